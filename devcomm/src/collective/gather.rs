use crate::buffer::BufferView;
use crate::collective::batch::Batch;
use crate::collective::helpers::{check_same_type, describe_slices};
use crate::error::Result;
use crate::transport::Transport;
use crate::types::{GroupConfig, Rank, StreamHandle};
use crate::wire::describe;

/// Gather: every rank sends `input` to root, which receives rank `i`'s
/// contribution into leading slice `i` of `output`.
///
/// `output` is only inspected on root.
///
/// # Safety
/// `input` everywhere and `output` on root must satisfy
/// [`BufferView::from_raw`]'s contract.
pub(crate) unsafe fn gather<T: Transport>(
    transport: &T,
    group: GroupConfig,
    input: &BufferView,
    output: &BufferView,
    root: Rank,
    stream: StreamHandle,
) -> Result<()> {
    group.check_rank(root)?;
    let src = describe(input, "gather", "input")?;
    let slices = if group.rank() == root {
        check_same_type("gather", input, output)?;
        describe_slices(output, input, group, "gather", "output")?
    } else {
        Vec::new()
    };

    let batch = Batch::open(transport, group, stream)?;
    unsafe { batch.send_wire(&src, root)? };
    for (peer, slice) in slices.iter().enumerate() {
        unsafe { batch.recv_wire(slice, peer as Rank)? };
    }
    batch.finish()
}
