use crate::buffer::BufferView;
use crate::collective::batch::Batch;
use crate::collective::helpers::{check_same_type, describe_slices};
use crate::error::Result;
use crate::transport::Transport;
use crate::types::{GroupConfig, Rank, StreamHandle};
use crate::wire::describe;

/// Scatter: root sends leading slice `i` of `input` to rank `i`.
///
/// Every rank, root included, receives exactly one slice into `output`.
/// `input` is only inspected on root and must have `world_size` as its
/// leading dimension there.
///
/// # Safety
/// `output` everywhere and `input` on root must satisfy
/// [`BufferView::from_raw`]'s contract.
pub(crate) unsafe fn scatter<T: Transport>(
    transport: &T,
    group: GroupConfig,
    input: &BufferView,
    output: &BufferView,
    root: Rank,
    stream: StreamHandle,
) -> Result<()> {
    group.check_rank(root)?;
    let dst = describe(output, "scatter", "output")?;
    let slices = if group.rank() == root {
        check_same_type("scatter", input, output)?;
        describe_slices(input, output, group, "scatter", "input")?
    } else {
        Vec::new()
    };

    let batch = Batch::open(transport, group, stream)?;
    for (peer, slice) in slices.iter().enumerate() {
        unsafe { batch.send_wire(slice, peer as Rank)? };
    }
    unsafe { batch.recv_wire(&dst, root)? };
    batch.finish()
}
