use crate::buffer::BufferView;
use crate::collective::batch::Batch;
use crate::collective::helpers::{check_count, check_same_type};
use crate::error::{CommError, Result};
use crate::transport::Transport;
use crate::types::{GroupConfig, Rank, StreamHandle};
use crate::wire::{WireDescriptor, describe};

/// All-to-all: rank `r` sends leading slice `i` of `input` to rank `i` and
/// receives rank `i`'s slice `r` into leading slice `i` of `output`.
///
/// Both buffers need `world_size` as their leading dimension.
///
/// # Safety
/// Both buffers must satisfy [`BufferView::from_raw`]'s contract.
pub(crate) unsafe fn all_to_all<T: Transport>(
    transport: &T,
    group: GroupConfig,
    input: &BufferView,
    output: &BufferView,
    stream: StreamHandle,
) -> Result<()> {
    let sends = split(input, group, "input")?;
    let recvs = split(output, group, "output")?;
    check_same_type("all_to_all", input, output)?;
    if let (Some(s), Some(r)) = (sends.first(), recvs.first()) {
        check_count("all_to_all", r.count, s.count)?;
    }

    let batch = Batch::open(transport, group, stream)?;
    for (peer, (send, recv)) in sends.iter().zip(&recvs).enumerate() {
        unsafe {
            batch.send_wire(send, peer as Rank)?;
            batch.recv_wire(recv, peer as Rank)?;
        }
    }
    batch.finish()
}

fn split(buf: &BufferView, group: GroupConfig, what: &'static str) -> Result<Vec<WireDescriptor>> {
    describe(buf, "all_to_all", what)?;
    let world = group.world_size() as usize;
    if buf.leading_dim() != world {
        return Err(CommError::Shape {
            operation: "all_to_all",
            what,
            expected: world,
            shape: buf.shape().to_vec(),
        });
    }
    (0..world)
        .map(|i| describe(&buf.leading_slice(i, "all_to_all")?, "all_to_all", what))
        .collect()
}
