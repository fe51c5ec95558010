use crate::buffer::BufferView;
use crate::collective::batch::Batch;
use crate::error::Result;
use crate::transport::Transport;
use crate::types::{GroupConfig, Rank, StreamHandle};
use crate::wire::describe;

/// # Safety
/// `buffer` must satisfy [`BufferView::from_raw`]'s contract.
pub(crate) unsafe fn send<T: Transport>(
    transport: &T,
    group: GroupConfig,
    buffer: &BufferView,
    peer: Rank,
    stream: StreamHandle,
) -> Result<()> {
    group.check_rank(peer)?;
    let buf = describe(buffer, "send", "input")?;
    unsafe { transport.send(buf.ptr, buf.count, buf.wire_type, peer, stream) }
}

/// # Safety
/// `buffer` must satisfy [`BufferView::from_raw`]'s contract.
pub(crate) unsafe fn recv<T: Transport>(
    transport: &T,
    group: GroupConfig,
    buffer: &BufferView,
    peer: Rank,
    stream: StreamHandle,
) -> Result<()> {
    group.check_rank(peer)?;
    let buf = describe(buffer, "recv", "output")?;
    unsafe { transport.recv(buf.ptr, buf.count, buf.wire_type, peer, stream) }
}

/// Send `input` to `peer` and receive `output` from it as one grouped exchange.
///
/// # Safety
/// Both buffers must satisfy [`BufferView::from_raw`]'s contract.
pub(crate) unsafe fn send_recv<T: Transport>(
    transport: &T,
    group: GroupConfig,
    input: &BufferView,
    output: &BufferView,
    peer: Rank,
    stream: StreamHandle,
) -> Result<()> {
    group.check_rank(peer)?;
    let src = describe(input, "send_recv", "input")?;
    let dst = describe(output, "send_recv", "output")?;

    let batch = Batch::open(transport, group, stream)?;
    unsafe {
        batch.send_wire(&src, peer)?;
        batch.recv_wire(&dst, peer)?;
    }
    batch.finish()
}
