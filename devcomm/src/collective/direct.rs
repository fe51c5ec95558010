//! Collectives that map onto exactly one transport call.

use crate::buffer::BufferView;
use crate::collective::helpers::{check_count, check_same_type};
use crate::error::Result;
use crate::transport::Transport;
use crate::types::{GroupConfig, Rank, ReduceOp, StreamHandle};
use crate::wire::describe;

/// # Safety
/// Both buffers must satisfy [`BufferView::from_raw`]'s contract.
pub(crate) unsafe fn all_reduce<T: Transport>(
    transport: &T,
    input: &BufferView,
    output: &BufferView,
    op: ReduceOp,
    stream: StreamHandle,
) -> Result<()> {
    let src = describe(input, "all_reduce", "input")?;
    let dst = describe(output, "all_reduce", "output")?;
    check_same_type("all_reduce", input, output)?;
    check_count("all_reduce", src.count, dst.count)?;
    unsafe {
        transport.all_reduce(src.ptr, dst.ptr, src.count, src.wire_type, op, stream)
    }
}

/// `output` is only read on `root`.
///
/// # Safety
/// `input` everywhere and `output` on `root` must satisfy
/// [`BufferView::from_raw`]'s contract.
pub(crate) unsafe fn reduce<T: Transport>(
    transport: &T,
    group: GroupConfig,
    input: &BufferView,
    output: &BufferView,
    root: Rank,
    op: ReduceOp,
    stream: StreamHandle,
) -> Result<()> {
    group.check_rank(root)?;
    let src = describe(input, "reduce", "input")?;
    let dst_ptr = if group.rank() == root {
        let dst = describe(output, "reduce", "output")?;
        check_same_type("reduce", input, output)?;
        check_count("reduce", src.count, dst.count)?;
        dst.ptr
    } else {
        output.ptr()
    };
    unsafe {
        transport.reduce(src.ptr, dst_ptr, src.count, src.wire_type, op, root, stream)
    }
}

/// In place: `buffer` is the source on `root` and the destination elsewhere.
///
/// # Safety
/// `buffer` must satisfy [`BufferView::from_raw`]'s contract.
pub(crate) unsafe fn broadcast<T: Transport>(
    transport: &T,
    group: GroupConfig,
    buffer: &BufferView,
    root: Rank,
    stream: StreamHandle,
) -> Result<()> {
    group.check_rank(root)?;
    let buf = describe(buffer, "broadcast", "buffer")?;
    unsafe {
        transport.broadcast(buf.ptr, buf.ptr, buf.count, buf.wire_type, root, stream)
    }
}

/// `input` holds `world_size` chunks of `output`'s size; rank `i` ends up
/// with the reduction of every rank's chunk `i`.
///
/// # Safety
/// Both buffers must satisfy [`BufferView::from_raw`]'s contract.
pub(crate) unsafe fn reduce_scatter<T: Transport>(
    transport: &T,
    group: GroupConfig,
    input: &BufferView,
    output: &BufferView,
    op: ReduceOp,
    stream: StreamHandle,
) -> Result<()> {
    let src = describe(input, "reduce_scatter", "input")?;
    let dst = describe(output, "reduce_scatter", "output")?;
    check_same_type("reduce_scatter", input, output)?;
    check_count(
        "reduce_scatter",
        dst.count * group.world_size() as usize,
        src.count,
    )?;
    unsafe {
        transport.reduce_scatter(src.ptr, dst.ptr, dst.count, src.wire_type, op, stream)
    }
}

/// `output` holds `world_size` copies of `input`'s size, in rank order.
///
/// # Safety
/// Both buffers must satisfy [`BufferView::from_raw`]'s contract.
pub(crate) unsafe fn all_gather<T: Transport>(
    transport: &T,
    group: GroupConfig,
    input: &BufferView,
    output: &BufferView,
    stream: StreamHandle,
) -> Result<()> {
    let src = describe(input, "all_gather", "input")?;
    let dst = describe(output, "all_gather", "output")?;
    check_same_type("all_gather", input, output)?;
    check_count(
        "all_gather",
        src.count * group.world_size() as usize,
        dst.count,
    )?;
    unsafe { transport.all_gather(src.ptr, dst.ptr, src.count, src.wire_type, stream) }
}
