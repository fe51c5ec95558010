use cudarc::nccl::sys::{ncclDataType_t, ncclRedOp_t};
use devcomm::{ReduceOp, WireType};

/// NCCL data type for a wire type.
///
/// Complex buffers never reach here as such: the layout adapter has already
/// turned them into twice as many elements of their real part type.
pub fn to_nccl_dtype(wt: WireType) -> ncclDataType_t {
    use ncclDataType_t::*;
    match wt {
        WireType::Int8 => ncclInt8,
        WireType::Uint8 => ncclUint8,
        WireType::Int32 => ncclInt32,
        WireType::Uint32 => ncclUint32,
        WireType::Int64 => ncclInt64,
        WireType::Uint64 => ncclUint64,
        WireType::Float16 => ncclFloat16,
        WireType::Float32 => ncclFloat32,
        WireType::Float64 => ncclFloat64,
    }
}

pub fn to_nccl_op(op: ReduceOp) -> ncclRedOp_t {
    use ncclRedOp_t::*;
    match op {
        ReduceOp::Sum => ncclSum,
        ReduceOp::Prod => ncclProd,
        ReduceOp::Max => ncclMax,
        ReduceOp::Min => ncclMin,
    }
}
