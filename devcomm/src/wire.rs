//! Translation from caller buffers to what the device transport consumes.
//!
//! Every buffer argument of every operation goes through [`describe`]
//! before any store or transport call is issued.

use crate::buffer::BufferView;
use crate::error::{CommError, Result};
use crate::types::{ElementType, WireType};

/// A validated buffer as the transport sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireDescriptor {
    pub ptr: u64,
    /// Element count in units of `wire_type`.
    pub count: usize,
    pub wire_type: WireType,
}

impl WireDescriptor {
    pub fn size_in_bytes(&self) -> usize {
        self.count * self.wire_type.size_in_bytes()
    }
}

/// Wire type for an element type, and how many wire elements one
/// element occupies (2 for complex: real and imaginary parts travel as
/// independent elements).
pub fn wire_type(dtype: ElementType) -> Result<(WireType, usize)> {
    let mapped = match dtype {
        ElementType::I8 => (WireType::Int8, 1),
        ElementType::U8 => (WireType::Uint8, 1),
        ElementType::I32 => (WireType::Int32, 1),
        ElementType::U32 => (WireType::Uint32, 1),
        ElementType::I64 => (WireType::Int64, 1),
        ElementType::U64 => (WireType::Uint64, 1),
        ElementType::F16 => (WireType::Float16, 1),
        ElementType::F32 => (WireType::Float32, 1),
        ElementType::F64 => (WireType::Float64, 1),
        ElementType::Complex64 => (WireType::Float32, 2),
        ElementType::Complex128 => (WireType::Float64, 2),
        ElementType::Bool
        | ElementType::I16
        | ElementType::U16
        | ElementType::BF16
        | ElementType::ComplexHalf => return Err(CommError::UnsupportedType { dtype }),
    };
    Ok(mapped)
}

/// Validate `buf` for `operation` and translate it to a wire descriptor.
///
/// `what` names the argument in error messages ("input", "output", ...).
pub fn describe(buf: &BufferView, operation: &'static str, what: &'static str) -> Result<WireDescriptor> {
    if !buf.is_contiguous() {
        return Err(CommError::Layout {
            operation,
            what,
            shape: buf.shape().to_vec(),
        });
    }
    let (wire_type, per_element) = wire_type(buf.dtype())?;
    Ok(WireDescriptor {
        ptr: buf.ptr(),
        count: buf.len() * per_element,
        wire_type,
    })
}
