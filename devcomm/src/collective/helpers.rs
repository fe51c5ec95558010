use crate::buffer::BufferView;
use crate::error::{CommError, Result};
use crate::types::GroupConfig;
use crate::wire::{WireDescriptor, describe};

/// Fail with `TypeMismatch` unless both buffers hold the same element type.
pub(crate) fn check_same_type(
    operation: &'static str,
    input: &BufferView,
    output: &BufferView,
) -> Result<()> {
    if input.dtype() != output.dtype() {
        return Err(CommError::TypeMismatch {
            operation,
            input: input.dtype(),
            output: output.dtype(),
        });
    }
    Ok(())
}

/// Fail with `SizeMismatch` unless `actual == expected` (counts in wire elements).
pub(crate) fn check_count(operation: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(CommError::SizeMismatch {
            operation,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Validate `buf` as `world_size` leading slices and describe each one.
///
/// Each slice must hold as many elements as `per_rank`.
pub(crate) fn describe_slices(
    buf: &BufferView,
    per_rank: &BufferView,
    group: GroupConfig,
    operation: &'static str,
    what: &'static str,
) -> Result<Vec<WireDescriptor>> {
    describe(buf, operation, what)?;
    let world = group.world_size() as usize;
    if buf.leading_dim() != world {
        return Err(CommError::Shape {
            operation,
            what,
            expected: world,
            shape: buf.shape().to_vec(),
        });
    }

    (0..world)
        .map(|i| {
            let slice = buf.leading_slice(i, operation)?;
            check_count(operation, per_rank.len(), slice.len())?;
            describe(&slice, operation, what)
        })
        .collect()
}
