//! Buffer descriptors handed to the collective layer.
//!
//! A [`BufferView`] is the only thing the communicator knows about a
//! caller's array: a raw pointer in whatever memory space the transport
//! addresses, a shape, an element type and contiguity flags. Array
//! libraries build one per call; host slices get safe constructors.

use crate::error::{CommError, Result};
use crate::types::{Element, ElementType};

/// Contiguity of a buffer in the two canonical memory orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Layout {
    /// Row-major (last index varies fastest).
    pub c_contiguous: bool,
    /// Column-major (first index varies fastest).
    pub f_contiguous: bool,
}

impl Layout {
    /// Row-major contiguous. Zero- and one-dimensional buffers are both.
    pub const C: Layout = Layout {
        c_contiguous: true,
        f_contiguous: false,
    };

    /// Column-major contiguous.
    pub const F: Layout = Layout {
        c_contiguous: false,
        f_contiguous: true,
    };

    /// Neither order; e.g. a strided slice.
    pub const STRIDED: Layout = Layout {
        c_contiguous: false,
        f_contiguous: false,
    };

    pub fn is_contiguous(&self) -> bool {
        self.c_contiguous || self.f_contiguous
    }
}

/// Descriptor of one caller buffer: `{pointer, shape, element type, layout}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferView {
    ptr: u64,
    shape: Vec<usize>,
    dtype: ElementType,
    layout: Layout,
}

impl BufferView {
    /// Describe an arbitrary buffer.
    ///
    /// # Safety
    /// `ptr` must address at least `product(shape) * dtype.size_in_bytes()`
    /// bytes laid out as `layout` claims, in the memory space of the
    /// transport the view is handed to, and must stay valid until that
    /// transport has finished with it.
    pub unsafe fn from_raw(ptr: u64, shape: &[usize], dtype: ElementType, layout: Layout) -> Self {
        let layout = if shape.iter().filter(|&&d| d != 1).count() <= 1 {
            // Vectors (including degenerate N-d shapes) are contiguous in both orders.
            Layout {
                c_contiguous: layout.is_contiguous(),
                f_contiguous: layout.is_contiguous(),
            }
        } else {
            layout
        };
        Self {
            ptr,
            shape: shape.to_vec(),
            dtype,
            layout,
        }
    }

    /// Read-only view of a host slice as a row-major array of `shape`.
    ///
    /// Fails with `SizeMismatch` if `shape` does not cover exactly `data.len()` elements.
    pub fn from_slice<T: Element>(data: &[T], shape: &[usize]) -> Result<Self> {
        check_len(data.len(), shape)?;
        // SAFETY: the slice covers exactly `product(shape)` elements of `T`.
        Ok(unsafe { Self::from_raw(data.as_ptr() as u64, shape, T::DTYPE, Layout::C) })
    }

    /// Writable view of a host slice as a row-major array of `shape`.
    pub fn from_mut_slice<T: Element>(data: &mut [T], shape: &[usize]) -> Result<Self> {
        check_len(data.len(), shape)?;
        // SAFETY: the slice covers exactly `product(shape)` elements of `T`.
        Ok(unsafe { Self::from_raw(data.as_mut_ptr() as u64, shape, T::DTYPE, Layout::C) })
    }

    pub fn ptr(&self) -> u64 {
        self.ptr
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn dtype(&self) -> ElementType {
        self.dtype
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn is_contiguous(&self) -> bool {
        self.layout.is_contiguous()
    }

    /// Number of elements (1 for a zero-dimensional buffer).
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the buffer in bytes.
    pub fn size_in_bytes(&self) -> usize {
        self.len() * self.dtype.size_in_bytes()
    }

    /// Extent of the first dimension (1 for a zero-dimensional buffer).
    pub fn leading_dim(&self) -> usize {
        self.shape.first().copied().unwrap_or(1)
    }

    /// The `index`-th slice along the first dimension.
    ///
    /// Slices are only contiguous when the buffer is row-major, so
    /// column-major multi-dimensional buffers are rejected with `Layout`.
    pub fn leading_slice(&self, index: usize, operation: &'static str) -> Result<BufferView> {
        if !self.layout.c_contiguous {
            return Err(CommError::Layout {
                operation,
                what: "a row-major buffer to slice",
                shape: self.shape.clone(),
            });
        }
        let lead = self.leading_dim();
        if index >= lead {
            return Err(CommError::Shape {
                operation,
                what: "slice index",
                expected: lead,
                shape: self.shape.clone(),
            });
        }
        let inner: &[usize] = self.shape.get(1..).unwrap_or(&[]);
        let slice_bytes = inner.iter().product::<usize>() * self.dtype.size_in_bytes();
        let ptr = self.ptr + (index * slice_bytes) as u64;
        // SAFETY: the slice lies inside this view's row-major allocation.
        Ok(unsafe { Self::from_raw(ptr, inner, self.dtype, Layout::C) })
    }
}

fn check_len(len: usize, shape: &[usize]) -> Result<()> {
    let expected: usize = shape.iter().product();
    if expected != len {
        return Err(CommError::SizeMismatch {
            operation: "buffer view",
            expected,
            actual: len,
        });
    }
    Ok(())
}
