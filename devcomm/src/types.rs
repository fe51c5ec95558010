use crate::error::{CommError, Result};

/// Rank of a participant in a communicator group (0-indexed).
pub type Rank = u32;

/// Size of the group and this process's place in it.
///
/// Fixed for the lifetime of a [`Communicator`](crate::Communicator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupConfig {
    world_size: u32,
    rank: Rank,
}

impl GroupConfig {
    /// Validate and build a group configuration.
    pub fn new(world_size: u32, rank: Rank) -> Result<Self> {
        if world_size == 0 {
            return Err(CommError::InvalidGroup {
                reason: "group size must be positive".into(),
            });
        }
        if rank >= world_size {
            return Err(CommError::InvalidRank { rank, world_size });
        }
        Ok(Self { world_size, rank })
    }

    pub fn world_size(&self) -> u32 {
        self.world_size
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// Check that `peer` names a member of this group.
    pub fn check_rank(&self, peer: Rank) -> Result<()> {
        if peer >= self.world_size {
            return Err(CommError::InvalidRank {
                rank: peer,
                world_size: self.world_size,
            });
        }
        Ok(())
    }
}

/// Element types an array library can hand us.
///
/// Wider than what the device transport carries; types without a wire
/// mapping are rejected by the layout adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ElementType {
    Bool = 0,
    I8 = 1,
    U8 = 2,
    I16 = 3,
    U16 = 4,
    I32 = 5,
    U32 = 6,
    I64 = 7,
    U64 = 8,
    F16 = 9,
    BF16 = 10,
    F32 = 11,
    F64 = 12,
    /// Complex number with two f16 parts.
    ComplexHalf = 13,
    /// Complex number with two f32 parts.
    Complex64 = 14,
    /// Complex number with two f64 parts.
    Complex128 = 15,
}

impl ElementType {
    /// Size of one element in bytes.
    pub const fn size_in_bytes(self) -> usize {
        match self {
            ElementType::Bool | ElementType::I8 | ElementType::U8 => 1,
            ElementType::I16 | ElementType::U16 | ElementType::F16 | ElementType::BF16 => 2,
            ElementType::I32 | ElementType::U32 | ElementType::F32 | ElementType::ComplexHalf => 4,
            ElementType::I64 | ElementType::U64 | ElementType::F64 | ElementType::Complex64 => 8,
            ElementType::Complex128 => 16,
        }
    }

    pub const fn is_complex(self) -> bool {
        matches!(
            self,
            ElementType::ComplexHalf | ElementType::Complex64 | ElementType::Complex128
        )
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            ElementType::Bool => "bool",
            ElementType::I8 => "i8",
            ElementType::U8 => "u8",
            ElementType::I16 => "i16",
            ElementType::U16 => "u16",
            ElementType::I32 => "i32",
            ElementType::U32 => "u32",
            ElementType::I64 => "i64",
            ElementType::U64 => "u64",
            ElementType::F16 => "f16",
            ElementType::BF16 => "bf16",
            ElementType::F32 => "f32",
            ElementType::F64 => "f64",
            ElementType::ComplexHalf => "complex32",
            ElementType::Complex64 => "complex64",
            ElementType::Complex128 => "complex128",
        }
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Host element types that map onto an [`ElementType`] tag.
pub trait Element: Copy + Send + 'static {
    const DTYPE: ElementType;
}

macro_rules! impl_element {
    ($($ty:ty => $tag:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: ElementType = ElementType::$tag;
            }
        )*
    };
}

impl_element!(
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    [f32; 2] => Complex64,
    [f64; 2] => Complex128,
);

/// Transport-level element type.
///
/// Mirrors the fixed set of types the device transport moves natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
    Int8 = 0,
    Uint8 = 1,
    Int32 = 2,
    Uint32 = 3,
    Int64 = 4,
    Uint64 = 5,
    Float16 = 6,
    Float32 = 7,
    Float64 = 8,
}

impl WireType {
    /// Size of one wire element in bytes.
    pub const fn size_in_bytes(self) -> usize {
        match self {
            WireType::Int8 | WireType::Uint8 => 1,
            WireType::Float16 => 2,
            WireType::Int32 | WireType::Uint32 | WireType::Float32 => 4,
            WireType::Int64 | WireType::Uint64 | WireType::Float64 => 8,
        }
    }
}

/// Reduction operations for collective communication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReduceOp {
    /// Element-wise sum across ranks.
    Sum,
    /// Element-wise product across ranks.
    Prod,
    /// Element-wise maximum across ranks.
    Max,
    /// Element-wise minimum across ranks.
    Min,
}

impl std::fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReduceOp::Sum => f.write_str("sum"),
            ReduceOp::Prod => f.write_str("prod"),
            ReduceOp::Max => f.write_str("max"),
            ReduceOp::Min => f.write_str("min"),
        }
    }
}

impl std::str::FromStr for ReduceOp {
    type Err = CommError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sum" => Ok(ReduceOp::Sum),
            "prod" => Ok(ReduceOp::Prod),
            "max" => Ok(ReduceOp::Max),
            "min" => Ok(ReduceOp::Min),
            other => Err(CommError::UnsupportedOp {
                op: other.to_string(),
            }),
        }
    }
}

/// Raw execution stream handle (e.g. a `cudaStream_t` cast to `u64`).
///
/// `StreamHandle::DEFAULT` is the legacy default stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StreamHandle(pub u64);

impl StreamHandle {
    pub const DEFAULT: StreamHandle = StreamHandle(0);

    pub fn as_u64(self) -> u64 {
        self.0
    }
}
