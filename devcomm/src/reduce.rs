//! Element-wise reduction over byte slices, used by the loopback transport.

use crate::types::{ReduceOp, WireType};

/// IEEE 754 binary16 kept as raw bits; arithmetic goes through `f32`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct F16(pub u16);

/// Smallest positive normal binary16 value, 2^-14.
const F16_MIN_NORMAL: f32 = 6.103_515_625e-5;
/// Halfway between the largest finite binary16 and the next power step.
const F16_OVERFLOW: f32 = 65520.0;

fn pow2(e: i32) -> f32 {
    f32::from_bits(((e + 127) as u32) << 23)
}

impl F16 {
    pub fn from_f32(v: f32) -> Self {
        let sign = ((v.to_bits() >> 16) & 0x8000) as u16;
        if v.is_nan() {
            return F16(sign | 0x7E00);
        }
        let abs = v.abs();
        if abs >= F16_OVERFLOW {
            return F16(sign | 0x7C00);
        }
        if abs < F16_MIN_NORMAL {
            // subnormal steps are 2^-24; a round-up to 0x400 lands on the min normal
            let steps = (abs * pow2(24)).round_ties_even() as u16;
            return F16(sign | steps);
        }

        let bits = abs.to_bits();
        let exp = ((bits >> 23) as i32 - 127 + 15) as u32;
        let man = bits & 0x007F_FFFF;
        let mut half = (exp << 10) | (man >> 13);
        let dropped = man & 0x1FFF;
        if dropped > 0x1000 || (dropped == 0x1000 && half & 1 == 1) {
            half += 1;
        }
        F16(sign | half as u16)
    }

    pub fn to_f32(self) -> f32 {
        let exp = ((self.0 >> 10) & 0x1F) as i32;
        let man = (self.0 & 0x03FF) as f32;
        let magnitude = match exp {
            0 => man * pow2(-24),
            0x1F if man == 0.0 => f32::INFINITY,
            0x1F => f32::NAN,
            _ => (1024.0 + man) * pow2(exp - 25),
        };
        if self.0 & 0x8000 != 0 { -magnitude } else { magnitude }
    }
}

/// One element of a reduction buffer: how to load it, store it and combine two.
trait Lane: Copy {
    const WIDTH: usize;
    fn load(bytes: &[u8]) -> Self;
    fn store(self, bytes: &mut [u8]);
    fn combine(self, other: Self, op: ReduceOp) -> Self;
}

macro_rules! lane {
    ($combine:ident: $($ty:ty),*) => {
        $(
            impl Lane for $ty {
                const WIDTH: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn load(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(raw)
                }

                #[inline]
                fn store(self, bytes: &mut [u8]) {
                    bytes.copy_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn combine(self, other: Self, op: ReduceOp) -> Self {
                    $combine!(self, other, op)
                }
            }
        )*
    };
}

macro_rules! wrapping {
    ($a:expr, $b:expr, $op:expr) => {
        match $op {
            ReduceOp::Sum => $a.wrapping_add($b),
            ReduceOp::Prod => $a.wrapping_mul($b),
            ReduceOp::Max => $a.max($b),
            ReduceOp::Min => $a.min($b),
        }
    };
}

macro_rules! ieee {
    ($a:expr, $b:expr, $op:expr) => {
        match $op {
            ReduceOp::Sum => $a + $b,
            ReduceOp::Prod => $a * $b,
            ReduceOp::Max => $a.max($b),
            ReduceOp::Min => $a.min($b),
        }
    };
}

lane!(wrapping: i8, u8, u16, i32, u32, i64, u64);
lane!(ieee: f32, f64);

impl Lane for F16 {
    const WIDTH: usize = 2;

    fn load(bytes: &[u8]) -> Self {
        F16(u16::load(bytes))
    }

    fn store(self, bytes: &mut [u8]) {
        self.0.store(bytes)
    }

    fn combine(self, other: Self, op: ReduceOp) -> Self {
        F16::from_f32(self.to_f32().combine(other.to_f32(), op))
    }
}

/// `dst[i] = op(dst[i], src[i])` over byte slices holding `dtype` elements.
///
/// Both slices must have the same length, a multiple of the element size.
pub(crate) fn reduce_slice(dst: &mut [u8], src: &[u8], dtype: WireType, op: ReduceOp) {
    debug_assert_eq!(dst.len(), src.len());
    match dtype {
        WireType::Int8 => fold::<i8>(dst, src, op),
        WireType::Uint8 => fold::<u8>(dst, src, op),
        WireType::Int32 => fold::<i32>(dst, src, op),
        WireType::Uint32 => fold::<u32>(dst, src, op),
        WireType::Int64 => fold::<i64>(dst, src, op),
        WireType::Uint64 => fold::<u64>(dst, src, op),
        WireType::Float16 => fold::<F16>(dst, src, op),
        WireType::Float32 => fold::<f32>(dst, src, op),
        WireType::Float64 => fold::<f64>(dst, src, op),
    }
}

fn fold<L: Lane>(dst: &mut [u8], src: &[u8], op: ReduceOp) {
    for (d, s) in dst.chunks_exact_mut(L::WIDTH).zip(src.chunks_exact(L::WIDTH)) {
        L::load(d).combine(L::load(s), op).store(d);
    }
}
