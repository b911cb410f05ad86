// Copyright (c) 2025 knix
// All rights reserved.

use std::fmt::{Display, Formatter};

use crate::types::Dtyp;

/// A fixed-width integer. Bits are stored unsigned; signed views are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntValue {
    I1(bool),
    I8(u8),
    I32(u32),
    I64(u64),
}

impl IntValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            IntValue::I1(_) => "i1",
            IntValue::I8(_) => "i8",
            IntValue::I32(_) => "i32",
            IntValue::I64(_) => "i64",
        }
    }

    pub fn bit_width(&self) -> u32 {
        match self {
            IntValue::I1(_) => 1,
            IntValue::I8(_) => 8,
            IntValue::I32(_) => 32,
            IntValue::I64(_) => 64,
        }
    }

    pub fn dtyp(&self) -> Dtyp {
        Dtyp::I(self.bit_width())
    }

    pub fn to_u64_bits(&self) -> u64 {
        match self {
            IntValue::I1(b) => *b as u64,
            IntValue::I8(v) => *v as u64,
            IntValue::I32(v) => *v as u64,
            IntValue::I64(v) => *v,
        }
    }

    /// Sign-extended view
    pub fn to_i64(&self) -> i64 {
        match self {
            // i1 true is -1 when read as signed
            IntValue::I1(b) => -(*b as i64),
            IntValue::I8(v) => *v as i8 as i64,
            IntValue::I32(v) => *v as i32 as i64,
            IntValue::I64(v) => *v as i64,
        }
    }

    /// Truncates `bits` to `width`; `None` for widths with no representation.
    pub fn from_u64_bits(width: u32, bits: u64) -> Option<IntValue> {
        match width {
            1 => Some(IntValue::I1(bits & 1 == 1)),
            8 => Some(IntValue::I8(bits as u8)),
            32 => Some(IntValue::I32(bits as u32)),
            64 => Some(IntValue::I64(bits)),
            _ => None,
        }
    }

    pub fn zero(width: u32) -> Option<IntValue> {
        IntValue::from_u64_bits(width, 0)
    }
}

impl Display for IntValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            IntValue::I1(v) => write!(f, "i1 {}", v),
            IntValue::I8(v) => write!(f, "i8 {}", v),
            IntValue::I32(v) => write!(f, "i32 {}", v),
            IntValue::I64(v) => write!(f, "i64 {}", v),
        }
    }
}
