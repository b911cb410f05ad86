// Copyright (c) 2025 knix
// All rights reserved.

use std::fmt::{Display, Formatter};

use ecow::EcoVec;
use itertools::Itertools;

use crate::error::CodecResult;
use crate::unsupportedf;

/// The layout-level type of a value; what the bytes of a value look like rather
/// than what the source program called it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dtyp {
    /// Fixed-width integer, by bit width
    I(u32),
    Pointer,
    /// Architecture-width integer that can carry a pointer's integer form
    Iptr,
    Half,
    Float,
    Double,
    X86Fp80,
    Fp128,
    PpcFp128,
    Array(u64, Box<Dtyp>),
    Vector(u64, Box<Dtyp>),
    Struct(EcoVec<Dtyp>),
    PackedStruct(EcoVec<Dtyp>),
    Void,
    Opaque,
    Metadata,
    X86Mmx,
}

impl Dtyp {
    pub const I1: Dtyp = Dtyp::I(1);
    pub const I8: Dtyp = Dtyp::I(8);
    pub const I32: Dtyp = Dtyp::I(32);
    pub const I64: Dtyp = Dtyp::I(64);

    pub fn array(count: u64, element: Dtyp) -> Dtyp {
        Dtyp::Array(count, Box::new(element))
    }

    pub fn vector(count: u64, element: Dtyp) -> Dtyp {
        Dtyp::Vector(count, Box::new(element))
    }

    pub fn structure(fields: impl IntoIterator<Item = Dtyp>) -> Dtyp {
        Dtyp::Struct(fields.into_iter().collect())
    }

    pub fn packed_structure(fields: impl IntoIterator<Item = Dtyp>) -> Dtyp {
        Dtyp::PackedStruct(fields.into_iter().collect())
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Dtyp::I(_) => "integer",
            Dtyp::Pointer => "pointer",
            Dtyp::Iptr => "iptr",
            Dtyp::Half => "half",
            Dtyp::Float => "float",
            Dtyp::Double => "double",
            Dtyp::X86Fp80 => "x86_fp80",
            Dtyp::Fp128 => "fp128",
            Dtyp::PpcFp128 => "ppc_fp128",
            Dtyp::Array(_, _) => "array",
            Dtyp::Vector(_, _) => "vector",
            Dtyp::Struct(_) => "struct",
            Dtyp::PackedStruct(_) => "packed struct",
            Dtyp::Void => "void",
            Dtyp::Opaque => "opaque",
            Dtyp::Metadata => "metadata",
            Dtyp::X86Mmx => "x86_mmx",
        }
    }

    pub fn is_supported_int_width(bits: u32) -> bool {
        matches!(bits, 1 | 8 | 32 | 64)
    }

    /// Fails with an unsupported error naming the first unsupported type found,
    /// searching fields and elements in order.
    pub fn check_supported(&self) -> CodecResult<()> {
        match self {
            Dtyp::I(bits) if Dtyp::is_supported_int_width(*bits) => Ok(()),
            Dtyp::I(bits) => unsupportedf!("integer width i{bits} is not supported"),
            Dtyp::Pointer | Dtyp::Iptr | Dtyp::Float | Dtyp::Double | Dtyp::Void => Ok(()),
            Dtyp::Array(_, elem) | Dtyp::Vector(_, elem) => elem.check_supported(),
            Dtyp::Struct(fields) | Dtyp::PackedStruct(fields) => {
                fields.iter().try_for_each(|f| f.check_supported())
            }
            Dtyp::Half
            | Dtyp::X86Fp80
            | Dtyp::Fp128
            | Dtyp::PpcFp128
            | Dtyp::Opaque
            | Dtyp::Metadata
            | Dtyp::X86Mmx => unsupportedf!("type {} is not supported", self),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.check_supported().is_ok()
    }

    /// The type of the member at `index` of an aggregate
    pub fn member(&self, index: u64) -> Option<&Dtyp> {
        match self {
            Dtyp::Array(count, elem) | Dtyp::Vector(count, elem) => {
                if index < *count { Some(elem) } else { None }
            }
            Dtyp::Struct(fields) | Dtyp::PackedStruct(fields) => {
                usize::try_from(index).ok().and_then(|i| fields.get(i))
            }
            _ => None,
        }
    }

    pub fn member_at_path(&self, path: &[u64]) -> Option<&Dtyp> {
        path.iter().try_fold(self, |t, index| t.member(*index))
    }
}

impl Display for Dtyp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Dtyp::I(bits) => write!(f, "i{}", bits),
            Dtyp::Pointer => f.write_str("ptr"),
            Dtyp::Iptr => f.write_str("iptr"),
            Dtyp::Half => f.write_str("half"),
            Dtyp::Float => f.write_str("float"),
            Dtyp::Double => f.write_str("double"),
            Dtyp::X86Fp80 => f.write_str("x86_fp80"),
            Dtyp::Fp128 => f.write_str("fp128"),
            Dtyp::PpcFp128 => f.write_str("ppc_fp128"),
            Dtyp::Array(count, elem) => write!(f, "[{} x {}]", count, elem),
            Dtyp::Vector(count, elem) => write!(f, "<{} x {}>", count, elem),
            Dtyp::Struct(fields) => write!(f, "{{ {} }}", fields.iter().join(", ")),
            Dtyp::PackedStruct(fields) => write!(f, "<{{ {} }}>", fields.iter().join(", ")),
            Dtyp::Void => f.write_str("void"),
            Dtyp::Opaque => f.write_str("opaque"),
            Dtyp::Metadata => f.write_str("metadata"),
            Dtyp::X86Mmx => f.write_str("x86_mmx"),
        }
    }
}
