// Copyright (c) 2025 knix
// All rights reserved.

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::types::Dtyp;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianess {
    Little,
    Big,
}

/// Bit width -> alignment in bytes
pub type AlignmentTable = BTreeMap<u32, u64>;

/// Target description that every size and byte-order decision is made against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    pub endianess: Endianess,
    /// Size of `ptr` and `iptr`, in bytes
    pub pointer_size: usize,
    pub int_alignments: AlignmentTable,
    pub float_alignments: AlignmentTable,
}

impl Default for DataLayout {
    /// Little-endian, 8-byte pointers, LLVM's default alignment tables
    fn default() -> Self {
        DataLayout {
            endianess: Endianess::Little,
            pointer_size: 8,
            int_alignments: AlignmentTable::from([(1, 1), (8, 1), (16, 2), (32, 4), (64, 8)]),
            float_alignments: AlignmentTable::from([(16, 2), (32, 4), (64, 8), (128, 16)]),
        }
    }
}

impl DataLayout {
    pub fn big_endian() -> Self {
        DataLayout::default().with_endianess(Endianess::Big)
    }

    pub fn with_endianess(mut self, endianess: Endianess) -> Self {
        self.endianess = endianess;
        self
    }

    pub fn with_pointer_size(mut self, pointer_size: usize) -> Self {
        self.pointer_size = pointer_size;
        self
    }

    /// Width of pointers and iptrs in bits
    pub fn pointer_bits(&self) -> u32 {
        u32::try_from(self.pointer_size.saturating_mul(8)).unwrap_or(u32::MAX)
    }

    pub fn is_big_endian(&self) -> bool {
        self.endianess == Endianess::Big
    }

    /// Size in bytes of a value of type `dt`. Integer widths other than
    /// 1, 8, 32 and 64 have size 0; callers reject them through
    /// [`Dtyp::check_supported`]. Structs are not padded.
    pub fn sizeof(&self, dt: &Dtyp) -> usize {
        match dt {
            Dtyp::I(1) | Dtyp::I(8) => 1,
            Dtyp::I(32) => 4,
            Dtyp::I(64) => 8,
            Dtyp::I(_) => 0,
            Dtyp::Pointer | Dtyp::Iptr => self.pointer_size,
            Dtyp::Half => 2,
            Dtyp::Float => 4,
            Dtyp::Double => 8,
            Dtyp::X86Fp80 => 10,
            Dtyp::Fp128 | Dtyp::PpcFp128 => 16,
            Dtyp::Array(count, elem) | Dtyp::Vector(count, elem) => {
                usize::try_from(*count).unwrap_or(usize::MAX).saturating_mul(self.sizeof(elem))
            }
            Dtyp::Struct(fields) | Dtyp::PackedStruct(fields) => {
                fields.iter().fold(0usize, |acc, f| acc.saturating_add(self.sizeof(f)))
            }
            Dtyp::Void | Dtyp::Opaque | Dtyp::Metadata | Dtyp::X86Mmx => 0,
        }
    }

    /// ABI alignment in bytes of a value of type `dt`, or `None` when the
    /// relevant alignment table is empty.
    pub fn dtyp_alignment(&self, dt: &Dtyp) -> Option<u64> {
        match dt {
            Dtyp::I(bits) => alignment(*bits, &self.int_alignments),
            Dtyp::Pointer | Dtyp::Iptr => Some(self.pointer_size as u64),
            Dtyp::Half => alignment(16, &self.float_alignments),
            Dtyp::Float => alignment(32, &self.float_alignments),
            Dtyp::Double => alignment(64, &self.float_alignments),
            Dtyp::X86Fp80 => alignment(80, &self.float_alignments),
            Dtyp::Fp128 | Dtyp::PpcFp128 => alignment(128, &self.float_alignments),
            Dtyp::Array(_, elem) | Dtyp::Vector(_, elem) => self.dtyp_alignment(elem),
            Dtyp::Struct(fields) => {
                fields.iter().try_fold(1, |acc, f| self.dtyp_alignment(f).map(|a| acc.max(a)))
            }
            Dtyp::PackedStruct(_) => Some(1),
            Dtyp::Void | Dtyp::Opaque | Dtyp::Metadata | Dtyp::X86Mmx => Some(1),
        }
    }
}

/// Alignment for `bit_width`: the exact entry if there is one, otherwise the
/// entry of the smallest wider key, otherwise the entry of the largest key.
pub fn alignment(bit_width: u32, table: &AlignmentTable) -> Option<u64> {
    if let Some(exact) = table.get(&bit_width) {
        return Some(*exact);
    }
    table
        .range((Bound::Excluded(bit_width), Bound::Unbounded))
        .next()
        .or_else(|| table.last_key_value())
        .map(|(_, align)| *align)
}
