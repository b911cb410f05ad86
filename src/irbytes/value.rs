// Copyright (c) 2025 knix
// All rights reserved.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use ecow::EcoVec;
use itertools::Itertools;
use num_bigint::BigInt;
use num_traits::One;

use crate::nz_u32_id;
use crate::ops::{ConversionKind, FloatBinop, FloatCmp, IntBinop, IntCmp};
use crate::types::Dtyp;

mod int_value;

pub use int_value::IntValue;

/// Deepest value nesting any recursive walk over values will follow
pub const MAX_VALUE_DEPTH: usize = 512;

nz_u32_id!(StoreId);
nz_u32_id!(AllocationId);

/// Where an address came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provenance {
    /// No provenance; the address was never derived from an allocation
    Nil,
    /// May alias any allocation; what integer-to-pointer casts produce
    Wildcard,
    Allocation(AllocationId),
}

impl Display for Provenance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Provenance::Nil => f.write_str("nil"),
            Provenance::Wildcard => f.write_str("*"),
            Provenance::Allocation(id) => write!(f, "alloc{}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub bits: u64,
    pub provenance: Provenance,
}

impl Address {
    pub fn new(bits: u64, provenance: Provenance) -> Address {
        Address { bits, provenance }
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ptr {:#x} ({})", self.bits, self.provenance)
    }
}

/// `int` reduced into `0..2^bits`. Iptrs are kept in this form once
/// concretized, whatever sign they were written with.
pub fn wrap_unsigned(int: &BigInt, bits: u32) -> BigInt {
    let mask: BigInt = (BigInt::one() << bits as usize) - 1;
    int & mask
}

/// Two's complement reading of the low `bits` bits of `int`
pub fn signed_view(int: &BigInt, bits: u32) -> BigInt {
    let unsigned = wrap_unsigned(int, bits);
    if bits > 0 && unsigned >= (BigInt::one() << (bits as usize - 1)) {
        unsigned - (BigInt::one() << bits as usize)
    } else {
        unsigned
    }
}

/// A fully concrete value
#[derive(Debug, Clone, PartialEq)]
pub enum DValue {
    Addr(Address),
    Int(IntValue),
    Iptr(BigInt),
    Float(f32),
    Double(f64),
    Struct(EcoVec<DValue>),
    PackedStruct(EcoVec<DValue>),
    Array(EcoVec<DValue>),
    Vector(EcoVec<DValue>),
    /// The result of a void computation
    None,
    /// Some value of this type, but a precondition was violated producing it
    Poison(Dtyp),
}

impl DValue {
    pub fn i1(v: bool) -> DValue {
        DValue::Int(IntValue::I1(v))
    }
    pub fn i8(v: u8) -> DValue {
        DValue::Int(IntValue::I8(v))
    }
    pub fn i32(v: u32) -> DValue {
        DValue::Int(IntValue::I32(v))
    }
    pub fn i64(v: u64) -> DValue {
        DValue::Int(IntValue::I64(v))
    }
    pub fn iptr(v: impl Into<BigInt>) -> DValue {
        DValue::Iptr(v.into())
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            DValue::Addr(_) => "address",
            DValue::Int(i) => i.kind_name(),
            DValue::Iptr(_) => "iptr",
            DValue::Float(_) => "float",
            DValue::Double(_) => "double",
            DValue::Struct(_) => "struct",
            DValue::PackedStruct(_) => "packed struct",
            DValue::Array(_) => "array",
            DValue::Vector(_) => "vector",
            DValue::None => "none",
            DValue::Poison(_) => "poison",
        }
    }

    pub fn is_poison(&self) -> bool {
        matches!(self, DValue::Poison(_))
    }

    /// The type this value was built at, when it can be recovered from the
    /// value alone. Empty arrays and vectors have no recoverable element type.
    pub fn dtyp(&self) -> Option<Dtyp> {
        match self {
            DValue::Addr(_) => Some(Dtyp::Pointer),
            DValue::Int(i) => Some(i.dtyp()),
            DValue::Iptr(_) => Some(Dtyp::Iptr),
            DValue::Float(_) => Some(Dtyp::Float),
            DValue::Double(_) => Some(Dtyp::Double),
            DValue::Struct(fields) => {
                fields.iter().map(|f| f.dtyp()).collect::<Option<EcoVec<_>>>().map(Dtyp::Struct)
            }
            DValue::PackedStruct(fields) => fields
                .iter()
                .map(|f| f.dtyp())
                .collect::<Option<EcoVec<_>>>()
                .map(Dtyp::PackedStruct),
            DValue::Array(elems) => {
                let elem = elems.first()?.dtyp()?;
                Some(Dtyp::array(elems.len() as u64, elem))
            }
            DValue::Vector(elems) => {
                let elem = elems.first()?.dtyp()?;
                Some(Dtyp::vector(elems.len() as u64, elem))
            }
            DValue::None => Some(Dtyp::Void),
            DValue::Poison(t) => Some(t.clone()),
        }
    }

    /// Members of an aggregate value
    pub fn members(&self) -> Option<&EcoVec<DValue>> {
        match self {
            DValue::Struct(m) | DValue::PackedStruct(m) | DValue::Array(m) | DValue::Vector(m) => {
                Some(m)
            }
            _ => None,
        }
    }
}

impl Display for DValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DValue::Addr(a) => write!(f, "{}", a),
            DValue::Int(i) => write!(f, "{}", i),
            DValue::Iptr(i) => write!(f, "iptr {}", i),
            DValue::Float(v) => write!(f, "float {}", v),
            DValue::Double(v) => write!(f, "double {}", v),
            DValue::Struct(fields) => write!(f, "{{ {} }}", fields.iter().join(", ")),
            DValue::PackedStruct(fields) => write!(f, "<{{ {} }}>", fields.iter().join(", ")),
            DValue::Array(elems) => write!(f, "[{}]", elems.iter().join(", ")),
            DValue::Vector(elems) => write!(f, "<{}>", elems.iter().join(", ")),
            DValue::None => f.write_str("none"),
            DValue::Poison(t) => write!(f, "{} poison", t),
        }
    }
}

/// Byte `index` of whatever `parent` concretizes to. Bytes sharing a parent
/// and a store id are entangled and must resolve together.
#[derive(Debug, Clone)]
pub struct SByte {
    pub parent: Arc<UValue>,
    /// Type `parent` was stored at
    pub dtyp: Dtyp,
    pub index: UValue,
    pub store_id: StoreId,
}

impl SByte {
    pub fn is_entangled_with(&self, other: &SByte) -> bool {
        self.store_id == other.store_id && same_parent(&self.parent, &other.parent, 0)
    }

    /// The byte index, if it is a literal rather than an expression
    pub fn literal_index(&self) -> Option<u64> {
        match &self.index {
            UValue::Iptr(i) => u64::try_from(i).ok(),
            UValue::Int(i) => Some(i.to_u64_bits()),
            _ => None,
        }
    }

    pub fn structurally_eq(&self, other: &SByte) -> bool {
        self.eq_at(other, 0)
    }

    fn eq_at(&self, other: &SByte, depth: usize) -> bool {
        self.store_id == other.store_id
            && self.dtyp == other.dtyp
            && same_parent(&self.parent, &other.parent, depth)
            && self.index.eq_at(&other.index, depth)
    }
}

impl PartialEq for SByte {
    fn eq(&self, other: &Self) -> bool {
        self.structurally_eq(other)
    }
}

fn same_parent(a: &Arc<UValue>, b: &Arc<UValue>, depth: usize) -> bool {
    Arc::ptr_eq(a, b) || a.eq_at(b, depth)
}

impl Display for SByte {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "extractbyte({}, {}, {}, sid {})", self.parent, self.dtyp, self.index, self.store_id)
    }
}

/// A possibly underdetermined value: a concrete shape, or an expression still
/// waiting to be concretized.
#[derive(Debug, Clone)]
pub enum UValue {
    Addr(Address),
    Int(IntValue),
    Iptr(BigInt),
    Float(f32),
    Double(f64),
    Undef(Dtyp),
    Poison(Dtyp),
    None,
    Struct(EcoVec<UValue>),
    PackedStruct(EcoVec<UValue>),
    Array(EcoVec<UValue>),
    Vector(EcoVec<UValue>),
    IBinop { op: IntBinop, lhs: Box<UValue>, rhs: Box<UValue> },
    ICmp { cmp: IntCmp, lhs: Box<UValue>, rhs: Box<UValue> },
    FBinop { op: FloatBinop, lhs: Box<UValue>, rhs: Box<UValue> },
    FCmp { cmp: FloatCmp, lhs: Box<UValue>, rhs: Box<UValue> },
    Conversion { conv: ConversionKind, from: Dtyp, value: Box<UValue>, to: Dtyp },
    Select { cond: Box<UValue>, then_value: Box<UValue>, else_value: Box<UValue> },
    ExtractValue { aggregate: Box<UValue>, path: Vec<u64> },
    InsertValue { aggregate: Box<UValue>, element: Box<UValue>, path: Vec<u64> },
    ExtractByte(Box<SByte>),
    ConcatBytes(Vec<SByte>, Dtyp),
}

impl UValue {
    pub fn i1(v: bool) -> UValue {
        UValue::Int(IntValue::I1(v))
    }
    pub fn i8(v: u8) -> UValue {
        UValue::Int(IntValue::I8(v))
    }
    pub fn i32(v: u32) -> UValue {
        UValue::Int(IntValue::I32(v))
    }
    pub fn i64(v: u64) -> UValue {
        UValue::Int(IntValue::I64(v))
    }
    pub fn iptr(v: impl Into<BigInt>) -> UValue {
        UValue::Iptr(v.into())
    }

    pub fn ibinop(op: IntBinop, lhs: UValue, rhs: UValue) -> UValue {
        UValue::IBinop { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }
    pub fn icmp(cmp: IntCmp, lhs: UValue, rhs: UValue) -> UValue {
        UValue::ICmp { cmp, lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }
    pub fn fbinop(op: FloatBinop, lhs: UValue, rhs: UValue) -> UValue {
        UValue::FBinop { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }
    pub fn fcmp(cmp: FloatCmp, lhs: UValue, rhs: UValue) -> UValue {
        UValue::FCmp { cmp, lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }
    pub fn conversion(conv: ConversionKind, from: Dtyp, value: UValue, to: Dtyp) -> UValue {
        UValue::Conversion { conv, from, value: Box::new(value), to }
    }
    pub fn select(cond: UValue, then_value: UValue, else_value: UValue) -> UValue {
        UValue::Select {
            cond: Box::new(cond),
            then_value: Box::new(then_value),
            else_value: Box::new(else_value),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            UValue::Addr(_) => "address",
            UValue::Int(i) => i.kind_name(),
            UValue::Iptr(_) => "iptr",
            UValue::Float(_) => "float",
            UValue::Double(_) => "double",
            UValue::Undef(_) => "undef",
            UValue::Poison(_) => "poison",
            UValue::None => "none",
            UValue::Struct(_) => "struct",
            UValue::PackedStruct(_) => "packed struct",
            UValue::Array(_) => "array",
            UValue::Vector(_) => "vector",
            UValue::IBinop { .. } => "ibinop",
            UValue::ICmp { .. } => "icmp",
            UValue::FBinop { .. } => "fbinop",
            UValue::FCmp { .. } => "fcmp",
            UValue::Conversion { .. } => "conversion",
            UValue::Select { .. } => "select",
            UValue::ExtractValue { .. } => "extractvalue",
            UValue::InsertValue { .. } => "insertvalue",
            UValue::ExtractByte(_) => "extractbyte",
            UValue::ConcatBytes(_, _) => "concatbytes",
        }
    }

    /// Tag-by-tag equality. Floating point payloads compare by bit pattern,
    /// so a NaN is equal to itself here. Values nested deeper than
    /// [`MAX_VALUE_DEPTH`] compare unequal, so their bytes are never entangled.
    pub fn structurally_eq(&self, other: &UValue) -> bool {
        self.eq_at(other, 0)
    }

    fn eq_at(&self, other: &UValue, depth: usize) -> bool {
        use UValue as U;
        if depth > MAX_VALUE_DEPTH {
            return false;
        }
        let d = depth + 1;
        match (self, other) {
            (U::Addr(a), U::Addr(b)) => a == b,
            (U::Int(a), U::Int(b)) => a == b,
            (U::Iptr(a), U::Iptr(b)) => a == b,
            (U::Float(a), U::Float(b)) => a.to_bits() == b.to_bits(),
            (U::Double(a), U::Double(b)) => a.to_bits() == b.to_bits(),
            (U::Undef(a), U::Undef(b)) => a == b,
            (U::Poison(a), U::Poison(b)) => a == b,
            (U::None, U::None) => true,
            (U::Struct(a), U::Struct(b))
            | (U::PackedStruct(a), U::PackedStruct(b))
            | (U::Array(a), U::Array(b))
            | (U::Vector(a), U::Vector(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.eq_at(y, d))
            }
            (U::IBinop { op: o1, lhs: l1, rhs: r1 }, U::IBinop { op: o2, lhs: l2, rhs: r2 }) => {
                o1 == o2 && l1.eq_at(l2, d) && r1.eq_at(r2, d)
            }
            (U::ICmp { cmp: c1, lhs: l1, rhs: r1 }, U::ICmp { cmp: c2, lhs: l2, rhs: r2 }) => {
                c1 == c2 && l1.eq_at(l2, d) && r1.eq_at(r2, d)
            }
            (U::FBinop { op: o1, lhs: l1, rhs: r1 }, U::FBinop { op: o2, lhs: l2, rhs: r2 }) => {
                o1 == o2 && l1.eq_at(l2, d) && r1.eq_at(r2, d)
            }
            (U::FCmp { cmp: c1, lhs: l1, rhs: r1 }, U::FCmp { cmp: c2, lhs: l2, rhs: r2 }) => {
                c1 == c2 && l1.eq_at(l2, d) && r1.eq_at(r2, d)
            }
            (
                U::Conversion { conv: c1, from: f1, value: v1, to: t1 },
                U::Conversion { conv: c2, from: f2, value: v2, to: t2 },
            ) => c1 == c2 && f1 == f2 && t1 == t2 && v1.eq_at(v2, d),
            (
                U::Select { cond: c1, then_value: t1, else_value: e1 },
                U::Select { cond: c2, then_value: t2, else_value: e2 },
            ) => c1.eq_at(c2, d) && t1.eq_at(t2, d) && e1.eq_at(e2, d),
            (
                U::ExtractValue { aggregate: a1, path: p1 },
                U::ExtractValue { aggregate: a2, path: p2 },
            ) => p1 == p2 && a1.eq_at(a2, d),
            (
                U::InsertValue { aggregate: a1, element: e1, path: p1 },
                U::InsertValue { aggregate: a2, element: e2, path: p2 },
            ) => p1 == p2 && a1.eq_at(a2, d) && e1.eq_at(e2, d),
            (U::ExtractByte(a), U::ExtractByte(b)) => a.eq_at(b, d),
            (U::ConcatBytes(a, t1), U::ConcatBytes(b, t2)) => {
                t1 == t2 && a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.eq_at(y, d))
            }
            _ => false,
        }
    }
}

impl PartialEq for UValue {
    fn eq(&self, other: &Self) -> bool {
        self.structurally_eq(other)
    }
}

impl From<DValue> for UValue {
    fn from(value: DValue) -> Self {
        fn members(m: EcoVec<DValue>) -> EcoVec<UValue> {
            m.into_iter().map(UValue::from).collect()
        }
        match value {
            DValue::Addr(a) => UValue::Addr(a),
            DValue::Int(i) => UValue::Int(i),
            DValue::Iptr(i) => UValue::Iptr(i),
            DValue::Float(v) => UValue::Float(v),
            DValue::Double(v) => UValue::Double(v),
            DValue::Struct(m) => UValue::Struct(members(m)),
            DValue::PackedStruct(m) => UValue::PackedStruct(members(m)),
            DValue::Array(m) => UValue::Array(members(m)),
            DValue::Vector(m) => UValue::Vector(members(m)),
            DValue::None => UValue::None,
            DValue::Poison(t) => UValue::Poison(t),
        }
    }
}

impl Display for UValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            UValue::Addr(a) => write!(f, "{}", a),
            UValue::Int(i) => write!(f, "{}", i),
            UValue::Iptr(i) => write!(f, "iptr {}", i),
            UValue::Float(v) => write!(f, "float {}", v),
            UValue::Double(v) => write!(f, "double {}", v),
            UValue::Undef(t) => write!(f, "{} undef", t),
            UValue::Poison(t) => write!(f, "{} poison", t),
            UValue::None => f.write_str("none"),
            UValue::Struct(m) => write!(f, "{{ {} }}", m.iter().join(", ")),
            UValue::PackedStruct(m) => write!(f, "<{{ {} }}>", m.iter().join(", ")),
            UValue::Array(m) => write!(f, "[{}]", m.iter().join(", ")),
            UValue::Vector(m) => write!(f, "<{}>", m.iter().join(", ")),
            UValue::IBinop { op, lhs, rhs } => write!(f, "{:?}({}, {})", op, lhs, rhs),
            UValue::ICmp { cmp, lhs, rhs } => write!(f, "icmp {:?}({}, {})", cmp, lhs, rhs),
            UValue::FBinop { op, lhs, rhs } => write!(f, "{:?}({}, {})", op, lhs, rhs),
            UValue::FCmp { cmp, lhs, rhs } => write!(f, "fcmp {:?}({}, {})", cmp, lhs, rhs),
            UValue::Conversion { conv, from, value, to } => {
                write!(f, "{:?} {} {} to {}", conv, from, value, to)
            }
            UValue::Select { cond, then_value, else_value } => {
                write!(f, "select({}, {}, {})", cond, then_value, else_value)
            }
            UValue::ExtractValue { aggregate, path } => {
                write!(f, "extractvalue({}, {})", aggregate, path.iter().join(", "))
            }
            UValue::InsertValue { aggregate, element, path } => {
                write!(f, "insertvalue({}, {}, {})", aggregate, element, path.iter().join(", "))
            }
            UValue::ExtractByte(b) => write!(f, "{}", b),
            UValue::ConcatBytes(bytes, t) => {
                write!(f, "concatbytes([{}], {})", bytes.iter().join(", "), t)
            }
        }
    }
}
