// Copyright (c) 2025 knix
// All rights reserved.

use std::cmp::Ordering;

use ecow::EcoVec;
use num_bigint::BigInt;
use num_traits::{One, ToPrimitive, Zero};

use crate::error::CodecResult;
use crate::layout::DataLayout;
use crate::ops::{ConversionKind, FloatBinop, FloatCmp, IntBinop, IntCmp, OpEvaluator};
use crate::types::Dtyp;
use crate::value::{DValue, IntValue, signed_view, wrap_unsigned};
use crate::{errf, evalf};

/// Reference semantics for the LLVM integer and floating point instructions:
/// wrapping two's complement arithmetic, poison for violated `nuw`/`nsw`/`exact`
/// flags and oversized shifts, an evaluation error for the immediate undefined
/// behavior of division by zero and signed division overflow. Iptrs are
/// unsigned and wrap at `iptr_bits`.
#[derive(Debug, Clone, Copy)]
pub struct BasicEvaluator {
    pub iptr_bits: u32,
}

impl Default for BasicEvaluator {
    fn default() -> Self {
        BasicEvaluator::with_iptr_bits(64)
    }
}

impl BasicEvaluator {
    pub const fn with_iptr_bits(iptr_bits: u32) -> Self {
        BasicEvaluator { iptr_bits }
    }

    pub fn for_layout(layout: &DataLayout) -> Self {
        BasicEvaluator::with_iptr_bits(layout.pointer_bits())
    }
}

fn mask(width: u32) -> u64 {
    if width >= 64 { u64::MAX } else { (1u64 << width) - 1 }
}

fn sext(width: u32, bits: u64) -> i64 {
    let shift = 64 - width;
    ((bits << shift) as i64) >> shift
}

fn signed_min(width: u32) -> i128 {
    -(1i128 << (width - 1))
}

fn fits_signed(width: u32, v: i128) -> bool {
    v >= signed_min(width) && v <= (1i128 << (width - 1)) - 1
}

fn make_int(width: u32, bits: u64) -> CodecResult<DValue> {
    IntValue::from_u64_bits(width, bits)
        .map(DValue::Int)
        .ok_or_else(|| errf!("no integer representation for width {}", width))
}

/// Applies `f` element-wise when both operands are vectors. Poison elements
/// produce a poison element of type `poison_of(element type)`.
fn lift2(
    lhs: &DValue,
    rhs: &DValue,
    poison_of: &dyn Fn(&DValue) -> DValue,
    f: &dyn Fn(&DValue, &DValue) -> CodecResult<DValue>,
) -> CodecResult<DValue> {
    match (lhs, rhs) {
        (DValue::Vector(l), DValue::Vector(r)) => {
            if l.len() != r.len() {
                return evalf!("vector operands of length {} and {}", l.len(), r.len());
            }
            let elems = l
                .iter()
                .zip(r.iter())
                .map(|(a, b)| match (a, b) {
                    (DValue::Poison(_), _) => Ok(poison_of(a)),
                    (_, DValue::Poison(_)) => Ok(poison_of(b)),
                    _ => f(a, b),
                })
                .collect::<CodecResult<EcoVec<_>>>()?;
            Ok(DValue::Vector(elems))
        }
        _ => f(lhs, rhs),
    }
}

fn same_poison(v: &DValue) -> DValue {
    v.clone()
}

fn i1_poison(_: &DValue) -> DValue {
    DValue::Poison(Dtyp::I1)
}

fn int_op(op: IntBinop, a: IntValue, b: IntValue) -> CodecResult<DValue> {
    use IntBinop as K;
    let w = a.bit_width();
    if w != b.bit_width() {
        return evalf!("mismatched integer operands {} and {}", a, b);
    }
    let (x, y) = (a.to_u64_bits(), b.to_u64_bits());
    let (sx, sy) = (sext(w, x) as i128, sext(w, y) as i128);
    let m = mask(w);
    let poison = || -> CodecResult<DValue> { Ok(DValue::Poison(Dtyp::I(w))) };
    let bits = match op {
        K::Add { nuw, nsw } => {
            if (nuw && (x as u128 + y as u128) > m as u128) || (nsw && !fits_signed(w, sx + sy)) {
                return poison();
            }
            x.wrapping_add(y)
        }
        K::Sub { nuw, nsw } => {
            if (nuw && x < y) || (nsw && !fits_signed(w, sx - sy)) {
                return poison();
            }
            x.wrapping_sub(y)
        }
        K::Mul { nuw, nsw } => {
            if (nuw && (x as u128 * y as u128) > m as u128) || (nsw && !fits_signed(w, sx * sy)) {
                return poison();
            }
            x.wrapping_mul(y)
        }
        K::Shl { nuw, nsw } => {
            if y >= w as u64 {
                return poison();
            }
            let r = (x << y) & m;
            if (nuw && (r >> y) != x) || (nsw && (sext(w, r) >> y) as i128 != sx) {
                return poison();
            }
            r
        }
        K::UDiv { exact } => {
            if y == 0 {
                return evalf!("udiv by zero");
            }
            if exact && x % y != 0 {
                return poison();
            }
            x / y
        }
        K::SDiv { exact } => {
            if sy == 0 {
                return evalf!("sdiv by zero");
            }
            if sx == signed_min(w) && sy == -1 {
                return evalf!("sdiv overflow on {}", a);
            }
            if exact && sx % sy != 0 {
                return poison();
            }
            (sx / sy) as i64 as u64
        }
        K::LShr { exact } => {
            if y >= w as u64 {
                return poison();
            }
            if exact && x & mask(y as u32) != 0 {
                return poison();
            }
            x >> y
        }
        K::AShr { exact } => {
            if y >= w as u64 {
                return poison();
            }
            if exact && x & mask(y as u32) != 0 {
                return poison();
            }
            (sext(w, x) >> y) as u64
        }
        K::URem => {
            if y == 0 {
                return evalf!("urem by zero");
            }
            x % y
        }
        K::SRem => {
            if sy == 0 {
                return evalf!("srem by zero");
            }
            if sx == signed_min(w) && sy == -1 {
                return evalf!("srem overflow on {}", a);
            }
            (sx % sy) as i64 as u64
        }
        K::And => x & y,
        K::Or => x | y,
        K::Xor => x ^ y,
    };
    make_int(w, bits & m)
}

/// A shift amount below `bits`, or `None` when the shift yields poison
fn shift_amount(amount: &BigInt, bits: u32) -> Option<u32> {
    amount.to_u32().filter(|a| *a < bits)
}

fn iptr_op(op: IntBinop, x: &BigInt, y: &BigInt, bits: u32) -> CodecResult<DValue> {
    use IntBinop as K;
    let (ux, uy) = (wrap_unsigned(x, bits), wrap_unsigned(y, bits));
    let (sx, sy) = (signed_view(x, bits), signed_view(y, bits));
    let poison = || -> CodecResult<DValue> { Ok(DValue::Poison(Dtyp::Iptr)) };
    let fits_unsigned = |v: &BigInt| *v == wrap_unsigned(v, bits);
    let fits_signed = |v: &BigInt| *v == signed_view(v, bits);
    let signed_min = || -> BigInt { signed_view(&(BigInt::one() << (bits as usize).saturating_sub(1)), bits) };
    let r: BigInt = match op {
        K::Add { nuw, nsw } => {
            let r = &ux + &uy;
            if (nuw && !fits_unsigned(&r)) || (nsw && !fits_signed(&(&sx + &sy))) {
                return poison();
            }
            r
        }
        K::Sub { nuw, nsw } => {
            if (nuw && ux < uy) || (nsw && !fits_signed(&(&sx - &sy))) {
                return poison();
            }
            &ux - &uy
        }
        K::Mul { nuw, nsw } => {
            let r = &ux * &uy;
            if (nuw && !fits_unsigned(&r)) || (nsw && !fits_signed(&(&sx * &sy))) {
                return poison();
            }
            r
        }
        K::UDiv { .. } | K::SDiv { .. } | K::URem | K::SRem if uy.is_zero() => {
            return evalf!("iptr division by zero");
        }
        K::UDiv { exact } => {
            if exact && !(&ux % &uy).is_zero() {
                return poison();
            }
            &ux / &uy
        }
        K::SDiv { exact } => {
            if sx == signed_min() && sy == BigInt::from(-1) {
                return evalf!("sdiv overflow on iptr {}", x);
            }
            if exact && !(&sx % &sy).is_zero() {
                return poison();
            }
            &sx / &sy
        }
        K::URem => &ux % &uy,
        K::SRem => {
            if sx == signed_min() && sy == BigInt::from(-1) {
                return evalf!("srem overflow on iptr {}", x);
            }
            &sx % &sy
        }
        K::Shl { nuw, nsw } => {
            let Some(amount) = shift_amount(&uy, bits) else { return poison() };
            let r = wrap_unsigned(&(&ux << amount), bits);
            if (nuw && (&r >> amount) != ux) || (nsw && (signed_view(&r, bits) >> amount) != sx) {
                return poison();
            }
            r
        }
        K::LShr { exact } => {
            let Some(amount) = shift_amount(&uy, bits) else { return poison() };
            if exact && !wrap_unsigned(&ux, amount).is_zero() {
                return poison();
            }
            &ux >> amount
        }
        K::AShr { exact } => {
            let Some(amount) = shift_amount(&uy, bits) else { return poison() };
            if exact && !wrap_unsigned(&ux, amount).is_zero() {
                return poison();
            }
            &sx >> amount
        }
        K::And => &ux & &uy,
        K::Or => &ux | &uy,
        K::Xor => &ux ^ &uy,
    };
    Ok(DValue::Iptr(wrap_unsigned(&r, bits)))
}

fn cmp_holds(cmp: IntCmp, unsigned: Ordering, signed: Ordering) -> bool {
    use IntCmp as C;
    match cmp {
        C::Eq => unsigned == Ordering::Equal,
        C::Ne => unsigned != Ordering::Equal,
        C::Ugt => unsigned == Ordering::Greater,
        C::Uge => unsigned != Ordering::Less,
        C::Ult => unsigned == Ordering::Less,
        C::Ule => unsigned != Ordering::Greater,
        C::Sgt => signed == Ordering::Greater,
        C::Sge => signed != Ordering::Less,
        C::Slt => signed == Ordering::Less,
        C::Sle => signed != Ordering::Greater,
    }
}

fn fcmp_holds(cmp: FloatCmp, ordering: Option<Ordering>) -> bool {
    use FloatCmp as C;
    match (cmp, ordering) {
        (C::False, _) => false,
        (C::True, _) => true,
        (C::Ord, o) => o.is_some(),
        (C::Uno, o) => o.is_none(),
        // Ordered predicates are false on NaN, unordered ones true
        (C::Oeq | C::Ogt | C::Oge | C::Olt | C::Ole | C::One, None) => false,
        (C::Ueq | C::Ugt | C::Uge | C::Ult | C::Ule | C::Une, None) => true,
        (C::Oeq | C::Ueq, Some(o)) => o == Ordering::Equal,
        (C::Ogt | C::Ugt, Some(o)) => o == Ordering::Greater,
        (C::Oge | C::Uge, Some(o)) => o != Ordering::Less,
        (C::Olt | C::Ult, Some(o)) => o == Ordering::Less,
        (C::Ole | C::Ule, Some(o)) => o != Ordering::Greater,
        (C::One | C::Une, Some(o)) => o != Ordering::Equal,
    }
}

fn float_to_int(v: f64, signed: bool, to: &Dtyp) -> CodecResult<DValue> {
    let Dtyp::I(w) = to else {
        return evalf!("float to integer conversion into {}", to);
    };
    let t = v.trunc();
    let (lo, hi) = if signed {
        (-(2f64.powi(*w as i32 - 1)), 2f64.powi(*w as i32 - 1))
    } else {
        (0.0, 2f64.powi(*w as i32))
    };
    // NaN fails both comparisons
    if !(t >= lo && t < hi) {
        return Ok(DValue::Poison(to.clone()));
    }
    let bits = if signed { t as i64 as u64 } else { t as u64 };
    make_int(*w, bits & mask(*w))
}

fn conv_scalar(conv: ConversionKind, value: &DValue, to: &Dtyp, iptr_bits: u32) -> CodecResult<DValue> {
    use ConversionKind as C;
    match (conv, value, to) {
        (C::Trunc | C::Zext, DValue::Int(i), Dtyp::I(w)) => make_int(*w, i.to_u64_bits() & mask(*w)),
        (C::Sext, DValue::Int(i), Dtyp::I(w)) => {
            make_int(*w, sext(i.bit_width(), i.to_u64_bits()) as u64 & mask(*w))
        }
        (C::Zext, DValue::Int(i), Dtyp::Iptr) => {
            Ok(DValue::Iptr(wrap_unsigned(&BigInt::from(i.to_u64_bits()), iptr_bits)))
        }
        (C::Sext, DValue::Int(i), Dtyp::Iptr) => {
            Ok(DValue::Iptr(wrap_unsigned(&BigInt::from(i.to_i64()), iptr_bits)))
        }
        (C::Trunc, DValue::Iptr(b), Dtyp::I(w)) => {
            let low: BigInt = b & BigInt::from(mask(*w));
            let bits = low.to_u64().ok_or_else(|| errf!("iptr {} did not truncate", b))?;
            make_int(*w, bits)
        }
        (C::Fptrunc, DValue::Double(d), Dtyp::Float) => Ok(DValue::Float(*d as f32)),
        (C::Fpext, DValue::Float(f), Dtyp::Double) => Ok(DValue::Double(*f as f64)),
        (C::Uitofp, DValue::Int(i), Dtyp::Float) => Ok(DValue::Float(i.to_u64_bits() as f32)),
        (C::Uitofp, DValue::Int(i), Dtyp::Double) => Ok(DValue::Double(i.to_u64_bits() as f64)),
        (C::Sitofp, DValue::Int(i), Dtyp::Float) => Ok(DValue::Float(i.to_i64() as f32)),
        (C::Sitofp, DValue::Int(i), Dtyp::Double) => Ok(DValue::Double(i.to_i64() as f64)),
        (C::Fptoui, DValue::Float(f), _) => float_to_int(*f as f64, false, to),
        (C::Fptoui, DValue::Double(d), _) => float_to_int(*d, false, to),
        (C::Fptosi, DValue::Float(f), _) => float_to_int(*f as f64, true, to),
        (C::Fptosi, DValue::Double(d), _) => float_to_int(*d, true, to),
        (C::Addrspacecast, DValue::Addr(_), Dtyp::Pointer) => Ok(value.clone()),
        (C::Inttoptr | C::Ptrtoint | C::Bitcast, _, _) => {
            evalf!("{:?} is resolved through the byte codec", conv)
        }
        _ => evalf!("cannot apply {:?} to {} producing {}", conv, value, to),
    }
}

impl OpEvaluator for BasicEvaluator {
    fn eval_iop(&self, op: IntBinop, lhs: &DValue, rhs: &DValue) -> CodecResult<DValue> {
        lift2(lhs, rhs, &same_poison, &|a, b| match (a, b) {
            (DValue::Int(x), DValue::Int(y)) => int_op(op, *x, *y),
            (DValue::Iptr(x), DValue::Iptr(y)) => iptr_op(op, x, y, self.iptr_bits),
            _ => evalf!("invalid integer operation {:?} on {} and {}", op, a, b),
        })
    }

    fn eval_icmp(&self, cmp: IntCmp, lhs: &DValue, rhs: &DValue) -> CodecResult<DValue> {
        lift2(lhs, rhs, &i1_poison, &|a, b| {
            let holds = match (a, b) {
                (DValue::Int(x), DValue::Int(y)) if x.bit_width() == y.bit_width() => cmp_holds(
                    cmp,
                    x.to_u64_bits().cmp(&y.to_u64_bits()),
                    x.to_i64().cmp(&y.to_i64()),
                ),
                (DValue::Iptr(x), DValue::Iptr(y)) => {
                    let n = self.iptr_bits;
                    cmp_holds(
                        cmp,
                        wrap_unsigned(x, n).cmp(&wrap_unsigned(y, n)),
                        signed_view(x, n).cmp(&signed_view(y, n)),
                    )
                }
                (DValue::Addr(x), DValue::Addr(y)) => {
                    let o = x.bits.cmp(&y.bits);
                    cmp_holds(cmp, o, (x.bits as i64).cmp(&(y.bits as i64)))
                }
                _ => return evalf!("invalid integer comparison {:?} on {} and {}", cmp, a, b),
            };
            Ok(DValue::i1(holds))
        })
    }

    fn eval_fop(&self, op: FloatBinop, lhs: &DValue, rhs: &DValue) -> CodecResult<DValue> {
        use FloatBinop as K;
        lift2(lhs, rhs, &same_poison, &|a, b| match (a, b) {
            (DValue::Float(x), DValue::Float(y)) => Ok(DValue::Float(match op {
                K::FAdd => x + y,
                K::FSub => x - y,
                K::FMul => x * y,
                K::FDiv => x / y,
                K::FRem => x % y,
            })),
            (DValue::Double(x), DValue::Double(y)) => Ok(DValue::Double(match op {
                K::FAdd => x + y,
                K::FSub => x - y,
                K::FMul => x * y,
                K::FDiv => x / y,
                K::FRem => x % y,
            })),
            _ => evalf!("invalid float operation {:?} on {} and {}", op, a, b),
        })
    }

    fn eval_fcmp(&self, cmp: FloatCmp, lhs: &DValue, rhs: &DValue) -> CodecResult<DValue> {
        lift2(lhs, rhs, &i1_poison, &|a, b| match (a, b) {
            (DValue::Float(x), DValue::Float(y)) => Ok(DValue::i1(fcmp_holds(cmp, x.partial_cmp(y)))),
            (DValue::Double(x), DValue::Double(y)) => {
                Ok(DValue::i1(fcmp_holds(cmp, x.partial_cmp(y))))
            }
            _ => evalf!("invalid float comparison {:?} on {} and {}", cmp, a, b),
        })
    }

    fn eval_conv(
        &self,
        conv: ConversionKind,
        from: &Dtyp,
        value: &DValue,
        to: &Dtyp,
    ) -> CodecResult<DValue> {
        match (from, value, to) {
            (Dtyp::Vector(_, from_elem), DValue::Vector(elems), Dtyp::Vector(n, to_elem)) => {
                if elems.len() as u64 != *n {
                    return evalf!("vector conversion of {} elements into {}", elems.len(), to);
                }
                let converted = elems
                    .iter()
                    .map(|e| match e {
                        DValue::Poison(_) => Ok(DValue::Poison((**to_elem).clone())),
                        _ => self.eval_conv(conv, from_elem, e, to_elem),
                    })
                    .collect::<CodecResult<EcoVec<_>>>()?;
                Ok(DValue::Vector(converted))
            }
            _ => conv_scalar(conv, value, to, self.iptr_bits),
        }
    }
}
