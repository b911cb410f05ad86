// Copyright (c) 2025 knix
// All rights reserved.

use ecow::EcoVec;
use log::{debug, trace};
use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::address::AddressModel;
use crate::default::default_dvalue;
use crate::entangle::partition_indices;
use crate::error::CodecResult;
use crate::layout::DataLayout;
use crate::ops::{ConversionKind, OpEvaluator};
use crate::serialize::exact_match;
use crate::types::Dtyp;
use crate::value::{DValue, IntValue, MAX_VALUE_DEPTH, SByte, UValue, wrap_unsigned};
use crate::{errf, failf, unsupportedf};

#[cfg(test)]
mod concretize_test;

/// One concrete byte of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DByte {
    Byte(u8),
    Poison,
}

/// Resolves [`UValue`]s to single [`DValue`]s. Resolution is deterministic:
/// `undef` always becomes the zero value of its type.
pub struct Concretizer<'a, A: AddressModel + ?Sized, E: OpEvaluator + ?Sized> {
    pub layout: &'a DataLayout,
    pub addrs: &'a A,
    pub ops: &'a E,
}

fn poison_operand(lhs: &DValue, rhs: &DValue) -> Option<Dtyp> {
    match (lhs, rhs) {
        (DValue::Poison(t), _) | (_, DValue::Poison(t)) => Some(t.clone()),
        _ => None,
    }
}

fn comparison_type(operand: &Dtyp) -> Dtyp {
    match operand {
        Dtyp::Vector(n, _) => Dtyp::vector(*n, Dtyp::I1),
        _ => Dtyp::I1,
    }
}

fn byte_of_u64(bits: u64, index: u64) -> u8 {
    if index >= 8 { 0 } else { (bits >> (8 * index)) as u8 }
}

fn byte_of_big(int: &BigInt, index: u64) -> u8 {
    let shift = usize::try_from(index).unwrap_or(usize::MAX).saturating_mul(8);
    let shifted: BigInt = int >> shift;
    let low: BigInt = shifted & BigInt::from(0xffu8);
    low.to_u8().unwrap_or(0)
}

/// Bytes are little-endian: `bytes[0]` is the least significant.
fn concat_bytes_u64(bytes: &[u8]) -> u64 {
    bytes.iter().rev().fold(0u64, |acc, b| (*b as u64) + (acc << 8))
}

fn concat_bytes_big(bytes: &[u8]) -> BigInt {
    bytes.iter().rev().fold(BigInt::ZERO, |acc, b| BigInt::from(*b) + (acc << 8usize))
}

fn low_bits(int: &BigInt, width: u32) -> CodecResult<IntValue> {
    let mask = if width >= 64 { u64::MAX } else { (1u64 << width) - 1 };
    let low: BigInt = int & BigInt::from(mask);
    low.to_u64()
        .and_then(|bits| IntValue::from_u64_bits(width, bits))
        .ok_or_else(|| errf!("{} does not truncate to i{}", int, width))
}

fn member_count(dt: &Dtyp) -> Option<u64> {
    match dt {
        Dtyp::Array(n, _) | Dtyp::Vector(n, _) => Some(*n),
        Dtyp::Struct(fields) | Dtyp::PackedStruct(fields) => Some(fields.len() as u64),
        _ => None,
    }
}

/// An aggregate of the same kind as `like`, holding `members`
fn rebuild_aggregate(like: &DValue, members: EcoVec<DValue>) -> CodecResult<DValue> {
    match like {
        DValue::Struct(_) => Ok(DValue::Struct(members)),
        DValue::PackedStruct(_) => Ok(DValue::PackedStruct(members)),
        DValue::Array(_) => Ok(DValue::Array(members)),
        DValue::Vector(_) => Ok(DValue::Vector(members)),
        other => failf!("{} is not an aggregate", other),
    }
}

/// A poison aggregate of type `t` spelled out as an aggregate of poison members
fn expand_poison(t: &Dtyp) -> Option<DValue> {
    match t {
        Dtyp::Struct(fields) => {
            Some(DValue::Struct(fields.iter().map(|f| DValue::Poison(f.clone())).collect()))
        }
        Dtyp::PackedStruct(fields) => {
            Some(DValue::PackedStruct(fields.iter().map(|f| DValue::Poison(f.clone())).collect()))
        }
        Dtyp::Array(n, e) => Some(DValue::Array((0..*n).map(|_| DValue::Poison((**e).clone())).collect())),
        Dtyp::Vector(n, e) => {
            Some(DValue::Vector((0..*n).map(|_| DValue::Poison((**e).clone())).collect()))
        }
        _ => None,
    }
}

pub fn extract_path(aggregate: &DValue, path: &[u64]) -> CodecResult<DValue> {
    let mut current = aggregate;
    for (depth, index) in path.iter().enumerate() {
        if let DValue::Poison(t) = current {
            return match t.member_at_path(&path[depth..]) {
                Some(member) => Ok(DValue::Poison(member.clone())),
                None => failf!("no member at {:?} in {}", &path[depth..], t),
            };
        }
        let Some(members) = current.members() else {
            return failf!("extractvalue index {} into non-aggregate {}", index, current);
        };
        current = usize::try_from(*index)
            .ok()
            .and_then(|i| members.get(i))
            .ok_or_else(|| errf!("extractvalue index {} out of range for {}", index, current))?;
    }
    Ok(current.clone())
}

pub fn insert_path(aggregate: &DValue, path: &[u64], element: DValue) -> CodecResult<DValue> {
    let Some((first, rest)) = path.split_first() else {
        return Ok(element);
    };
    let expanded;
    let aggregate = match aggregate {
        DValue::Poison(t) => {
            expanded = expand_poison(t).ok_or_else(|| errf!("insertvalue into poison {}", t))?;
            &expanded
        }
        other => other,
    };
    let Some(members) = aggregate.members() else {
        return failf!("insertvalue index {} into non-aggregate {}", first, aggregate);
    };
    let mut members = members.clone();
    let slot = usize::try_from(*first)
        .ok()
        .and_then(|i| members.make_mut().get_mut(i))
        .ok_or_else(|| errf!("insertvalue index {} out of range for {}", first, aggregate))?;
    let updated = insert_path(slot, rest, element)?;
    *slot = updated;
    rebuild_aggregate(aggregate, members)
}

impl<'a, A, E> Concretizer<'a, A, E>
where
    A: AddressModel + ?Sized,
    E: OpEvaluator + ?Sized,
{
    pub fn make(layout: &'a DataLayout, addrs: &'a A, ops: &'a E) -> Self {
        Concretizer { layout, addrs, ops }
    }

    pub fn concretize(&self, uv: &UValue) -> CodecResult<DValue> {
        self.concretize_at(uv, 0)
    }

    fn concretize_at(&self, uv: &UValue, depth: usize) -> CodecResult<DValue> {
        if depth > MAX_VALUE_DEPTH {
            return failf!("value nested deeper than {} levels", MAX_VALUE_DEPTH);
        }
        if log::log_enabled!(log::Level::Trace) {
            trace!("concretize[{}] {}", depth, uv);
        }
        let d = depth + 1;
        match uv {
            UValue::Addr(a) => Ok(DValue::Addr(a.clone())),
            UValue::Int(i) => Ok(DValue::Int(*i)),
            UValue::Iptr(i) => Ok(DValue::Iptr(wrap_unsigned(i, self.layout.pointer_bits()))),
            UValue::Float(v) => Ok(DValue::Float(*v)),
            UValue::Double(v) => Ok(DValue::Double(*v)),
            UValue::None => Ok(DValue::None),
            UValue::Poison(t) => Ok(DValue::Poison(t.clone())),
            UValue::Undef(t) => default_dvalue(t, self.addrs),
            UValue::Struct(m) => Ok(DValue::Struct(self.concretize_members(m, d)?)),
            UValue::PackedStruct(m) => Ok(DValue::PackedStruct(self.concretize_members(m, d)?)),
            UValue::Array(m) => Ok(DValue::Array(self.concretize_members(m, d)?)),
            UValue::Vector(m) => Ok(DValue::Vector(self.concretize_members(m, d)?)),
            UValue::IBinop { op, lhs, rhs } => {
                let l = self.concretize_at(lhs, d)?;
                let r = self.concretize_at(rhs, d)?;
                match poison_operand(&l, &r) {
                    Some(t) => Ok(DValue::Poison(t)),
                    None => self.ops.eval_iop(*op, &l, &r),
                }
            }
            UValue::ICmp { cmp, lhs, rhs } => {
                let l = self.concretize_at(lhs, d)?;
                let r = self.concretize_at(rhs, d)?;
                match poison_operand(&l, &r) {
                    Some(t) => Ok(DValue::Poison(comparison_type(&t))),
                    None => self.ops.eval_icmp(*cmp, &l, &r),
                }
            }
            UValue::FBinop { op, lhs, rhs } => {
                let l = self.concretize_at(lhs, d)?;
                let r = self.concretize_at(rhs, d)?;
                match poison_operand(&l, &r) {
                    Some(t) => Ok(DValue::Poison(t)),
                    None => self.ops.eval_fop(*op, &l, &r),
                }
            }
            UValue::FCmp { cmp, lhs, rhs } => {
                let l = self.concretize_at(lhs, d)?;
                let r = self.concretize_at(rhs, d)?;
                match poison_operand(&l, &r) {
                    Some(t) => Ok(DValue::Poison(comparison_type(&t))),
                    None => self.ops.eval_fcmp(*cmp, &l, &r),
                }
            }
            UValue::Conversion { conv, from, value, to } => {
                let v = self.concretize_at(value, d)?;
                if v.is_poison() {
                    return Ok(DValue::Poison(to.clone()));
                }
                self.convert(*conv, from, &v, to)
            }
            UValue::Select { cond, then_value, else_value } => {
                self.concretize_select(cond, then_value, else_value, d)
            }
            UValue::ExtractValue { aggregate, path } => {
                let agg = self.concretize_at(aggregate, d)?;
                extract_path(&agg, path)
            }
            UValue::InsertValue { aggregate, element, path } => {
                let agg = self.concretize_at(aggregate, d)?;
                let elt = self.concretize_at(element, d)?;
                insert_path(&agg, path, elt)
            }
            UValue::ExtractByte(b) => {
                failf!("bare byte placeholder cannot be concretized: {}", b)
            }
            UValue::ConcatBytes(bytes, dt) => {
                dt.check_supported()?;
                if let Some(parent) = exact_match(self.layout, bytes, dt) {
                    debug!("concat at {} is one intact store; concretizing {}", dt, parent);
                    return self.concretize_at(parent, d);
                }
                self.extractbytes_to_dvalue(bytes, dt, d)
            }
        }
    }

    fn concretize_members(&self, members: &EcoVec<UValue>, depth: usize) -> CodecResult<EcoVec<DValue>> {
        members.iter().map(|m| self.concretize_at(m, depth)).collect()
    }

    fn concretize_select(
        &self,
        cond: &UValue,
        then_value: &UValue,
        else_value: &UValue,
        depth: usize,
    ) -> CodecResult<DValue> {
        match self.concretize_at(cond, depth)? {
            DValue::Int(IntValue::I1(true)) => self.concretize_at(then_value, depth),
            DValue::Int(IntValue::I1(false)) => self.concretize_at(else_value, depth),
            DValue::Poison(_) => {
                let then_v = self.concretize_at(then_value, depth)?;
                match then_v.dtyp() {
                    Some(t) => Ok(DValue::Poison(t)),
                    None => failf!("cannot type the poison result of selecting {}", then_v),
                }
            }
            DValue::Vector(conds) => {
                let then_v = self.concretize_at(then_value, depth)?;
                let else_v = self.concretize_at(else_value, depth)?;
                let (Some(t), Some(e)) = (then_v.members(), else_v.members()) else {
                    return failf!("vector select over {} and {}", then_v, else_v);
                };
                if t.len() != conds.len() || e.len() != conds.len() {
                    return failf!("vector select with {} conditions over {} and {}", conds.len(), then_v, else_v);
                }
                let picked = conds
                    .iter()
                    .zip(t.iter().zip(e.iter()))
                    .map(|(c, (t, e))| match c {
                        DValue::Int(IntValue::I1(true)) => Ok(t.clone()),
                        DValue::Int(IntValue::I1(false)) => Ok(e.clone()),
                        DValue::Poison(_) => t
                            .dtyp()
                            .map(DValue::Poison)
                            .ok_or_else(|| errf!("cannot type the poison lane of {}", then_v)),
                        other => failf!("select condition lane {} is not an i1", other),
                    })
                    .collect::<CodecResult<EcoVec<_>>>()?;
                Ok(DValue::Vector(picked))
            }
            other => failf!("select condition {} is not an i1", other),
        }
    }

    fn convert(&self, conv: ConversionKind, from: &Dtyp, v: &DValue, to: &Dtyp) -> CodecResult<DValue> {
        match (conv, v, to) {
            (ConversionKind::Bitcast, _, _) => self.bitcast(v, from, to),
            (ConversionKind::Ptrtoint, DValue::Addr(a), Dtyp::Iptr) => {
                Ok(DValue::Iptr(wrap_unsigned(&self.addrs.ptr_to_int(a), self.layout.pointer_bits())))
            }
            (ConversionKind::Ptrtoint, DValue::Addr(a), Dtyp::I(w)) => {
                Ok(DValue::Int(low_bits(&self.addrs.ptr_to_int(a), *w)?))
            }
            (ConversionKind::Inttoptr, DValue::Int(i), Dtyp::Pointer) => Ok(DValue::Addr(
                self.addrs.int_to_ptr(&BigInt::from(i.to_u64_bits()), self.addrs.wildcard_provenance())?,
            )),
            (ConversionKind::Inttoptr, DValue::Iptr(i), Dtyp::Pointer) => {
                Ok(DValue::Addr(self.addrs.int_to_ptr(i, self.addrs.wildcard_provenance())?))
            }
            (ConversionKind::Addrspacecast, DValue::Addr(a), Dtyp::Pointer) => {
                let int = self.addrs.ptr_to_int(a);
                Ok(DValue::Addr(self.addrs.int_to_ptr(&int, self.addrs.address_provenance(a))?))
            }
            (
                ConversionKind::Ptrtoint | ConversionKind::Inttoptr | ConversionKind::Addrspacecast,
                DValue::Vector(elems),
                Dtyp::Vector(n, to_elem),
            ) => {
                let Dtyp::Vector(_, from_elem) = from else {
                    return failf!("{:?} of vector {} from non-vector type {}", conv, v, from);
                };
                if elems.len() as u64 != *n {
                    return failf!("{:?} of {} elements into {}", conv, elems.len(), to);
                }
                let converted = elems
                    .iter()
                    .map(|e| match e {
                        DValue::Poison(_) => Ok(DValue::Poison((**to_elem).clone())),
                        _ => self.convert(conv, from_elem, e, to_elem),
                    })
                    .collect::<CodecResult<EcoVec<_>>>()?;
                Ok(DValue::Vector(converted))
            }
            (ConversionKind::Ptrtoint | ConversionKind::Inttoptr | ConversionKind::Addrspacecast, _, _) => {
                failf!("cannot apply {:?} to {} producing {}", conv, v, to)
            }
            _ => self.ops.eval_conv(conv, from, v, to),
        }
    }

    /// Reinterprets the bytes of `v` as a value of `to`
    fn bitcast(&self, v: &DValue, from: &Dtyp, to: &Dtyp) -> CodecResult<DValue> {
        if from == to {
            return Ok(v.clone());
        }
        from.check_supported()?;
        to.check_supported()?;
        let size = self.layout.sizeof(from);
        if size != self.layout.sizeof(to) {
            return failf!("bitcast between {} and {} of different sizes", from, to);
        }
        let mut bytes = Vec::with_capacity(size);
        for i in 0..size {
            match self.dvalue_extract_byte(v, from, i as u64)? {
                DByte::Byte(b) => bytes.push(b),
                DByte::Poison => return Ok(DValue::Poison(to.clone())),
            }
        }
        self.dvalue_bytes_to_dvalue(&bytes, to)
    }

    /// Resolves a byte index. `None` means the index was poison.
    fn concretize_index(&self, index: &UValue, depth: usize) -> CodecResult<Option<u64>> {
        match self.concretize_at(index, depth)? {
            DValue::Int(i) => Ok(Some(i.to_u64_bits())),
            DValue::Iptr(i) => {
                let low: BigInt = i & BigInt::from(u64::MAX);
                Ok(low.to_u64())
            }
            DValue::Poison(_) => Ok(None),
            other => failf!("byte index {} is not an integer", other),
        }
    }

    /// Rebuilds a value of type `dt` from placeholders that do not form one
    /// intact store. Each distinct (parent, store) pair is concretized once and
    /// every placeholder entangled with it reads its byte from that one result.
    pub fn extractbytes_to_dvalue(&self, bytes: &[SByte], dt: &Dtyp, depth: usize) -> CodecResult<DValue> {
        let size = self.layout.sizeof(dt);
        if bytes.len() != size {
            return failf!("{} bytes cannot form {} ({} bytes)", bytes.len(), dt, size);
        }
        let classes = partition_indices(bytes, |a, b| a.is_entangled_with(b));
        debug!("rebuilding {} from {} byte(s) of {} store(s)", dt, bytes.len(), classes.len());

        let mut resolved: Vec<Option<u8>> = vec![None; bytes.len()];
        for class in &classes {
            let parent = self.concretize_at(&bytes[class[0]].parent, depth)?;
            if parent.is_poison() {
                return Ok(DValue::Poison(dt.clone()));
            }
            for &i in class {
                let byte = &bytes[i];
                let Some(index) = self.concretize_index(&byte.index, depth)? else {
                    return Ok(DValue::Poison(dt.clone()));
                };
                match self.dvalue_extract_byte(&parent, &byte.dtyp, index)? {
                    DByte::Byte(b) => {
                        trace!("byte {} <- byte {} of {} (sid {})", i, index, parent, byte.store_id);
                        resolved[i] = Some(b);
                    }
                    DByte::Poison => return Ok(DValue::Poison(dt.clone())),
                }
            }
        }
        let concrete = resolved
            .into_iter()
            .enumerate()
            .map(|(i, b)| b.ok_or_else(|| errf!("byte {} was never resolved", i)))
            .collect::<CodecResult<Vec<u8>>>()?;
        self.dvalue_bytes_to_dvalue(&concrete, dt)
    }

    /// Byte `index` of `dv`, read as a value of type `dt`. Scalars are read
    /// arithmetically, least significant byte first.
    pub fn dvalue_extract_byte(&self, dv: &DValue, dt: &Dtyp, index: u64) -> CodecResult<DByte> {
        match dv {
            DValue::Poison(_) => Ok(DByte::Poison),
            DValue::Int(i) => Ok(DByte::Byte(byte_of_u64(i.to_u64_bits(), index))),
            DValue::Float(f) => Ok(DByte::Byte(byte_of_u64(f.to_bits() as u64, index))),
            DValue::Double(f) => Ok(DByte::Byte(byte_of_u64(f.to_bits(), index))),
            DValue::Iptr(i) => Ok(DByte::Byte(byte_of_big(i, index))),
            DValue::Addr(a) => Ok(DByte::Byte(byte_of_big(&self.addrs.ptr_to_int(a), index))),
            DValue::None => failf!("void has no byte {}", index),
            DValue::Struct(members)
            | DValue::PackedStruct(members)
            | DValue::Array(members)
            | DValue::Vector(members) => self.extract_field_byte(dv, members, dt, index),
        }
    }

    /// Finds the lowest member of `aggregate` covering byte `index` by stepping
    /// over member sizes, then reads the byte at the remaining offset from it.
    pub fn extract_field_byte(
        &self,
        aggregate: &DValue,
        members: &[DValue],
        dt: &Dtyp,
        index: u64,
    ) -> CodecResult<DByte> {
        let kinds_agree = matches!(
            (aggregate, dt),
            (DValue::Struct(_), Dtyp::Struct(_))
                | (DValue::PackedStruct(_), Dtyp::PackedStruct(_))
                | (DValue::Array(_), Dtyp::Array(_, _))
                | (DValue::Vector(_), Dtyp::Vector(_, _))
        );
        if !kinds_agree || member_count(dt) != Some(members.len() as u64) {
            return failf!("{} value with {} members read as {}", aggregate.kind_name(), members.len(), dt);
        }
        let mut offset = index;
        for (i, member) in members.iter().enumerate() {
            let Some(member_dt) = dt.member(i as u64) else {
                return failf!("{} has no member {}", dt, i);
            };
            let size = self.layout.sizeof(member_dt) as u64;
            if offset < size {
                return self.dvalue_extract_byte(member, member_dt, offset);
            }
            offset -= size;
        }
        failf!("byte {} is past the end of {}", index, dt)
    }

    /// Assembles little-endian concrete `bytes` into a value of type `dt`.
    /// Iptrs come back unsigned and pointers with wildcard provenance.
    pub fn dvalue_bytes_to_dvalue(&self, bytes: &[u8], dt: &Dtyp) -> CodecResult<DValue> {
        dt.check_supported()?;
        let size = self.layout.sizeof(dt);
        if bytes.len() != size {
            return failf!("{} bytes cannot form {} ({} bytes)", bytes.len(), dt, size);
        }
        match dt {
            Dtyp::I(w) => match IntValue::from_u64_bits(*w, concat_bytes_u64(bytes)) {
                Some(i) => Ok(DValue::Int(i)),
                None => unsupportedf!("integer width i{} is not supported", w),
            },
            Dtyp::Iptr => Ok(DValue::Iptr(concat_bytes_big(bytes))),
            Dtyp::Pointer => {
                let int = concat_bytes_big(bytes);
                Ok(DValue::Addr(self.addrs.int_to_ptr(&int, self.addrs.wildcard_provenance())?))
            }
            Dtyp::Float => Ok(DValue::Float(f32::from_bits(concat_bytes_u64(bytes) as u32))),
            Dtyp::Double => Ok(DValue::Double(f64::from_bits(concat_bytes_u64(bytes)))),
            Dtyp::Void => Ok(DValue::None),
            Dtyp::Struct(fields) => Ok(DValue::Struct(self.split_members(bytes, fields.iter())?)),
            Dtyp::PackedStruct(fields) => {
                Ok(DValue::PackedStruct(self.split_members(bytes, fields.iter())?))
            }
            Dtyp::Array(n, elem) => Ok(DValue::Array(self.split_members(bytes, repeat_elem(*n, elem))?)),
            Dtyp::Vector(n, elem) => {
                Ok(DValue::Vector(self.split_members(bytes, repeat_elem(*n, elem))?))
            }
            Dtyp::Half
            | Dtyp::X86Fp80
            | Dtyp::Fp128
            | Dtyp::PpcFp128
            | Dtyp::Opaque
            | Dtyp::Metadata
            | Dtyp::X86Mmx => unsupportedf!("cannot rebuild a value of type {}", dt),
        }
    }

    fn split_members<'t>(
        &self,
        bytes: &[u8],
        member_types: impl Iterator<Item = &'t Dtyp>,
    ) -> CodecResult<EcoVec<DValue>> {
        let mut rest = bytes;
        let mut members = EcoVec::new();
        for t in member_types {
            let n = self.layout.sizeof(t);
            if n > rest.len() {
                return failf!("ran out of bytes reading a member of type {}", t);
            }
            let (chunk, tail) = rest.split_at(n);
            members.push(self.dvalue_bytes_to_dvalue(chunk, t)?);
            rest = tail;
        }
        if !rest.is_empty() {
            return failf!("{} byte(s) left over after the last member", rest.len());
        }
        Ok(members)
    }
}

fn repeat_elem(count: u64, elem: &Dtyp) -> impl Iterator<Item = &Dtyp> {
    (0..count).map(move |_| elem)
}
