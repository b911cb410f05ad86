// Copyright (c) 2025 knix
// All rights reserved.

//! Values to symbolic bytes and back.
//!
//! Storing a value never looks inside it: the whole value becomes one
//! entangled run of `sizeof(dt)` placeholders that all point at it, so loading
//! the same run back is free and loading part of it defers to the concretizer.
//! Byte lists handed to and returned from this module are in memory order;
//! everything else in the crate sees them in logical (little-endian) order.

use std::sync::Arc;

use log::debug;

use crate::entangle::{StoreIdSource, retag};
use crate::error::CodecResult;
use crate::failf;
use crate::layout::DataLayout;
use crate::types::Dtyp;
use crate::value::{MAX_VALUE_DEPTH, SByte, StoreId, UValue};


/// `size` placeholders for bytes `0..size` of `parent`, all in store `sid`
pub fn to_ubytes(parent: Arc<UValue>, dt: &Dtyp, sid: StoreId, size: usize) -> Vec<SByte> {
    (0..size)
        .map(|i| SByte {
            parent: parent.clone(),
            dtyp: dt.clone(),
            index: UValue::iptr(i),
            store_id: sid,
        })
        .collect()
}

/// Encodes `value`, stored at type `dt`, into `sizeof(dt)` symbolic bytes.
pub fn serialize_sbytes(
    layout: &DataLayout,
    value: &UValue,
    dt: &Dtyp,
    sids: &mut StoreIdSource,
) -> CodecResult<Vec<SByte>> {
    dt.check_supported()?;
    let size = layout.sizeof(dt);
    let mut bytes = match value {
        UValue::None => {
            if size != 0 {
                return failf!("none cannot be stored at {} ({} bytes)", dt, size);
            }
            Vec::new()
        }
        UValue::ConcatBytes(loaded, _) => {
            if loaded.len() != size {
                return failf!("{} loaded bytes cannot be stored at {} ({} bytes)", loaded.len(), dt, size);
            }
            retag(loaded, sids)?
        }
        UValue::ExtractByte(b) => {
            return failf!("bare byte placeholder cannot be stored: {}", b);
        }
        _ => {
            check_shape(value, dt)?;
            let sid = sids.fresh();
            debug!("serialize {} at {} as sid {}", value, dt, sid);
            to_ubytes(Arc::new(value.clone()), dt, sid, size)
        }
    };
    if layout.is_big_endian() {
        bytes.reverse();
    }
    Ok(bytes)
}

/// Decodes memory-order `bytes` as a value of type `dt`. Returns the stored
/// value itself when the bytes are exactly one intact store of it, and a
/// deferred [`UValue::ConcatBytes`] otherwise.
pub fn deserialize_sbytes(layout: &DataLayout, bytes: &[SByte], dt: &Dtyp) -> CodecResult<UValue> {
    dt.check_supported()?;
    if *dt == Dtyp::Void {
        if !bytes.is_empty() {
            return failf!("void loaded from {} bytes", bytes.len());
        }
        return Ok(UValue::None);
    }
    let mut logical = bytes.to_vec();
    if layout.is_big_endian() {
        logical.reverse();
    }
    if let Some(parent) = exact_match(layout, &logical, dt) {
        debug!("deserialize {}: intact store of {}", dt, parent);
        return Ok((**parent).clone());
    }
    debug!("deserialize {}: deferring {} byte(s)", dt, logical.len());
    Ok(UValue::ConcatBytes(logical, dt.clone()))
}

/// The parent of `bytes` when they are, in logical order, bytes `0..sizeof(dt)`
/// of one store of one value at type `dt`.
pub fn exact_match<'a>(layout: &DataLayout, bytes: &'a [SByte], dt: &Dtyp) -> Option<&'a Arc<UValue>> {
    let first = bytes.first()?;
    if bytes.len() != layout.sizeof(dt) || first.dtyp != *dt {
        return None;
    }
    let intact = bytes.iter().enumerate().all(|(i, b)| {
        b.is_entangled_with(first) && b.dtyp == first.dtyp && b.literal_index() == Some(i as u64)
    });
    if intact { Some(&first.parent) } else { None }
}

/// Rejects literal values whose shape contradicts `dt`. Expressions are
/// accepted as they are; their type is only known once they are evaluated.
pub fn check_shape(value: &UValue, dt: &Dtyp) -> CodecResult<()> {
    check_shape_at(value, dt, 0)
}

fn check_shape_at(value: &UValue, dt: &Dtyp, depth: usize) -> CodecResult<()> {
    if depth > MAX_VALUE_DEPTH {
        return failf!("stored value nested deeper than {} levels", MAX_VALUE_DEPTH);
    }
    let ok = match (value, dt) {
        (UValue::Int(i), Dtyp::I(w)) => i.bit_width() == *w,
        (UValue::Iptr(_), Dtyp::Iptr)
        | (UValue::Addr(_), Dtyp::Pointer)
        | (UValue::Float(_), Dtyp::Float)
        | (UValue::Double(_), Dtyp::Double)
        | (UValue::None, Dtyp::Void) => true,
        (UValue::Undef(t) | UValue::Poison(t), _) => t == dt,
        (UValue::Struct(members), Dtyp::Struct(fields))
        | (UValue::PackedStruct(members), Dtyp::PackedStruct(fields)) => {
            if members.len() != fields.len() {
                return failf!(
                    "{} members given for {} with {} fields",
                    members.len(),
                    dt,
                    fields.len()
                );
            }
            for (m, f) in members.iter().zip(fields.iter()) {
                check_shape_at(m, f, depth + 1)?;
            }
            true
        }
        (UValue::Array(members), Dtyp::Array(count, elem))
        | (UValue::Vector(members), Dtyp::Vector(count, elem)) => {
            if members.len() as u64 != *count {
                return failf!("{} elements given for {}", members.len(), dt);
            }
            for m in members.iter() {
                check_shape_at(m, elem, depth + 1)?;
            }
            true
        }
        (UValue::ExtractByte(b), _) => {
            return failf!("bare byte placeholder inside a stored value: {}", b);
        }
        (
            UValue::IBinop { .. }
            | UValue::ICmp { .. }
            | UValue::FBinop { .. }
            | UValue::FCmp { .. }
            | UValue::Conversion { .. }
            | UValue::Select { .. }
            | UValue::ExtractValue { .. }
            | UValue::InsertValue { .. }
            | UValue::ConcatBytes(_, _),
            _,
        ) => true,
        _ => false,
    };
    if ok { Ok(()) } else { failf!("{} value {} does not have type {}", value.kind_name(), value, dt) }
}
