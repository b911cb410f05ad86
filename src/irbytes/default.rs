// Copyright (c) 2025 knix
// All rights reserved.

use ecow::EcoVec;
use num_bigint::BigInt;

use crate::address::AddressModel;
use crate::error::CodecResult;
use crate::types::Dtyp;
use crate::unsupportedf;
use crate::value::{DValue, IntValue};

/// The all-zero value of `dt`. This is what `undef` resolves to.
pub fn default_dvalue<A: AddressModel + ?Sized>(dt: &Dtyp, addrs: &A) -> CodecResult<DValue> {
    match dt {
        Dtyp::I(bits) => match IntValue::zero(*bits) {
            Some(zero) => Ok(DValue::Int(zero)),
            None => unsupportedf!("no default value for integer width i{}", bits),
        },
        Dtyp::Pointer => Ok(DValue::Addr(addrs.null_address()?)),
        Dtyp::Iptr => Ok(DValue::Iptr(BigInt::ZERO)),
        Dtyp::Float => Ok(DValue::Float(0.0)),
        Dtyp::Double => Ok(DValue::Double(0.0)),
        Dtyp::Void => Ok(DValue::None),
        Dtyp::Array(count, elem) => Ok(DValue::Array(repeat_default(*count, elem, addrs)?)),
        Dtyp::Vector(count, elem) => Ok(DValue::Vector(repeat_default(*count, elem, addrs)?)),
        Dtyp::Struct(fields) => Ok(DValue::Struct(fields_default(fields, addrs)?)),
        Dtyp::PackedStruct(fields) => Ok(DValue::PackedStruct(fields_default(fields, addrs)?)),
        Dtyp::Half
        | Dtyp::X86Fp80
        | Dtyp::Fp128
        | Dtyp::PpcFp128
        | Dtyp::Metadata
        | Dtyp::X86Mmx
        | Dtyp::Opaque => unsupportedf!("no default value for {}", dt),
    }
}

fn repeat_default<A: AddressModel + ?Sized>(
    count: u64,
    elem: &Dtyp,
    addrs: &A,
) -> CodecResult<EcoVec<DValue>> {
    let zero = default_dvalue(elem, addrs)?;
    Ok((0..count).map(|_| zero.clone()).collect())
}

fn fields_default<A: AddressModel + ?Sized>(
    fields: &EcoVec<Dtyp>,
    addrs: &A,
) -> CodecResult<EcoVec<DValue>> {
    fields.iter().map(|f| default_dvalue(f, addrs)).collect()
}
