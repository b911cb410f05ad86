// Copyright (c) 2025 knix
// All rights reserved.

use std::sync::Arc;

use crate::codec::ByteCodec;
use crate::entangle::StoreIdSource;
use crate::layout::DataLayout;
use crate::types::Dtyp;
use crate::value::{SByte, StoreId, UValue};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn le_codec() -> ByteCodec {
    init_logging();
    ByteCodec::with_layout(DataLayout::default())
}

pub fn be_codec() -> ByteCodec {
    init_logging();
    ByteCodec::with_layout(DataLayout::big_endian())
}

pub fn sid(n: u32) -> StoreId {
    StoreId::from_u32(n).unwrap()
}

pub fn encode(codec: &ByteCodec, value: &UValue, dt: &Dtyp) -> Vec<SByte> {
    codec.encode(value, dt, &mut StoreIdSource::make()).unwrap()
}

/// Byte `index` of `parent` stored at `dt` under store `store_id`
pub fn sbyte(parent: &Arc<UValue>, dt: &Dtyp, index: u64, store_id: u32) -> SByte {
    SByte { parent: parent.clone(), dtyp: dt.clone(), index: UValue::iptr(index), store_id: sid(store_id) }
}
