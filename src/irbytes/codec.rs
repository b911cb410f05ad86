// Copyright (c) 2025 knix
// All rights reserved.

use log::debug;

use crate::address::{AddressModel, FlatAddressModel};
use crate::concretize::Concretizer;
use crate::default::default_dvalue;
use crate::entangle::{StoreIdSource, retag};
use crate::error::CodecResult;
use crate::layout::DataLayout;
use crate::ops::{BasicEvaluator, OpEvaluator};
use crate::serialize::{deserialize_sbytes, serialize_sbytes};
use crate::types::Dtyp;
use crate::value::{DValue, SByte, UValue};


/// The byte codec for one target. Holds only configuration; store ids come
/// from the [`StoreIdSource`] each encode is handed.
#[derive(Debug, Clone)]
pub struct ByteCodec<A: AddressModel = FlatAddressModel, E: OpEvaluator = BasicEvaluator> {
    pub layout: DataLayout,
    pub addrs: A,
    pub ops: E,
}

impl ByteCodec {
    pub fn with_layout(layout: DataLayout) -> Self {
        let ops = BasicEvaluator::for_layout(&layout);
        ByteCodec::new(layout, FlatAddressModel, ops)
    }
}

impl Default for ByteCodec {
    fn default() -> Self {
        ByteCodec::with_layout(DataLayout::default())
    }
}

impl<A: AddressModel, E: OpEvaluator> ByteCodec<A, E> {
    pub fn new(layout: DataLayout, addrs: A, ops: E) -> Self {
        debug!(
            "byte codec: {:?}-endian, {}-byte pointers",
            layout.endianess, layout.pointer_size
        );
        ByteCodec { layout, addrs, ops }
    }

    pub fn sizeof(&self, dt: &Dtyp) -> usize {
        self.layout.sizeof(dt)
    }

    pub fn alignment_of(&self, dt: &Dtyp) -> Option<u64> {
        self.layout.dtyp_alignment(dt)
    }

    /// `value` stored at `dt`, as `sizeof(dt)` bytes in memory order
    pub fn encode(&self, value: &UValue, dt: &Dtyp, sids: &mut StoreIdSource) -> CodecResult<Vec<SByte>> {
        serialize_sbytes(&self.layout, value, dt, sids)
    }

    /// Memory-order `bytes` loaded at `dt`
    pub fn decode(&self, bytes: &[SByte], dt: &Dtyp) -> CodecResult<UValue> {
        deserialize_sbytes(&self.layout, bytes, dt)
    }

    pub fn retag(&self, bytes: &[SByte], sids: &mut StoreIdSource) -> CodecResult<Vec<SByte>> {
        retag(bytes, sids)
    }

    pub fn default_value(&self, dt: &Dtyp) -> CodecResult<DValue> {
        default_dvalue(dt, &self.addrs)
    }

    pub fn concretizer(&self) -> Concretizer<'_, A, E> {
        Concretizer::make(&self.layout, &self.addrs, &self.ops)
    }

    pub fn concretize(&self, uv: &UValue) -> CodecResult<DValue> {
        self.concretizer().concretize(uv)
    }
}
