// Copyright (c) 2025 knix
// All rights reserved.

//! Byte-level value codec and concretizer for an LLVM IR semantic model.
//!
//! Typed values are split into symbolic bytes on store ([`serialize`]), put back
//! together on load, and resolved down to concrete values ([`concretize`]) when
//! an interpreter actually needs them. [`codec::ByteCodec`] bundles the pieces
//! behind the collaborators a memory model supplies: a [`layout::DataLayout`], an
//! [`address::AddressModel`] and an [`ops::OpEvaluator`].

use smallvec::SmallVec;

pub mod address;
pub mod codec;
pub mod concretize;
pub mod default;
pub mod entangle;
pub mod error;
pub mod layout;
pub mod ops;
pub mod serialize;
pub mod types;
pub mod value;

#[cfg(test)]
mod test_util;

pub use codec::ByteCodec;
pub use error::{CodecError, CodecErrorKind, CodecResult};
pub use layout::{DataLayout, Endianess};
pub use types::Dtyp;
pub use value::{Address, DValue, IntValue, Provenance, SByte, StoreId, UValue};

pub type SV8<T> = SmallVec<[T; 8]>;

#[macro_export]
macro_rules! nz_u32_id {
    ($name: ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(std::num::NonZeroU32);
        impl From<std::num::NonZeroU32> for $name {
            fn from(value: std::num::NonZeroU32) -> Self {
                Self::from_nzu32(value)
            }
        }
        impl From<$name> for std::num::NonZeroU32 {
            fn from(val: $name) -> Self {
                val.0
            }
        }
        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl $name {
            pub const fn as_u32(self) -> u32 {
                self.0.get()
            }

            pub const fn from_nzu32(value: std::num::NonZeroU32) -> Self {
                $name(value)
            }
            pub const fn from_u32(value: u32) -> Option<Self> {
                match std::num::NonZeroU32::new(value) {
                    None => None,
                    Some(nz_u32) => Some($name(nz_u32)),
                }
            }
            pub const ONE: Self = $name(std::num::NonZeroU32::MIN);
        }
    };
}
