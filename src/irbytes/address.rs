// Copyright (c) 2025 knix
// All rights reserved.

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::error::CodecResult;
use crate::failf;
use crate::value::{Address, Provenance};

/// The address operations a memory model hands to the codec. The codec never
/// allocates; it only turns addresses into integers and back.
pub trait AddressModel {
    /// Integer form of an address, discarding its provenance
    fn ptr_to_int(&self, address: &Address) -> BigInt;

    fn int_to_ptr(&self, int: &BigInt, provenance: Provenance) -> CodecResult<Address>;

    fn address_provenance(&self, address: &Address) -> Provenance;

    fn wildcard_provenance(&self) -> Provenance {
        Provenance::Wildcard
    }

    fn nil_provenance(&self) -> Provenance {
        Provenance::Nil
    }

    fn null_address(&self) -> CodecResult<Address> {
        self.int_to_ptr(&BigInt::ZERO, self.nil_provenance())
    }
}

/// Addresses are plain 64-bit integers tagged with a provenance. Integers are
/// wrapped into the 64-bit range the way a two's complement `inttoptr` would.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatAddressModel;

impl AddressModel for FlatAddressModel {
    fn ptr_to_int(&self, address: &Address) -> BigInt {
        BigInt::from(address.bits)
    }

    fn int_to_ptr(&self, int: &BigInt, provenance: Provenance) -> CodecResult<Address> {
        let wrapped: BigInt = int & BigInt::from(u64::MAX);
        let Some(bits) = wrapped.to_u64() else {
            return failf!("integer {} does not fit in an address", int);
        };
        Ok(Address::new(bits, provenance))
    }

    fn address_provenance(&self, address: &Address) -> Provenance {
        address.provenance
    }
}
