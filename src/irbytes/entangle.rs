// Copyright (c) 2025 knix
// All rights reserved.

use ahash::HashMapExt;
use fxhash::FxHashMap;
use log::trace;

use crate::error::CodecResult;
use crate::value::{SByte, StoreId};
use crate::{SV8, errf};

#[cfg(test)]
mod entangle_test;

/// Hands out strictly increasing store ids. One source lives for exactly one
/// encode operation and is passed down by `&mut` to everything that needs a
/// fresh id.
#[derive(Debug)]
pub struct StoreIdSource {
    next: u32,
}

impl Default for StoreIdSource {
    fn default() -> Self {
        StoreIdSource::make()
    }
}

impl StoreIdSource {
    pub fn make() -> Self {
        Self { next: StoreId::ONE.as_u32() }
    }

    /// Starts after `last`, so ids already present in memory are never reused
    pub fn starting_after(last: StoreId) -> Self {
        Self { next: last.as_u32().saturating_add(1) }
    }

    pub fn fresh(&mut self) -> StoreId {
        let Some(id) = StoreId::from_u32(self.next) else { unreachable!("store ids start at 1") };
        self.next = self
            .next
            .checked_add(1)
            .unwrap_or_else(|| panic!("store id space exhausted after {}", id));
        id
    }

    pub fn peek(&self) -> u32 {
        self.next
    }
}

/// Splits `items` into classes under `same`. Each class is seeded by the
/// first element not yet placed in a class and lists member indices in input
/// order; classes come out in seed order.
pub fn partition_indices<T>(items: &[T], same: impl Fn(&T, &T) -> bool) -> Vec<SV8<usize>> {
    let mut classes: Vec<SV8<usize>> = Vec::new();
    let mut rest: Vec<usize> = (0..items.len()).collect();
    while let Some((&seed, others)) = rest.split_first() {
        let (in_class, out_of_class): (Vec<usize>, Vec<usize>) =
            others.iter().partition(|&&i| same(&items[seed], &items[i]));
        let mut class: SV8<usize> = SV8::with_capacity(in_class.len() + 1);
        class.push(seed);
        class.extend(in_class);
        classes.push(class);
        rest = out_of_class;
    }
    classes
}

/// Gives every group of bytes that shared a store id one new, fresh store id,
/// keeping positions. Bytes that shared an id before share one after, and no
/// others do.
pub fn retag(bytes: &[SByte], sids: &mut StoreIdSource) -> CodecResult<Vec<SByte>> {
    let classes = partition_indices(bytes, |a, b| a.store_id == b.store_id);
    let mut by_index: FxHashMap<usize, SByte> = FxHashMap::with_capacity(bytes.len());
    for class in classes {
        let sid = sids.fresh();
        trace!("retag: {} byte(s) of sid {} -> sid {}", class.len(), bytes[class[0]].store_id, sid);
        for i in class {
            by_index.insert(i, SByte { store_id: sid, ..bytes[i].clone() });
        }
    }
    (0..bytes.len())
        .map(|i| {
            by_index.remove(&i).ok_or_else(|| errf!("byte {} went missing while re-tagging", i))
        })
        .collect()
}
