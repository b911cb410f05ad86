use std::sync::Arc;

use crate::entangle::*;
use crate::test_util::{sbyte, sid};
use crate::types::Dtyp;
use crate::value::{SByte, StoreId, UValue};

fn byte(parent: &Arc<UValue>, index: u64, store_id: u32) -> SByte {
    sbyte(parent, &Dtyp::I32, index, store_id)
}

#[test]
fn store_ids_are_strictly_increasing() {
    let mut sids = StoreIdSource::make();
    let a = sids.fresh();
    let b = sids.fresh();
    let c = sids.fresh();
    assert_eq!(a, StoreId::ONE);
    assert!(a < b && b < c);
}

#[test]
fn independent_sources_do_not_interfere() {
    let mut first = StoreIdSource::make();
    let mut second = StoreIdSource::make();
    first.fresh();
    first.fresh();
    assert_eq!(second.fresh(), StoreId::ONE);
    assert_eq!(first.peek(), 3);
}

#[test]
fn starting_after_skips_known_ids() {
    let mut sids = StoreIdSource::starting_after(sid(7));
    assert_eq!(sids.fresh(), sid(8));
}

#[test]
fn partition_seeds_with_first_ungrouped() {
    let items = [1, 2, 1, 3, 2, 1];
    let classes = partition_indices(&items, |a, b| a == b);
    let classes: Vec<Vec<usize>> = classes.into_iter().map(|c| c.into_vec()).collect();
    assert_eq!(classes, vec![vec![0, 2, 5], vec![1, 4], vec![3]]);
}

#[test]
fn partition_empty() {
    let items: [u8; 0] = [];
    assert!(partition_indices(&items, |a, b| a == b).is_empty());
}

#[test]
fn retag_preserves_entanglement_with_fresh_ids() {
    let p = Arc::new(UValue::i32(7));
    let q = Arc::new(UValue::i32(9));
    let bytes = vec![byte(&p, 0, 3), byte(&q, 1, 5), byte(&p, 2, 3), byte(&q, 3, 3)];
    let mut sids = StoreIdSource::starting_after(sid(5));
    let out = retag(&bytes, &mut sids).unwrap();

    assert_eq!(out.len(), bytes.len());
    for i in 0..bytes.len() {
        for j in 0..bytes.len() {
            let before = bytes[i].store_id == bytes[j].store_id;
            let after = out[i].store_id == out[j].store_id;
            assert_eq!(before, after, "bytes {} and {}", i, j);
        }
        assert!(out[i].store_id > sid(5), "id {} is not fresh", out[i].store_id);
        assert!(out[i].parent.structurally_eq(&bytes[i].parent));
        assert_eq!(out[i].index, bytes[i].index);
    }
}

#[test]
fn retag_assigns_ids_in_seed_order() {
    let p = Arc::new(UValue::i32(1));
    let bytes = vec![byte(&p, 0, 9), byte(&p, 1, 4), byte(&p, 2, 9)];
    let mut sids = StoreIdSource::make();
    let out = retag(&bytes, &mut sids).unwrap();
    assert_eq!(out[0].store_id, sid(1));
    assert_eq!(out[1].store_id, sid(2));
    assert_eq!(out[2].store_id, sid(1));
}
