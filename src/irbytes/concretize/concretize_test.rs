use std::sync::Arc;

use ecow::EcoVec;

use crate::codec::ByteCodec;
use crate::concretize::*;
use crate::entangle::StoreIdSource;
use crate::error::CodecErrorKind;
use crate::layout::DataLayout;
use crate::ops::{ConversionKind, FloatCmp, IntBinop, IntCmp};
use crate::test_util::*;
use crate::types::Dtyp;
use crate::value::{Address, AllocationId, DValue, MAX_VALUE_DEPTH, Provenance, SByte, UValue};

fn ustruct(members: impl IntoIterator<Item = UValue>) -> UValue {
    UValue::Struct(members.into_iter().collect())
}

fn dstruct(members: impl IntoIterator<Item = DValue>) -> DValue {
    DValue::Struct(members.into_iter().collect())
}

fn alloc(n: u32) -> Provenance {
    Provenance::Allocation(AllocationId::from_u32(n).unwrap())
}

const HIGH: u64 = 0x8000_0000_0000_0010;

/// Puts an equal-valued byte from a separate store at logical byte 0 of `bytes`
fn overwrite_low_byte(codec: &ByteCodec, bytes: &mut [SByte], value: u8, sids: &mut StoreIdSource) {
    let other = codec.encode(&UValue::i8(value), &Dtyp::I8, sids).unwrap();
    let offset = if codec.layout.is_big_endian() { bytes.len() - 1 } else { 0 };
    bytes[offset] = other[0].clone();
}

#[test]
fn struct_of_two_i32_scenario() {
    let codec = le_codec();
    let dt = Dtyp::structure([Dtyp::I32, Dtyp::I32]);
    assert_eq!(codec.sizeof(&dt), 8);
    let uv = ustruct([UValue::i32(1), UValue::i32(2)]);
    assert_eq!(codec.concretize(&uv).unwrap(), dstruct([DValue::i32(1), DValue::i32(2)]));

    let bytes = encode(&codec, &uv, &dt);
    let loaded = codec.decode(&bytes, &dt).unwrap();
    assert_eq!(codec.concretize(&loaded).unwrap(), dstruct([DValue::i32(1), DValue::i32(2)]));
}

#[test]
fn undef_is_zero() {
    let codec = le_codec();
    assert_eq!(codec.concretize(&UValue::Undef(Dtyp::I32)).unwrap(), DValue::i32(0));
    assert_eq!(
        codec.concretize(&UValue::Undef(Dtyp::array(2, Dtyp::Double))).unwrap(),
        DValue::Array([DValue::Double(0.0), DValue::Double(0.0)].into_iter().collect())
    );
    let DValue::Addr(null) = codec.concretize(&UValue::Undef(Dtyp::Pointer)).unwrap() else {
        panic!("undef pointer is not an address");
    };
    assert_eq!(null, Address::new(0, Provenance::Nil));
}

#[test]
fn concrete_shapes_are_fixed_points() {
    let codec = le_codec();
    let values = [
        DValue::i1(false),
        DValue::i8(7),
        DValue::i64(1 << 40),
        DValue::iptr(9),
        DValue::Float(2.5),
        DValue::Double(f64::MIN_POSITIVE),
        DValue::Addr(Address::new(0x40, alloc(3))),
        DValue::Poison(Dtyp::I8),
        DValue::None,
        DValue::Vector([DValue::i32(1), DValue::Poison(Dtyp::I32)].into_iter().collect()),
        dstruct([DValue::i8(1), DValue::PackedStruct([DValue::i64(2)].into_iter().collect())]),
    ];
    for v in values {
        assert_eq!(codec.concretize(&UValue::from(v.clone())).unwrap(), v);
    }
}

#[test]
fn partially_overwritten_value_reads_new_byte() {
    for codec in [le_codec(), be_codec()] {
        let mut sids = StoreIdSource::make();
        let mut memory = codec.encode(&UValue::i32(0x11223344), &Dtyp::I32, &mut sids).unwrap();
        let overwrite = codec.encode(&UValue::i8(0xaa), &Dtyp::I8, &mut sids).unwrap();
        // logical byte 1 lives at memory offset 1 on little endian and 2 on big endian
        let offset = if codec.layout.is_big_endian() { 2 } else { 1 };
        memory[offset] = overwrite[0].clone();

        let loaded = codec.decode(&memory, &Dtyp::I32).unwrap();
        assert!(matches!(loaded, UValue::ConcatBytes(_, _)));
        assert_eq!(codec.concretize(&loaded).unwrap(), DValue::i32(0x1122aa44));
    }
}

#[test]
fn narrower_load_of_wider_store() {
    let codec = le_codec();
    let bytes = encode(&codec, &UValue::i64(0x0102030405060708), &Dtyp::I64);
    let low = codec.decode(&bytes[..4], &Dtyp::I32).unwrap();
    assert_eq!(codec.concretize(&low).unwrap(), DValue::i32(0x05060708));
    let high = codec.decode(&bytes[4..], &Dtyp::I32).unwrap();
    assert_eq!(codec.concretize(&high).unwrap(), DValue::i32(0x01020304));
}

#[test]
fn loads_spanning_an_expression_evaluate_it() {
    let codec = le_codec();
    let sum = UValue::ibinop(IntBinop::ADD, UValue::i32(0x100), UValue::i32(0x23));
    let mut bytes = encode(&codec, &sum, &Dtyp::I32);
    let zero = encode(&codec, &UValue::i8(0), &Dtyp::I8);
    bytes[3] = zero[0].clone();
    let loaded = codec.decode(&bytes, &Dtyp::I32).unwrap();
    assert_eq!(codec.concretize(&loaded).unwrap(), DValue::i32(0x123));
}

#[test]
fn poison_operands_poison_the_result() {
    let codec = le_codec();
    let add = UValue::ibinop(IntBinop::ADD, UValue::Poison(Dtyp::I32), UValue::i32(1));
    assert_eq!(codec.concretize(&add).unwrap(), DValue::Poison(Dtyp::I32));

    let cmp = UValue::icmp(IntCmp::Eq, UValue::i64(1), UValue::Poison(Dtyp::I64));
    assert_eq!(codec.concretize(&cmp).unwrap(), DValue::Poison(Dtyp::I1));

    let vcmp = UValue::fcmp(FloatCmp::Oeq, UValue::Poison(Dtyp::vector(4, Dtyp::Float)), UValue::Float(0.0));
    assert_eq!(codec.concretize(&vcmp).unwrap(), DValue::Poison(Dtyp::vector(4, Dtyp::I1)));

    let conv = UValue::conversion(ConversionKind::Zext, Dtyp::I8, UValue::Poison(Dtyp::I8), Dtyp::I32);
    assert_eq!(codec.concretize(&conv).unwrap(), DValue::Poison(Dtyp::I32));
}

#[test]
fn poison_survives_the_byte_path() {
    let codec = le_codec();
    let mut sids = StoreIdSource::make();
    let mut memory = codec.encode(&UValue::Poison(Dtyp::I32), &Dtyp::I32, &mut sids).unwrap();
    let other = codec.encode(&UValue::i8(1), &Dtyp::I8, &mut sids).unwrap();
    memory[0] = other[0].clone();
    let loaded = codec.decode(&memory, &Dtyp::I32).unwrap();
    assert_eq!(codec.concretize(&loaded).unwrap(), DValue::Poison(Dtyp::I32));
}

#[test]
fn poison_struct_member_reads_as_poison() {
    let codec = le_codec();
    let dt = Dtyp::structure([Dtyp::I32, Dtyp::I32]);
    let value = ustruct([UValue::i32(5), UValue::Poison(Dtyp::I32)]);
    let bytes = encode(&codec, &value, &dt);

    let first = codec.decode(&bytes[..4], &Dtyp::I32).unwrap();
    assert_eq!(codec.concretize(&first).unwrap(), DValue::i32(5));
    let second = codec.decode(&bytes[4..], &Dtyp::I32).unwrap();
    assert_eq!(codec.concretize(&second).unwrap(), DValue::Poison(Dtyp::I32));

    let whole = codec.concretize(&value).unwrap();
    assert_eq!(whole, dstruct([DValue::i32(5), DValue::Poison(Dtyp::I32)]));
}

#[test]
fn extractvalue_from_poison_is_member_poison() {
    let codec = le_codec();
    let dt = Dtyp::structure([Dtyp::I8, Dtyp::array(2, Dtyp::Double)]);
    let uv = UValue::ExtractValue { aggregate: Box::new(UValue::Poison(dt)), path: vec![1, 0] };
    assert_eq!(codec.concretize(&uv).unwrap(), DValue::Poison(Dtyp::Double));
}

#[test]
fn bitcast_goes_through_bytes() {
    let codec = le_codec();
    let to_int = UValue::conversion(ConversionKind::Bitcast, Dtyp::Float, UValue::Float(1.0), Dtyp::I32);
    assert_eq!(codec.concretize(&to_int).unwrap(), DValue::i32(0x3f80_0000));

    let to_float =
        UValue::conversion(ConversionKind::Bitcast, Dtyp::I64, UValue::i64(0x4000_0000_0000_0000), Dtyp::Double);
    assert_eq!(codec.concretize(&to_float).unwrap(), DValue::Double(2.0));

    let lanes = UValue::conversion(
        ConversionKind::Bitcast,
        Dtyp::I64,
        UValue::i64(0x0000_0002_0000_0001),
        Dtyp::vector(2, Dtyp::I32),
    );
    assert_eq!(
        codec.concretize(&lanes).unwrap(),
        DValue::Vector([DValue::i32(1), DValue::i32(2)].into_iter().collect())
    );

    let mismatched = UValue::conversion(ConversionKind::Bitcast, Dtyp::I32, UValue::i32(0), Dtyp::I64);
    assert!(codec.concretize(&mismatched).unwrap_err().is_structural());
}

#[test]
fn bitcast_to_same_type_keeps_provenance() {
    let codec = le_codec();
    let addr = Address::new(0x2000, alloc(1));
    let uv = UValue::conversion(ConversionKind::Bitcast, Dtyp::Pointer, UValue::Addr(addr.clone()), Dtyp::Pointer);
    assert_eq!(codec.concretize(&uv).unwrap(), DValue::Addr(addr));
}

#[test]
fn pointer_integer_round_trip() {
    let codec = le_codec();
    let addr = Address::new(0x2000, alloc(1));
    let as_int = UValue::conversion(ConversionKind::Ptrtoint, Dtyp::Pointer, UValue::Addr(addr.clone()), Dtyp::I64);
    assert_eq!(codec.concretize(&as_int).unwrap(), DValue::i64(0x2000));

    let back = UValue::conversion(ConversionKind::Inttoptr, Dtyp::I64, as_int, Dtyp::Pointer);
    assert_eq!(codec.concretize(&back).unwrap(), DValue::Addr(Address::new(0x2000, Provenance::Wildcard)));

    let cast = UValue::conversion(ConversionKind::Addrspacecast, Dtyp::Pointer, UValue::Addr(addr.clone()), Dtyp::Pointer);
    assert_eq!(codec.concretize(&cast).unwrap(), DValue::Addr(addr));
}

#[test]
fn pointers_rebuilt_from_bytes_have_wildcard_provenance() {
    let codec = le_codec();
    let addr = Address::new(0xdead_beef, alloc(2));
    let mut bytes = encode(&codec, &UValue::Addr(addr.clone()), &Dtyp::Pointer);
    assert_eq!(codec.concretize(&codec.decode(&bytes, &Dtyp::Pointer).unwrap()).unwrap(), DValue::Addr(addr));

    let same_byte = encode(&codec, &UValue::i8(0xef), &Dtyp::I8);
    bytes[0] = same_byte[0].clone();
    let loaded = codec.decode(&bytes, &Dtyp::Pointer).unwrap();
    assert_eq!(
        codec.concretize(&loaded).unwrap(),
        DValue::Addr(Address::new(0xdead_beef, Provenance::Wildcard))
    );
}

#[test]
fn iptr_bytes_are_unsigned() {
    let codec = le_codec();
    let c = codec.concretizer();
    let bytes = [0xfe, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff];
    assert_eq!(c.dvalue_bytes_to_dvalue(&bytes, &Dtyp::Iptr).unwrap(), DValue::iptr(u64::MAX - 1));
    assert_eq!(c.dvalue_bytes_to_dvalue(&[7, 0, 0, 0, 0, 0, 0, 0], &Dtyp::Iptr).unwrap(), DValue::iptr(7));
    for i in 0..8 {
        assert_eq!(
            c.dvalue_extract_byte(&DValue::iptr(u64::MAX - 1), &Dtyp::Iptr, i).unwrap(),
            DByte::Byte(bytes[i as usize])
        );
    }
}

#[test]
fn high_ptrtoint_result_survives_the_byte_path() {
    for codec in [le_codec(), be_codec()] {
        let mut sids = StoreIdSource::make();
        let addr = UValue::Addr(Address::new(HIGH, alloc(1)));
        let as_int = UValue::conversion(ConversionKind::Ptrtoint, Dtyp::Pointer, addr, Dtyp::Iptr);
        let mut bytes = codec.encode(&as_int, &Dtyp::Iptr, &mut sids).unwrap();
        let intact = codec.concretize(&codec.decode(&bytes, &Dtyp::Iptr).unwrap()).unwrap();
        assert_eq!(intact, DValue::iptr(HIGH));

        overwrite_low_byte(&codec, &mut bytes, 0x10, &mut sids);
        let loaded = codec.decode(&bytes, &Dtyp::Iptr).unwrap();
        assert!(matches!(loaded, UValue::ConcatBytes(_, _)));
        assert_eq!(codec.concretize(&loaded).unwrap(), intact);
    }
}

#[test]
fn high_pointer_survives_the_byte_path() {
    for codec in [le_codec(), be_codec()] {
        let mut sids = StoreIdSource::make();
        let addr = Address::new(HIGH, alloc(1));
        let mut bytes = codec.encode(&UValue::Addr(addr.clone()), &Dtyp::Pointer, &mut sids).unwrap();
        let intact = codec.concretize(&codec.decode(&bytes, &Dtyp::Pointer).unwrap()).unwrap();
        assert_eq!(intact, DValue::Addr(addr));

        overwrite_low_byte(&codec, &mut bytes, 0x10, &mut sids);
        let loaded = codec.decode(&bytes, &Dtyp::Pointer).unwrap();
        assert_eq!(codec.concretize(&loaded).unwrap(), DValue::Addr(Address::new(HIGH, Provenance::Wildcard)));
    }
}

#[test]
fn negative_iptr_literals_concretize_unsigned() {
    for codec in [le_codec(), be_codec()] {
        let mut sids = StoreIdSource::make();
        let mut bytes = codec.encode(&UValue::iptr(-3), &Dtyp::Iptr, &mut sids).unwrap();
        let intact = codec.concretize(&codec.decode(&bytes, &Dtyp::Iptr).unwrap()).unwrap();
        assert_eq!(intact, DValue::iptr(u64::MAX - 2));

        overwrite_low_byte(&codec, &mut bytes, 0xfd, &mut sids);
        let loaded = codec.decode(&bytes, &Dtyp::Iptr).unwrap();
        assert_eq!(codec.concretize(&loaded).unwrap(), intact);
    }

    let narrow = ByteCodec::with_layout(DataLayout::default().with_pointer_size(4));
    assert_eq!(narrow.concretize(&UValue::iptr(-1)).unwrap(), DValue::iptr(0xffff_ffffu32));
    let sum = UValue::ibinop(IntBinop::ADD, UValue::iptr(0xffff_ffffu32), UValue::iptr(2));
    assert_eq!(narrow.concretize(&sum).unwrap(), DValue::iptr(1));
}

#[test]
fn oversized_iptr_shift_is_poison() {
    let codec = le_codec();
    let shl = UValue::ibinop(IntBinop::Shl { nuw: false, nsw: false }, UValue::iptr(1), UValue::iptr(1u64 << 40));
    assert_eq!(codec.concretize(&shl).unwrap(), DValue::Poison(Dtyp::Iptr));
}

#[test]
fn aggregate_bytes_address_the_lowest_covering_field() {
    let codec = le_codec();
    let c = codec.concretizer();
    let dt = Dtyp::structure([Dtyp::I8, Dtyp::I32, Dtyp::array(0, Dtyp::I64), Dtyp::I8]);
    let v = dstruct([
        DValue::i8(0x01),
        DValue::i32(0x05040302),
        DValue::Array(EcoVec::new()),
        DValue::i8(0x06),
    ]);
    let read: Vec<DByte> = (0..6).map(|i| c.dvalue_extract_byte(&v, &dt, i).unwrap()).collect();
    let expected: Vec<DByte> = (1..=6).map(DByte::Byte).collect();
    assert_eq!(read, expected);
    assert!(c.dvalue_extract_byte(&v, &dt, 6).unwrap_err().is_structural());

    let wrong = Dtyp::structure([Dtyp::I8, Dtyp::I32]);
    assert!(c.dvalue_extract_byte(&v, &wrong, 0).unwrap_err().is_structural());
}

#[test]
fn byte_count_mismatch_is_structural() {
    let codec = le_codec();
    let c = codec.concretizer();
    assert!(c.dvalue_bytes_to_dvalue(&[1, 2, 3], &Dtyp::I32).unwrap_err().is_structural());
    assert!(c.dvalue_bytes_to_dvalue(&[0, 0], &Dtyp::Half).unwrap_err().is_unsupported());
}

#[test]
fn select_picks_one_branch() {
    let codec = le_codec();
    let pick = UValue::select(UValue::i1(true), UValue::i32(1), UValue::i32(2));
    assert_eq!(codec.concretize(&pick).unwrap(), DValue::i32(1));

    let cond = UValue::icmp(IntCmp::Slt, UValue::i32(u32::MAX), UValue::i32(0));
    let signed = UValue::select(cond, UValue::i8(10), UValue::i8(20));
    assert_eq!(codec.concretize(&signed).unwrap(), DValue::i8(10));

    // the branch not taken is never concretized
    let div = UValue::ibinop(IntBinop::UDiv { exact: false }, UValue::i32(1), UValue::i32(0));
    let guarded = UValue::select(UValue::i1(false), div, UValue::i32(3));
    assert_eq!(codec.concretize(&guarded).unwrap(), DValue::i32(3));

    let poisoned = UValue::select(UValue::Poison(Dtyp::I1), UValue::i64(1), UValue::i64(2));
    assert_eq!(codec.concretize(&poisoned).unwrap(), DValue::Poison(Dtyp::I64));
}

#[test]
fn vector_select_is_lane_wise() {
    let codec = le_codec();
    let conds = UValue::Vector([UValue::i1(true), UValue::i1(false), UValue::Poison(Dtyp::I1)].into_iter().collect());
    let a = UValue::Vector([UValue::i8(1), UValue::i8(2), UValue::i8(3)].into_iter().collect());
    let b = UValue::Vector([UValue::i8(4), UValue::i8(5), UValue::i8(6)].into_iter().collect());
    assert_eq!(
        codec.concretize(&UValue::select(conds, a, b)).unwrap(),
        DValue::Vector([DValue::i8(1), DValue::i8(5), DValue::Poison(Dtyp::I8)].into_iter().collect())
    );
}

#[test]
fn extract_and_insert_value() {
    let codec = le_codec();
    let inner = UValue::Array([UValue::i32(10), UValue::i32(20)].into_iter().collect());
    let agg = ustruct([UValue::i8(1), inner]);

    let get = UValue::ExtractValue { aggregate: Box::new(agg.clone()), path: vec![1, 1] };
    assert_eq!(codec.concretize(&get).unwrap(), DValue::i32(20));

    let set = UValue::InsertValue {
        aggregate: Box::new(agg.clone()),
        element: Box::new(UValue::i32(99)),
        path: vec![1, 0],
    };
    let expected = dstruct([DValue::i8(1), DValue::Array([DValue::i32(99), DValue::i32(20)].into_iter().collect())]);
    assert_eq!(codec.concretize(&set).unwrap(), expected);

    let into_poison = UValue::InsertValue {
        aggregate: Box::new(UValue::Poison(Dtyp::structure([Dtyp::I8, Dtyp::I32]))),
        element: Box::new(UValue::i32(4)),
        path: vec![1],
    };
    assert_eq!(codec.concretize(&into_poison).unwrap(), dstruct([DValue::Poison(Dtyp::I8), DValue::i32(4)]));

    let bad = UValue::ExtractValue { aggregate: Box::new(agg), path: vec![2] };
    assert!(codec.concretize(&bad).unwrap_err().is_structural());
}

#[test]
fn bare_extract_byte_is_structural() {
    let codec = le_codec();
    let p = Arc::new(UValue::i32(1));
    let uv = UValue::ExtractByte(Box::new(sbyte(&p, &Dtyp::I32, 0, 1)));
    let err = codec.concretize(&uv).unwrap_err();
    assert_eq!(err.kind, CodecErrorKind::Structural);
}

#[test]
fn evaluator_failures_surface() {
    let codec = le_codec();
    let div = UValue::ibinop(IntBinop::SRem, UValue::i32(5), UValue::i32(0));
    assert_eq!(codec.concretize(&div).unwrap_err().kind, CodecErrorKind::Evaluation);
}

#[test]
fn nesting_beyond_the_limit_is_rejected() {
    // deep recursion needs more than the default test thread stack
    let handle = std::thread::Builder::new()
        .stack_size(256 << 20)
        .spawn(|| {
            let codec = le_codec();
            let nest = |depth: usize| {
                (0..depth).fold(UValue::i32(0), |acc, _| UValue::ibinop(IntBinop::ADD, acc, UValue::i32(1)))
            };
            let shallow = nest(MAX_VALUE_DEPTH - 1);
            assert_eq!(codec.concretize(&shallow).unwrap(), DValue::i32(MAX_VALUE_DEPTH as u32 - 1));
            let deep = nest(MAX_VALUE_DEPTH + 10);
            assert!(codec.concretize(&deep).unwrap_err().is_structural());
        })
        .unwrap();
    handle.join().unwrap();
}
