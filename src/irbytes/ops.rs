// Copyright (c) 2025 knix
// All rights reserved.

use crate::error::CodecResult;
use crate::types::Dtyp;
use crate::value::DValue;

mod basic;


pub use basic::BasicEvaluator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntBinop {
    Add { nuw: bool, nsw: bool },
    Sub { nuw: bool, nsw: bool },
    Mul { nuw: bool, nsw: bool },
    Shl { nuw: bool, nsw: bool },
    UDiv { exact: bool },
    SDiv { exact: bool },
    LShr { exact: bool },
    AShr { exact: bool },
    URem,
    SRem,
    And,
    Or,
    Xor,
}

impl IntBinop {
    pub const ADD: IntBinop = IntBinop::Add { nuw: false, nsw: false };
    pub const SUB: IntBinop = IntBinop::Sub { nuw: false, nsw: false };
    pub const MUL: IntBinop = IntBinop::Mul { nuw: false, nsw: false };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntCmp {
    Eq,
    Ne,
    Ugt,
    Uge,
    Ult,
    Ule,
    Sgt,
    Sge,
    Slt,
    Sle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatBinop {
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatCmp {
    False,
    Oeq,
    Ogt,
    Oge,
    Olt,
    Ole,
    One,
    Ord,
    Uno,
    Ueq,
    Ugt,
    Uge,
    Ult,
    Ule,
    Une,
    True,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionKind {
    Trunc,
    Zext,
    Sext,
    Fptrunc,
    Fpext,
    Uitofp,
    Sitofp,
    Fptoui,
    Fptosi,
    Inttoptr,
    Ptrtoint,
    Bitcast,
    Addrspacecast,
}

/// Pure evaluation of the instructions the concretizer does not interpret
/// itself. Operands are never poison; the concretizer short-circuits that.
pub trait OpEvaluator {
    fn eval_iop(&self, op: IntBinop, lhs: &DValue, rhs: &DValue) -> CodecResult<DValue>;

    fn eval_icmp(&self, cmp: IntCmp, lhs: &DValue, rhs: &DValue) -> CodecResult<DValue>;

    fn eval_fop(&self, op: FloatBinop, lhs: &DValue, rhs: &DValue) -> CodecResult<DValue>;

    fn eval_fcmp(&self, cmp: FloatCmp, lhs: &DValue, rhs: &DValue) -> CodecResult<DValue>;

    /// Numeric conversions. Pointer/integer casts and bitcasts are resolved by
    /// the concretizer and do not reach the evaluator.
    fn eval_conv(
        &self,
        conv: ConversionKind,
        from: &Dtyp,
        value: &DValue,
        to: &Dtyp,
    ) -> CodecResult<DValue>;
}
