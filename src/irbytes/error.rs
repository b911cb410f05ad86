// Copyright (c) 2025 knix
// All rights reserved.

use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecErrorKind {
    /// Malformed input: a value that disagrees with its type, a missing field,
    /// a byte placeholder in a position where it has no meaning, and so on.
    Structural,
    /// A type the codec deliberately does not implement (half, x86_fp80, fp128,
    /// ppc_fp128, metadata, x86_mmx, opaque, odd integer widths).
    Unsupported,
    /// An operator evaluator refused its operands, e.g. division by zero.
    Evaluation,
}

impl CodecErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            CodecErrorKind::Structural => "structural",
            CodecErrorKind::Unsupported => "unsupported",
            CodecErrorKind::Evaluation => "evaluation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecError {
    pub kind: CodecErrorKind,
    pub message: String,
}

impl CodecError {
    pub fn make(kind: CodecErrorKind, message: impl AsRef<str>) -> CodecError {
        CodecError { kind, message: message.as_ref().to_owned() }
    }

    pub fn is_unsupported(&self) -> bool {
        self.kind == CodecErrorKind::Unsupported
    }

    pub fn is_structural(&self) -> bool {
        self.kind == CodecErrorKind::Structural
    }
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error: {}", self.kind.name(), self.message)
    }
}

impl std::error::Error for CodecError {}

pub type CodecResult<A> = Result<A, CodecError>;

pub fn make_error<T: AsRef<str>>(kind: CodecErrorKind, message: T) -> CodecError {
    CodecError::make(kind, message)
}

pub fn make_fail<A, T: AsRef<str>>(kind: CodecErrorKind, message: T) -> CodecResult<A> {
    Err(make_error(kind, message))
}

#[macro_export]
macro_rules! errf {
    ($($format_args:expr),* $(,)?) => {
        {
            let s: String = format!($($format_args),*);
            $crate::error::make_error($crate::error::CodecErrorKind::Structural, &s)
        }
    };
}

#[macro_export]
macro_rules! failf {
    ($($format_args:expr),* $(,)?) => {
        {
            let s: String = format!($($format_args),*);
            $crate::error::make_fail($crate::error::CodecErrorKind::Structural, &s)
        }
    };
}

#[macro_export]
macro_rules! unsupportedf {
    ($($format_args:expr),* $(,)?) => {
        {
            let s: String = format!($($format_args),*);
            $crate::error::make_fail($crate::error::CodecErrorKind::Unsupported, &s)
        }
    };
}

#[macro_export]
macro_rules! evalf {
    ($($format_args:expr),* $(,)?) => {
        {
            let s: String = format!($($format_args),*);
            $crate::error::make_fail($crate::error::CodecErrorKind::Evaluation, &s)
        }
    };
}
