//! Error types for the backend pipeline.
//!
//! Per §7, two error kinds are user-visible ([`FrontendError`]); everything
//! else the pipeline detects is an internal invariant violation and is
//! treated as a compiler bug, not a recoverable `Result`.

use std::fmt;

/// A source line number, 1-based. The out-of-scope lexer/parser/AST hand
/// these to the translator on every node.
pub type Line = u32;

/// A user-visible compilation failure: bad input, not a compiler bug.
/// Mirrors `SyntacticError`/`SemanticError` in the front end this backend
/// consumes (`examples/original_source/src/semantic_analysis/analyzers.py`).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrontendError {
    #[error("Compilation error! {message} in line {line}")]
    Syntactic { message: String, line: Line },
    #[error("Compilation error! {message} in line {line}")]
    Semantic { message: String, line: Line },
}

impl FrontendError {
    pub fn semantic(message: impl Into<String>, line: Line) -> Self {
        FrontendError::Semantic { message: message.into(), line }
    }

    pub fn syntactic(message: impl Into<String>, line: Line) -> Self {
        FrontendError::Syntactic { message: message.into(), line }
    }

    pub fn line(&self) -> Line {
        match self {
            FrontendError::Syntactic { line, .. } | FrontendError::Semantic { line, .. } => *line,
        }
    }
}

/// Result alias for any fallible frontend-facing operation (translation,
/// type checking).
pub type CompileResult<T> = Result<T, FrontendError>;

/// Panics with a message identifying a broken internal invariant, per §7:
/// "Internal invariants are enforced by panics ... these indicate a
/// compiler bug rather than a user input problem."
#[derive(Debug)]
pub struct InternalInvariant(pub &'static str);

impl fmt::Display for InternalInvariant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "internal invariant violated: {}", self.0)
    }
}

impl std::error::Error for InternalInvariant {}

/// Panics with an [`InternalInvariant`] message. Used at the three sites
/// §7 calls out: `Seq`/`ESeq` surviving canonicalization, an unknown
/// operator, and a `Call` whose function is not a `Name`.
macro_rules! bug {
    ($msg:expr) => {
        panic!("{}", $crate::result::InternalInvariant($msg))
    };
}

pub(crate) use bug;
