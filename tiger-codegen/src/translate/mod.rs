//! Translator (§4.D): turns a Tiger AST into checked IR fragments.
//!
//! Submodules mirror the two source files this component merges —
//! `examples/original_source/src/semantic_analysis/analyzers.py` for type
//! checking and `examples/original_source/src/intermediate_representation/
//! translate.py` for the IR it builds alongside every check.

pub mod ast;
pub mod builders;
pub mod checker;
pub mod environment;
pub mod fragment;
pub mod level;
pub mod translated_expr;
pub mod types;

pub use checker::{TypedExpr, Translator};
pub use fragment::{Fragment, FragmentManager};
