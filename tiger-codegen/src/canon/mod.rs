//! Canonicalization: linearize, form basic blocks, trace-schedule (§4.E).

pub mod blocks;
pub mod linearize;
pub mod trace;

use log::debug;

use crate::ir::Stmt;
use crate::temp::TempFactory;

/// Runs the full canonicalization pipeline on one procedure body.
pub fn canonicalize(factory: &mut TempFactory, body: Stmt) -> Vec<Stmt> {
    debug!("canonicalizing procedure body");
    let linear = linearize::linearize(factory, body);
    let blocks = blocks::basic_blocks(factory, linear);
    trace::trace_schedule(factory, blocks)
}
