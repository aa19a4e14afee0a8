//! Trace scheduling (§4.E). Grounded on
//! `examples/original_source/src/canonical/trace.py`.

use std::collections::HashMap;

use crate::canon::blocks::BasicBlocks;
use crate::ir::{negate_rel_op, Expr, Stmt};
use crate::temp::{Label, TempFactory};

fn block_label(block: &[Stmt]) -> Label {
    match &block[0] {
        Stmt::Label(l) => l.clone(),
        _ => panic!("block must start with a Label"),
    }
}

/// Greedily traces blocks: start an unmarked block, follow its jump target
/// into the next unmarked block (preferring a `CondJump`'s false
/// successor), repeat until every block is marked.
fn reorder_blocks(blocks: Vec<Vec<Stmt>>) -> Vec<Vec<Stmt>> {
    let mut unmarked: HashMap<Label, Vec<Stmt>> =
        blocks.iter().map(|b| (block_label(b), b.clone())).collect();
    let mut result = Vec::new();
    for block in &blocks {
        let mut current_label = block_label(block);
        while let Some(current) = unmarked.remove(&current_label) {
            let next_label = match current.last().unwrap() {
                Stmt::Jump(_, labels) => labels.first().cloned(),
                Stmt::CondJump { true_label, false_label, .. } => {
                    if unmarked.contains_key(false_label) {
                        Some(false_label.clone())
                    } else {
                        Some(true_label.clone())
                    }
                }
                _ => None,
            };
            result.push(current);
            match next_label {
                Some(l) if unmarked.contains_key(&l) => current_label = l,
                _ => break,
            }
        }
    }
    result
}

fn add_new_false_label(factory: &mut TempFactory, block: &mut Vec<Stmt>) {
    let new_false = factory.new_label();
    match block.last_mut().unwrap() {
        Stmt::CondJump { false_label, .. } => *false_label = new_false.clone(),
        _ => panic!("add_new_false_label requires a trailing CondJump"),
    }
    block.push(Stmt::Label(new_false.clone()));
    block.push(Stmt::Jump(Expr::Name(new_false.clone()), vec![new_false]));
}

/// Ensures every `CondJump` is immediately followed by its false label (§8
/// property 4), and drops `Jump`s whose target is already the next block.
fn fix_jumps(factory: &mut TempFactory, blocks: &mut Vec<Vec<Stmt>>) {
    let len = blocks.len();
    for i in 0..len.saturating_sub(1) {
        let next_label = block_label(&blocks[i + 1]);
        match blocks[i].last().unwrap().clone() {
            Stmt::Jump(_, labels) if labels.first() == Some(&next_label) => {
                blocks[i].pop();
            }
            Stmt::CondJump { true_label, false_label, .. } => {
                if next_label != true_label && next_label != false_label {
                    add_new_false_label(factory, &mut blocks[i]);
                } else if next_label == true_label {
                    if let Stmt::CondJump { op, true_label, false_label, .. } =
                        blocks[i].last_mut().unwrap()
                    {
                        std::mem::swap(true_label, false_label);
                        *op = negate_rel_op(*op);
                    }
                }
            }
            _ => {}
        }
    }
    if let Some(last) = blocks.last() {
        if matches!(last.last(), Some(Stmt::CondJump { .. })) {
            let idx = blocks.len() - 1;
            add_new_false_label(factory, &mut blocks[idx]);
        }
    }
}

/// Produces the final, scheduled, flat statement list for one procedure.
pub fn trace_schedule(factory: &mut TempFactory, bb: BasicBlocks) -> Vec<Stmt> {
    let mut reordered = reorder_blocks(bb.blocks);
    reordered.push(vec![Stmt::Label(bb.done_label)]);
    fix_jumps(factory, &mut reordered);
    reordered.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canon::blocks::basic_blocks;
    use crate::ir::RelationalOperator;

    #[test]
    fn cond_jump_is_always_followed_by_its_false_label() {
        let mut f = TempFactory::new();
        let t_label = f.new_label();
        let f_label = f.new_label();
        let stmts = vec![
            Stmt::CondJump {
                op: RelationalOperator::Eq,
                left: Expr::Const(1),
                right: Expr::Const(1),
                true_label: t_label.clone(),
                false_label: f_label.clone(),
            },
            Stmt::Label(t_label.clone()),
            Stmt::SExp(Expr::Const(0)),
        ];
        let bb = basic_blocks(&mut f, stmts);
        let scheduled = trace_schedule(&mut f, bb);
        for (i, s) in scheduled.iter().enumerate() {
            if let Stmt::CondJump { false_label, .. } = s {
                match &scheduled[i + 1] {
                    Stmt::Label(l) => assert_eq!(l, false_label),
                    other => panic!("expected Label after CondJump, got {other:?}"),
                }
            }
        }
    }
}
