//! Basic-block formation (§4.E). Grounded on
//! `examples/original_source/src/canonical/basic_block.py`.

use crate::ir::{Expr, Stmt};
use crate::temp::{Label, TempFactory};

/// The result of block formation: every block starts with a `Label` and
/// ends with `Jump`/`CondJump` (§8 property 3); `done_label` names the
/// synthetic block that closes the procedure.
pub struct BasicBlocks {
    pub done_label: Label,
    pub blocks: Vec<Vec<Stmt>>,
}

fn label_of(stmt: &Stmt) -> Label {
    match stmt {
        Stmt::Label(l) => l.clone(),
        _ => panic!("basic block must start with a Label"),
    }
}

fn ends_in_jump(stmt: &Stmt) -> bool {
    matches!(stmt, Stmt::Jump(..) | Stmt::CondJump { .. })
}

/// Splits a linearized statement list into basic blocks.
pub fn basic_blocks(factory: &mut TempFactory, statements: Vec<Stmt>) -> BasicBlocks {
    let done_label = factory.new_label();
    let mut blocks: Vec<Vec<Stmt>> = Vec::new();
    let mut start = 0;
    for (i, stmt) in statements.iter().enumerate() {
        match stmt {
            Stmt::Label(_) => {
                if start < i {
                    blocks.push(statements[start..i].to_vec());
                    start = i;
                }
            }
            Stmt::Jump(..) | Stmt::CondJump { .. } => {
                blocks.push(statements[start..=i].to_vec());
                start = i + 1;
            }
            _ => {}
        }
    }
    let mut last_block = statements[start..].to_vec();
    last_block.push(Stmt::Jump(Expr::Name(done_label.clone()), vec![done_label.clone()]));
    blocks.push(last_block);

    for block in &mut blocks {
        if !matches!(block[0], Stmt::Label(_)) {
            block.insert(0, Stmt::Label(factory.new_label()));
        }
    }

    let len = blocks.len();
    for i in 0..len.saturating_sub(1) {
        if !ends_in_jump(blocks[i].last().unwrap()) {
            let next_label = label_of(&blocks[i + 1][0]);
            blocks[i].push(Stmt::Jump(Expr::Name(next_label.clone()), vec![next_label]));
        }
    }

    BasicBlocks { done_label, blocks }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_block_starts_with_label_and_ends_with_jump() {
        let mut f = TempFactory::new();
        let l1 = f.new_label();
        let stmts = vec![Stmt::Label(l1), Stmt::SExp(Expr::Const(1))];
        let bb = basic_blocks(&mut f, stmts);
        for block in &bb.blocks {
            assert!(matches!(block[0], Stmt::Label(_)));
            assert!(ends_in_jump(block.last().unwrap()));
        }
    }

    #[test]
    fn interior_jumps_split_into_separate_blocks() {
        let mut f = TempFactory::new();
        let target = f.new_label();
        let stmts = vec![
            Stmt::Jump(Expr::Name(target.clone()), vec![target.clone()]),
            Stmt::Label(target),
            Stmt::SExp(Expr::Const(0)),
        ];
        let bb = basic_blocks(&mut f, stmts);
        assert_eq!(bb.blocks.len(), 2);
    }
}
