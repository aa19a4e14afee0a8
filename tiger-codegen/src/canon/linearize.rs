//! Linearization: eliminate `ESeq`, restrict `Call` to top-of-`Move`/`SExp`
//! positions (§4.E). Grounded on
//! `examples/original_source/src/canonical/linearize.py`.

use crate::ir::{Expr, Stmt};
use crate::temp::TempFactory;

fn is_noop(stmt: &Stmt) -> bool {
    matches!(stmt, Stmt::SExp(Expr::Const(_)))
}

fn noop_statement() -> Stmt {
    Stmt::SExp(Expr::Const(0))
}

/// True if `expr` may be evaluated after `stmt` without changing meaning:
/// `stmt` has no observable effect, or `expr` cannot itself be affected by
/// any side effect (a bare name or constant).
fn commute(stmt: &Stmt, expr: &Expr) -> bool {
    is_noop(stmt) || matches!(expr, Expr::Name(_) | Expr::Const(_))
}

fn simplified_seq(first: Stmt, second: Stmt) -> Stmt {
    if is_noop(&first) {
        return second;
    }
    if is_noop(&second) {
        return first;
    }
    Stmt::Seq(vec![first, second])
}

/// Splits off the side-effecting prefix of `expr`, returning it alongside
/// the now side-effect-free remainder.
fn do_expr(factory: &mut TempFactory, expr: Expr) -> (Stmt, Expr) {
    match expr {
        Expr::BinOp(op, l, r) => {
            let (stmt, mut exprs) = reorder(factory, vec![*l, *r]);
            let r = exprs.pop().unwrap();
            let l = exprs.pop().unwrap();
            (stmt, Expr::bin(op, l, r))
        }
        Expr::Mem(e) => {
            let (stmt, mut exprs) = reorder(factory, vec![*e]);
            (stmt, Expr::mem(exprs.pop().unwrap()))
        }
        Expr::ESeq(s, e) => {
            let (sub_stmt, sub_expr) = do_expr(factory, *e);
            (simplified_seq(do_stmt(factory, *s), sub_stmt), sub_expr)
        }
        Expr::Call(f, args) => {
            let mut all = vec![*f];
            all.extend(args);
            let (stmt, mut exprs) = reorder(factory, all);
            let f = exprs.remove(0);
            (stmt, Expr::call(f, exprs))
        }
        other => (noop_statement(), other),
    }
}

/// Pushes `reorder` through a statement so every subexpression it contains
/// is side-effect free once extracted.
fn do_stmt(factory: &mut TempFactory, stmt: Stmt) -> Stmt {
    match stmt {
        Stmt::Seq(list) => {
            let mut out = Vec::new();
            for s in list {
                let new_s = do_stmt(factory, s);
                if !is_noop(&new_s) {
                    out.push(new_s);
                }
            }
            if out.is_empty() {
                noop_statement()
            } else {
                Stmt::Seq(out)
            }
        }
        Stmt::Jump(target, labels) => {
            let (stmt, mut exprs) = reorder(factory, vec![target]);
            simplified_seq(stmt, Stmt::Jump(exprs.pop().unwrap(), labels))
        }
        Stmt::CondJump { op, left, right, true_label, false_label } => {
            let (stmt, mut exprs) = reorder(factory, vec![left, right]);
            let right = exprs.pop().unwrap();
            let left = exprs.pop().unwrap();
            simplified_seq(
                stmt,
                Stmt::CondJump { op, left, right, true_label, false_label },
            )
        }
        Stmt::Move(dst, src) => do_move(factory, dst, src),
        Stmt::SExp(e) => do_sexp(factory, e),
        Stmt::Label(_) => stmt,
    }
}

fn do_move(factory: &mut TempFactory, dst: Expr, src: Expr) -> Stmt {
    match (dst, src) {
        (Expr::Temp(t), Expr::Call(f, args)) => {
            let mut all = vec![*f];
            all.extend(args);
            let (stmt, mut exprs) = reorder(factory, all);
            let f = exprs.remove(0);
            simplified_seq(stmt, Stmt::Move(Expr::Temp(t), Expr::call(f, exprs)))
        }
        (dst @ Expr::Temp(_), src) => {
            let (stmt, mut exprs) = reorder(factory, vec![src]);
            simplified_seq(stmt, Stmt::Move(dst, exprs.pop().unwrap()))
        }
        (Expr::Mem(addr), src) => {
            let (stmt, mut exprs) = reorder(factory, vec![*addr, src]);
            let src = exprs.pop().unwrap();
            let addr = exprs.pop().unwrap();
            simplified_seq(stmt, Stmt::Move(Expr::mem(addr), src))
        }
        (Expr::ESeq(s, e), src) => {
            do_stmt(factory, Stmt::Seq(vec![*s, Stmt::Move(*e, src)]))
        }
        (dst, src) => Stmt::Move(dst, src),
    }
}

fn do_sexp(factory: &mut TempFactory, expr: Expr) -> Stmt {
    match expr {
        Expr::Call(f, args) => {
            let mut all = vec![*f];
            all.extend(args);
            let (stmt, mut exprs) = reorder(factory, all);
            let f = exprs.remove(0);
            simplified_seq(stmt, Stmt::SExp(Expr::call(f, exprs)))
        }
        other => {
            let (stmt, mut exprs) = reorder(factory, vec![other]);
            simplified_seq(stmt, Stmt::SExp(exprs.pop().unwrap()))
        }
    }
}

/// Evaluates `exprs` left to right, binding any expression that does not
/// commute past the statements evaluated after it to a fresh temp first.
fn reorder(factory: &mut TempFactory, mut exprs: Vec<Expr>) -> (Stmt, Vec<Expr>) {
    if exprs.is_empty() {
        return (noop_statement(), Vec::new());
    }
    if matches!(exprs[0], Expr::Call(..)) {
        let head = exprs.remove(0);
        let t = factory.new_temp();
        let bound = Expr::eseq(Stmt::Move(Expr::Temp(t), head), Expr::Temp(t));
        exprs.insert(0, bound);
        return reorder(factory, exprs);
    }
    let rest = exprs.split_off(1);
    let head = exprs.into_iter().next().unwrap();
    let (head_stmt, head_expr) = do_expr(factory, head);
    let (tail_stmt, tail_exprs) = reorder(factory, rest);
    if commute(&tail_stmt, &head_expr) {
        let mut out = vec![head_expr];
        out.extend(tail_exprs);
        (simplified_seq(head_stmt, tail_stmt), out)
    } else {
        let t = factory.new_temp();
        let bind = simplified_seq(head_stmt, Stmt::Move(Expr::Temp(t), head_expr));
        let mut out = vec![Expr::Temp(t)];
        out.extend(tail_exprs);
        (simplified_seq(bind, tail_stmt), out)
    }
}

fn linear(stmt: Stmt, mut tail: Vec<Stmt>) -> Vec<Stmt> {
    match stmt {
        Stmt::Seq(list) => {
            let mut out = Vec::new();
            for s in list {
                out = linear(s, out);
            }
            out.append(&mut tail);
            out
        }
        other => {
            let mut out = vec![other];
            out.append(&mut tail);
            out
        }
    }
}

/// Linearizes one procedure body into a flat statement list.
pub fn linearize(factory: &mut TempFactory, stmt: Stmt) -> Vec<Stmt> {
    linear(do_stmt(factory, stmt), Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::BinaryOperator;

    #[test]
    fn linearize_flattens_nested_seq() {
        let mut f = TempFactory::new();
        let l = f.new_label();
        let stmt = Stmt::Seq(vec![
            Stmt::Seq(vec![Stmt::Label(l.clone())]),
            Stmt::SExp(Expr::Const(1)),
        ]);
        let out = linearize(&mut f, stmt);
        assert!(matches!(out[0], Stmt::Label(_)));
    }

    #[test]
    fn eseq_is_eliminated_from_expressions() {
        let mut f = TempFactory::new();
        let l = f.new_label();
        let t = f.new_temp();
        let e = Expr::eseq(Stmt::Label(l), Expr::Temp(t));
        let stmt = Stmt::SExp(e);
        let out = linearize(&mut f, stmt);
        for s in &out {
            assert_no_eseq_stmt(s);
        }
    }

    fn assert_no_eseq_stmt(stmt: &Stmt) {
        match stmt {
            Stmt::Seq(list) => list.iter().for_each(assert_no_eseq_stmt),
            Stmt::Move(d, s) => {
                assert_no_eseq_expr(d);
                assert_no_eseq_expr(s);
            }
            Stmt::SExp(e) | Stmt::Jump(e, _) => assert_no_eseq_expr(e),
            Stmt::CondJump { left, right, .. } => {
                assert_no_eseq_expr(left);
                assert_no_eseq_expr(right);
            }
            Stmt::Label(_) => {}
        }
    }

    fn assert_no_eseq_expr(expr: &Expr) {
        match expr {
            Expr::ESeq(..) => panic!("ESeq survived linearization"),
            Expr::BinOp(_, l, r) => {
                assert_no_eseq_expr(l);
                assert_no_eseq_expr(r);
            }
            Expr::Mem(e) => assert_no_eseq_expr(e),
            Expr::Call(f, args) => {
                assert_no_eseq_expr(f);
                args.iter().for_each(assert_no_eseq_expr);
            }
            Expr::Temp(_) | Expr::Name(_) | Expr::Const(_) => {}
        }
    }

    #[test]
    fn call_is_restricted_to_move_temp_or_sexp() {
        let mut f = TempFactory::new();
        let label = f.new_label();
        let arg_call = Expr::call(Expr::Name(label.clone()), Vec::new());
        let stmt = Stmt::SExp(Expr::bin(BinaryOperator::Plus, arg_call, Expr::Const(1)));
        let out = linearize(&mut f, stmt);
        for s in &out {
            assert_call_is_restricted(s);
        }
    }

    fn assert_call_is_restricted(stmt: &Stmt) {
        match stmt {
            Stmt::Move(Expr::Temp(_), e) => assert_call_only_at_top(e, true),
            Stmt::SExp(e) => assert_call_only_at_top(e, true),
            Stmt::Move(_, e) => assert_call_only_at_top(e, false),
            Stmt::Jump(e, _) => assert_call_only_at_top(e, false),
            Stmt::CondJump { left, right, .. } => {
                assert_call_only_at_top(left, false);
                assert_call_only_at_top(right, false);
            }
            Stmt::Seq(list) => list.iter().for_each(assert_call_is_restricted),
            Stmt::Label(_) => {}
        }
    }

    fn assert_call_only_at_top(expr: &Expr, allowed_here: bool) {
        match expr {
            Expr::Call(f, args) => {
                assert!(allowed_here, "Call found outside Move(Temp,_)/SExp");
                assert_call_only_at_top(f, false);
                args.iter().for_each(|a| assert_call_only_at_top(a, false));
            }
            Expr::BinOp(_, l, r) => {
                assert_call_only_at_top(l, false);
                assert_call_only_at_top(r, false);
            }
            Expr::Mem(e) => assert_call_only_at_top(e, false),
            _ => {}
        }
    }
}
