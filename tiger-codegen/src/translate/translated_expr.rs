//! The three-form translated-expression representation (`Ex`/`Nx`/`Cx`).
//!
//! Grounded on
//! `examples/original_source/src/intermediate_representation/translated_expression.py`.
//! The source represents a not-yet-fixed boolean condition as a statement
//! plus two mutable back-patch lists of `ConditionalJump`s whose `.true`/
//! `.false` fields get overwritten once the labels are known. IR nodes here
//! are owned, not shared-mutable, so `Cx` instead carries a closure from
//! `(true_label, false_label)` to the finished statement — the same
//! deferred-patch semantics, expressed as a single-use builder instead of a
//! list of patch sites.

use crate::ir::{Expr, RelationalOperator, Stmt};
use crate::result::bug;
use crate::temp::{Label, TempFactory};

/// One of the three shapes an in-progress IR translation can take.
pub enum TranslatedExpr {
    /// Produces a value.
    Ex(Expr),
    /// Produces no value.
    Nx(Stmt),
    /// A boolean condition: given the labels to jump to on true/false,
    /// builds the deciding statement.
    Cx(Box<dyn FnOnce(Label, Label) -> Stmt>),
}

/// Forces any translated expression into a value-producing `Expr`.
pub fn convert_to_expression(factory: &mut TempFactory, exp: TranslatedExpr) -> Expr {
    match exp {
        TranslatedExpr::Ex(e) => e,
        TranslatedExpr::Nx(s) => Expr::eseq(s, Expr::Const(0)),
        TranslatedExpr::Cx(build) => {
            let result = factory.new_temp();
            let true_label = factory.new_label();
            let false_label = factory.new_label();
            Expr::eseq(
                Stmt::Seq(vec![
                    Stmt::Move(Expr::Temp(result), Expr::Const(1)),
                    build(true_label.clone(), false_label.clone()),
                    Stmt::Label(false_label),
                    Stmt::Move(Expr::Temp(result), Expr::Const(0)),
                    Stmt::Label(true_label),
                ]),
                Expr::Temp(result),
            )
        }
    }
}

/// Forces any translated expression into a no-result `Stmt`.
pub fn convert_to_statement(factory: &mut TempFactory, exp: TranslatedExpr) -> Stmt {
    match exp {
        TranslatedExpr::Ex(e) => Stmt::SExp(e),
        TranslatedExpr::Nx(s) => s,
        TranslatedExpr::Cx(build) => {
            let true_label = factory.new_label();
            let false_label = factory.new_label();
            Stmt::Seq(vec![
                build(true_label.clone(), false_label.clone()),
                Stmt::Label(true_label),
                Stmt::Label(false_label),
            ])
        }
    }
}

/// Forces any translated expression into a condition builder. Panics on
/// `Nx`: a no-result expression has no truth value to test (mirrors the
/// source's `Trying to remove_conditional from a NoResult expression`,
/// which is an internal-invariant violation here rather than a recoverable
/// exception, since a correctly type-checked AST never reaches this path).
pub fn convert_to_condition(exp: TranslatedExpr) -> Box<dyn FnOnce(Label, Label) -> Stmt> {
    match exp {
        TranslatedExpr::Ex(e) => Box::new(move |true_label, false_label| Stmt::CondJump {
            op: RelationalOperator::Ne,
            left: e,
            right: Expr::Const(0),
            true_label,
            false_label,
        }),
        TranslatedExpr::Nx(_) => bug!("cannot convert a no-result expression to a condition"),
        TranslatedExpr::Cx(build) => build,
    }
}

pub fn no_op_expression() -> TranslatedExpr {
    TranslatedExpr::Ex(Expr::Const(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converting_an_expression_to_a_condition_tests_against_zero() {
        let mut f = TempFactory::new();
        let build = convert_to_condition(TranslatedExpr::Ex(Expr::Const(5)));
        let t = f.new_label();
        let fl = f.new_label();
        let stmt = build(t.clone(), fl.clone());
        match stmt {
            Stmt::CondJump { op, true_label, false_label, .. } => {
                assert_eq!(op, RelationalOperator::Ne);
                assert_eq!(true_label, t);
                assert_eq!(false_label, fl);
            }
            other => panic!("expected CondJump, got {other:?}"),
        }
    }

    #[test]
    fn converting_a_condition_to_an_expression_materializes_zero_or_one() {
        let mut f = TempFactory::new();
        let cx = TranslatedExpr::Cx(Box::new(|t, fl| Stmt::CondJump {
            op: RelationalOperator::Eq,
            left: Expr::Const(1),
            right: Expr::Const(1),
            true_label: t,
            false_label: fl,
        }));
        let expr = convert_to_expression(&mut f, cx);
        assert!(matches!(expr, Expr::ESeq(..)));
    }
}
