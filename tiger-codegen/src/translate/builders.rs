//! Free functions building translated IR for each AST shape.
//!
//! Grounded on
//! `examples/original_source/src/intermediate_representation/translate.py`.
//! Each function here takes already-translated operands (from
//! `translate::checker`, which interleaves these calls with type checking)
//! and returns one more [`TranslatedExpr`].

use crate::frame::{self, WORD_SIZE};
use crate::ir::{BinaryOperator, Expr, RelationalOperator, Stmt};
use crate::temp::{Label, TempFactory, TempMap};
use crate::translate::ast;
use crate::translate::environment::is_standard_library_function;
use crate::translate::fragment::{Fragment, FragmentManager};
use crate::translate::level::{Access, Level};
use crate::translate::translated_expr::{
    convert_to_condition, convert_to_expression, convert_to_statement, TranslatedExpr,
};

/// Walks the static-link chain from `level` up to `access.level`, applying
/// `access_to_exp` at each hop, and reads the final location.
pub fn simple_variable(map: &TempMap, access: &Access, level: &Level) -> TranslatedExpr {
    let mut result = Expr::Temp(frame::frame_pointer(map));
    let mut current = level.clone();
    while current != access.level {
        let static_link = current.formals().remove(0);
        result = frame::access_to_exp(&static_link.access, result);
        current = current.parent();
    }
    TranslatedExpr::Ex(frame::access_to_exp(&access.access, result))
}

pub fn field_variable(factory: &mut TempFactory, variable: TranslatedExpr, field_index: i64) -> TranslatedExpr {
    let base = convert_to_expression(factory, variable);
    TranslatedExpr::Ex(Expr::mem(Expr::bin(
        BinaryOperator::Plus,
        base,
        Expr::bin(BinaryOperator::Mul, Expr::Const(field_index), Expr::Const(WORD_SIZE)),
    )))
}

pub fn subscript_variable(
    factory: &mut TempFactory,
    variable: TranslatedExpr,
    subscript: TranslatedExpr,
) -> TranslatedExpr {
    let base = convert_to_expression(factory, variable);
    let index = convert_to_expression(factory, subscript);
    TranslatedExpr::Ex(Expr::mem(Expr::bin(
        BinaryOperator::Plus,
        base,
        Expr::bin(BinaryOperator::Mul, index, Expr::Const(WORD_SIZE)),
    )))
}

pub fn nil_expression() -> TranslatedExpr {
    TranslatedExpr::Ex(Expr::Const(0))
}

pub fn integer_expression(n: i64) -> TranslatedExpr {
    TranslatedExpr::Ex(Expr::Const(n))
}

pub fn string_expression(factory: &mut TempFactory, fragments: &mut FragmentManager, s: String) -> TranslatedExpr {
    let label = factory.new_label();
    fragments.add(Fragment::String { label: label.clone(), string: s });
    TranslatedExpr::Ex(Expr::Name(label))
}

/// Builds a call. Standard-library calls skip static-link assembly (§4.D).
pub fn call_expression(
    map: &TempMap,
    function_label: &Label,
    function_level: &Level,
    caller_level: &Level,
    args: Vec<TranslatedExpr>,
    factory: &mut TempFactory,
) -> TranslatedExpr {
    let arg_exprs: Vec<Expr> = args.into_iter().map(|a| convert_to_expression(factory, a)).collect();

    if is_standard_library_function(function_label.as_str()) {
        return TranslatedExpr::Ex(frame::external_call(function_label.as_str(), arg_exprs));
    }

    let mut static_link = Expr::Temp(frame::frame_pointer(map));
    let mut current = caller_level.clone();
    while current != function_level.parent() {
        let link_access = current.formals().remove(0);
        static_link = frame::access_to_exp(&link_access.access, static_link);
        current = current.parent();
    }
    let mut call_args = vec![static_link];
    call_args.extend(arg_exprs);
    TranslatedExpr::Ex(Expr::call(Expr::Name(function_label.clone()), call_args))
}

pub fn convert_arithmetic_operator(op: ast::Oper) -> BinaryOperator {
    match op {
        ast::Oper::Plus => BinaryOperator::Plus,
        ast::Oper::Minus => BinaryOperator::Minus,
        ast::Oper::Times => BinaryOperator::Mul,
        ast::Oper::Divide => BinaryOperator::Div,
        other => unreachable!("{other:?} is not an arithmetic operator"),
    }
}

pub fn convert_conditional_operator(op: ast::Oper) -> RelationalOperator {
    match op {
        ast::Oper::Eq => RelationalOperator::Eq,
        ast::Oper::Neq => RelationalOperator::Ne,
        ast::Oper::Lt => RelationalOperator::Lt,
        ast::Oper::Le => RelationalOperator::Le,
        ast::Oper::Gt => RelationalOperator::Gt,
        ast::Oper::Ge => RelationalOperator::Ge,
        other => unreachable!("{other:?} is not a relational operator"),
    }
}

pub fn arithmetic_operation_expression(
    factory: &mut TempFactory,
    op: ast::Oper,
    left: TranslatedExpr,
    right: TranslatedExpr,
) -> TranslatedExpr {
    let l = convert_to_expression(factory, left);
    let r = convert_to_expression(factory, right);
    TranslatedExpr::Ex(Expr::bin(convert_arithmetic_operator(op), l, r))
}

pub fn conditional_operation_expression(
    factory: &mut TempFactory,
    op: ast::Oper,
    left: TranslatedExpr,
    right: TranslatedExpr,
) -> TranslatedExpr {
    let l = convert_to_expression(factory, left);
    let r = convert_to_expression(factory, right);
    let rel = convert_conditional_operator(op);
    TranslatedExpr::Cx(Box::new(move |true_label, false_label| Stmt::CondJump {
        op: rel,
        left: l,
        right: r,
        true_label,
        false_label,
    }))
}

pub fn string_conditional_operation_expression(
    factory: &mut TempFactory,
    op: ast::Oper,
    left: TranslatedExpr,
    right: TranslatedExpr,
) -> TranslatedExpr {
    let l = convert_to_expression(factory, left);
    let r = convert_to_expression(factory, right);
    let rel = convert_conditional_operator(op);
    let compare = frame::external_call("string_compare", vec![l, r]);
    TranslatedExpr::Cx(Box::new(move |true_label, false_label| Stmt::CondJump {
        op: rel,
        left: compare,
        right: Expr::Const(0),
        true_label,
        false_label,
    }))
}

pub fn record_expression(factory: &mut TempFactory, fields: Vec<TranslatedExpr>) -> TranslatedExpr {
    let result = factory.new_temp();
    let size = Expr::Const(fields.len() as i64 * WORD_SIZE);
    let mut sequence = vec![Stmt::Move(Expr::Temp(result), frame::external_call("init_record", vec![size]))];
    for (index, field) in fields.into_iter().enumerate() {
        let value = convert_to_expression(factory, field);
        let slot = Expr::mem(Expr::bin(
            BinaryOperator::Plus,
            Expr::Temp(result),
            Expr::Const(index as i64 * WORD_SIZE),
        ));
        sequence.push(Stmt::Move(slot, value));
    }
    TranslatedExpr::Ex(Expr::eseq(Stmt::Seq(sequence), Expr::Temp(result)))
}

pub fn sequence_expression(factory: &mut TempFactory, mut exprs: Vec<TranslatedExpr>) -> TranslatedExpr {
    if exprs.is_empty() {
        return TranslatedExpr::Ex(Expr::Const(0));
    }
    let first = exprs.remove(0);
    let mut result = convert_to_expression(factory, first);
    for next in exprs {
        let next_expr = convert_to_expression(factory, next);
        result = Expr::eseq(Stmt::SExp(result), next_expr);
    }
    TranslatedExpr::Ex(result)
}

pub fn assignment_expression(
    factory: &mut TempFactory,
    variable: TranslatedExpr,
    exp: TranslatedExpr,
) -> TranslatedExpr {
    let dst = convert_to_expression(factory, variable);
    let src = convert_to_expression(factory, exp);
    TranslatedExpr::Nx(Stmt::Move(dst, src))
}

pub fn if_expression(
    factory: &mut TempFactory,
    test: TranslatedExpr,
    then_branch: TranslatedExpr,
    else_branch: Option<TranslatedExpr>,
) -> TranslatedExpr {
    let test_build = convert_to_condition(test);
    let then_expr = convert_to_expression(factory, then_branch);
    let else_expr = match else_branch {
        Some(e) => convert_to_expression(factory, e),
        None => Expr::Const(0),
    };

    let true_label = factory.new_label();
    let false_label = factory.new_label();
    let join_label = factory.new_label();
    let result = factory.new_temp();

    let test_stmt = test_build(true_label.clone(), false_label.clone());

    let sequence = Stmt::Seq(vec![
        test_stmt,
        Stmt::Label(true_label),
        Stmt::Move(Expr::Temp(result), then_expr),
        Stmt::Jump(Expr::Name(join_label.clone()), vec![join_label.clone()]),
        Stmt::Label(false_label),
        Stmt::Move(Expr::Temp(result), else_expr),
        Stmt::Label(join_label),
    ]);

    TranslatedExpr::Ex(Expr::eseq(sequence, Expr::Temp(result)))
}

pub fn while_expression(
    factory: &mut TempFactory,
    test: TranslatedExpr,
    body: TranslatedExpr,
    break_label: Label,
) -> TranslatedExpr {
    let test_build = convert_to_condition(test);
    let test_label = factory.new_label();
    let body_label = factory.new_label();
    let body_stmt = convert_to_statement(factory, body);

    let test_stmt = test_build(body_label.clone(), break_label.clone());

    let sequence = Stmt::Seq(vec![
        Stmt::Label(test_label.clone()),
        test_stmt,
        Stmt::Label(body_label),
        body_stmt,
        Stmt::Jump(Expr::Name(test_label.clone()), vec![test_label]),
        Stmt::Label(break_label),
    ]);

    TranslatedExpr::Nx(sequence)
}

pub fn break_expression(break_label: Label) -> TranslatedExpr {
    TranslatedExpr::Nx(Stmt::Jump(Expr::Name(break_label.clone()), vec![break_label]))
}

pub fn for_expression(
    factory: &mut TempFactory,
    variable: TranslatedExpr,
    lo: TranslatedExpr,
    hi: TranslatedExpr,
    body: TranslatedExpr,
    break_label: Label,
) -> TranslatedExpr {
    let test_label = factory.new_label();
    let body_label = factory.new_label();
    let limit = factory.new_temp();
    let variable_expr = convert_to_expression(factory, variable);
    let lo_expr = convert_to_expression(factory, lo);
    let hi_expr = convert_to_expression(factory, hi);
    let body_stmt = convert_to_statement(factory, body);

    let sequence = Stmt::Seq(vec![
        Stmt::Move(variable_expr.clone(), lo_expr),
        Stmt::Move(Expr::Temp(limit), hi_expr),
        Stmt::Label(test_label.clone()),
        Stmt::CondJump {
            op: RelationalOperator::Le,
            left: variable_expr.clone(),
            right: Expr::Temp(limit),
            true_label: body_label.clone(),
            false_label: break_label.clone(),
        },
        Stmt::Label(body_label),
        body_stmt,
        Stmt::Move(variable_expr.clone(), Expr::bin(BinaryOperator::Plus, variable_expr, Expr::Const(1))),
        Stmt::Jump(Expr::Name(test_label.clone()), vec![test_label]),
        Stmt::Label(break_label),
    ]);

    TranslatedExpr::Nx(sequence)
}

pub fn let_expression(
    factory: &mut TempFactory,
    decs: Vec<TranslatedExpr>,
    body: TranslatedExpr,
) -> TranslatedExpr {
    let dec_stmts: Vec<Stmt> = decs.into_iter().map(|d| convert_to_statement(factory, d)).collect();
    let body_expr = convert_to_expression(factory, body);
    TranslatedExpr::Ex(Expr::eseq(Stmt::Seq(dec_stmts), body_expr))
}

pub fn array_expression(factory: &mut TempFactory, size: TranslatedExpr, init: TranslatedExpr) -> TranslatedExpr {
    let size_expr = convert_to_expression(factory, size);
    let init_expr = convert_to_expression(factory, init);
    TranslatedExpr::Ex(frame::external_call("init_array", vec![size_expr, init_expr]))
}

pub fn empty_expression() -> TranslatedExpr {
    TranslatedExpr::Nx(Stmt::SExp(Expr::Const(0)))
}

/// Wraps a function body so its value lands in the return-value register,
/// preserving callee-saved registers and shifting register-passed formals
/// into their homes, then records the finished procedure as a fragment.
pub fn proc_entry_exit(
    factory: &mut TempFactory,
    map: &TempMap,
    function_level: &Level,
    body: TranslatedExpr,
    fragments: &mut FragmentManager,
) {
    let body_expr = convert_to_expression(factory, body);
    let body_stmt = Stmt::Move(Expr::Temp(frame::return_value(map)), body_expr);
    let frame = function_level.with_frame(|f| f.clone());
    let shifted = function_level.with_frame(|f| frame::shift_view(f, map, body_stmt));
    let preserved = frame::preserve_callee_registers(factory, map, shifted);
    fragments.add(Fragment::Proc { body: preserved, frame });
}
