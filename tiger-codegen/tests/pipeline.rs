//! End-to-end pipeline tests, built directly against hand-constructed ASTs
//! (this crate has no lexer/parser of its own — `tigerc` supplies one).
//! Pins the end-to-end scenarios named in the arithmetic-let, cyclic-type,
//! and loop-variable-assignment rows of spec.md §8's scenario table.

use proptest::prelude::*;

use tiger_codegen::frame::{self, all_registers};
use tiger_codegen::ir;
use tiger_codegen::temp::{TempFactory, TempMap};
use tiger_codegen::translate::ast::{Declaration, Expr, Oper, Type, TypeDec, Variable, VariableDec};
use tiger_codegen::translate::Translator;

fn translator() -> Translator {
    let mut factory = TempFactory::new();
    let map = TempMap::initialize(&mut factory, &all_registers());
    Translator::new(factory, map)
}

const LINE: u32 = 1;

#[test]
fn let_bound_arithmetic_expression_compiles_to_assembly_with_tigermain() {
    let program = Expr::Let {
        decs: vec![Declaration::Variable(VariableDec {
            name: "a".to_string(),
            type_name: None,
            init: Expr::Op {
                oper: Oper::Plus,
                left: Box::new(Expr::Int(1, LINE)),
                right: Box::new(Expr::Int(2, LINE)),
                line: LINE,
            },
            line: LINE,
        })],
        body: vec![Expr::Var(Box::new(Variable::Simple { name: "a".to_string(), line: LINE }))],
        line: LINE,
    };

    let fragments = translator().translate_program(&program).expect("well-typed program should compile");
    let assembly = tiger_codegen::compile_all(fragments.into_fragments());
    assert!(assembly.contains(".section .rodata"));
    assert!(assembly.contains("tigermain"));
}

#[test]
fn cyclic_type_aliases_are_rejected_with_the_cyclic_type_message() {
    let program = Expr::Let {
        decs: vec![Declaration::Types(
            vec![
                TypeDec { name: "a".to_string(), ty: Type::Name { name: "b".to_string(), line: LINE }, line: LINE },
                TypeDec { name: "b".to_string(), ty: Type::Name { name: "a".to_string(), line: LINE }, line: LINE },
            ],
            LINE,
        )],
        body: vec![],
        line: LINE,
    };

    let err = translator().translate_program(&program).expect_err("a↔b must be rejected as cyclic");
    assert!(err.to_string().contains("Cyclic type definition found involving type"));
}

#[test]
fn assigning_to_a_for_loop_variable_is_a_semantic_error() {
    let program = Expr::For {
        var: "i".to_string(),
        lo: Box::new(Expr::Int(1, LINE)),
        hi: Box::new(Expr::Int(10, LINE)),
        body: Box::new(Expr::Assign {
            var: Box::new(Variable::Simple { name: "i".to_string(), line: LINE }),
            exp: Box::new(Expr::Op {
                oper: Oper::Plus,
                left: Box::new(Expr::Var(Box::new(Variable::Simple { name: "i".to_string(), line: LINE }))),
                right: Box::new(Expr::Int(1, LINE)),
                line: LINE,
            }),
            line: LINE,
        }),
        line: LINE,
    };

    let err = translator().translate_program(&program).expect_err("the loop variable must not be assignable");
    assert!(err.to_string().contains("is not assignable"));
}

#[test]
fn an_undeclared_variable_reference_is_a_semantic_error_not_a_panic() {
    let program = Expr::Var(Box::new(Variable::Simple { name: "nope".to_string(), line: LINE }));
    let err = translator().translate_program(&program).expect_err("undefined variable must be rejected");
    assert!(err.to_string().contains("Undefined"));
}

/// A tiny generator for well-typed integer-arithmetic ASTs (`+ - *` over
/// literals), grounded on the same shape the end-to-end table's arithmetic
/// row exercises. Division is left out of the generator, not the language:
/// a fair `Arbitrary` would need to dodge zero divisors, which adds
/// generator complexity the property below doesn't need to pay for.
fn arb_arith_expr() -> impl Strategy<Value = Expr> {
    let leaf = any::<i8>().prop_map(|n| Expr::Int(n as i64, LINE));
    leaf.prop_recursive(4, 64, 4, |inner| {
        (inner.clone(), inner, prop_oneof![Just(Oper::Plus), Just(Oper::Minus), Just(Oper::Times)])
            .prop_map(|(left, right, oper)| Expr::Op {
                oper,
                left: Box::new(left),
                right: Box::new(right),
                line: LINE,
            })
    })
}

fn eval_ast(expr: &Expr) -> i64 {
    match expr {
        Expr::Int(n, _) => *n,
        Expr::Op { oper, left, right, .. } => {
            let l = eval_ast(left);
            let r = eval_ast(right);
            match oper {
                Oper::Plus => l.wrapping_add(r),
                Oper::Minus => l.wrapping_sub(r),
                Oper::Times => l.wrapping_mul(r),
                _ => unreachable!("generator only produces + - *"),
            }
        }
        _ => unreachable!("generator only produces Int and Op nodes"),
    }
}

fn eval_ir(expr: &ir::Expr) -> i64 {
    match expr {
        ir::Expr::Const(n) => *n,
        ir::Expr::BinOp(op, left, right) => {
            let l = eval_ir(left);
            let r = eval_ir(right);
            match op {
                ir::BinaryOperator::Plus => l.wrapping_add(r),
                ir::BinaryOperator::Minus => l.wrapping_sub(r),
                ir::BinaryOperator::Mul => l.wrapping_mul(r),
                other => panic!("unexpected IR operator for a pure arithmetic program: {other:?}"),
            }
        }
        other => panic!("unexpected IR node for a pure arithmetic program: {other:?}"),
    }
}

/// Finds the `Move` that writes into `rv`, digging through the `Seq`
/// nesting `frame::shift_view`/`preserve_callee_registers` add around the
/// translated body.
fn find_return_move<'a>(stmt: &'a ir::Stmt, rv: tiger_codegen::temp::Temp) -> Option<&'a ir::Expr> {
    match stmt {
        ir::Stmt::Move(ir::Expr::Temp(t), value) if *t == rv => Some(value),
        ir::Stmt::Seq(stmts) => stmts.iter().find_map(|s| find_return_move(s, rv)),
        _ => None,
    }
}

proptest! {
    #[test]
    fn compiled_arithmetic_matches_host_evaluation_modulo_256(expr in arb_arith_expr()) {
        let expected = eval_ast(&expr).rem_euclid(256);

        let mut factory = TempFactory::new();
        let map = TempMap::initialize(&mut factory, &all_registers());
        let translator = Translator::new(factory, map.clone());
        let program = Expr::Let { decs: vec![], body: vec![expr], line: LINE };
        let fragments = translator.translate_program(&program).expect("arithmetic over literals is always well-typed");

        let rv = frame::return_value(&map);
        let mut found = None;
        for fragment in fragments.into_fragments() {
            if let tiger_codegen::translate::Fragment::Proc { body, .. } = fragment {
                if let Some(value) = find_return_move(&body, rv) {
                    found = Some(eval_ir(value).rem_euclid(256));
                }
            }
        }
        let actual = found.expect("a non-empty program body must produce a move into the return register");
        prop_assert_eq!(actual, expected);
    }
}
