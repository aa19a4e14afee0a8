//! Maximal-munch instruction selection (§4.F).
//!
//! Rewrites canonical IR into abstract x86-64 AT&T instructions carrying
//! `'s`/`'d`/`'j` placeholders. Grounded on
//! `examples/original_source/src/instruction_selection/munch.py`, with the
//! `Call` case — left as an unimplemented `pass` there — fully implemented
//! per §4.F's complete description.

use log::debug;

use crate::frame::{ARGUMENT_REGISTERS, CALLER_SAVED_REGISTERS};
use crate::ir::{BinaryOperator, Expr, Stmt};
use crate::isa::x86::asm::Instr;
use crate::isa::x86::registers::condition_code;
use crate::result::bug;
use crate::temp::{Temp, TempFactory, TempMap};

fn mnemonic(op: BinaryOperator) -> &'static str {
    use BinaryOperator::*;
    match op {
        Plus => "addq",
        Minus => "subq",
        Mul => "imulq",
        Div => "idivq",
        And => "andq",
        Or => "orq",
        Xor => "xorq",
        LShift => "salq",
        RShift => "sarq",
        ARShift => "shrq",
    }
}

/// Selects instructions for one procedure body. Owns the output list and
/// borrows the temp factory (fresh temps for every intermediate result)
/// and the register `TempMap` (to name `rax`/`rdx`/argument registers).
pub struct Selector<'a> {
    factory: &'a mut TempFactory,
    map: &'a TempMap,
    out: Vec<Instr>,
}

impl<'a> Selector<'a> {
    pub fn new(factory: &'a mut TempFactory, map: &'a TempMap) -> Self {
        debug!("selecting instructions for one procedure");
        Selector { factory, map, out: Vec::new() }
    }

    pub fn into_instructions(self) -> Vec<Instr> {
        self.out
    }

    fn emit(&mut self, instr: Instr) {
        self.out.push(instr);
    }

    fn reg(&self, name: &str) -> Temp {
        self.map.temp_for(name).unwrap_or_else(|| panic!("unregistered machine register {name}"))
    }

    pub fn munch_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Label(l) => self.emit(Instr::label(format!("{l}:"), l.clone())),
            Stmt::Jump(_, labels) => {
                self.emit(Instr::oper("jmp 'j0", Vec::new(), Vec::new(), Some(labels.clone())))
            }
            Stmt::CondJump { op, left, right, true_label, false_label } => {
                let l = self.munch_expr(left);
                let r = self.munch_expr(right);
                self.emit(Instr::oper("cmpq %'s0, %'s1", vec![l, r], Vec::new(), None));
                let cc = condition_code(*op);
                self.emit(Instr::oper(
                    format!("j{cc} 'j0"),
                    Vec::new(),
                    Vec::new(),
                    Some(vec![true_label.clone(), false_label.clone()]),
                ));
            }
            Stmt::Move(dst, src) => self.munch_move(dst, src),
            Stmt::SExp(e) => {
                self.munch_expr(e);
            }
            Stmt::Seq(_) => bug!("Seq survived canonicalization into instruction selection"),
        }
    }

    fn munch_move(&mut self, dst: &Expr, src: &Expr) {
        match dst {
            Expr::Temp(t) => {
                let s = self.munch_expr(src);
                self.emit(Instr::mov("movq %'s0, %'d0", s, *t));
            }
            Expr::Mem(addr) => {
                let s = self.munch_expr(src);
                let a = self.munch_expr(addr);
                self.emit(Instr::oper("movq %'s0, (%'s1)", vec![s, a], Vec::new(), None));
            }
            _ => bug!("Move target must be a Temp or Mem"),
        }
    }

    fn munch_args(&mut self, args: &[Expr]) -> Vec<Temp> {
        let mut in_registers = Vec::new();
        let mut pushed_in_order = Vec::new();
        for (i, arg) in args.iter().enumerate() {
            let t = self.munch_expr(arg);
            if i < ARGUMENT_REGISTERS.len() {
                in_registers.push((self.reg(ARGUMENT_REGISTERS[i]), t));
            } else {
                pushed_in_order.push(t);
            }
        }
        // Push extras right-to-left so they land in source order on the
        // stack, then load the first six into their argument registers.
        for &t in pushed_in_order.iter().rev() {
            self.emit(Instr::oper("pushq %'s0", vec![t], Vec::new(), None));
        }
        let mut used = Vec::new();
        for (reg_temp, value_temp) in in_registers {
            self.emit(Instr::mov("movq %'s0, %'d0", value_temp, reg_temp));
            used.push(reg_temp);
        }
        used.extend(pushed_in_order);
        used
    }

    pub fn munch_expr(&mut self, expr: &Expr) -> Temp {
        match expr {
            Expr::BinOp(op, l, r) => self.munch_binop(*op, l, r),
            Expr::Mem(addr) => {
                let a = self.munch_expr(addr);
                let t = self.factory.new_temp();
                self.emit(Instr::mov("movq (%'s0), %'d0", a, t));
                t
            }
            Expr::Temp(t) => *t,
            Expr::Name(l) => {
                let t = self.factory.new_temp();
                self.emit(Instr::oper(format!("leaq {l}(%rip), %'d0"), Vec::new(), vec![t], None));
                t
            }
            Expr::Const(k) => {
                let t = self.factory.new_temp();
                self.emit(Instr::oper(format!("movq ${k}, %'d0"), Vec::new(), vec![t], None));
                t
            }
            Expr::Call(f, args) => self.munch_call(f, args),
            Expr::ESeq(..) => bug!("ESeq survived canonicalization into instruction selection"),
        }
    }

    fn munch_binop(&mut self, op: BinaryOperator, l: &Expr, r: &Expr) -> Temp {
        use BinaryOperator::*;
        match op {
            Plus | Minus | And | Or | Xor => {
                let left = self.munch_expr(l);
                let dst = self.factory.new_temp();
                self.emit(Instr::mov("movq %'s0, %'d0", left, dst));
                let right = self.munch_expr(r);
                self.emit(Instr::oper(
                    format!("{} %'s1, %'d0", mnemonic(op)),
                    vec![dst, right],
                    vec![dst],
                    None,
                ));
                dst
            }
            Mul | Div => {
                let rax = self.reg("rax");
                let rdx = self.reg("rdx");
                let left = self.munch_expr(l);
                self.emit(Instr::mov("movq %'s0, %'d0", left, rax));
                self.emit(Instr::oper("cqto", vec![rax], vec![rdx], None));
                let right = self.munch_expr(r);
                self.emit(Instr::oper(
                    format!("{} %'s2", mnemonic(op)),
                    vec![rax, rdx, right],
                    vec![rax, rdx],
                    None,
                ));
                let result = self.factory.new_temp();
                self.emit(Instr::mov("movq %'s0, %'d0", rax, result));
                result
            }
            LShift | RShift | ARShift => {
                let dst = self.munch_expr(r);
                let count = self.munch_expr(l);
                self.emit(Instr::oper(
                    format!("{} %'s0, %'d0", mnemonic(op)),
                    vec![count, dst],
                    vec![dst],
                    None,
                ));
                dst
            }
        }
    }

    fn munch_call(&mut self, f: &Expr, args: &[Expr]) -> Temp {
        let label = match f {
            Expr::Name(l) => l.clone(),
            _ => bug!("Call target must be a Name"),
        };
        let arg_temps = self.munch_args(args);
        let mut destinations: Vec<Temp> =
            CALLER_SAVED_REGISTERS.iter().map(|&r| self.reg(r)).collect();
        destinations.extend(ARGUMENT_REGISTERS.iter().map(|&r| self.reg(r)));
        let rax = self.reg("rax");
        destinations.push(rax);
        self.emit(Instr::oper(format!("call {label}"), arg_temps, destinations, None));
        rax
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::all_registers;

    fn selector(factory: &mut TempFactory, map: &TempMap) -> Selector<'_> {
        Selector::new(factory, map)
    }

    #[test]
    fn const_lowers_to_a_single_move_immediate() {
        let mut factory = TempFactory::new();
        let map = TempMap::initialize(&mut factory, &all_registers());
        let mut sel = selector(&mut factory, &map);
        let t = sel.munch_expr(&Expr::Const(7));
        let instrs = sel.into_instructions();
        assert_eq!(instrs.len(), 1);
        assert_eq!(instrs[0].destinations(), &[t]);
        assert!(instrs[0].sources().is_empty());
    }

    #[test]
    fn addition_produces_move_then_op() {
        let mut factory = TempFactory::new();
        let map = TempMap::initialize(&mut factory, &all_registers());
        let mut sel = selector(&mut factory, &map);
        let _ = sel.munch_expr(&Expr::bin(BinaryOperator::Plus, Expr::Const(1), Expr::Const(2)));
        let instrs = sel.into_instructions();
        // const(1), move-into-dst, const(2), addq
        assert_eq!(instrs.len(), 4);
        assert!(!instrs.last().unwrap().is_move());
    }

    #[test]
    fn call_destinations_include_caller_saved_argument_registers_and_rax() {
        let mut factory = TempFactory::new();
        let map = TempMap::initialize(&mut factory, &all_registers());
        let mut sel = selector(&mut factory, &map);
        let label = factory.new_label();
        let result = sel.munch_call(&Expr::Name(label), &[]);
        assert_eq!(result, map.temp_for("rax").unwrap());
        let instrs = sel.into_instructions();
        let call = instrs.last().unwrap();
        assert!(call.destinations().contains(&map.temp_for("rax").unwrap()));
        assert!(call.destinations().contains(&map.temp_for("rdi").unwrap()));
        assert!(call.destinations().contains(&map.temp_for("r10").unwrap()));
    }
}
