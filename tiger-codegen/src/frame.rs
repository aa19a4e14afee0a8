//! Activation records for the x86-64 System V ABI (§4.B).
//!
//! Register role lists, `Access`, `Frame`, view-shift, callee-save
//! preservation, the `sink` pseudo-instruction, and final prologue/epilogue
//! assembly. Grounded directly on
//! `examples/original_source/src/activation_records/frame.py`.

use crate::ir::{BinaryOperator, Expr, Stmt};
use crate::isa::x86::asm::{Instr, Procedure};
use crate::temp::{Label, Temp, TempFactory, TempMap};

/// Machine word size in bytes.
pub const WORD_SIZE: i64 = 8;

/// Registers with a fixed hardware role, not available to the allocator
/// as general-purpose storage.
pub const SPECIAL_REGISTERS: &[&str] = &["rip", "rsp", "rax"];

/// Argument-passing registers, left to right (the zero-th slot also carries
/// the static link for non-external calls).
pub const ARGUMENT_REGISTERS: &[&str] = &["rdi", "rsi", "rdx", "rcx", "r8", "r9"];

/// Registers the callee must leave unchanged across a call.
pub const CALLEE_SAVED_REGISTERS: &[&str] = &["rbx", "rbp", "r12", "r13", "r14", "r15"];

/// Registers the callee may trash freely.
pub const CALLER_SAVED_REGISTERS: &[&str] = &["r10", "r11"];

/// All machine registers backing a precolored temp, in a stable order.
pub fn all_registers() -> Vec<&'static str> {
    SPECIAL_REGISTERS
        .iter()
        .chain(ARGUMENT_REGISTERS)
        .chain(CALLEE_SAVED_REGISTERS)
        .chain(CALLER_SAVED_REGISTERS)
        .copied()
        .collect()
}

pub fn frame_pointer(map: &TempMap) -> Temp {
    map.temp_for("rbp").expect("TempMap not initialized with rbp")
}

pub fn return_value(map: &TempMap) -> Temp {
    map.temp_for("rax").expect("TempMap not initialized with rax")
}

/// The location of a formal or local, as seen from inside the callee.
#[derive(Clone, Debug)]
pub enum Access {
    /// Memory at `offset(%rbp)`.
    InFrame(i64),
    /// Register-resident, in abstract temp `t`.
    InReg(Temp),
}

/// One function's activation record: formal locations, locals allocated so
/// far, and the running frame offset.
#[derive(Clone)]
pub struct Frame {
    pub name: Label,
    /// Bottom of allocated frame space; always `<= 0`, decremented by
    /// [`WORD_SIZE`] per escaped local/formal.
    pub offset: i64,
    pub formals: Vec<Access>,
    pub locals: Vec<Access>,
}

impl Frame {
    /// Builds a new frame. `formal_escapes[i]` is true iff the i-th formal
    /// escapes (is captured by a nested function or has its address taken).
    pub fn new(factory: &mut TempFactory, name: Label, formal_escapes: &[bool]) -> Self {
        let mut frame = Frame { name, offset: 0, formals: Vec::new(), locals: Vec::new() };
        let in_registers = formal_escapes.len().min(ARGUMENT_REGISTERS.len());
        for &escape in &formal_escapes[..in_registers] {
            let access = frame.alloc_single_var(factory, escape);
            frame.formals.push(access);
        }
        let mut extra_offset = 16;
        for _ in &formal_escapes[in_registers..] {
            frame.formals.push(Access::InFrame(extra_offset));
            extra_offset += WORD_SIZE;
        }
        frame
    }

    /// Allocates a new local, returning its `Access`.
    pub fn alloc_local(&mut self, factory: &mut TempFactory, escape: bool) -> Access {
        let access = self.alloc_single_var(factory, escape);
        self.locals.push(access.clone());
        access
    }

    fn alloc_single_var(&mut self, factory: &mut TempFactory, escape: bool) -> Access {
        if escape {
            self.offset -= WORD_SIZE;
            Access::InFrame(self.offset)
        } else {
            Access::InReg(factory.new_temp())
        }
    }
}

/// Turns an `Access` into the IR expression that reads/writes it, given the
/// frame pointer expression of the frame it lives in (discarded for
/// register-resident accesses).
pub fn access_to_exp(access: &Access, fp: Expr) -> Expr {
    match access {
        Access::InFrame(offset) => Expr::mem(Expr::bin(BinaryOperator::Plus, fp, Expr::Const(*offset))),
        Access::InReg(t) => Expr::Temp(*t),
    }
}

/// Builds a call to a runtime-provided function with no static link
/// (§6's runtime dependency list; §4.B).
pub fn external_call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::call(Expr::Name(TempFactory::named_label(name)), args)
}

/// Prepends moves that copy each register-passed formal from its
/// parameter-passing register into its home (frame slot or register temp).
pub fn shift_view(frame: &Frame, map: &TempMap, body: Stmt) -> Stmt {
    let mut shifts = Vec::new();
    for (access, &reg_name) in frame.formals.iter().zip(ARGUMENT_REGISTERS) {
        let reg_temp = map.temp_for(reg_name).expect("argument register must be precolored");
        match access {
            Access::InFrame(offset) => {
                let dst = Expr::mem(Expr::bin(
                    BinaryOperator::Plus,
                    Expr::Temp(frame_pointer(map)),
                    Expr::Const(*offset),
                ));
                shifts.push(Stmt::Move(dst, Expr::Temp(reg_temp)));
            }
            Access::InReg(t) => {
                shifts.push(Stmt::Move(Expr::Temp(*t), Expr::Temp(reg_temp)));
            }
        }
    }
    shifts.push(body);
    Stmt::Seq(shifts)
}

/// Wraps `body` so every callee-saved register is preserved across the
/// call: moved into a fresh temp at entry, moved back at exit.
pub fn preserve_callee_registers(factory: &mut TempFactory, map: &TempMap, body: Stmt) -> Stmt {
    let mut save = Vec::new();
    let mut restore = Vec::new();
    for &reg_name in CALLEE_SAVED_REGISTERS {
        let reg_temp = map.temp_for(reg_name).expect("callee-saved register must be precolored");
        let fresh = factory.new_temp();
        save.push(Stmt::Move(Expr::Temp(fresh), Expr::Temp(reg_temp)));
        restore.push(Stmt::Move(Expr::Temp(reg_temp), Expr::Temp(fresh)));
    }
    let mut seq = save;
    seq.push(body);
    seq.extend(restore);
    Stmt::Seq(seq)
}

/// Appends a pseudo-instruction advertising that callee-saved registers,
/// `rsp`, `rip`, and `rax` are live at procedure exit (§9: resolved in
/// favor of including `rax`, since it holds the live return value).
pub fn sink(map: &TempMap, mut body: Vec<Instr>) -> Vec<Instr> {
    let sink_registers: Vec<&str> = CALLEE_SAVED_REGISTERS
        .iter()
        .copied()
        .chain(["rsp", "rip", "rax"])
        .collect();
    let sink_temps = sink_registers
        .iter()
        .map(|&name| map.temp_for(name).expect("sink register must be precolored"))
        .collect();
    body.push(Instr::oper("", sink_temps, Vec::new(), None));
    body
}

/// Assembles the final prologue/epilogue around a colored instruction list.
pub fn assembly_procedure(frame: &Frame, body: Vec<Instr>) -> Procedure {
    let stack_size = round_up_to_16(-frame.offset);
    let prologue = format!(
        "# PROCEDURE {name}\n{name}:\n\
         pushq %rbp\n\
         movq %rsp, %rbp\n\
         subq ${stack_size}, %rsp\n\n",
        name = frame.name,
        stack_size = stack_size,
    );
    let epilogue = format!(
        "\nmovq %rbp, %rsp\n\
         popq %rbp\n\
         ret\n\
         # END {name}\n",
        name = frame.name,
    );
    Procedure { prologue, body, epilogue }
}

fn round_up_to_16(n: i64) -> i64 {
    (n + 15) & !15
}

/// Formats one `.asciz` string fragment (§9: resolved in favor of
/// `.asciz`, matching §4.B's own worked example).
pub fn string_literal(label: &Label, literal_text: &str) -> String {
    format!("{label}:\n\t.asciz {literal_text}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_with_all_registers(factory: &mut TempFactory) -> TempMap {
        TempMap::initialize(factory, &all_registers())
    }

    #[test]
    fn escaped_formals_get_negative_frame_offsets() {
        let mut factory = TempFactory::new();
        let name = factory.new_label();
        let frame = Frame::new(&mut factory, name, &[true, false, true]);
        match &frame.formals[0] {
            Access::InFrame(o) => assert_eq!(*o, -8),
            other => panic!("expected InFrame, got {other:?}"),
        }
        assert!(matches!(frame.formals[1], Access::InReg(_)));
        match &frame.formals[2] {
            Access::InFrame(o) => assert_eq!(*o, -16),
            other => panic!("expected InFrame, got {other:?}"),
        }
    }

    #[test]
    fn formals_beyond_sixth_go_to_positive_stack_offsets() {
        let mut factory = TempFactory::new();
        let name = factory.new_label();
        let escapes = vec![false; 8];
        let frame = Frame::new(&mut factory, name, &escapes);
        assert_eq!(frame.formals.len(), 8);
        match &frame.formals[6] {
            Access::InFrame(o) => assert_eq!(*o, 16),
            other => panic!("expected InFrame, got {other:?}"),
        }
        match &frame.formals[7] {
            Access::InFrame(o) => assert_eq!(*o, 24),
            other => panic!("expected InFrame, got {other:?}"),
        }
    }

    #[test]
    fn alloc_local_decrements_offset_only_when_escaping() {
        let mut factory = TempFactory::new();
        let name = factory.new_label();
        let mut frame = Frame::new(&mut factory, name, &[]);
        frame.alloc_local(&mut factory, true);
        assert_eq!(frame.offset, -8);
        frame.alloc_local(&mut factory, false);
        assert_eq!(frame.offset, -8);
    }

    #[test]
    fn stack_size_rounds_up_to_16() {
        assert_eq!(round_up_to_16(8), 16);
        assert_eq!(round_up_to_16(16), 16);
        assert_eq!(round_up_to_16(17), 32);
        assert_eq!(round_up_to_16(0), 0);
    }

    #[test]
    fn sink_includes_rax_and_stack_registers() {
        let mut factory = TempFactory::new();
        let map = map_with_all_registers(&mut factory);
        let body = sink(&map, Vec::new());
        let sunk = body.last().unwrap();
        assert_eq!(sunk.sources().len(), CALLEE_SAVED_REGISTERS.len() + 3);
        assert!(sunk.destinations().is_empty());
    }

    #[test]
    fn string_literal_uses_asciz() {
        let mut factory = TempFactory::new();
        let label = factory.new_label();
        assert_eq!(string_literal(&label, "\"hi\""), format!("{label}:\n\t.asciz \"hi\"\n"));
    }
}
