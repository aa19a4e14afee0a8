//! Final assembly emission (§4.I).
//!
//! Grounded on
//! `examples/original_source/src/putting_it_all_together/file_handler.py`
//! (section headers, per-fragment writing) and
//! `examples/original_source/src/instruction_selection/assembly.py`'s
//! `Instruction.format` (placeholder substitution, via
//! [`crate::isa::x86::asm::Instr::format`] here). The source writes
//! straight to an open file handle; this version builds the same text into
//! an owned `String` so callers choose the destination.

use log::debug;

use crate::frame::{self, Frame};
use crate::isa::x86::asm::{Instr, Procedure};
use crate::temp::{Label, TempMap};

/// Drops a `Move` whose source and destination resolved, after register
/// allocation, to the same machine register — a no-op once colored.
pub fn remove_redundant_moves(instructions: Vec<Instr>, map: &TempMap) -> Vec<Instr> {
    instructions
        .into_iter()
        .filter(|instr| match instr {
            Instr::Move { src, dst, .. } => map.name_of(*src) != map.name_of(*dst),
            _ => true,
        })
        .collect()
}

/// Assembles `instructions` into one procedure's prologue/body/epilogue and
/// renders every instruction's placeholders against `map`.
pub fn emit_procedure(frame: &Frame, instructions: Vec<Instr>, map: &TempMap) -> String {
    debug!("emitting procedure {}", frame.name);
    let instructions = remove_redundant_moves(instructions, map);
    let procedure = frame::assembly_procedure(frame, instructions);
    format_procedure(&procedure, map)
}

fn format_procedure(procedure: &Procedure, map: &TempMap) -> String {
    let mut out = procedure.prologue.clone();
    for instr in &procedure.body {
        out.push_str(&instr.format(&mut |t| map.display(t)));
        out.push('\n');
    }
    out.push_str(&procedure.epilogue);
    out
}

/// The `.rodata` section header, written once before every string literal.
pub fn data_header() -> &'static str {
    ".section .rodata\n"
}

/// The `.text` section header, written once before every procedure.
pub fn code_header() -> &'static str {
    "\n.text\n.global tigermain\n.type tigermain, @function\n\n"
}

pub fn string_fragment(label: &Label, string: &str) -> String {
    frame::string_literal(label, string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::all_registers;
    use crate::temp::TempFactory;

    #[test]
    fn redundant_move_to_the_same_register_is_dropped() {
        let mut factory = TempFactory::new();
        let map = TempMap::initialize(&mut factory, &all_registers());
        let rax = map.temp_for("rax").unwrap();
        let instrs = vec![Instr::mov("movq %'s0, %'d0", rax, rax)];
        assert!(remove_redundant_moves(instrs, &map).is_empty());
    }

    #[test]
    fn move_between_distinct_registers_survives() {
        let mut factory = TempFactory::new();
        let map = TempMap::initialize(&mut factory, &all_registers());
        let rax = map.temp_for("rax").unwrap();
        let rbx = map.temp_for("rbx").unwrap();
        let instrs = vec![Instr::mov("movq %'s0, %'d0", rax, rbx)];
        assert_eq!(remove_redundant_moves(instrs, &map).len(), 1);
    }

    #[test]
    fn code_header_advertises_tigermain_as_global() {
        assert!(code_header().contains("tigermain"));
    }

    #[test]
    fn emitted_procedure_contains_prologue_and_epilogue() {
        let mut factory = TempFactory::new();
        let map = TempMap::initialize(&mut factory, &all_registers());
        let name = factory.new_label();
        let frame = Frame::new(&mut factory, name.clone(), &[]);
        let text = emit_procedure(&frame, Vec::new(), &map);
        assert!(text.contains(&format!("{name}:")));
        assert!(text.contains("ret"));
    }
}
