//! Driver (§4.J): pipes translated fragments through canonicalization,
//! instruction selection, register allocation, and final emission.
//!
//! Grounded on
//! `examples/original_source/src/putting_it_all_together/file_handler.py`,
//! the only module in the original that drives every pass end to end for a
//! whole program.

use log::debug;

use crate::canon;
use crate::emit;
use crate::frame::{self, all_registers};
use crate::isa::x86::munch::Selector;
use crate::regalloc;
use crate::temp::{TempFactory, TempMap};
use crate::translate::Fragment;

/// One fragment compiled to its final text: a string literal or a procedure.
pub enum CompiledFragment {
    String(String),
    Proc(String),
}

/// Compiles one fragment through canonicalization, instruction selection,
/// register allocation, and emission.
pub fn compile_fragment(
    factory: &mut TempFactory,
    map: &mut TempMap,
    fragment: Fragment,
) -> CompiledFragment {
    match fragment {
        Fragment::String { label, string } => {
            CompiledFragment::String(emit::string_fragment(&label, &string))
        }
        Fragment::Proc { body, mut frame } => {
            debug!("compiling procedure {}", frame.name);
            let trace = canon::canonicalize(factory, body);
            let mut selector = Selector::new(factory, map);
            for stmt in &trace {
                selector.munch_stmt(stmt);
            }
            let instructions = selector.into_instructions();
            let instructions = frame::sink(map, instructions);
            let result = regalloc::allocate(factory, map, &mut frame, instructions);
            map.update_register_mapping(&result.coloring);
            let text = emit::emit_procedure(&frame, result.instructions, map);
            CompiledFragment::Proc(text)
        }
    }
}

/// Compiles every fragment and assembles the whole program's text: a
/// `.rodata` section with every string literal, then a `.text` section with
/// every procedure, in declaration order.
pub fn compile_all(fragments: Vec<Fragment>) -> String {
    let mut factory = TempFactory::new();
    let mut map = TempMap::initialize(&mut factory, &all_registers());

    let mut data = String::from(emit::data_header());
    let mut code = String::from(emit::code_header());
    for fragment in fragments {
        match compile_fragment(&mut factory, &mut map, fragment) {
            CompiledFragment::String(s) => data.push_str(&s),
            CompiledFragment::Proc(p) => code.push_str(&p),
        }
    }
    data + &code
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::ir::Stmt;

    #[test]
    fn a_string_fragment_compiles_to_an_asciz_line() {
        let mut factory = TempFactory::new();
        let label = factory.new_label();
        let fragment = Fragment::String { label: label.clone(), string: "\"hi\"".to_string() };
        let mut map = TempMap::initialize(&mut factory, &all_registers());
        match compile_fragment(&mut factory, &mut map, fragment) {
            CompiledFragment::String(s) => assert!(s.contains(".asciz")),
            CompiledFragment::Proc(_) => panic!("expected a string fragment"),
        }
    }

    #[test]
    fn an_empty_procedure_compiles_to_a_prologue_and_epilogue() {
        let mut factory = TempFactory::new();
        let mut map = TempMap::initialize(&mut factory, &all_registers());
        let name = factory.new_label();
        let frame = Frame::new(&mut factory, name.clone(), &[]);
        let fragment = Fragment::Proc { body: Stmt::Seq(Vec::new()), frame };
        match compile_fragment(&mut factory, &mut map, fragment) {
            CompiledFragment::Proc(text) => {
                assert!(text.contains(&format!("{name}:")));
                assert!(text.contains("ret"));
            }
            CompiledFragment::String(_) => panic!("expected a procedure fragment"),
        }
    }

    #[test]
    fn compile_all_orders_data_before_code() {
        let mut factory = TempFactory::new();
        let label = factory.new_label();
        let fragments = vec![Fragment::String { label, string: "\"x\"".to_string() }];
        let text = compile_all(fragments);
        assert!(text.find(".rodata").unwrap() < text.find(".text").unwrap());
    }
}
