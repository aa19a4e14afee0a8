//! Value/type environments and the standard-library bypass list.
//!
//! Grounded on `examples/original_source/src/semantic_analysis/environment.py`.

use crate::frame::Access;
use crate::symbol::SymbolTable;
use crate::translate::level::Level;
use crate::translate::types::Type;

/// A name bound in the value environment: either a variable or a function.
#[derive(Clone)]
pub enum EnvironmentEntry {
    Variable(VariableEntry),
    Function(FunctionEntry),
}

#[derive(Clone)]
pub struct VariableEntry {
    pub ty: Type,
    pub access: Access,
    pub level: Level,
    /// False for a `for`-loop control variable: not an assignable l-value.
    pub is_editable: bool,
}

#[derive(Clone)]
pub struct FunctionEntry {
    pub formals: Vec<Type>,
    pub result: Type,
    pub level: Level,
    pub label: crate::temp::Label,
}

/// Names pre-bound in [`base_value_environment`] that bypass static-link
/// assembly entirely (`translate::builders::call_expression`).
pub const STANDARD_LIBRARY_FUNCTIONS: &[&str] =
    &["print", "flush", "getchar", "ord", "chr", "size", "substring", "concat", "not", "exit"];

pub fn is_standard_library_function(name: &str) -> bool {
    STANDARD_LIBRARY_FUNCTIONS.contains(&name)
}

pub fn base_type_environment() -> SymbolTable<Type> {
    let mut env = SymbolTable::new();
    env.add("int", Type::Int);
    env.add("string", Type::String);
    env
}

/// Binds every standard-library function (see
/// [`STANDARD_LIBRARY_FUNCTIONS`]) at the outermost level, so
/// `FunctionEntry::level`/`label` are never consulted for these: they
/// always take the `external_call` path.
pub fn base_value_environment(outermost: &Level) -> SymbolTable<EnvironmentEntry> {
    let mut env = SymbolTable::new();
    let mut bind = |name: &str, formals: Vec<Type>, result: Type| {
        env.add(
            name,
            EnvironmentEntry::Function(FunctionEntry {
                formals,
                result,
                level: outermost.clone(),
                label: crate::temp::TempFactory::named_label(name),
            }),
        );
    };
    bind("print", vec![Type::String], Type::Void);
    bind("flush", vec![], Type::Void);
    bind("getchar", vec![], Type::String);
    bind("ord", vec![Type::String], Type::Int);
    bind("chr", vec![Type::Int], Type::String);
    bind("size", vec![Type::String], Type::Int);
    bind("substring", vec![Type::String, Type::Int, Type::Int], Type::String);
    bind("concat", vec![Type::String, Type::String], Type::String);
    bind("not", vec![Type::Int], Type::Int);
    bind("exit", vec![Type::Int], Type::Void);
    env
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_bound_stdlib_name_is_recognized_as_bypassing() {
        for name in STANDARD_LIBRARY_FUNCTIONS {
            assert!(is_standard_library_function(name));
        }
        assert!(!is_standard_library_function("tigermain"));
    }
}
