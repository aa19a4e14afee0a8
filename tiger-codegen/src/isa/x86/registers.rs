//! x86-64 register classes and condition-code mnemonics.

use crate::ir::RelationalOperator;

/// General-purpose registers available to the allocator as colors: every
/// register except `rip` (not a storage location) and `rsp`/`rbp` (frame
/// management, never colored onto by the allocator since they're excluded
/// from `initial`'s precolored-but-colorable set). This is `K` in §4.H.
pub const ALLOCATABLE_REGISTERS: &[&str] = &[
    "rax", "rbx", "rcx", "rdx", "rsi", "rdi", "r8", "r9", "r10", "r11", "r12", "r13", "r14", "r15",
];

/// Number of colors available to the allocator.
pub fn k() -> usize {
    ALLOCATABLE_REGISTERS.len()
}

/// AT&T condition-code suffix for a relational operator, used by the
/// selector to build `j<cc>`/`set<cc>` mnemonics (§4.F).
pub fn condition_code(op: RelationalOperator) -> &'static str {
    use RelationalOperator::*;
    match op {
        Eq => "e",
        Ne => "ne",
        Lt => "l",
        Gt => "g",
        Le => "le",
        Ge => "ge",
        Ult => "b",
        Ule => "be",
        Ugt => "a",
        Uge => "ae",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RelationalOperator::*;

    #[test]
    fn signed_and_unsigned_orderings_use_distinct_mnemonics() {
        assert_eq!(condition_code(Lt), "l");
        assert_eq!(condition_code(Ult), "b");
        assert_eq!(condition_code(Ge), "ge");
        assert_eq!(condition_code(Uge), "ae");
    }

    #[test]
    fn every_relational_operator_has_a_mnemonic() {
        for op in [Eq, Ne, Lt, Gt, Le, Ge, Ult, Ule, Ugt, Uge] {
            assert!(!condition_code(op).is_empty());
        }
    }
}
