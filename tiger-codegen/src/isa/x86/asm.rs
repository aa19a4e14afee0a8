//! Abstract x86-64 assembly instructions.
//!
//! An [`Instr`] is an assembly line with placeholders `'s<i>`, `'d<i>`,
//! `'j<i>` standing in for the `i`-th source temp, destination temp, and
//! jump-target label, substituted textually at [`Instr::format`] time once
//! a temp→register mapping is known (§4.F, §9's note on placeholders: "a
//! safer design stores parsed segments ... but textual substitution is
//! acceptable if source/destination/jump lists are canonical at emit
//! time").

use smallvec::SmallVec;

use crate::temp::{Label, Temp};

/// Most instructions reference at most a couple of source/destination
/// temps; `sink` is the outlier (§4.B) and simply spills to the heap.
pub type TempList = SmallVec<[Temp; 2]>;

#[derive(Clone, Debug)]
pub enum Instr {
    /// A general operation: `line` may reference `'s0.. `, `'d0..`, `'j0..`.
    Oper { line: String, src: TempList, dst: TempList, jump: Option<Vec<Label>> },
    /// A bare label line; never carries placeholders.
    Label { line: String, label: Label },
    /// A register-to-register copy the coalescer may remove during
    /// emission if src and dst end up mapped to the same register.
    Move { line: String, src: Temp, dst: Temp },
}

impl Instr {
    pub fn oper(line: impl Into<String>, src: Vec<Temp>, dst: Vec<Temp>, jump: Option<Vec<Label>>) -> Self {
        Instr::Oper { line: line.into(), src: src.into(), dst: dst.into(), jump }
    }

    pub fn mov(line: impl Into<String>, src: Temp, dst: Temp) -> Self {
        Instr::Move { line: line.into(), src, dst }
    }

    pub fn label(line: impl Into<String>, label: Label) -> Self {
        Instr::Label { line: line.into(), label }
    }

    pub fn sources(&self) -> &[Temp] {
        match self {
            Instr::Oper { src, .. } => src,
            Instr::Move { src, .. } => std::slice::from_ref(src),
            Instr::Label { .. } => &[],
        }
    }

    pub fn destinations(&self) -> &[Temp] {
        match self {
            Instr::Oper { dst, .. } => dst,
            Instr::Move { dst, .. } => std::slice::from_ref(dst),
            Instr::Label { .. } => &[],
        }
    }

    pub fn jumps(&self) -> Option<&[Label]> {
        match self {
            Instr::Oper { jump, .. } => jump.as_deref(),
            _ => None,
        }
    }

    /// True for the `Move` variant only: the one kind the coalescer may
    /// eliminate.
    pub fn is_move(&self) -> bool {
        matches!(self, Instr::Move { .. })
    }

    /// Substitutes every placeholder in `line` and returns the finished
    /// assembly text for this instruction. `temp_name` resolves a temp to
    /// its final machine-register (or spill-slot) name.
    pub fn format(&self, temp_name: &mut dyn FnMut(Temp) -> String) -> String {
        match self {
            Instr::Label { line, .. } => line.clone(),
            Instr::Move { line, src, dst } => {
                replace(&replace(line, "'s", &[temp_name(*src)]), "'d", &[temp_name(*dst)])
            }
            Instr::Oper { line, src, dst, jump } => {
                let mut out = replace(line, "'s", &src.iter().map(|&t| temp_name(t)).collect::<Vec<_>>());
                out = replace(&out, "'d", &dst.iter().map(|&t| temp_name(t)).collect::<Vec<_>>());
                if let Some(jump) = jump {
                    out = replace(&out, "'j", &jump.iter().map(|l| l.to_string()).collect::<Vec<_>>());
                }
                out
            }
        }
    }
}

fn replace(line: &str, prefix: &str, replacements: &[String]) -> String {
    let mut out = line.to_string();
    for (i, value) in replacements.iter().enumerate() {
        out = out.replace(&format!("{prefix}{i}"), value);
    }
    out
}

/// One compiled procedure: prologue, colored body, epilogue (§4.B, §4.I).
pub struct Procedure {
    pub prologue: String,
    pub body: Vec<Instr>,
    pub epilogue: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temp::TempFactory;

    #[test]
    fn operation_substitutes_all_placeholder_kinds() {
        let mut f = TempFactory::new();
        let s0 = f.new_temp();
        let d0 = f.new_temp();
        let l = f.new_label();
        let instr = Instr::oper("jcc 'j0 # 's0 -> 'd0", vec![s0], vec![d0], Some(vec![l.clone()]));
        let out = instr.format(&mut |t| t.to_string());
        assert_eq!(out, format!("jcc {} # {} -> {}", l, s0, d0));
    }

    #[test]
    fn move_is_tagged_is_move() {
        let mut f = TempFactory::new();
        let s = f.new_temp();
        let d = f.new_temp();
        assert!(Instr::mov("movq %'s0,%'d0", s, d).is_move());
    }
}
