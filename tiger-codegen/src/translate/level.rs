//! Nested-scope levels and the accesses they hand out.
//!
//! Grounded on `examples/original_source/src/intermediate_representation/level.py`.
//! `Level` there is compared by Python object identity (`current_level is
//! not access.level`); here a `Real` level wraps an `Rc`, so [`Level::eq`]
//! compares by pointer identity via `Rc::ptr_eq` instead of structurally.

use std::cell::RefCell;
use std::rc::Rc;

use crate::frame::{Access as FrameAccess, Frame};
use crate::temp::{Label, TempFactory};

struct RealLevelInner {
    parent: Level,
    frame: RefCell<Frame>,
}

/// A nested lexical scope with its own activation record, or the sentinel
/// enclosing the whole program.
#[derive(Clone)]
pub enum Level {
    Outermost,
    Real(Rc<RealLevelInner>),
}

impl PartialEq for Level {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Level::Outermost, Level::Outermost) => true,
            (Level::Real(a), Level::Real(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// A variable or formal's location together with the level it was
/// allocated in, so [`crate::translate::builders::simple_variable`] knows
/// how many static links to chase.
#[derive(Clone)]
pub struct Access {
    pub level: Level,
    pub access: FrameAccess,
}

impl Level {
    /// Creates a new nested level. Every real level prepends a static-link
    /// formal (always escaping) ahead of the caller-supplied formals.
    pub fn new_real(factory: &mut TempFactory, parent: Level, name: Label, formal_escapes: &[bool]) -> Level {
        let mut escapes = Vec::with_capacity(formal_escapes.len() + 1);
        escapes.push(true);
        escapes.extend_from_slice(formal_escapes);
        let frame = Frame::new(factory, name, &escapes);
        Level::Real(Rc::new(RealLevelInner { parent, frame: RefCell::new(frame) }))
    }

    /// The accesses of every formal, including the static link at index 0.
    pub fn formals(&self) -> Vec<Access> {
        match self {
            Level::Real(inner) => inner
                .frame
                .borrow()
                .formals
                .iter()
                .map(|a| Access { level: self.clone(), access: a.clone() })
                .collect(),
            Level::Outermost => Vec::new(),
        }
    }

    pub fn parent(&self) -> Level {
        match self {
            Level::Real(inner) => inner.parent.clone(),
            Level::Outermost => Level::Outermost,
        }
    }

    pub fn alloc_local(&self, factory: &mut TempFactory, escape: bool) -> Access {
        match self {
            Level::Real(inner) => {
                let access = inner.frame.borrow_mut().alloc_local(factory, escape);
                Access { level: self.clone(), access }
            }
            Level::Outermost => unreachable!("cannot allocate a local in the outermost level"),
        }
    }

    pub fn with_frame<R>(&self, f: impl FnOnce(&Frame) -> R) -> R {
        match self {
            Level::Real(inner) => f(&inner.frame.borrow()),
            Level::Outermost => unreachable!("the outermost level has no frame"),
        }
    }

    pub fn name(&self) -> Label {
        match self {
            Level::Real(inner) => inner.frame.borrow().name.clone(),
            Level::Outermost => unreachable!("the outermost level has no name"),
        }
    }
}

/// The level of the Tiger program's single top-level procedure, `tigermain`.
pub fn base_program_level(factory: &mut TempFactory) -> Level {
    Level::new_real(factory, Level::Outermost, TempFactory::named_label("tigermain"), &[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_levels_with_the_same_shape_are_not_equal() {
        let mut f = TempFactory::new();
        let name_a = f.new_label();
        let name_b = f.new_label();
        let a = Level::new_real(&mut f, Level::Outermost, name_a, &[]);
        let b = Level::new_real(&mut f, Level::Outermost, name_b, &[]);
        assert!(a != b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn formals_include_the_static_link_at_index_zero() {
        let mut f = TempFactory::new();
        let name = f.new_label();
        let level = Level::new_real(&mut f, Level::Outermost, name, &[true, false]);
        assert_eq!(level.formals().len(), 3);
    }
}
