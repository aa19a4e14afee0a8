//! Compiled fragments and the manager collecting them.
//!
//! Grounded on
//! `examples/original_source/src/intermediate_representation/fragment.py`.
//! The source's `FragmentManager` is a process-wide static list; per §9's
//! reentrancy note this version is an ordinary value threaded explicitly
//! through translation and drained by [`crate::driver`].

use crate::frame::Frame;
use crate::ir::Stmt;
use crate::temp::Label;

pub enum Fragment {
    String { label: Label, string: String },
    Proc { body: Stmt, frame: Frame },
}

#[derive(Default)]
pub struct FragmentManager {
    fragments: Vec<Fragment>,
}

impl FragmentManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, fragment: Fragment) {
        self.fragments.push(fragment);
    }

    pub fn into_fragments(self) -> Vec<Fragment> {
        self.fragments
    }
}
