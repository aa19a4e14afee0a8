//! A scoped symbol table.
//!
//! `SymbolTable<T>` is a single interleaved stack of bindings and
//! scope-boundary markers, per §3 and §9: pushing a scope pushes a marker;
//! ending it pops bindings back to (and including) the most recent marker.
//! A marker can be flagged as a *loop scope*, which is how `break` legality
//! is decided — a `break` is legal iff the closest scope boundary that
//! isn't itself skipped over is loop-flagged.

use std::collections::HashMap;

enum Entry<T> {
    Binding { name: String, prior: Option<T> },
    Marker { is_loop: bool },
}

/// A scoped map from names to `T`, with undo-on-scope-exit semantics.
pub struct SymbolTable<T> {
    current: HashMap<String, T>,
    history: Vec<Entry<T>>,
}

impl<T: Clone> Default for SymbolTable<T> {
    fn default() -> Self {
        SymbolTable { current: HashMap::new(), history: Vec::new() }
    }
}

impl<T: Clone> SymbolTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `value` in the current scope, recording whatever it
    /// shadows so `end_scope` can restore it.
    pub fn add(&mut self, name: impl Into<String>, value: T) {
        let name = name.into();
        let prior = self.current.insert(name.clone(), value);
        self.history.push(Entry::Binding { name, prior });
    }

    pub fn find(&self, name: &str) -> Option<&T> {
        self.current.get(name)
    }

    /// Opens a new scope. `is_loop` marks it as a loop body, for
    /// `is_closest_scope_a_loop`.
    pub fn begin_scope(&mut self, is_loop: bool) {
        self.history.push(Entry::Marker { is_loop });
    }

    /// Closes the innermost open scope, undoing every binding made since
    /// its `begin_scope`.
    pub fn end_scope(&mut self) {
        while let Some(entry) = self.history.pop() {
            match entry {
                Entry::Binding { name, prior } => match prior {
                    Some(value) => {
                        self.current.insert(name, value);
                    }
                    None => {
                        self.current.remove(&name);
                    }
                },
                Entry::Marker { .. } => break,
            }
        }
    }

    /// True iff the nearest enclosing scope marker is loop-flagged.
    pub fn is_closest_scope_a_loop(&self) -> bool {
        for entry in self.history.iter().rev() {
            if let Entry::Marker { is_loop } = entry {
                return *is_loop;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadowing_is_undone_on_scope_exit() {
        let mut t: SymbolTable<i32> = SymbolTable::new();
        t.add("x", 1);
        t.begin_scope(false);
        t.add("x", 2);
        assert_eq!(t.find("x"), Some(&2));
        t.end_scope();
        assert_eq!(t.find("x"), Some(&1));
    }

    #[test]
    fn new_binding_is_removed_entirely_on_scope_exit() {
        let mut t: SymbolTable<i32> = SymbolTable::new();
        t.begin_scope(false);
        t.add("y", 5);
        t.end_scope();
        assert_eq!(t.find("y"), None);
    }

    #[test]
    fn loop_scope_detection_skips_non_loop_markers() {
        let mut t: SymbolTable<i32> = SymbolTable::new();
        t.begin_scope(true);
        assert!(t.is_closest_scope_a_loop());
        t.begin_scope(false);
        assert!(!t.is_closest_scope_a_loop());
        t.end_scope();
        assert!(t.is_closest_scope_a_loop());
        t.end_scope();
        assert!(!t.is_closest_scope_a_loop());
    }
}
