//! Temporaries and labels.
//!
//! A [`Temp`] is an opaque, monotonically-issued identity standing in for a
//! value that may eventually live in a machine register or a frame slot. A
//! [`Label`] is an opaque name for a code location. Both are handed out by a
//! [`TempFactory`], and a [`TempMap`] tracks the bidirectional mapping
//! between machine-register-backed temps and their register names.

use std::collections::HashMap;
use std::fmt;

/// An opaque, positive temporary identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Temp(u32);

impl Temp {
    fn with_number(n: u32) -> Self {
        Temp(n)
    }

    /// The raw numeric identity, for use as a secondary-map index.
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Temp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

impl fmt::Debug for Temp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// An opaque label name. Named labels (`named`) pass through unchanged;
/// generated labels are `lab_<n>`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(String);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Label {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Issues fresh temps and labels for one compilation. Per §9's reentrancy
/// note, this replaces the source's process-wide counters with an object
/// threaded explicitly through the pipeline.
#[derive(Default)]
pub struct TempFactory {
    next_temp: u32,
    next_label: u32,
}

impl TempFactory {
    pub fn new() -> Self {
        TempFactory { next_temp: 0, next_label: 0 }
    }

    /// A fresh temp, distinct from every other temp this factory has issued.
    pub fn new_temp(&mut self) -> Temp {
        let t = Temp::with_number(self.next_temp);
        self.next_temp += 1;
        t
    }

    /// A fresh, compiler-generated label: `lab_0`, `lab_1`, ...
    pub fn new_label(&mut self) -> Label {
        let l = Label(format!("lab_{}", self.next_label));
        self.next_label += 1;
        l
    }

    /// A label with a caller-chosen name, used verbatim (function names,
    /// string-fragment labels with a stable external name).
    pub fn named_label(name: impl Into<String>) -> Label {
        Label(name.into())
    }
}

/// Bidirectional mapping between machine-register-backed temps and their
/// assembly names, plus (after allocation) the coloring for every other
/// temp.
///
/// The source keeps this as a process-wide singleton (`TempMap`); here it
/// is owned by whichever `Frame`/allocator run needs it, per §9.
#[derive(Clone, Default)]
pub struct TempMap {
    temp_to_name: HashMap<Temp, &'static str>,
    name_to_temp: HashMap<&'static str, Temp>,
}

impl TempMap {
    /// Creates one fresh temp per machine register name and records both
    /// directions of the mapping.
    pub fn initialize(factory: &mut TempFactory, register_names: &[&'static str]) -> Self {
        let mut map = TempMap::default();
        for &name in register_names {
            let t = factory.new_temp();
            map.temp_to_name.insert(t, name);
            map.name_to_temp.insert(name, t);
        }
        map
    }

    pub fn temp_for(&self, name: &str) -> Option<Temp> {
        self.name_to_temp.get(name).copied()
    }

    pub fn name_of(&self, t: Temp) -> Option<&'static str> {
        self.temp_to_name.get(&t).copied()
    }

    /// Rewrites the temp→register-name map by composing it with an
    /// allocation result (non-precolored temp → precolored temp), so that
    /// every temp, after allocation, resolves to a machine register name.
    pub fn update_register_mapping(&mut self, allocation: &HashMap<Temp, Temp>) {
        let mut additions = Vec::new();
        for (&temp, &color) in allocation {
            if let Some(&name) = self.temp_to_name.get(&color) {
                additions.push((temp, name));
            }
        }
        for (temp, name) in additions {
            self.temp_to_name.insert(temp, name);
        }
    }

    /// Prints `t<n>` for a temp with no assigned register, per §4.A's
    /// invariant.
    pub fn display(&self, t: Temp) -> String {
        match self.name_of(t) {
            Some(name) => name.to_string(),
            None => t.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_temps_are_distinct() {
        let mut f = TempFactory::new();
        let a = f.new_temp();
        let b = f.new_temp();
        assert_ne!(a, b);
    }

    #[test]
    fn generated_labels_are_sequential() {
        let mut f = TempFactory::new();
        assert_eq!(f.new_label().as_str(), "lab_0");
        assert_eq!(f.new_label().as_str(), "lab_1");
    }

    #[test]
    fn named_label_passes_through() {
        assert_eq!(TempFactory::named_label("tigermain").as_str(), "tigermain");
    }

    #[test]
    fn temp_map_round_trips_register_names() {
        let mut f = TempFactory::new();
        let map = TempMap::initialize(&mut f, &["rax", "rbx"]);
        let rax = map.temp_for("rax").unwrap();
        assert_eq!(map.name_of(rax), Some("rax"));
        assert_eq!(map.temp_for("rcx"), None);
    }

    #[test]
    fn display_falls_back_to_tn_when_uncolored() {
        let mut f = TempFactory::new();
        let t = f.new_temp();
        let map = TempMap::default();
        assert_eq!(map.display(t), t.to_string());
    }
}
