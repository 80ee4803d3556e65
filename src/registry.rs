//! Component registry
//!
//! Mirror of the registry each sandbox document builds at runtime: it records
//! which names the assembled units will register, so the renderer can decide
//! up front whether the root component can be resolved. One registry belongs
//! to one renderer and is reset at the start of every assembly.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentRegistry {
    /// Registered name -> source path of the unit that registers it.
    entries: BTreeMap<String, String>,
    order: Vec<String>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Later registrations of the same name win, as they do at runtime.
    pub fn register(&mut self, name: &str, source_path: &str) {
        if self
            .entries
            .insert(name.to_string(), source_path.to_string())
            .is_none()
        {
            self.order.push(name.to_string());
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Names in registration order.
    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
