use std::collections::HashMap;

use serde::Serialize;

use super::ledger::Ledger;

/// Per-meal expand/collapse flags, keyed by meal id. Never persisted.
///
/// An id with no entry renders expanded.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CollapseState {
    entries: HashMap<u32, bool>,
}

impl CollapseState {
    /// State for a freshly seeded ledger: meal 1 expanded.
    pub fn seeded() -> Self {
        let mut state = Self::default();
        state.expand(1);
        state
    }

    /// State for a ledger read from the store: everything collapsed.
    pub fn all_collapsed(ledger: &Ledger) -> Self {
        Self {
            entries: ledger.meals().iter().map(|m| (m.id, true)).collect(),
        }
    }

    pub fn is_collapsed(&self, id: u32) -> bool {
        self.entries.get(&id).copied().unwrap_or(false)
    }

    pub fn expand(&mut self, id: u32) {
        self.entries.insert(id, false);
    }

    pub fn toggle(&mut self, id: u32) -> bool {
        let entry = self.entries.entry(id).or_insert(false);
        *entry = !*entry;
        *entry
    }

    pub fn forget(&mut self, id: u32) {
        self.entries.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
