//! Sequenced identifier allocation.
//!
//! Geometry features and selections get short sequenced ids (`csel1`,
//! `cyl2`, `pi3`) while human-readable labels act as pseudonyms looked up
//! when a later operation references an earlier output.

use std::collections::HashMap;

/// Allocates `key + index` identifiers and tracks label pseudonyms.
#[derive(Debug, Default)]
pub struct IdTable {
    counters: HashMap<String, u32>,
    pseudonyms: HashMap<String, String>,
}

impl IdTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next id for `key`: `csel` yields `csel1`, then `csel2`, …
    pub fn next(&mut self, key: &str) -> String {
        let counter = self.counters.entry(key.to_string()).or_insert(0);
        *counter += 1;
        format!("{key}{counter}")
    }

    /// Allocates the next id for `key` and records `label` as its pseudonym.
    ///
    /// Returns `None` if the label is already in use, leaving the existing
    /// mapping untouched (the sequence counter still advances, matching the
    /// allocate-then-check order callers rely on for stable numbering).
    pub fn next_labeled(&mut self, key: &str, label: &str) -> Option<String> {
        let id = self.next(key);
        if self.pseudonyms.contains_key(label) {
            return None;
        }
        self.pseudonyms.insert(label.to_string(), id.clone());
        Some(id)
    }

    /// Looks up the id previously recorded for `label`.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&str> {
        self.pseudonyms.get(label).map(String::as_str)
    }

    /// True if `label` has already been used as a pseudonym.
    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.pseudonyms.contains_key(label)
    }

    /// Total number of ids handed out across all keys.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.counters.values().sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequenced_per_key() {
        let mut ids = IdTable::new();
        assert_eq!(ids.next("csel"), "csel1");
        assert_eq!(ids.next("csel"), "csel2");
        assert_eq!(ids.next("cyl"), "cyl1");
        assert_eq!(ids.next("csel"), "csel3");
        assert_eq!(ids.count(), 4);
    }

    #[test]
    fn labels_resolve_to_their_id() {
        let mut ids = IdTable::new();
        let id = ids.next_labeled("csel", "CUFF FINAL").unwrap();
        assert_eq!(id, "csel1");
        assert_eq!(ids.get("CUFF FINAL"), Some("csel1"));
        assert!(ids.has_label("CUFF FINAL"));
    }

    #[test]
    fn duplicate_label_is_rejected() {
        let mut ids = IdTable::new();
        ids.next_labeled("csel", "SRC").unwrap();
        assert!(ids.next_labeled("csel", "SRC").is_none());
        assert_eq!(ids.get("SRC"), Some("csel1"));
    }
}
