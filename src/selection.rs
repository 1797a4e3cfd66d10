//! Named cumulative selections.
//!
//! A selection is an append-only, named collection of geometric entities of
//! one fixed kind. Construction operations contribute their outputs to
//! selections; later operations, instance retention tables, and
//! material/physics bindings all refer to entities exclusively through
//! selection names. Members are weak references into the backend's live
//! topology and get pruned or remapped as the kernel replaces identities.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::backend::EntityRef;
use crate::error::{Result, SelectionError};

/// Kind of topological entity a selection may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Domain,
    Boundary,
    Edge,
    Point,
}

impl EntityKind {
    /// Suffix used in assembly-global selection names.
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            EntityKind::Domain => "dom",
            EntityKind::Boundary => "bnd",
            EntityKind::Edge => "edg",
            EntityKind::Point => "pnt",
        }
    }
}

/// A single cumulative selection.
#[derive(Debug, Clone)]
pub struct Selection {
    kind: EntityKind,
    members: Vec<EntityRef>,
}

impl Selection {
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    #[must_use]
    pub fn members(&self) -> &[EntityRef] {
        &self.members
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Registry mapping selection names to cumulative selections.
///
/// Keys are ordered so iteration (and therefore assembly merging) is
/// deterministic across runs.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    selections: BTreeMap<String, Selection>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends entities to the named selection, creating it on first
    /// contribution. The kind is fixed by that first contribution.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::KindMismatch`] if `kind` disagrees with an
    /// earlier contribution.
    pub fn contribute(&mut self, name: &str, kind: EntityKind, entities: &[EntityRef]) -> Result<()> {
        if let Some(existing) = self.selections.get_mut(name) {
            if existing.kind != kind {
                return Err(SelectionError::KindMismatch {
                    name: name.to_string(),
                    expected: existing.kind,
                    found: kind,
                }
                .into());
            }
            for &e in entities {
                if !existing.members.contains(&e) {
                    existing.members.push(e);
                }
            }
        } else {
            self.selections.insert(
                name.to_string(),
                Selection {
                    kind,
                    members: entities.to_vec(),
                },
            );
        }
        Ok(())
    }

    /// Resolves a selection by name.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::UnknownSelection`] if the name was never
    /// contributed to.
    pub fn resolve(&self, name: &str) -> Result<&Selection> {
        self.selections.get(name).ok_or_else(|| {
            SelectionError::UnknownSelection {
                name: name.to_string(),
            }
            .into()
        })
    }

    /// True if a selection with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.selections.contains_key(name)
    }

    /// Remaps a template-local name to an assembly-global one, preserving
    /// members and kind exactly. If the target name already exists the
    /// members merge under the usual kind check.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::UnknownSelection`] if `old` does not exist,
    /// or [`SelectionError::KindMismatch`] when merging into an existing
    /// selection of a different kind.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        let sel = self.selections.remove(old).ok_or_else(|| {
            SelectionError::UnknownSelection {
                name: old.to_string(),
            }
        })?;
        match self.contribute(new, sel.kind, &sel.members) {
            Ok(()) => Ok(()),
            Err(e) => {
                // Restore on failure so the registry stays consistent.
                self.selections.insert(old.to_string(), sel);
                Err(e)
            }
        }
    }

    /// Removes a selection entirely, returning it if present.
    pub fn remove(&mut self, name: &str) -> Option<Selection> {
        self.selections.remove(name)
    }

    /// Rewrites entity identities across every selection. `pairs` maps old
    /// refs to their kernel-issued replacements after a transform.
    pub fn remap(&mut self, pairs: &[(EntityRef, EntityRef)]) {
        for sel in self.selections.values_mut() {
            for member in &mut sel.members {
                if let Some(&(_, new)) = pairs.iter().find(|&&(old, _)| old == *member) {
                    *member = new;
                }
            }
        }
    }

    /// Drops members for which `alive` returns false.
    pub fn prune_dead(&mut self, mut alive: impl FnMut(EntityRef) -> bool) {
        for sel in self.selections.values_mut() {
            sel.members.retain(|&e| alive(e));
        }
    }

    /// Iterates `(name, selection)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Selection)> {
        self.selections.iter().map(|(n, s)| (n.as_str(), s))
    }

    /// Selection names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.selections.keys().map(String::as_str)
    }

    /// Number of selections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.selections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use slotmap::SlotMap;

    use crate::error::{PartforgeError, SelectionError};

    use super::*;

    fn refs(n: usize) -> Vec<EntityRef> {
        let mut arena: SlotMap<EntityRef, ()> = SlotMap::with_key();
        (0..n).map(|_| arena.insert(())).collect()
    }

    #[test]
    fn contribution_accumulates() {
        let mut reg = Registry::new();
        let e = refs(3);
        reg.contribute("csel1", EntityKind::Domain, &e[..1]).unwrap();
        reg.contribute("csel1", EntityKind::Domain, &e[1..]).unwrap();
        assert_eq!(reg.resolve("csel1").unwrap().len(), 3);
    }

    #[test]
    fn duplicate_members_are_not_double_counted() {
        let mut reg = Registry::new();
        let e = refs(1);
        reg.contribute("s", EntityKind::Point, &e).unwrap();
        reg.contribute("s", EntityKind::Point, &e).unwrap();
        assert_eq!(reg.resolve("s").unwrap().len(), 1);
    }

    #[test]
    fn kind_is_fixed_at_first_contribution() {
        let mut reg = Registry::new();
        let e = refs(2);
        reg.contribute("s", EntityKind::Domain, &e[..1]).unwrap();
        let err = reg.contribute("s", EntityKind::Boundary, &e[1..]).unwrap_err();
        assert!(matches!(
            err,
            PartforgeError::Selection(SelectionError::KindMismatch { .. })
        ));
    }

    #[test]
    fn unknown_selection_reports_name() {
        let reg = Registry::new();
        let err = reg.resolve("nope").unwrap_err();
        let PartforgeError::Selection(SelectionError::UnknownSelection { name }) = err else {
            panic!("wrong error: {err}");
        };
        assert_eq!(name, "nope");
    }

    #[test]
    fn rename_preserves_cardinality_and_kind() {
        let mut reg = Registry::new();
        let e = refs(4);
        reg.contribute("csel2", EntityKind::Boundary, &e).unwrap();
        reg.rename("csel2", "geom1_pi1_csel2_bnd").unwrap();
        assert!(!reg.contains("csel2"));
        let sel = reg.resolve("geom1_pi1_csel2_bnd").unwrap();
        assert_eq!(sel.len(), 4);
        assert_eq!(sel.kind(), EntityKind::Boundary);
    }

    #[test]
    fn rename_merge_with_kind_conflict_restores_old() {
        let mut reg = Registry::new();
        let e = refs(2);
        reg.contribute("a", EntityKind::Domain, &e[..1]).unwrap();
        reg.contribute("b", EntityKind::Point, &e[1..]).unwrap();
        assert!(reg.rename("a", "b").is_err());
        assert!(reg.contains("a"));
    }

    #[test]
    fn remap_rewrites_identities_everywhere() {
        let mut reg = Registry::new();
        let e = refs(3);
        reg.contribute("a", EntityKind::Domain, &e[..2]).unwrap();
        reg.contribute("b", EntityKind::Domain, &e[..1]).unwrap();
        reg.remap(&[(e[0], e[2])]);
        assert!(reg.resolve("a").unwrap().members().contains(&e[2]));
        assert!(reg.resolve("b").unwrap().members().contains(&e[2]));
        assert!(!reg.resolve("b").unwrap().members().contains(&e[0]));
    }

    #[test]
    fn prune_dead_drops_members() {
        let mut reg = Registry::new();
        let e = refs(3);
        reg.contribute("a", EntityKind::Domain, &e).unwrap();
        reg.prune_dead(|r| r != e[1]);
        assert_eq!(reg.resolve("a").unwrap().len(), 2);
    }
}
