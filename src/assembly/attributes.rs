//! Material and physics-source bindings over assembly selections.
//!
//! Pure table insertions: a binding has no geometric side effect, only
//! downstream meaning for the external solver. The only validation is that
//! the referenced selection exists and its entity kind fits the attachment.

use std::collections::BTreeMap;

use crate::error::{Result, SelectionError};
use crate::selection::{EntityKind, Registry};

/// Physics source attached to a named selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceSpec {
    /// Point current source, amperes.
    PointCurrent { amplitude: f64 },
    /// Ground (zero potential) boundary condition.
    Ground,
}

impl SourceSpec {
    /// Entity kind the source must be placed on.
    #[must_use]
    pub fn required_kind(self) -> EntityKind {
        match self {
            SourceSpec::PointCurrent { .. } => EntityKind::Point,
            SourceSpec::Ground => EntityKind::Boundary,
        }
    }
}

/// Accumulated material and source bindings.
#[derive(Debug, Clone, Default)]
pub struct AttributeSet {
    materials: BTreeMap<String, String>,
    sources: BTreeMap<String, SourceSpec>,
}

impl AttributeSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a material to a domain selection.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::UnknownSelection`] if the selection does
    /// not exist and [`SelectionError::KindMismatch`] if it is not a domain
    /// selection.
    pub fn bind_material(
        &mut self,
        registry: &Registry,
        selection: &str,
        material: &str,
    ) -> Result<()> {
        let kind = registry.resolve(selection)?.kind();
        if kind != EntityKind::Domain {
            return Err(SelectionError::KindMismatch {
                name: selection.to_string(),
                expected: EntityKind::Domain,
                found: kind,
            }
            .into());
        }
        self.materials.insert(selection.to_string(), material.to_string());
        Ok(())
    }

    /// Binds a physics source to a selection of the matching kind.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::UnknownSelection`] if the selection does
    /// not exist and [`SelectionError::KindMismatch`] if the kind does not
    /// fit the source.
    pub fn bind_source(
        &mut self,
        registry: &Registry,
        selection: &str,
        source: SourceSpec,
    ) -> Result<()> {
        let kind = registry.resolve(selection)?.kind();
        if kind != source.required_kind() {
            return Err(SelectionError::KindMismatch {
                name: selection.to_string(),
                expected: source.required_kind(),
                found: kind,
            }
            .into());
        }
        self.sources.insert(selection.to_string(), source);
        Ok(())
    }

    /// Material bound to a selection, if any.
    #[must_use]
    pub fn material_of(&self, selection: &str) -> Option<&str> {
        self.materials.get(selection).map(String::as_str)
    }

    /// Source bound to a selection, if any.
    #[must_use]
    pub fn source_of(&self, selection: &str) -> Option<SourceSpec> {
        self.sources.get(selection).copied()
    }

    /// All material bindings in name order.
    pub fn materials(&self) -> impl Iterator<Item = (&str, &str)> {
        self.materials.iter().map(|(s, m)| (s.as_str(), m.as_str()))
    }

    /// All source bindings in name order.
    pub fn sources(&self) -> impl Iterator<Item = (&str, SourceSpec)> {
        self.sources.iter().map(|(s, src)| (s.as_str(), *src))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use slotmap::SlotMap;

    use crate::backend::EntityRef;
    use crate::error::{PartforgeError, SelectionError};

    use super::*;

    fn registry_with(name: &str, kind: EntityKind) -> Registry {
        let mut arena: SlotMap<EntityRef, ()> = SlotMap::with_key();
        let e = arena.insert(());
        let mut reg = Registry::new();
        reg.contribute(name, kind, &[e]).unwrap();
        reg
    }

    #[test]
    fn material_binds_to_domain() {
        let reg = registry_with("geom1_pi1_csel3_dom", EntityKind::Domain);
        let mut attrs = AttributeSet::new();
        attrs
            .bind_material(&reg, "geom1_pi1_csel3_dom", "silicone")
            .unwrap();
        assert_eq!(attrs.material_of("geom1_pi1_csel3_dom"), Some("silicone"));
    }

    #[test]
    fn unknown_selection_reports_exact_name() {
        let reg = Registry::new();
        let mut attrs = AttributeSet::new();
        let err = attrs
            .bind_material(&reg, "geom1_pi1_csel9_dom", "platinum")
            .unwrap_err();
        let PartforgeError::Selection(SelectionError::UnknownSelection { name }) = err else {
            panic!("wrong error: {err}");
        };
        assert_eq!(name, "geom1_pi1_csel9_dom");
    }

    #[test]
    fn point_source_requires_point_selection() {
        let reg = registry_with("src", EntityKind::Domain);
        let mut attrs = AttributeSet::new();
        assert!(attrs
            .bind_source(&reg, "src", SourceSpec::PointCurrent { amplitude: 1e-3 })
            .is_err());

        let reg = registry_with("src", EntityKind::Point);
        assert!(attrs
            .bind_source(&reg, "src", SourceSpec::PointCurrent { amplitude: 1e-3 })
            .is_ok());
    }

    #[test]
    fn ground_requires_boundary_selection() {
        let reg = registry_with("medium", EntityKind::Boundary);
        let mut attrs = AttributeSet::new();
        attrs.bind_source(&reg, "medium", SourceSpec::Ground).unwrap();
        assert_eq!(attrs.source_of("medium"), Some(SourceSpec::Ground));
    }
}
