//! Device-family configuration data.
//!
//! A device family is a data-only description of one cuff product line: its
//! parameter set and the ordered list of template instances that assemble
//! it, with their bindings, placement transforms, retention overrides, and
//! material/source attachments. Families are plain JSON so a new product
//! variant never requires code changes.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::info;

use crate::assembly::{Assembly, InstanceSpec, SourceSpec};
use crate::backend::GeometryBackend;
use crate::error::{ConfigError, Result, SelectionError};
use crate::math::Vector3;
use crate::params::ParameterStore;
use crate::selection::EntityKind;
use crate::template::TemplateTable;

/// One family parameter definition.
#[derive(Debug, Clone, Deserialize)]
pub struct ParamEntry {
    pub name: String,
    pub expression: String,
    #[serde(default)]
    pub description: String,
}

/// Placement rotation: axis through the origin plus an expression angle.
#[derive(Debug, Clone, Deserialize)]
pub struct RotationEntry {
    pub axis: [f64; 3],
    pub angle: String,
}

/// Per-selection retention override.
#[derive(Debug, Clone, Deserialize)]
pub struct RetentionEntry {
    pub selection: String,
    pub kind: EntityKind,
    pub keep: bool,
}

/// Material attached to one of the instance's domain selections.
#[derive(Debug, Clone, Deserialize)]
pub struct MaterialEntry {
    pub selection: String,
    pub material: String,
}

/// Physics source description, converted to [`SourceSpec`] on apply.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceEntry {
    PointCurrent { amplitude: f64 },
    Ground,
}

impl From<SourceEntry> for SourceSpec {
    fn from(entry: SourceEntry) -> Self {
        match entry {
            SourceEntry::PointCurrent { amplitude } => SourceSpec::PointCurrent { amplitude },
            SourceEntry::Ground => SourceSpec::Ground,
        }
    }
}

/// Source attached to one of the instance's selections.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceBindingEntry {
    pub selection: String,
    pub source: SourceEntry,
}

fn default_keep() -> bool {
    true
}

/// One template instance within a family.
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceEntry {
    pub template: String,
    pub label: String,
    /// Template input name to binding expression.
    #[serde(default)]
    pub def: BTreeMap<String, String>,
    #[serde(default)]
    pub rotation: Option<RotationEntry>,
    #[serde(default)]
    pub translation: Option<[String; 3]>,
    #[serde(default)]
    pub retention: Vec<RetentionEntry>,
    #[serde(default = "default_keep")]
    pub keep_non_contributing: bool,
    #[serde(default)]
    pub materials: Vec<MaterialEntry>,
    #[serde(default)]
    pub sources: Vec<SourceBindingEntry>,
}

/// A complete device-family description.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceFamily {
    pub name: String,
    #[serde(default)]
    pub params: Vec<ParamEntry>,
    #[serde(default)]
    pub instances: Vec<InstanceEntry>,
}

impl DeviceFamily {
    /// Parses a family description from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Malformed`] for syntactically or structurally
    /// invalid JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        let family: Self = serde_json::from_str(text).map_err(ConfigError::Malformed)?;
        Ok(family)
    }

    /// Applies the family to an assembly: defines its parameters in the
    /// assembly's group, places every instance in order, and attaches the
    /// declared materials and sources.
    ///
    /// # Errors
    ///
    /// Any failure is wrapped in [`ConfigError::Apply`] carrying the family
    /// name; the underlying parameter, placement, or binding error is the
    /// source. Placement is sequential, so an error leaves earlier instances
    /// in the assembly and later ones unplaced.
    pub fn apply(
        &self,
        table: &TemplateTable,
        params: &mut ParameterStore,
        assembly: &mut Assembly,
        backend: &mut dyn GeometryBackend,
    ) -> Result<()> {
        self.apply_inner(table, params, assembly, backend)
            .map_err(|e| {
                ConfigError::Apply {
                    family: self.name.clone(),
                    source: Box::new(e),
                }
                .into()
            })
    }

    fn apply_inner(
        &self,
        table: &TemplateTable,
        params: &mut ParameterStore,
        assembly: &mut Assembly,
        backend: &mut dyn GeometryBackend,
    ) -> Result<()> {
        let group = assembly.group().to_string();
        for p in &self.params {
            params.define(&group, &p.name, &p.expression, &p.description)?;
        }

        for entry in &self.instances {
            let mut spec = InstanceSpec::new(&entry.template, &entry.label);
            for (input, expr) in &entry.def {
                spec = spec.bind(input, expr);
            }
            if let Some(rot) = &entry.rotation {
                let axis = Vector3::new(rot.axis[0], rot.axis[1], rot.axis[2]);
                spec = spec.rotate(axis, &rot.angle);
            }
            if let Some(t) = &entry.translation {
                spec = spec.translate([&t[0], &t[1], &t[2]]);
            }
            for rule in &entry.retention {
                spec = spec.retain(&rule.selection, rule.kind, rule.keep);
            }
            if !entry.keep_non_contributing {
                spec = spec.drop_non_contributing();
            }
            assembly.place_instance(table, params, backend, &spec)?;

            for m in &entry.materials {
                let name = resolve_selection(
                    assembly,
                    &entry.label,
                    &m.selection,
                    EntityKind::Domain,
                )?;
                assembly.bind_material(&name, &m.material)?;
            }
            for s in &entry.sources {
                let source = SourceSpec::from(s.source);
                let name = resolve_selection(
                    assembly,
                    &entry.label,
                    &s.selection,
                    source.required_kind(),
                )?;
                assembly.bind_source(&name, source)?;
            }
        }
        info!(
            family = %self.name,
            instances = self.instances.len(),
            "device family applied"
        );
        Ok(())
    }
}

fn resolve_selection(
    assembly: &Assembly,
    instance: &str,
    selection: &str,
    kind: EntityKind,
) -> Result<String> {
    assembly
        .selection_name(instance, selection, kind)
        .map(str::to_string)
        .ok_or_else(|| {
            SelectionError::UnknownSelection {
                name: selection.to_string(),
            }
            .into()
        })
}
