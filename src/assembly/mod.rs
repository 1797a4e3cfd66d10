//! Assembly composition.
//!
//! An assembly places part instances: each placement binds a template's
//! declared inputs to expressions in the assembly's parameter namespace,
//! runs the template's construction graph, applies a rigid transform,
//! filters the resulting selections through per-kind retention flags, and
//! merges the survivors into the assembly-global registry under
//! `geom1_<instanceId>_<cselId>_<kind>` names. Instances never share
//! mutable state; the whole pipeline is a strict sequential critical
//! section over the backend.

mod attributes;

pub use attributes::{AttributeSet, SourceSpec};

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::backend::{
    EntityRef, GeometryBackend, MeshHandle, MeshOptions, SolutionHandle, StudyType, TransformSpec,
};
use crate::error::{BackendError, BuildError, Result};
use crate::expr::{Bindings, Expr};
use crate::graph::run_template;
use crate::ids::IdTable;
use crate::math::{Point3, Vector3};
use crate::params::ParameterStore;
use crate::selection::{EntityKind, Registry};
use crate::template::{Template, TemplateTable};

/// Rigid placement transform: optional rotation about an axis through the
/// origin by an expression-valued angle, then an optional translation.
#[derive(Debug, Clone, Default)]
pub struct PlacementTransform {
    pub rotation: Option<(Vector3, String)>,
    pub translation: Option<[String; 3]>,
}

/// Per-selection retention override. Later rules override earlier ones.
#[derive(Debug, Clone)]
pub struct RetentionRule {
    pub selection_label: String,
    pub kind: EntityKind,
    pub keep: bool,
}

/// Everything needed to place one instance of a template.
#[derive(Debug, Clone)]
pub struct InstanceSpec {
    pub template: String,
    pub label: String,
    /// Formal input name to caller expression, evaluated in the assembly's
    /// parameter namespace. Unbound inputs fall back to template defaults.
    pub bindings: BTreeMap<String, String>,
    pub transform: PlacementTransform,
    pub retention: Vec<RetentionRule>,
    /// When false, selections the template declared non-contributing default
    /// to dropped instead of kept.
    pub keep_non_contributing: bool,
}

impl InstanceSpec {
    /// Starts a placement description.
    #[must_use]
    pub fn new(template: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            label: label.into(),
            bindings: BTreeMap::new(),
            transform: PlacementTransform::default(),
            retention: Vec::new(),
            keep_non_contributing: true,
        }
    }

    /// Binds a formal input to a caller expression.
    #[must_use]
    pub fn bind(mut self, input: &str, expr: &str) -> Self {
        self.bindings.insert(input.to_string(), expr.to_string());
        self
    }

    /// Rotation about an axis through the origin by an expression angle.
    #[must_use]
    pub fn rotate(mut self, axis: Vector3, angle: &str) -> Self {
        self.transform.rotation = Some((axis, angle.to_string()));
        self
    }

    /// Translation by three expression components.
    #[must_use]
    pub fn translate(mut self, displacement: [&str; 3]) -> Self {
        self.transform.translation = Some(displacement.map(str::to_string));
        self
    }

    /// Appends a retention override for one selection/kind pair.
    #[must_use]
    pub fn retain(mut self, selection_label: &str, kind: EntityKind, keep: bool) -> Self {
        self.retention.push(RetentionRule {
            selection_label: selection_label.to_string(),
            kind,
            keep,
        });
        self
    }

    /// Drops non-contributing selections by default.
    #[must_use]
    pub fn drop_non_contributing(mut self) -> Self {
        self.keep_non_contributing = false;
        self
    }
}

/// Record of a placed instance.
#[derive(Debug, Clone)]
pub struct PlacedInstance {
    pub id: String,
    pub label: String,
    pub template: String,
    /// (selection label, kind) to assembly-global selection name.
    pub selections: BTreeMap<(String, EntityKind), String>,
}

/// Top-level container: merged selection registry across all instances plus
/// material and physics-source bindings.
#[derive(Debug, Default)]
pub struct Assembly {
    group: String,
    ids: IdTable,
    registry: Registry,
    instances: Vec<PlacedInstance>,
    attributes: AttributeSet,
}

impl Assembly {
    /// Creates an assembly evaluating expressions in `group`'s namespace.
    #[must_use]
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            ..Self::default()
        }
    }

    /// The parameter namespace of this assembly.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// The merged assembly-global selection registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Placed instances in placement order.
    #[must_use]
    pub fn instances(&self) -> &[PlacedInstance] {
        &self.instances
    }

    /// Looks up a placed instance by label.
    #[must_use]
    pub fn instance(&self, label: &str) -> Option<&PlacedInstance> {
        self.instances.iter().find(|i| i.label == label)
    }

    /// Assembly-global name of an instance's selection, if retained.
    #[must_use]
    pub fn selection_name(
        &self,
        instance_label: &str,
        selection_label: &str,
        kind: EntityKind,
    ) -> Option<&str> {
        self.instance(instance_label)?
            .selections
            .get(&(selection_label.to_string(), kind))
            .map(String::as_str)
    }

    /// Material and source bindings.
    #[must_use]
    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    /// Places one instance of a template.
    ///
    /// # Errors
    ///
    /// Fails with [`BuildError::UnknownInput`] for a binding key the
    /// template does not declare, [`BuildError::DuplicateInstanceLabel`] for
    /// a reused label, or any wrapped template-run error. On failure nothing
    /// is merged into the assembly.
    pub fn place_instance(
        &mut self,
        table: &TemplateTable,
        params: &ParameterStore,
        backend: &mut dyn GeometryBackend,
        spec: &InstanceSpec,
    ) -> Result<String> {
        let template = table.get(&spec.template)?;
        self.place_inner(template, params, backend, spec)
            .map_err(|e| {
                BuildError::PlacementFailed {
                    instance: spec.label.clone(),
                    template: spec.template.clone(),
                    source: Box::new(e),
                }
                .into()
            })
    }

    fn place_inner(
        &mut self,
        template: &Template,
        params: &ParameterStore,
        backend: &mut dyn GeometryBackend,
        spec: &InstanceSpec,
    ) -> Result<String> {
        // Every binding key must name a declared input.
        for key in spec.bindings.keys() {
            if template.input(key).is_none() {
                return Err(BuildError::UnknownInput {
                    template: template.name().to_string(),
                    name: key.clone(),
                }
                .into());
            }
        }

        // Merge caller expressions with template defaults, all evaluated in
        // the assembly's parameter namespace.
        let mut bindings = Bindings::new();
        for input in template.inputs() {
            let value = match spec.bindings.get(&input.name) {
                Some(text) => params.eval_in(&self.group, &Expr::parse(text)?)?,
                None => params.eval_in(&self.group, &input.default)?,
            };
            bindings.insert(input.name.clone(), value);
        }

        let mut local = run_template(template, &mut bindings, backend)?;

        self.apply_transform(params, backend, &spec.transform, &mut local)?;

        // Retention: decide keep/drop per (selection, kind), delete dropped
        // entities from the live topology, then prune stale weak refs.
        let mut doomed: Vec<EntityRef> = Vec::new();
        let mut dropped_names: Vec<String> = Vec::new();
        for (name, sel) in local.iter() {
            let (label, contributing) = template
                .selection(name)
                .map_or((name, true), |d| (d.label.as_str(), d.contributing));
            let mut keep = contributing || spec.keep_non_contributing;
            for rule in &spec.retention {
                if rule.selection_label == label && rule.kind == sel.kind() {
                    keep = rule.keep;
                }
            }
            if !keep {
                doomed.extend_from_slice(sel.members());
                dropped_names.push(name.to_string());
            }
        }
        backend.delete(&doomed);
        for name in &dropped_names {
            local.remove(name);
        }
        {
            let backend = &*backend;
            local.prune_dead(|e| backend.is_alive(e));
        }

        let Some(pi) = self.ids.next_labeled("pi", &spec.label) else {
            return Err(BuildError::DuplicateInstanceLabel {
                label: spec.label.clone(),
            }
            .into());
        };

        // Rename survivors into the assembly-global namespace and merge.
        let mut placed = PlacedInstance {
            id: pi.clone(),
            label: spec.label.clone(),
            template: template.name().to_string(),
            selections: BTreeMap::new(),
        };
        for (name, sel) in local.iter() {
            let assembly_name = format!("geom1_{pi}_{name}_{}", sel.kind().suffix());
            self.registry
                .contribute(&assembly_name, sel.kind(), sel.members())?;
            let label = template
                .selection(name)
                .map_or_else(|| name.to_string(), |d| d.label.clone());
            placed
                .selections
                .insert((label, sel.kind()), assembly_name);
        }
        info!(
            instance = %spec.label,
            id = %pi,
            template = template.name(),
            selections = placed.selections.len(),
            "instance placed"
        );
        self.instances.push(placed);
        Ok(pi)
    }

    fn apply_transform(
        &self,
        params: &ParameterStore,
        backend: &mut dyn GeometryBackend,
        transform: &PlacementTransform,
        local: &mut Registry,
    ) -> Result<()> {
        let mut specs: Vec<TransformSpec> = Vec::new();
        if let Some((axis, angle_text)) = &transform.rotation {
            let angle = params
                .eval_in(&self.group, &Expr::parse(angle_text)?)?
                .as_angle()?;
            specs.push(TransformSpec::Rotate {
                origin: Point3::origin(),
                axis: *axis,
                angle,
            });
        }
        if let Some(displacement) = &transform.translation {
            let mut d = [0.0; 3];
            for (slot, text) in d.iter_mut().zip(displacement.iter()) {
                *slot = params
                    .eval_in(&self.group, &Expr::parse(text)?)?
                    .as_length()?;
            }
            specs.push(TransformSpec::Translate {
                displacement: Vector3::new(d[0], d[1], d[2]),
            });
        }

        for spec in specs {
            // Unique live entities across all local selections.
            let mut entities: Vec<EntityRef> = Vec::new();
            for (_, sel) in local.iter() {
                for &e in sel.members() {
                    if backend.is_alive(e) && !entities.contains(&e) {
                        entities.push(e);
                    }
                }
            }
            if entities.is_empty() {
                continue;
            }
            let moved = backend.transform(&spec, &entities)?;
            let pairs: Vec<_> = entities.into_iter().zip(moved).collect();
            local.remap(&pairs);
            debug!(?spec, "placement transform applied");
        }
        Ok(())
    }

    /// Meshes the assembled geometry through the backend.
    ///
    /// # Errors
    ///
    /// Fails if no instance has been placed or the backend cannot mesh.
    pub fn mesh(
        &self,
        backend: &mut dyn GeometryBackend,
        options: &MeshOptions,
    ) -> Result<MeshHandle> {
        if self.instances.is_empty() {
            return Err(BackendError::NothingToMesh.into());
        }
        backend.mesh(options)
    }

    /// Runs a study through the backend.
    ///
    /// # Errors
    ///
    /// Fails if no instance has been placed or the backend has no mesh.
    pub fn solve(
        &self,
        backend: &mut dyn GeometryBackend,
        study: StudyType,
    ) -> Result<SolutionHandle> {
        if self.instances.is_empty() {
            return Err(BackendError::NoMesh.into());
        }
        backend.solve(study)
    }

    /// Binds a material to an assembly-level domain selection.
    ///
    /// # Errors
    ///
    /// See [`AttributeSet::bind_material`].
    pub fn bind_material(&mut self, selection: &str, material: &str) -> Result<()> {
        self.attributes
            .bind_material(&self.registry, selection, material)
    }

    /// Binds a physics source to an assembly-level selection.
    ///
    /// # Errors
    ///
    /// See [`AttributeSet::bind_source`].
    pub fn bind_source(&mut self, selection: &str, source: SourceSpec) -> Result<()> {
        self.attributes
            .bind_source(&self.registry, selection, source)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::backend::MemoryBackend;
    use crate::error::{PartforgeError, SelectionError};
    use crate::library::standard_templates;

    use super::*;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn setup() -> (TemplateTable, ParameterStore, MemoryBackend) {
        init_tracing();
        (
            standard_templates().unwrap(),
            ParameterStore::new(),
            MemoryBackend::new(),
        )
    }

    #[test]
    fn gapped_holed_cuff_yields_one_final_domain() {
        let (table, params, mut backend) = setup();
        let mut assembly = Assembly::new("demo");
        let spec = InstanceSpec::new("TubeCuff", "cuff")
            .bind("Theta", "340 [deg]")
            .bind("N_holes", "1");
        let pi = assembly
            .place_instance(&table, &params, &mut backend, &spec)
            .unwrap();
        assert_eq!(pi, "pi1");

        let name = assembly
            .selection_name("cuff", "CUFF FINAL", EntityKind::Domain)
            .unwrap();
        assert_eq!(name, "geom1_pi1_csel3_dom");
        let sel = assembly.registry().resolve(name).unwrap();
        assert_eq!(sel.kind(), EntityKind::Domain);
        assert_eq!(sel.len(), 1);
        assert!(backend.is_alive(sel.members()[0]));
    }

    #[test]
    fn closed_cuff_without_holes_takes_only_first_branch() {
        let (table, params, mut backend) = setup();
        let mut assembly = Assembly::new("demo");
        let spec = InstanceSpec::new("TubeCuff", "cuff")
            .bind("Theta", "360 [deg]")
            .bind("N_holes", "0");
        assembly
            .place_instance(&table, &params, &mut backend, &spec)
            .unwrap();

        assert!(assembly
            .selection_name("cuff", "CUFF FINAL", EntityKind::Domain)
            .is_some());
        // Gap and hole machinery never ran, so those selections were never
        // contributed to and do not surface at the assembly level.
        for label in ["CUFF GAP", "CUFF GAP CROSS SECTION", "HOLES"] {
            assert!(
                assembly
                    .selection_name("cuff", label, EntityKind::Domain)
                    .is_none(),
                "{label} should be absent"
            );
        }
    }

    #[test]
    fn two_contacts_get_disjoint_point_sources() {
        let (table, mut params, mut backend) = setup();
        params.define("demo", "Center_P", "10 [mm]", "").unwrap();
        params.define("demo", "Pitch_P", "1.5 [mm]", "").unwrap();

        let mut assembly = Assembly::new("demo");
        for (label, center) in [
            ("contact_1", "Center_P - Pitch_P/2"),
            ("contact_2", "Center_P + Pitch_P/2"),
        ] {
            let spec = InstanceSpec::new("RibbonContact", label).bind("Center", center);
            assembly
                .place_instance(&table, &params, &mut backend, &spec)
                .unwrap();
        }

        let src1 = assembly
            .selection_name("contact_1", "SRC", EntityKind::Point)
            .unwrap()
            .to_string();
        let src2 = assembly
            .selection_name("contact_2", "SRC", EntityKind::Point)
            .unwrap()
            .to_string();
        assert_ne!(src1, src2);
        let m1 = assembly.registry().resolve(&src1).unwrap().members().to_vec();
        let m2 = assembly.registry().resolve(&src2).unwrap().members().to_vec();
        assert!(m1.iter().all(|e| !m2.contains(e)));

        assembly
            .bind_source(&src1, SourceSpec::PointCurrent { amplitude: 1e-3 })
            .unwrap();
        assembly
            .bind_source(&src2, SourceSpec::PointCurrent { amplitude: -1e-3 })
            .unwrap();
        assert_eq!(assembly.attributes().sources().count(), 2);
    }

    #[test]
    fn binding_to_a_missing_selection_reports_the_exact_name() {
        let (table, params, mut backend) = setup();
        let mut assembly = Assembly::new("demo");
        let spec = InstanceSpec::new("CuffFill", "fill");
        assembly
            .place_instance(&table, &params, &mut backend, &spec)
            .unwrap();

        let err = assembly
            .bind_material("geom1_pi9_csel1_dom", "saline")
            .unwrap_err();
        let PartforgeError::Selection(SelectionError::UnknownSelection { name }) = err else {
            panic!("wrong error: {err}");
        };
        assert_eq!(name, "geom1_pi9_csel1_dom");
    }

    #[test]
    fn duplicate_instance_label_is_rejected() {
        let (table, params, mut backend) = setup();
        let mut assembly = Assembly::new("demo");
        let spec = InstanceSpec::new("CuffFill", "fill");
        assembly
            .place_instance(&table, &params, &mut backend, &spec)
            .unwrap();
        let err = assembly
            .place_instance(&table, &params, &mut backend, &spec)
            .unwrap_err();
        let PartforgeError::Build(BuildError::PlacementFailed { source, .. }) = err else {
            panic!("wrong error: {err}");
        };
        assert!(matches!(
            *source,
            PartforgeError::Build(BuildError::DuplicateInstanceLabel { .. })
        ));
    }

    #[test]
    fn unknown_binding_key_is_rejected_before_any_geometry() {
        let (table, params, mut backend) = setup();
        let mut assembly = Assembly::new("demo");
        let spec = InstanceSpec::new("CuffFill", "fill").bind("Nope", "1 [mm]");
        assert!(assembly
            .place_instance(&table, &params, &mut backend, &spec)
            .is_err());
        assert_eq!(backend.live_count(), 0);
        assert!(assembly.instances().is_empty());
    }

    #[test]
    fn dropping_non_contributing_leaves_only_final_selections() {
        let (table, params, mut backend) = setup();
        let mut assembly = Assembly::new("demo");
        let spec = InstanceSpec::new("TubeCuff", "cuff").drop_non_contributing();
        assembly
            .place_instance(&table, &params, &mut backend, &spec)
            .unwrap();

        let placed = assembly.instance("cuff").unwrap();
        assert_eq!(placed.selections.len(), 1);
        assert!(assembly
            .selection_name("cuff", "CUFF FINAL", EntityKind::Domain)
            .is_some());
        // Nothing but the final cuff body survives in the backend.
        assert_eq!(backend.live_count(), 1);
    }

    #[test]
    fn retention_override_can_drop_a_contributing_selection() {
        let (table, params, mut backend) = setup();
        let mut assembly = Assembly::new("demo");
        let spec = InstanceSpec::new("RibbonContact", "contact")
            .bind("Recess", "0 [um]")
            .retain("SRC", EntityKind::Point, false);
        assembly
            .place_instance(&table, &params, &mut backend, &spec)
            .unwrap();
        assert!(assembly
            .selection_name("contact", "SRC", EntityKind::Point)
            .is_none());
        assert!(assembly
            .selection_name("contact", "CONTACT FINAL", EntityKind::Domain)
            .is_some());
    }

    #[test]
    fn placement_transform_moves_the_instance_geometry() {
        let (table, params, mut backend) = setup();
        let mut assembly = Assembly::new("demo");
        let spec = InstanceSpec::new("CuffFill", "fill")
            .translate(["1 [mm]", "0 [um]", "0 [um]"]);
        assembly
            .place_instance(&table, &params, &mut backend, &spec)
            .unwrap();
        let name = assembly
            .selection_name("fill", "CUFF FILL FINAL", EntityKind::Domain)
            .unwrap();
        let e = assembly.registry().resolve(name).unwrap().members()[0];
        let pos = backend.entity(e).unwrap().position;
        approx::assert_relative_eq!(pos.x, 1000.0, epsilon = 1e-9);
    }

    #[test]
    fn identical_builds_produce_identical_registries() {
        let (table, params, _) = setup();
        let build = || {
            let mut backend = MemoryBackend::new();
            let mut assembly = Assembly::new("demo");
            for label in ["cuff", "fill"] {
                let template = if label == "cuff" { "TubeCuff" } else { "CuffFill" };
                let spec = InstanceSpec::new(template, label);
                assembly
                    .place_instance(&table, &params, &mut backend, &spec)
                    .unwrap();
            }
            assembly
                .registry()
                .names()
                .map(str::to_string)
                .collect::<Vec<_>>()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn mesh_and_solve_gate_on_placed_instances() {
        let (table, params, mut backend) = setup();
        let mut assembly = Assembly::new("demo");
        assert!(assembly.mesh(&mut backend, &MeshOptions::default()).is_err());
        assert!(assembly.solve(&mut backend, StudyType::Electrostatic).is_err());

        let spec = InstanceSpec::new("CuffFill", "fill");
        assembly
            .place_instance(&table, &params, &mut backend, &spec)
            .unwrap();
        let mesh = assembly.mesh(&mut backend, &MeshOptions::default()).unwrap();
        assert_eq!(mesh, MeshHandle(1));
        assert!(assembly
            .solve(&mut backend, StudyType::Electrostatic)
            .is_ok());
    }
}
