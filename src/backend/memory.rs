//! Deterministic in-memory backend.
//!
//! Tracks entities at the set level only: each live entity has a kind, a
//! representative position, and the handles it was derived from. Boolean,
//! sweep, and partition results follow fixed counting rules so construction
//! graphs can be validated (selection names, kinds, entity counts, retention)
//! without a solid-modeling kernel. Not a geometric implementation.

use slotmap::SlotMap;
use tracing::trace;

use crate::error::{BackendError, Result};
use crate::math::{rotation_about, transform_point, Matrix4, Point3};
use crate::selection::EntityKind;

use super::{
    BooleanKind, EntityRef, GeometryBackend, MeshHandle, MeshOptions, PrimitiveSpec,
    SolutionHandle, StudyType, SweepSpec, TransformSpec,
};

/// Bookkeeping record for one live entity.
#[derive(Debug, Clone)]
pub struct EntityData {
    pub kind: EntityKind,
    /// Representative position (anchor or centroid surrogate).
    pub position: Point3,
    /// Handles this entity was derived from. Provenance only; the parents
    /// themselves are no longer live.
    pub parents: Vec<EntityRef>,
}

/// Arena-backed reference implementation of [`GeometryBackend`].
#[derive(Debug, Default)]
pub struct MemoryBackend {
    arena: SlotMap<EntityRef, EntityData>,
    meshes: u64,
    solutions: u64,
    has_mesh: bool,
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record for a live entity.
    #[must_use]
    pub fn entity(&self, e: EntityRef) -> Option<&EntityData> {
        self.arena.get(e)
    }

    /// Number of live entities.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.arena.len()
    }

    /// Number of live entities of one kind.
    #[must_use]
    pub fn live_count_of(&self, kind: EntityKind) -> usize {
        self.arena.values().filter(|d| d.kind == kind).count()
    }

    fn require_live(&self, entities: &[EntityRef]) -> Result<()> {
        if entities.iter().all(|&e| self.arena.contains_key(e)) {
            Ok(())
        } else {
            Err(BackendError::StaleHandle.into())
        }
    }

    fn consume(&mut self, entities: &[EntityRef]) {
        for &e in entities {
            self.arena.remove(e);
        }
    }

    fn spawn(&mut self, kind: EntityKind, position: Point3, parents: Vec<EntityRef>) -> EntityRef {
        self.arena.insert(EntityData {
            kind,
            position,
            parents,
        })
    }

    fn apply_matrix(&mut self, matrix: &Matrix4, entities: &[EntityRef]) -> Result<Vec<EntityRef>> {
        self.require_live(entities)?;
        let mut out = Vec::with_capacity(entities.len());
        for &e in entities {
            // Unwrap-free: require_live guarantees presence.
            let Some(data) = self.arena.get(e).cloned() else {
                return Err(BackendError::StaleHandle.into());
            };
            self.arena.remove(e);
            let moved = self.spawn(data.kind, transform_point(matrix, &data.position), vec![e]);
            out.push(moved);
        }
        Ok(out)
    }
}

impl GeometryBackend for MemoryBackend {
    fn create_primitive(&mut self, spec: &PrimitiveSpec) -> Result<Vec<EntityRef>> {
        let degenerate = match *spec {
            PrimitiveSpec::Cylinder { radius, height, .. } => radius <= 0.0 || height == 0.0,
            PrimitiveSpec::Sphere { radius, .. } | PrimitiveSpec::Circle { radius, .. } => {
                radius <= 0.0
            }
            PrimitiveSpec::Cone {
                semiaxes, height, ..
            } => semiaxes[0] <= 0.0 || semiaxes[1] <= 0.0 || height == 0.0,
            PrimitiveSpec::Ellipse { semiaxes, .. } => semiaxes[0] <= 0.0 || semiaxes[1] <= 0.0,
            PrimitiveSpec::Rectangle { size, .. } => size[0] <= 0.0 || size[1] <= 0.0,
            PrimitiveSpec::Curve { start, end } => (end - start).norm() <= 0.0,
            PrimitiveSpec::Point { .. } => false,
        };
        if degenerate {
            return Err(BackendError::Degenerate(format!("{spec:?}")).into());
        }
        let e = self.spawn(spec.produces(), spec.anchor(), Vec::new());
        trace!(?e, "create primitive");
        Ok(vec![e])
    }

    fn boolean_op(
        &mut self,
        kind: BooleanKind,
        input: &[EntityRef],
        input2: &[EntityRef],
    ) -> Result<Vec<EntityRef>> {
        self.require_live(input)?;
        self.require_live(input2)?;
        let result = match kind {
            BooleanKind::Difference => {
                // One surviving region per input entity; the subtrahend is
                // consumed into each result's provenance.
                let mut out = Vec::with_capacity(input.len());
                for &e in input {
                    let Some(data) = self.arena.get(e).cloned() else {
                        return Err(BackendError::StaleHandle.into());
                    };
                    let mut parents = vec![e];
                    parents.extend_from_slice(input2);
                    out.push(self.spawn(data.kind, data.position, parents));
                }
                out
            }
            BooleanKind::Union => {
                let all: Vec<EntityRef> = input.iter().chain(input2).copied().collect();
                let mut centroid = nalgebra::Vector3::zeros();
                let mut kind_of_first = EntityKind::Domain;
                for (i, &e) in all.iter().enumerate() {
                    let Some(data) = self.arena.get(e) else {
                        return Err(BackendError::StaleHandle.into());
                    };
                    if i == 0 {
                        kind_of_first = data.kind;
                    }
                    centroid += data.position.coords;
                }
                #[allow(clippy::cast_precision_loss)]
                let centroid = Point3::from(centroid / all.len().max(1) as f64);
                vec![self.spawn(kind_of_first, centroid, all)]
            }
        };
        self.consume(input);
        self.consume(input2);
        Ok(result)
    }

    fn sweep_like(
        &mut self,
        spec: &SweepSpec,
        cross_section: &[EntityRef],
    ) -> Result<Vec<EntityRef>> {
        self.require_live(cross_section)?;
        if let SweepSpec::Sweep { path, .. } = spec {
            self.require_live(path)?;
        }
        let mut out = Vec::with_capacity(cross_section.len());
        for &cs in cross_section {
            let Some(data) = self.arena.get(cs).cloned() else {
                return Err(BackendError::StaleHandle.into());
            };
            let position = match spec {
                SweepSpec::Extrude {
                    direction,
                    distance,
                } => data.position + direction * (*distance / 2.0),
                SweepSpec::Revolve { .. } | SweepSpec::Sweep { .. } => data.position,
            };
            out.push(self.spawn(EntityKind::Domain, position, vec![cs]));
        }
        // Path curves stay live: several cross-sections may sweep along the
        // same curve in sequence.
        self.consume(cross_section);
        Ok(out)
    }

    fn fillet(&mut self, radius: f64, entities: &[EntityRef]) -> Result<Vec<EntityRef>> {
        if radius <= 0.0 {
            return Err(BackendError::Degenerate("non-positive fillet radius".into()).into());
        }
        self.require_live(entities)?;
        let mut out = Vec::with_capacity(entities.len());
        for &e in entities {
            let Some(data) = self.arena.get(e).cloned() else {
                return Err(BackendError::StaleHandle.into());
            };
            self.arena.remove(e);
            out.push(self.spawn(data.kind, data.position, vec![e]));
        }
        Ok(out)
    }

    fn transform(
        &mut self,
        spec: &TransformSpec,
        entities: &[EntityRef],
    ) -> Result<Vec<EntityRef>> {
        let matrix = match spec {
            TransformSpec::Rotate {
                origin,
                axis,
                angle,
            } => rotation_about(origin, axis, *angle),
            TransformSpec::Translate { displacement } => Matrix4::new_translation(displacement),
            TransformSpec::Scale { origin, factor } => {
                let t_neg = Matrix4::new_translation(&(-origin.coords));
                let s = Matrix4::new_nonuniform_scaling(&nalgebra::Vector3::new(
                    factor[0], factor[1], factor[2],
                ));
                let t_pos = Matrix4::new_translation(&origin.coords);
                t_pos * s * t_neg
            }
        };
        self.apply_matrix(&matrix, entities)
    }

    fn partition(&mut self, input: &[EntityRef], tool: &[EntityRef]) -> Result<Vec<EntityRef>> {
        self.require_live(input)?;
        self.require_live(tool)?;
        // Topology subdivision: each input region splits in two along the
        // tool; material is never removed.
        let mut out = Vec::with_capacity(input.len() * 2);
        for &e in input {
            let Some(data) = self.arena.get(e).cloned() else {
                return Err(BackendError::StaleHandle.into());
            };
            let mut parents = vec![e];
            parents.extend_from_slice(tool);
            out.push(self.spawn(data.kind, data.position, parents.clone()));
            out.push(self.spawn(data.kind, data.position, parents));
        }
        self.consume(input);
        self.consume(tool);
        Ok(out)
    }

    fn delete_in_ball(&mut self, center: Point3, radius: f64) -> Result<Vec<EntityRef>> {
        if radius < 0.0 {
            return Err(BackendError::Degenerate("negative ball radius".into()).into());
        }
        let doomed: Vec<EntityRef> = self
            .arena
            .iter()
            .filter(|(_, d)| (d.position - center).norm() <= radius)
            .map(|(e, _)| e)
            .collect();
        self.consume(&doomed);
        Ok(doomed)
    }

    fn delete(&mut self, entities: &[EntityRef]) {
        self.consume(entities);
    }

    fn is_alive(&self, entity: EntityRef) -> bool {
        self.arena.contains_key(entity)
    }

    fn entity_kind(&self, entity: EntityRef) -> Option<EntityKind> {
        self.arena.get(entity).map(|d| d.kind)
    }

    fn mesh(&mut self, _options: &MeshOptions) -> Result<MeshHandle> {
        if self.live_count_of(EntityKind::Domain) == 0 {
            return Err(BackendError::NothingToMesh.into());
        }
        self.meshes += 1;
        self.has_mesh = true;
        Ok(MeshHandle(self.meshes))
    }

    fn solve(&mut self, _study: StudyType) -> Result<SolutionHandle> {
        if !self.has_mesh {
            return Err(BackendError::NoMesh.into());
        }
        self.solutions += 1;
        Ok(SolutionHandle(self.solutions))
    }
}
