//! The external geometry kernel contract.
//!
//! The assembly builder never computes geometry itself. Every solid
//! operation goes through [`GeometryBackend`], a narrow trait a real
//! CAD/FEM product would implement by delegating to its kernel. The crate
//! ships [`MemoryBackend`], a deterministic bookkeeping implementation used
//! for tests and for validating construction graphs offline.

mod memory;

pub use memory::{EntityData, MemoryBackend};

use slotmap::new_key_type;

use crate::error::Result;
use crate::math::{Point3, Vector3};
use crate::selection::EntityKind;

new_key_type! {
    /// Opaque handle to a topological entity owned by the backend.
    pub struct EntityRef;
}

/// Work plane for 2D cross-section primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkPlane {
    Xy,
    Xz,
    Yz,
    Zx,
}

impl WorkPlane {
    /// Lifts in-plane coordinates to 3D.
    #[must_use]
    pub fn to_3d(self, uv: [f64; 2]) -> Point3 {
        let [u, v] = uv;
        match self {
            WorkPlane::Xy => Point3::new(u, v, 0.0),
            WorkPlane::Xz => Point3::new(u, 0.0, v),
            WorkPlane::Yz => Point3::new(0.0, u, v),
            WorkPlane::Zx => Point3::new(v, 0.0, u),
        }
    }
}

/// Anchor convention for rectangle placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseAnchor {
    Corner,
    Center,
}

/// A primitive creation request with fully evaluated numeric parameters.
///
/// Expression evaluation happens in the construction graph runner; backends
/// only ever see plain numbers in canonical units.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveSpec {
    Cylinder {
        pos: Point3,
        radius: f64,
        height: f64,
        axis: Vector3,
    },
    Sphere {
        pos: Point3,
        radius: f64,
    },
    /// Eccentric cone: circular base, top scaled by `ratio`.
    Cone {
        pos: Point3,
        axis: Vector3,
        semiaxes: [f64; 2],
        height: f64,
        ratio: f64,
    },
    Rectangle {
        plane: WorkPlane,
        pos: [f64; 2],
        size: [f64; 2],
        base: BaseAnchor,
    },
    Circle {
        plane: WorkPlane,
        pos: [f64; 2],
        radius: f64,
    },
    Ellipse {
        plane: WorkPlane,
        pos: [f64; 2],
        semiaxes: [f64; 2],
    },
    Point {
        pos: Point3,
    },
    /// Path curve between two endpoints (parametric helix segments and the
    /// like collapse to their endpoints in this contract).
    Curve {
        start: Point3,
        end: Point3,
    },
}

impl PrimitiveSpec {
    /// Kind of entity this primitive produces.
    #[must_use]
    pub fn produces(&self) -> EntityKind {
        match self {
            PrimitiveSpec::Cylinder { .. }
            | PrimitiveSpec::Sphere { .. }
            | PrimitiveSpec::Cone { .. } => EntityKind::Domain,
            PrimitiveSpec::Rectangle { .. }
            | PrimitiveSpec::Circle { .. }
            | PrimitiveSpec::Ellipse { .. } => EntityKind::Boundary,
            PrimitiveSpec::Curve { .. } => EntityKind::Edge,
            PrimitiveSpec::Point { .. } => EntityKind::Point,
        }
    }

    /// Representative anchor position of the primitive.
    #[must_use]
    pub fn anchor(&self) -> Point3 {
        match *self {
            PrimitiveSpec::Cylinder { pos, .. }
            | PrimitiveSpec::Sphere { pos, .. }
            | PrimitiveSpec::Cone { pos, .. }
            | PrimitiveSpec::Point { pos } => pos,
            PrimitiveSpec::Rectangle { plane, pos, size, base } => {
                let centered = match base {
                    BaseAnchor::Center => pos,
                    BaseAnchor::Corner => [pos[0] + size[0] / 2.0, pos[1] + size[1] / 2.0],
                };
                plane.to_3d(centered)
            }
            PrimitiveSpec::Circle { plane, pos, .. }
            | PrimitiveSpec::Ellipse { plane, pos, .. } => plane.to_3d(pos),
            PrimitiveSpec::Curve { start, end } => Point3::from((start.coords + end.coords) / 2.0),
        }
    }
}

/// Kernel-level boolean operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanKind {
    Difference,
    Union,
}

/// Sweep-family request turning 2D cross-sections into solids.
#[derive(Debug, Clone, PartialEq)]
pub enum SweepSpec {
    /// Revolution about the work plane's axis, radians.
    Revolve { angle_start: f64, angle_end: f64 },
    Extrude { direction: Vector3, distance: f64 },
    /// Sweep along a path-curve selection with an optional edge fixing the
    /// sweep parameterization.
    Sweep {
        path: Vec<EntityRef>,
        direction_edge: Option<EntityRef>,
    },
}

/// Rigid or affine transform request.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformSpec {
    Rotate {
        origin: Point3,
        axis: Vector3,
        angle: f64,
    },
    Translate { displacement: Vector3 },
    Scale { origin: Point3, factor: [f64; 3] },
}

/// Meshing options forwarded to the external mesher.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeshOptions {
    pub max_element_size: Option<f64>,
}

/// Study type forwarded to the external solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudyType {
    /// Stationary electrostatic (electric currents) study.
    Electrostatic,
}

/// Handle to a mesh produced by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshHandle(pub u64);

/// Handle to a solved study.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolutionHandle(pub u64);

/// Contract the external geometry/FEM kernel must satisfy.
///
/// All entity handles are owned by the backend's live topology; callers hold
/// weak references and must treat returned handle lists as the only source
/// of truth for identity after each operation.
pub trait GeometryBackend {
    /// Creates a primitive entity.
    ///
    /// # Errors
    ///
    /// Returns an error for degenerate parameters.
    fn create_primitive(&mut self, spec: &PrimitiveSpec) -> Result<Vec<EntityRef>>;

    /// Set-level boolean over two entity groups. Operands are consumed.
    ///
    /// # Errors
    ///
    /// Returns an error if an operand handle is stale.
    fn boolean_op(
        &mut self,
        kind: BooleanKind,
        input: &[EntityRef],
        input2: &[EntityRef],
    ) -> Result<Vec<EntityRef>>;

    /// Turns 2D cross-sections into solids. Cross-sections are consumed.
    ///
    /// # Errors
    ///
    /// Returns an error if a cross-section handle is stale.
    fn sweep_like(&mut self, spec: &SweepSpec, cross_section: &[EntityRef])
        -> Result<Vec<EntityRef>>;

    /// Applies a transform, replacing each entity identity. The result is
    /// index-aligned with `entities`.
    ///
    /// # Errors
    ///
    /// Returns an error if an entity handle is stale.
    fn transform(&mut self, spec: &TransformSpec, entities: &[EntityRef])
        -> Result<Vec<EntityRef>>;

    /// Rounds the corners of boundary entities, replacing each entity
    /// identity. The result is index-aligned with `entities`.
    ///
    /// # Errors
    ///
    /// Returns an error for a non-positive radius or a stale handle.
    fn fillet(&mut self, radius: f64, entities: &[EntityRef]) -> Result<Vec<EntityRef>>;

    /// Subdivides `input` entities using `tool` entities as cutting
    /// surfaces. Does not remove material.
    ///
    /// # Errors
    ///
    /// Returns an error if a handle is stale.
    fn partition(&mut self, input: &[EntityRef], tool: &[EntityRef]) -> Result<Vec<EntityRef>>;

    /// Deletes every live entity within `radius` of `center`, returning the
    /// removed handles so registries can prune their weak references.
    ///
    /// # Errors
    ///
    /// Returns an error if the predicate is degenerate (negative radius).
    fn delete_in_ball(&mut self, center: Point3, radius: f64) -> Result<Vec<EntityRef>>;

    /// Drops entities from the live topology. Stale handles are ignored.
    fn delete(&mut self, entities: &[EntityRef]);

    /// True if the handle still refers to a live entity.
    fn is_alive(&self, entity: EntityRef) -> bool;

    /// Kind of a live entity.
    fn entity_kind(&self, entity: EntityRef) -> Option<EntityKind>;

    /// Meshes the current live topology.
    ///
    /// # Errors
    ///
    /// Returns an error if there is nothing to mesh.
    fn mesh(&mut self, options: &MeshOptions) -> Result<MeshHandle>;

    /// Runs a study against the most recent mesh.
    ///
    /// # Errors
    ///
    /// Returns an error if no mesh exists.
    fn solve(&mut self, study: StudyType) -> Result<SolutionHandle>;
}
