//! Construction operation graph.
//!
//! A template's body is an ordered list of typed operations. Each operation
//! carries a human-readable label, the selection names it consumes, an
//! optional `contribute_to` output selection, and expression-valued
//! geometric parameters evaluated against the run's bindings. Execution is
//! strictly sequential; a later operation may resolve any selection a
//! strictly earlier operation contributed to.

mod run;

pub use run::run_template;

use crate::backend::{BaseAnchor, BooleanKind, WorkPlane};
use crate::expr::Expr;
use crate::math::Vector3;

/// Primitive shape with expression-valued parameters.
#[derive(Debug, Clone)]
pub enum PrimitiveOp {
    Cylinder {
        pos: [Expr; 3],
        radius: Expr,
        height: Expr,
        axis: Vector3,
    },
    Sphere {
        pos: [Expr; 3],
        radius: Expr,
    },
    Cone {
        pos: [Expr; 3],
        axis: Vector3,
        semiaxes: [Expr; 2],
        height: Expr,
        ratio: Expr,
    },
    Rectangle {
        plane: WorkPlane,
        pos: [Expr; 2],
        size: [Expr; 2],
        base: BaseAnchor,
    },
    Circle {
        plane: WorkPlane,
        pos: [Expr; 2],
        radius: Expr,
    },
    Ellipse {
        plane: WorkPlane,
        pos: [Expr; 2],
        semiaxes: [Expr; 2],
    },
    Point {
        pos: [Expr; 3],
    },
    /// Path curve between two endpoints, used as a sweep spine.
    Curve {
        start: [Expr; 3],
        end: [Expr; 3],
    },
}

/// Sweep-family operation parameters.
#[derive(Debug, Clone)]
pub enum SweepOp {
    /// Revolution of a cross-section about the work plane axis.
    Revolve { angle_start: Expr, angle_end: Expr },
    Extrude { direction: Vector3, distance: Expr },
    /// Sweep along a path-curve selection; `direction_edge` names an edge
    /// selection fixing the sweep parameterization.
    Sweep {
        path: String,
        direction_edge: Option<String>,
    },
}

/// Transform operation parameters.
#[derive(Debug, Clone)]
pub enum TransformOp {
    Rotate {
        origin: [Expr; 3],
        axis: Vector3,
        angle: Expr,
    },
    Move {
        displacement: [Expr; 3],
    },
    Scale {
        origin: [Expr; 3],
        factor: [Expr; 3],
    },
}

/// One conditional branch: a guard expression over the bindings and the
/// nested block it protects.
#[derive(Debug, Clone)]
pub struct Branch {
    pub condition: Expr,
    pub ops: Vec<Operation>,
}

/// A single construction operation.
#[derive(Debug, Clone)]
pub enum Operation {
    Primitive {
        label: String,
        shape: PrimitiveOp,
        contribute_to: Option<String>,
    },
    Boolean {
        label: String,
        kind: BooleanKind,
        input: String,
        input2: String,
        contribute_to: Option<String>,
    },
    SweepLike {
        label: String,
        kind: SweepOp,
        input: String,
        contribute_to: Option<String>,
    },
    Transform {
        label: String,
        kind: TransformOp,
        input: String,
        contribute_to: Option<String>,
    },
    Partition {
        label: String,
        input: String,
        tool: String,
        contribute_to: Option<String>,
    },
    /// Rounds the corners of 2D cross-sections before they get extruded or
    /// swept. Replaces entity identities like a transform.
    Fillet {
        label: String,
        radius: Expr,
        input: String,
        contribute_to: Option<String>,
    },
    /// Removes live entities within a ball; prunes degenerate artifacts of
    /// earlier boolean/partition steps.
    Delete {
        label: String,
        center: [Expr; 3],
        radius: Expr,
    },
    /// Ordered `If`/`ElseIf` branches. The first branch whose condition is
    /// true executes; if none is true the whole block is skipped.
    Conditional {
        label: String,
        branches: Vec<Branch>,
    },
}

impl Operation {
    /// The operation's diagnostic label.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Operation::Primitive { label, .. }
            | Operation::Boolean { label, .. }
            | Operation::SweepLike { label, .. }
            | Operation::Transform { label, .. }
            | Operation::Partition { label, .. }
            | Operation::Fillet { label, .. }
            | Operation::Delete { label, .. }
            | Operation::Conditional { label, .. } => label,
        }
    }
}
