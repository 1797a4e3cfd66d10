use thiserror::Error;

use crate::selection::EntityKind;

/// Top-level error type for the partforge assembly builder.
#[derive(Debug, Error)]
pub enum PartforgeError {
    #[error(transparent)]
    Expr(#[from] ExprError),

    #[error(transparent)]
    Param(#[from] ParamError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors produced while parsing or evaluating parameter expressions.
#[derive(Debug, Error)]
pub enum ExprError {
    #[error("parse error at offset {offset} in {source_text:?}: {message}")]
    Parse {
        source_text: String,
        offset: usize,
        message: String,
    },

    #[error("unknown unit [{0}]")]
    UnknownUnit(String),

    #[error("unknown function {0:?}")]
    UnknownFunction(String),

    #[error("{func} takes {expected} argument(s), got {found}")]
    BadArity {
        func: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("unit mismatch: {context} ({left} vs {right})")]
    UnitMismatch {
        context: &'static str,
        left: String,
        right: String,
    },
}

/// Errors from the expression parameter store.
#[derive(Debug, Error)]
pub enum ParamError {
    #[error("parameter {name:?} already defined in group {group:?}")]
    DuplicateParameter { group: String, name: String },

    #[error("unresolved reference to {name:?}")]
    UnresolvedReference { name: String },

    #[error("cyclic parameter dependency: {path}")]
    CyclicDependency { path: String },
}

/// Errors from the named selection registry.
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("selection {name:?} holds {expected:?} entities, contribution is {found:?}")]
    KindMismatch {
        name: String,
        expected: EntityKind,
        found: EntityKind,
    },

    #[error("unknown selection {name:?}")]
    UnknownSelection { name: String },
}

/// Errors raised while running a construction graph or placing an instance.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("operand selection {selection:?} of {operation:?} resolved to zero live entities")]
    EmptyOperand {
        operation: String,
        selection: String,
    },

    #[error("{name:?} is not a declared input of template {template:?}")]
    UnknownInput { template: String, name: String },

    #[error("unknown template {0:?}")]
    UnknownTemplate(String),

    #[error("template {template:?} already registered")]
    DuplicateTemplate { template: String },

    #[error("selection label {label:?} already declared in template {template:?}")]
    DuplicateSelectionLabel { template: String, label: String },

    #[error("instance label {label:?} already used in this assembly")]
    DuplicateInstanceLabel { label: String },

    #[error("template {template:?}, operation {label:?} (#{index}): {source}")]
    OperationFailed {
        template: String,
        label: String,
        index: usize,
        #[source]
        source: Box<PartforgeError>,
    },

    #[error("instance {instance:?} of {template:?}: {source}")]
    PlacementFailed {
        instance: String,
        template: String,
        #[source]
        source: Box<PartforgeError>,
    },
}

/// Errors surfaced by a geometry backend implementation.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("stale entity handle")]
    StaleHandle,

    #[error("degenerate geometry: {0}")]
    Degenerate(String),

    #[error("nothing to mesh")]
    NothingToMesh,

    #[error("no mesh available for the study")]
    NoMesh,
}

/// Errors from device-family configuration data.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("device family {family:?}: {source}")]
    Apply {
        family: String,
        #[source]
        source: Box<PartforgeError>,
    },

    #[error("malformed device family description: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Convenience type alias for results using [`PartforgeError`].
pub type Result<T> = std::result::Result<T, PartforgeError>;
