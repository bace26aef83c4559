use thiserror::Error;

use crate::data::DataSpec;
use crate::errors::GraphError;
use crate::id::{NodeRef, SourcePlug, TargetPlug};

/// Errors raised while mutating the scene graph.
///
/// Every variant is fatal to the stage that raised it; nothing here is
/// retried or downgraded, and partially created output is left for the
/// caller to discard.
#[non_exhaustive]
#[derive(Debug, Error, Clone)]
pub enum SceneError {
    #[error("a node named `{0}` already exists")]
    NameCollision(String),
    #[error("node `{node}` already has an attribute named `{attribute}`")]
    DuplicateAttribute { node: String, attribute: String },
    #[error("unknown node: {0:?}")]
    UnknownNode(NodeRef),
    #[error("no attribute or pin `{pin}` on node `{node}`")]
    UnknownPlug { node: String, pin: String },
    #[error("{target:?} is already driven by {existing:?}; pass force to rewire")]
    AlreadyDriven {
        target: TargetPlug,
        existing: SourcePlug,
    },
    #[error("{source_plug:?} and {target:?} have incompatible types ({from:?} -> {to:?})")]
    IncompatiblePinTypes {
        source_plug: SourcePlug,
        target: TargetPlug,
        from: DataSpec,
        to: DataSpec,
    },
    #[error("connecting {source_plug:?} to {target:?} would close a dataflow cycle")]
    ConnectionCycle {
        source_plug: SourcePlug,
        target: TargetPlug,
    },
    #[error("parenting `{child}` under `{parent}` would close a hierarchy cycle")]
    HierarchyCycle { child: String, parent: String },
    #[error("channel `{pin}` on `{node}` is locked")]
    LockedChannel { node: String, pin: String },
    #[error("attribute `{attribute}` on `{node}` expects {expected:?}, got {found:?}")]
    AttributeTypeMismatch {
        node: String,
        attribute: String,
        expected: DataSpec,
        found: DataSpec,
    },
    #[error("weighted point constraint weights must sum to 1.0, got {sum}")]
    UnnormalizedWeights { sum: f32 },
    #[error("a weighted constraint needs at least one driver")]
    NoDrivers,
    #[error("ik chain from `{start}` to `{end}` must run through exactly {expected} joints")]
    InvalidIkChain {
        start: String,
        end: String,
        expected: usize,
    },
    #[error("`{end}` is not a descendant of `{start}`")]
    NotADescendant { start: String, end: String },
    #[error(transparent)]
    Graph(#[from] GraphError),
}

pub type SceneResult<T> = Result<T, SceneError>;
