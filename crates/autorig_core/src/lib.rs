//! Core machinery for the autorig construction engine.
//!
//! This crate implements the collaborators every rig build runs against:
//!
//! - [`Scene`](scene::Scene): a DAG of named transform, joint, utility,
//!   constraint and IK-handle nodes with hierarchical parenting and
//!   world/local transform queries.
//! - A typed, lockable, connectable attribute store per node.
//! - Connection wiring between output and input plugs, with a
//!   single-driver-per-destination rule and cycle rejection at wiring time.
//! - Pull-based evaluation that resolves attribute values and world
//!   transforms through connections, utility operators, weighted constraints
//!   and IK solves.
//!
//! Higher layers never address scene contents by recomputed name strings:
//! every creation call returns an opaque [`NodeRef`](id::NodeRef), and names
//! exist as a debugging side channel.

pub mod data;
pub mod errors;
pub mod id;
pub mod naming;
pub mod operator;
pub mod scene;

pub mod prelude {
    pub use crate::data::{DataSpec, DataValue};
    pub use crate::errors::{
        ConfigError, GeometryError, GraphError, GraphResult, SceneError, SceneResult,
    };
    pub use crate::id::{NodeRef, PinId, SourcePlug, TargetPlug};
    pub use crate::operator::{OpContext, Operator};
    pub use crate::scene::{
        Attribute, AttrDef, ConstraintKind, IkSolver, Scene, SceneNode, SceneNodeKind,
        WorldTransform,
    };
}
