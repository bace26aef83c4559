//! The closed catalogue of dataflow computation nodes.
//!
//! Every kind the construction pipeline may wire lives in [`NodeKind`]; the
//! enum is the registry, so a kind that is not listed here cannot be
//! instantiated at all, and a kind addressed by an unknown string key fails
//! loudly at parse time. Node names are canonical `context_KIND`, e.g.
//! `L_arm_IKFK_REV`.

pub mod f32;
pub mod matrix;
pub mod vec3;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use autorig_core::errors::{ConfigError, SceneResult};
use autorig_core::id::NodeRef;
use autorig_core::operator::Operator;
use autorig_core::scene::Scene;

pub use crate::f32::{
    AddScalar, BlendTwo, Clamp, Condition, DivideScalar, MultiplyScalar, Reverse, SubtractScalar,
};
pub use crate::matrix::{ComposeMatrix, DecomposeMatrix, InverseMatrix, MultiplyMatrix};
pub use crate::vec3::{AddVec3, Distance, MultiplyVec3};

/// Catalogue of computation node kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    AddScalar,
    SubtractScalar,
    MultiplyScalar,
    DivideScalar,
    Reverse,
    Clamp,
    BlendTwo,
    Condition,
    Distance,
    AddVec3,
    MultiplyVec3,
    MultiplyMatrix,
    InverseMatrix,
    ComposeMatrix,
    DecomposeMatrix,
}

impl NodeKind {
    pub const ALL: [NodeKind; 15] = [
        NodeKind::AddScalar,
        NodeKind::SubtractScalar,
        NodeKind::MultiplyScalar,
        NodeKind::DivideScalar,
        NodeKind::Reverse,
        NodeKind::Clamp,
        NodeKind::BlendTwo,
        NodeKind::Condition,
        NodeKind::Distance,
        NodeKind::AddVec3,
        NodeKind::MultiplyVec3,
        NodeKind::MultiplyMatrix,
        NodeKind::InverseMatrix,
        NodeKind::ComposeMatrix,
        NodeKind::DecomposeMatrix,
    ];

    /// Canonical name suffix.
    pub fn tag(&self) -> &'static str {
        match self {
            NodeKind::AddScalar => "ADL",
            NodeKind::SubtractScalar => "SUB",
            NodeKind::MultiplyScalar => "MDL",
            NodeKind::DivideScalar => "DIV",
            NodeKind::Reverse => "REV",
            NodeKind::Clamp => "CLMP",
            NodeKind::BlendTwo => "BTA",
            NodeKind::Condition => "CND",
            NodeKind::Distance => "DIST",
            NodeKind::AddVec3 => "VAD",
            NodeKind::MultiplyVec3 => "VMD",
            NodeKind::MultiplyMatrix => "MM",
            NodeKind::InverseMatrix => "INVM",
            NodeKind::ComposeMatrix => "CMPM",
            NodeKind::DecomposeMatrix => "DCPM",
        }
    }

    pub fn instantiate(&self) -> Box<dyn Operator> {
        match self {
            NodeKind::AddScalar => Box::new(AddScalar::new()),
            NodeKind::SubtractScalar => Box::new(SubtractScalar::new()),
            NodeKind::MultiplyScalar => Box::new(MultiplyScalar::new()),
            NodeKind::DivideScalar => Box::new(DivideScalar::new()),
            NodeKind::Reverse => Box::new(Reverse::new()),
            NodeKind::Clamp => Box::new(Clamp::new()),
            NodeKind::BlendTwo => Box::new(BlendTwo::new()),
            NodeKind::Condition => Box::new(Condition::new()),
            NodeKind::Distance => Box::new(Distance::new()),
            NodeKind::AddVec3 => Box::new(AddVec3::new()),
            NodeKind::MultiplyVec3 => Box::new(MultiplyVec3::new()),
            NodeKind::MultiplyMatrix => Box::new(MultiplyMatrix::new()),
            NodeKind::InverseMatrix => Box::new(InverseMatrix::new()),
            NodeKind::ComposeMatrix => Box::new(ComposeMatrix::new()),
            NodeKind::DecomposeMatrix => Box::new(DecomposeMatrix::new()),
        }
    }
}

impl FromStr for NodeKind {
    type Err = ConfigError;

    /// Long and short keys both resolve, the way the old node dictionaries
    /// accepted either. Anything else is a configuration bug.
    fn from_str(key: &str) -> Result<Self, Self::Err> {
        match key {
            "addDoubleLinear" | "ADL" => Ok(NodeKind::AddScalar),
            "subtract" | "SUB" => Ok(NodeKind::SubtractScalar),
            "multDoubleLinear" | "MDL" => Ok(NodeKind::MultiplyScalar),
            "divide" | "DIV" => Ok(NodeKind::DivideScalar),
            "reverse" | "REV" => Ok(NodeKind::Reverse),
            "clamp" | "CLMP" => Ok(NodeKind::Clamp),
            "blendTwoAttr" | "BTA" => Ok(NodeKind::BlendTwo),
            "condition" | "CND" => Ok(NodeKind::Condition),
            "distanceBetween" | "DIST" => Ok(NodeKind::Distance),
            "addVector" | "VAD" => Ok(NodeKind::AddVec3),
            "multiplyVector" | "VMD" => Ok(NodeKind::MultiplyVec3),
            "multMatrix" | "MM" => Ok(NodeKind::MultiplyMatrix),
            "inverseMatrix" | "INVM" => Ok(NodeKind::InverseMatrix),
            "composeMatrix" | "CMPM" => Ok(NodeKind::ComposeMatrix),
            "decomposeMatrix" | "DCPM" => Ok(NodeKind::DecomposeMatrix),
            other => Err(ConfigError::UnknownNodeKind(other.to_string())),
        }
    }
}

/// Create a catalogue node named `{context}_{KIND}`.
pub fn create_node(scene: &mut Scene, kind: NodeKind, context: &str) -> SceneResult<NodeRef> {
    scene.create_utility(format!("{context}_{}", kind.tag()), kind.instantiate())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_match_instances() {
        for kind in NodeKind::ALL {
            assert_eq!(kind.instantiate().kind_tag(), kind.tag());
        }
    }

    #[test]
    fn keys_resolve_both_ways() {
        for kind in NodeKind::ALL {
            assert_eq!(kind.tag().parse::<NodeKind>().unwrap(), kind);
        }
        assert_eq!(
            "decomposeMatrix".parse::<NodeKind>().unwrap(),
            NodeKind::DecomposeMatrix
        );
    }

    #[test]
    fn unknown_kind_fails_loudly() {
        assert!(matches!(
            "loft".parse::<NodeKind>(),
            Err(ConfigError::UnknownNodeKind(_))
        ));
    }

    #[test]
    fn canonical_node_naming() {
        let mut scene = Scene::new();
        let rev = create_node(&mut scene, NodeKind::Reverse, "L_arm_IKFK").unwrap();
        assert_eq!(scene.name_of(rev).unwrap(), "L_arm_IKFK_REV");
    }
}
