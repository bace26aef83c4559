use bevy::transform::components::Transform;
use serde::{Deserialize, Serialize};

use crate::id::NodeRef;

/// Which channels a weighted constraint drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// Translation blend.
    Point,
    /// Rotation blend.
    Orient,
    /// Translation and rotation blend.
    Parent,
}

impl ConstraintKind {
    pub(crate) fn tag(&self) -> &'static str {
        match self {
            ConstraintKind::Point => "pointCNS",
            ConstraintKind::Orient => "orientCNS",
            ConstraintKind::Parent => "parentCNS",
        }
    }

    pub(crate) fn drives_translate(&self) -> bool {
        matches!(self, ConstraintKind::Point | ConstraintKind::Parent)
    }

    pub(crate) fn drives_rotate(&self) -> bool {
        matches!(self, ConstraintKind::Orient | ConstraintKind::Parent)
    }
}

#[derive(Clone, Debug)]
pub struct ConstraintDriver {
    pub node: NodeRef,
    /// Captured at creation when offsets are maintained:
    /// `driver_world⁻¹ * driven_world`.
    pub offset: Option<Transform>,
}

/// N drivers blending into one driven node.
///
/// Per-driver weights live as `weight0..weightN-1` attributes on the
/// constraint node, so the blend ratio is drivable like any other channel.
/// The constraint's outputs are wired into the driven node's channels at
/// creation; evaluation happens in the driven node's parent space.
#[derive(Clone, Debug)]
pub struct WeightedConstraint {
    pub kind: ConstraintKind,
    pub driven: NodeRef,
    pub drivers: Vec<ConstraintDriver>,
    pub maintain_offset: bool,
    /// Axes held at the rest value instead of the blend (point only).
    pub skip_axes: [bool; 3],
    /// Driven local transform at creation; holds when all weights are zero
    /// and fills the channels the kind does not drive.
    pub rest: Transform,
}

impl WeightedConstraint {
    pub const OUT_TRANSLATE: &'static str = "constraintTranslate";
    pub const OUT_ROTATE: &'static str = "constraintRotate";

    pub fn weight_attr(index: usize) -> String {
        format!("weight{index}")
    }
}
