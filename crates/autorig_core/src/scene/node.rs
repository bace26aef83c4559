use bevy::platform::collections::HashSet;
use bevy::transform::components::Transform;
use indexmap::IndexMap;

use crate::id::NodeRef;
use crate::operator::Operator;
use crate::scene::attribute::Attribute;
use crate::scene::constraint::WeightedConstraint;
use crate::scene::ik::IkHandle;

/// What a scene node is, beyond its transform and attributes.
#[derive(Clone, Debug)]
pub enum SceneNodeKind {
    /// Plain transform: groups, guides, controls, offsets, sockets.
    Transform,
    /// Skeletal transform belonging to exactly one chain.
    Joint,
    /// A dataflow computation node. Utility nodes carry no transform
    /// channels; their pins are the operator's ports plus custom attributes.
    Utility(Box<dyn Operator>),
    Constraint(WeightedConstraint),
    IkHandle(IkHandle),
}

impl SceneNodeKind {
    pub fn is_joint(&self) -> bool {
        matches!(self, SceneNodeKind::Joint)
    }

    /// Utility nodes are pure dependency-graph nodes; everything else sits
    /// in the transform hierarchy.
    pub fn has_transform(&self) -> bool {
        !matches!(self, SceneNodeKind::Utility(_))
    }
}

#[derive(Clone, Debug)]
pub struct SceneNode {
    pub id: NodeRef,
    pub name: String,
    pub(crate) parent: Option<NodeRef>,
    pub(crate) children: Vec<NodeRef>,
    /// Authored local transform. Driven channels override this at
    /// evaluation time; the stored value doubles as the rest pose.
    pub(crate) local: Transform,
    pub kind: SceneNodeKind,
    pub(crate) attributes: IndexMap<String, Attribute>,
    /// Transform channels refused for authoring and wiring.
    pub(crate) locked_channels: HashSet<String>,
    /// Transform channels hidden from the channel box.
    pub(crate) hidden_channels: HashSet<String>,
}

impl SceneNode {
    pub fn parent(&self) -> Option<NodeRef> {
        self.parent
    }

    pub fn children(&self) -> &[NodeRef] {
        &self.children
    }

    pub fn local_transform(&self) -> Transform {
        self.local
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn channel_locked(&self, pin: &str) -> bool {
        self.locked_channels.contains(pin)
    }

    pub fn channel_hidden(&self, pin: &str) -> bool {
        self.hidden_channels.contains(pin)
    }
}

/// Short channel keys, the granularity at which channels lock and hide.
pub const CHANNEL_KEYS: [(&str, &str); 10] = [
    ("tx", "translateX"),
    ("ty", "translateY"),
    ("tz", "translateZ"),
    ("rx", "rotateX"),
    ("ry", "rotateY"),
    ("rz", "rotateZ"),
    ("sx", "scaleX"),
    ("sy", "scaleY"),
    ("sz", "scaleZ"),
    ("v", "visibility"),
];

/// Resolve a short channel key (`"tx"`) to its pin name.
pub fn channel_pin(key: &str) -> Option<&'static str> {
    CHANNEL_KEYS
        .iter()
        .find(|(short, _)| *short == key)
        .map(|(_, pin)| *pin)
}

/// Split a component pin (`"rotateX"`) into its compound pin and axis.
pub(crate) fn component_of(pin: &str) -> Option<(&'static str, usize)> {
    let (compound, axis) = match pin {
        "translateX" => ("translate", 0),
        "translateY" => ("translate", 1),
        "translateZ" => ("translate", 2),
        "rotateX" => ("rotate", 0),
        "rotateY" => ("rotate", 1),
        "rotateZ" => ("rotate", 2),
        "scaleX" => ("scale", 0),
        "scaleY" => ("scale", 1),
        "scaleZ" => ("scale", 2),
        _ => return None,
    };
    Some((compound, axis))
}

pub(crate) fn is_compound_channel(pin: &str) -> bool {
    matches!(pin, "translate" | "rotate" | "scale")
}

pub(crate) fn component_pins_of(compound: &str) -> Option<[&'static str; 3]> {
    match compound {
        "translate" => Some(["translateX", "translateY", "translateZ"]),
        "rotate" => Some(["rotateX", "rotateY", "rotateZ"]),
        "scale" => Some(["scaleX", "scaleY", "scaleZ"]),
        _ => None,
    }
}
