use std::fmt;
use std::hash::{Hash, Hasher};

use uuid::Uuid;

/// Opaque handle to a scene node.
///
/// Handles are the only way later build stages refer to earlier output.
/// They stay valid across renames; a deleted node's handle simply stops
/// resolving.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeRef {
    id: Uuid,
}

impl NodeRef {
    pub(crate) fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Hash for NodeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let (hi, lo) = self.id.as_u64_pair();
        state.write_u64(hi ^ lo);
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = &self.id.simple().to_string()[..8];
        write!(f, "NodeRef({short})")
    }
}

/// Identifier of a pin within a node: a built-in channel (`translate`,
/// `rotateX`, `visibility`, ...), an operator port or a custom attribute.
pub type PinId = String;

/// Output side of a connection.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SourcePlug {
    pub node: NodeRef,
    pub pin: PinId,
}

impl SourcePlug {
    pub fn new(node: NodeRef, pin: impl Into<PinId>) -> Self {
        Self {
            node,
            pin: pin.into(),
        }
    }
}

impl fmt::Debug for SourcePlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}.{}", self.node, self.pin)
    }
}

/// Input side of a connection. A target may have at most one driver.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TargetPlug {
    pub node: NodeRef,
    pub pin: PinId,
}

impl TargetPlug {
    pub fn new(node: NodeRef, pin: impl Into<PinId>) -> Self {
        Self {
            node,
            pin: pin.into(),
        }
    }
}

impl fmt::Debug for TargetPlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}.{}", self.node, self.pin)
    }
}
