//! Per-build scratch state.

use autorig_core::id::NodeRef;

use crate::params::Side;

/// Stack-scoped state threaded through every stage of one build.
///
/// Holds the module naming scope and the ledger of top-level nodes the
/// build created (the module root, utility nodes and anything else without
/// a parent), so a finished module can be deleted cleanly and nested or
/// repeated builds cannot corrupt each other's bookkeeping.
#[derive(Debug)]
pub struct BuildContext {
    pub side: Side,
    module: String,
    created: Vec<NodeRef>,
}

impl BuildContext {
    pub fn new(side: Side, module: impl Into<String>) -> Self {
        Self {
            side,
            module: module.into(),
            created: Vec::new(),
        }
    }

    /// The module scope, e.g. `L_arm`.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// `{module}_{name}`.
    pub fn scoped(&self, name: &str) -> String {
        format!("{}_{name}", self.module)
    }

    /// Record a top-level node in the build ledger.
    pub fn track(&mut self, node: NodeRef) -> NodeRef {
        self.created.push(node);
        node
    }

    pub fn created(&self) -> &[NodeRef] {
        &self.created
    }

    pub(crate) fn into_created(self) -> Vec<NodeRef> {
        self.created
    }
}
