//! # Autorig
//!
//! Procedural skeletal-rig construction. From a flat parameter record this
//! crate builds a complete animatable module into a
//! [`Scene`](autorig_core::scene::Scene):
//!
//! 1. A [`SegmentPlan`](topology::SegmentPlan) names every segment of the
//!    module up front, deterministically.
//! 2. [`place_guides`](guides::place_guides) lays out placement transforms;
//!    interior guides ride weighted blends of their bracketing pivots and
//!    the pole-vector guide is solved geometrically.
//! 3. [`build_skeleton`](skeleton::build_skeleton) instantiates one
//!    canonical pose as three parallel chains (bind, FK driver, IK driver).
//! 4. [`build_limb_controls`](controls::build_limb_controls) wraps the
//!    drivers in offset-parented controls and an IK handle.
//! 5. [`wire_ikfk_blend`](blend::wire_ikfk_blend) ties the chains together
//!    under a single normalized `IKFK` switch and distributes twist.
//! 6. [`seal_module`](modules::seal_module) hides all of it behind an input
//!    socket, an output socket and one attribute surface.
//!
//! Entry points exist per module kind: [`build_limb`](modules::build_limb),
//! [`build_finger_module`](modules::build_finger_module),
//! [`build_foot_module`](modules::build_foot_module),
//! [`build_spine_module`](modules::build_spine_module) and
//! [`build_clavicle_module`](modules::build_clavicle_module), plus
//! [`assemble_rig_root`](modules::assemble_rig_root) for the shared rig
//! hierarchy the modules attach into.
//!
//! Builds are synchronous, single threaded and not idempotent: rebuilding
//! into a scene that still holds the previous output raises a naming
//! collision instead of reusing nodes.

pub mod blend;
pub mod context;
pub mod controls;
pub mod errors;
pub mod guides;
pub mod modules;
pub mod params;
pub mod skeleton;
pub mod topology;

pub mod prelude {
    pub use autorig_core::prelude::*;

    pub use crate::blend::{BlendNetwork, wire_ikfk_blend};
    pub use crate::context::BuildContext;
    pub use crate::controls::{ControlHandle, ControlSet, create_control, create_offset};
    pub use crate::errors::{BuildError, BuildResult};
    pub use crate::guides::{GuideRole, GuideSet, place_guides};
    pub use crate::modules::{
        ModuleSockets, assemble_rig_root, build_clavicle_module, build_finger_module,
        build_foot_module, build_limb, build_spine_module, connect_modules, seal_module,
    };
    pub use crate::params::{
        ClavicleParams, ControlColor, ControlShape, FingerParams, FootParams, LimbKind,
        LimbParams, Side, SpineParams,
    };
    pub use crate::skeleton::{ChainRole, JointChain, build_skeleton};
    pub use crate::topology::SegmentPlan;
}
