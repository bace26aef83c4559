//! Module facades and the per-kind entry points.
//!
//! A sealed module exposes exactly two transform sockets and one attribute
//! surface. Full-body assembly attaches, detaches and drives a module
//! through those alone; nothing outside this crate touches the internals.

pub mod assembly;
pub mod clavicle;
pub mod finger;
pub mod foot;
pub mod limb;
pub mod spine;

pub use assembly::{RigRoot, assemble_rig_root};
pub use clavicle::{ClavicleModule, build_clavicle_module};
pub use finger::{FingerModule, build_finger_module};
pub use foot::{FootModule, build_foot_module};
pub use limb::{LimbModule, build_limb};
pub use spine::{SpineModule, build_spine_module};

use autorig_builtin_nodes::{DecomposeMatrix, NodeKind, create_node};
use autorig_core::id::{NodeRef, SourcePlug, TargetPlug};
use autorig_core::scene::Scene;

use crate::context::BuildContext;
use crate::errors::BuildResult;

/// The sealed surface of one module.
///
/// Socket and attribute names are plain identifiers so an assembly layer
/// can address them without holding handles, but the handles are the
/// canonical references.
#[derive(Clone, Debug)]
pub struct ModuleSockets {
    pub root: NodeRef,
    /// Rigid anchor: the module's joint and control groups live under it,
    /// so whatever drives the input carries the whole limb.
    pub input: NodeRef,
    /// Mirrors the end bind joint's world transform through a decompose
    /// node.
    pub output: NodeRef,
    /// The control carrying the module's published attributes.
    pub surface: NodeRef,
    pub input_name: String,
    pub output_name: String,
    pub surface_name: String,
    pub switch_attr: Option<String>,
}

/// Seal a module behind its two sockets and attribute surface.
pub fn seal_module(
    scene: &mut Scene,
    ctx: &mut BuildContext,
    module_root: NodeRef,
    anchors: &[NodeRef],
    root_bind: NodeRef,
    end_bind: NodeRef,
    surface: NodeRef,
    switch_attr: Option<&str>,
) -> BuildResult<ModuleSockets> {
    let input_name = ctx.scoped("input_MOD");
    let root_world = scene.eval_world_transform(root_bind)?;
    let input = scene.create_transform_at(input_name.clone(), Some(module_root), root_world)?;
    for anchor in anchors {
        scene.reparent(*anchor, Some(input), true)?;
    }

    let output_name = ctx.scoped("output_MOD");
    let output = scene.create_transform(output_name.clone(), Some(module_root))?;
    let decompose = create_node(scene, NodeKind::DecomposeMatrix, &ctx.scoped("output"))?;
    ctx.track(decompose);
    scene.connect(
        SourcePlug::new(end_bind, "worldMatrix"),
        TargetPlug::new(decompose, DecomposeMatrix::INPUT),
        false,
    )?;
    for (source, target) in [
        (DecomposeMatrix::OUTPUT_TRANSLATE, "translate"),
        (DecomposeMatrix::OUTPUT_ROTATE, "rotate"),
        (DecomposeMatrix::OUTPUT_SCALE, "scale"),
    ] {
        scene.connect(
            SourcePlug::new(decompose, source),
            TargetPlug::new(output, target),
            false,
        )?;
    }

    let surface_name = scene.name_of(surface)?.to_string();
    Ok(ModuleSockets {
        root: module_root,
        input,
        output,
        surface,
        input_name,
        output_name,
        surface_name,
        switch_attr: switch_attr.map(str::to_string),
    })
}

/// Wire an upstream module's output socket into a downstream module's
/// input socket, channel for channel.
pub fn connect_modules(
    scene: &mut Scene,
    upstream: &ModuleSockets,
    downstream: &ModuleSockets,
) -> BuildResult<()> {
    for pin in ["translate", "rotate", "scale"] {
        scene.connect(
            SourcePlug::new(upstream.output, pin),
            TargetPlug::new(downstream.input, pin),
            true,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ClavicleParams, LimbParams};

    #[test]
    fn modules_chain_output_to_input() {
        let mut scene = Scene::new();
        let clavicle = build_clavicle_module(&mut scene, &ClavicleParams::default()).unwrap();
        let arm = build_limb(&mut scene, &LimbParams::default()).unwrap();

        connect_modules(&mut scene, &clavicle.sockets, &arm.sockets).unwrap();
        let upstream = scene
            .eval_attr(clavicle.sockets.output, "translate")
            .unwrap()
            .as_vec3()
            .unwrap();
        let downstream = scene
            .eval_attr(arm.sockets.input, "translate")
            .unwrap()
            .as_vec3()
            .unwrap();
        assert!(upstream.abs_diff_eq(downstream, 1e-5));
    }

    #[test]
    fn socket_names_are_plain_identifiers() {
        let mut scene = Scene::new();
        let arm = build_limb(&mut scene, &LimbParams::default()).unwrap();
        assert_eq!(arm.sockets.input_name, "L_arm_input_MOD");
        assert_eq!(arm.sockets.output_name, "L_arm_output_MOD");
        assert_eq!(arm.sockets.switch_attr.as_deref(), Some("IKFK"));
        assert_eq!(
            scene.node_by_name(&arm.sockets.input_name),
            Some(arm.sockets.input)
        );
    }

    #[test]
    fn rig_root_hosts_modules() {
        let mut scene = Scene::new();
        let rig = assemble_rig_root(&mut scene, "biped").unwrap();
        let arm = build_limb(&mut scene, &LimbParams::default()).unwrap();
        rig.attach(&mut scene, &arm.sockets).unwrap();
        assert_eq!(
            scene.parent_of(arm.sockets.root).unwrap(),
            Some(rig.control_group)
        );
    }
}
