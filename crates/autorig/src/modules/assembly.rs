//! The shared rig root every module attaches into: the fixed group
//! hierarchy, the global/local placement controls and their scale and
//! display wiring.

use bevy::log::info;

use autorig_builtin_nodes::{DecomposeMatrix, NodeKind, Reverse, create_node};
use autorig_core::id::{NodeRef, SourcePlug, TargetPlug};
use autorig_core::scene::{AttrDef, Scene};

use crate::controls::{ControlHandle, create_control, lock_hide};
use crate::errors::BuildResult;
use crate::modules::ModuleSockets;
use crate::params::{ControlColor, ControlShape};

use bevy::transform::components::Transform;

/// The assembled rig hierarchy. One per scene; the group names are fixed.
#[derive(Debug)]
pub struct RigRoot {
    pub root: NodeRef,
    pub global_move: NodeRef,
    pub control_group: NodeRef,
    pub ik_group: NodeRef,
    pub bone_group: NodeRef,
    pub driver_group: NodeRef,
    pub geo_group: NodeRef,
    pub render_group: NodeRef,
    pub proxy_group: NodeRef,
    pub placement: NodeRef,
    pub global_control: ControlHandle,
    pub local_control: ControlHandle,
}

impl RigRoot {
    /// Attach a sealed module under the rig's control group.
    pub fn attach(&self, scene: &mut Scene, module: &ModuleSockets) -> BuildResult<()> {
        scene.reparent(module.root, Some(self.control_group), true)?;
        Ok(())
    }
}

pub fn assemble_rig_root(scene: &mut Scene, rig_name: &str) -> BuildResult<RigRoot> {
    info!("assembling rig root `{rig_name}`");
    let root = scene.create_transform(rig_name, None)?;
    let grp = |scene: &mut Scene, name: &str, parent: NodeRef| {
        scene.create_transform(format!("{name}_GRP"), Some(parent))
    };

    let global_move = grp(scene, "GLOBAL_MOVE", root)?;
    let ik_group = grp(scene, "IK", global_move)?;
    let control_group = grp(scene, "CTL", global_move)?;
    let joint_group = grp(scene, "JNT", global_move)?;
    let bone_group = grp(scene, "BONE", joint_group)?;
    let driver_group = grp(scene, "DRIVER", joint_group)?;

    let geo_group = grp(scene, "GEO", root)?;
    grp(scene, "EXTRAS", geo_group)?;
    let proxy_group = grp(scene, "ANIM_PROXY", geo_group)?;
    let render_group = grp(scene, "RENDER", geo_group)?;

    let misc = grp(scene, "MISC_NODES", root)?;
    grp(scene, "NODES_TO_SHOW", misc)?;
    grp(scene, "NODES_TO_HIDE", misc)?;
    grp(scene, "DELETE_BEFORE_PUBLISH", misc)?;

    let placement = grp(scene, "PLACEMENT", root)?;
    grp(scene, "SCRIPT_NODES", root)?;

    let deformer = grp(scene, "DEFORMER", root)?;
    let blendshapes = grp(scene, "BLENDSHAPES", deformer)?;
    grp(scene, "RIBBONS", blendshapes)?;
    grp(scene, "LIVE_SHAPES", blendshapes)?;
    grp(scene, "SHAPES_TO_DELETE", blendshapes)?;
    grp(scene, "NONSCALE_JNTS", deformer)?;
    grp(scene, "CUSTOM_SYSTEMS", deformer)?;
    grp(scene, "DEFORMER_HANDLE", deformer)?;

    // Placement controls: global quad arrow, local circle inside it.
    let global_control = create_control(
        scene,
        "Global_CTL",
        ControlShape::QuadArrow,
        ControlColor::Yellow,
        Some(placement),
        Transform::IDENTITY,
    )?;
    let local_control = create_control(
        scene,
        "Local_CTL",
        ControlShape::Circle,
        ControlColor::Orange,
        Some(global_control.node),
        Transform::IDENTITY,
    )?;

    // Everything under GLOBAL_MOVE follows the local control's world
    // matrix through one decompose.
    let decompose = create_node(scene, NodeKind::DecomposeMatrix, "GLOBAL")?;
    scene.connect(
        SourcePlug::new(local_control.node, "worldMatrix"),
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
            TargetPlug::new(global_move, target),
            false,
        )?;
    }

    // Uniform-scale attributes fan into the scale channels.
    scene.add_attribute(
        local_control.node,
        AttrDef::float("localScale").default_value(1.).min(0.01),
    )?;
    scene.add_attribute(
        global_control.node,
        AttrDef::float("globalScale").default_value(1.).min(0.01),
    )?;
    for axis in ["scaleX", "scaleY", "scaleZ"] {
        scene.connect(
            SourcePlug::new(local_control.node, "localScale"),
            TargetPlug::new(local_control.node, axis),
            false,
        )?;
        scene.connect(
            SourcePlug::new(global_control.node, "globalScale"),
            TargetPlug::new(global_control.node, axis),
            false,
        )?;
    }

    // Display toggles on the global control.
    scene.add_attribute(
        global_control.node,
        AttrDef::enumeration("geoSelectable", ["Normal", "Template", "Reference"])
            .default_value(2)
            .channel_box_only(),
    )?;
    scene.add_attribute(
        global_control.node,
        AttrDef::enumeration("geoVis", ["Proxy", "Render"])
            .default_value(1)
            .channel_box_only(),
    )?;
    scene.add_attribute(
        geo_group,
        AttrDef::enumeration("displayType", ["Normal", "Template", "Reference"])
            .default_value(2)
            .channel_box_only(),
    )?;
    scene.connect(
        SourcePlug::new(global_control.node, "geoSelectable"),
        TargetPlug::new(geo_group, "displayType"),
        false,
    )?;
    scene.connect(
        SourcePlug::new(global_control.node, "geoVis"),
        TargetPlug::new(render_group, "visibility"),
        false,
    )?;
    let vis_reverse = create_node(scene, NodeKind::Reverse, "Global_geoVis")?;
    scene.connect(
        SourcePlug::new(global_control.node, "geoVis"),
        TargetPlug::new(vis_reverse, Reverse::INPUT),
        false,
    )?;
    scene.connect(
        SourcePlug::new(vis_reverse, Reverse::OUTPUT),
        TargetPlug::new(proxy_group, "visibility"),
        false,
    )?;

    // Scale stays published through the attributes only.
    lock_hide(scene, local_control.node, &["sx", "sy", "sz", "v"])?;
    lock_hide(scene, global_control.node, &["sx", "sy", "sz", "v"])?;

    Ok(RigRoot {
        root,
        global_move,
        control_group,
        ik_group,
        bone_group,
        driver_group,
        geo_group,
        render_group,
        proxy_group,
        placement,
        global_control,
        local_control,
    })
}

#[cfg(test)]
mod tests {
    use bevy::math::Vec3;

    use super::*;
    use autorig_core::scene::Scene;

    #[test]
    fn scale_attributes_fan_into_channels() {
        let mut scene = Scene::new();
        let rig = assemble_rig_root(&mut scene, "biped").unwrap();
        scene
            .set_attr(rig.local_control.node, "localScale", 1.5)
            .unwrap();
        let scale = scene
            .eval_attr(rig.local_control.node, "scale")
            .unwrap()
            .as_vec3()
            .unwrap();
        assert!(scale.abs_diff_eq(Vec3::splat(1.5), 1e-6));

        // The minimum clamps authoring.
        scene
            .set_attr(rig.global_control.node, "globalScale", 0.)
            .unwrap();
        let clamped = scene
            .eval_attr(rig.global_control.node, "globalScale")
            .unwrap()
            .as_f32()
            .unwrap();
        assert!((clamped - 0.01).abs() < 1e-6);
    }

    #[test]
    fn global_move_follows_the_local_control() {
        let mut scene = Scene::new();
        let rig = assemble_rig_root(&mut scene, "biped").unwrap();
        scene
            .set_attr(rig.local_control.node, "translate", Vec3::new(2., 0., 1.))
            .unwrap();
        let moved = scene.world_transform(rig.global_move).unwrap().translation;
        assert!(moved.abs_diff_eq(Vec3::new(2., 0., 1.), 1e-5));
    }

    #[test]
    fn geo_visibility_toggles_between_proxy_and_render() {
        let mut scene = Scene::new();
        let rig = assemble_rig_root(&mut scene, "biped").unwrap();
        // Default: render visible, proxy hidden.
        assert!(
            scene
                .eval_attr(rig.render_group, "visibility")
                .unwrap()
                .as_bool()
                .unwrap()
        );
        assert!(
            !scene
                .eval_attr(rig.proxy_group, "visibility")
                .unwrap()
                .as_bool()
                .unwrap()
        );
        scene.set_attr(rig.global_control.node, "geoVis", 0).unwrap();
        assert!(
            !scene
                .eval_attr(rig.render_group, "visibility")
                .unwrap()
                .as_bool()
                .unwrap()
        );
        assert!(
            scene
                .eval_attr(rig.proxy_group, "visibility")
                .unwrap()
                .as_bool()
                .unwrap()
        );
    }
}
