//! Spine module: parallel IK/FK driver chains over the planned spine
//! segments, a COG control publishing the switch, and per-joint weighted
//! blends onto the bind chain.
//!
//! The original deformer stack (lofted ribbon, skin, blend shapes) is
//! deformation and stays out; the bind spine blends through the same
//! constraint triples a limb uses.

use bevy::log::info;
use bevy::math::Vec3;
use bevy::transform::components::Transform;

use autorig_builtin_nodes::{MultiplyScalar, NodeKind, Reverse, create_node};
use autorig_core::id::{NodeRef, SourcePlug, TargetPlug};
use autorig_core::naming::{self, suffix};
use autorig_core::scene::{AttrDef, ConstraintKind, Scene};

use crate::context::BuildContext;
use crate::controls::{
    ControlHandle, SCALE_AND_VIS, create_control, create_offset, lock_hide,
};
use crate::errors::BuildResult;
use crate::modules::{ModuleSockets, seal_module};
use crate::params::{ControlShape, SpineParams};
use crate::topology::SegmentPlan;

/// Canonical spine column, pelvis up, tip last.
const SPINE_POSITIONS: [Vec3; 6] = [
    Vec3::new(0., 10., 0.),
    Vec3::new(0., 11., 0.),
    Vec3::new(0., 12., -0.25),
    Vec3::new(0., 13., -0.5),
    Vec3::new(0., 14., -0.5),
    Vec3::new(0., 15., -0.5),
];

#[derive(Debug)]
pub struct SpineModule {
    pub params: SpineParams,
    pub plan: SegmentPlan,
    pub bind_joints: Vec<NodeRef>,
    pub cog_control: ControlHandle,
    pub reverse: NodeRef,
    pub sockets: ModuleSockets,
    created: Vec<NodeRef>,
}

impl SpineModule {
    pub fn switch(&self) -> SourcePlug {
        SourcePlug::new(self.sockets.surface, "spineIKFK")
    }

    pub fn delete(self, scene: &mut Scene) -> autorig_core::errors::SceneResult<()> {
        for node in self.created.into_iter().rev() {
            if scene.node(node).is_ok() {
                scene.delete_node(node)?;
            }
        }
        Ok(())
    }
}

pub fn build_spine_module(scene: &mut Scene, params: &SpineParams) -> BuildResult<SpineModule> {
    let prefix = params.side.prefix();
    let module_name = format!("{prefix}_spine");
    let plan = SegmentPlan::build_spine(SPINE_POSITIONS.len() as u32 - 1, params.side)?;
    let mut ctx = BuildContext::new(params.side, module_name.clone());
    info!("building spine module `{module_name}`");

    let module_root = scene.create_transform(ctx.scoped(suffix::MODULE), None)?;
    ctx.track(module_root);

    // Guides, chained pelvis to tip, one per planned segment.
    let guide_group = scene.create_transform(ctx.scoped("guide_GRP"), Some(module_root))?;
    let segments: Vec<String> = plan.segments().cloned().collect();
    let mut guide_positions = Vec::new();
    let mut prev = guide_group;
    for (segment, position) in segments.iter().zip(&SPINE_POSITIONS) {
        let guide = scene.create_transform_at(
            naming::with_suffix(segment, suffix::LOCATOR),
            Some(prev),
            Transform::from_translation(*position),
        )?;
        guide_positions.push(scene.world_transform(guide)?.translation);
        prev = guide;
    }

    // Bind chain plus the two driver chains, one joint per planned
    // segment, sharing the guide pose. Driver chains stop short of the
    // tip.
    let joint_group = scene.create_transform(ctx.scoped("JNT_GRP"), Some(module_root))?;
    let chain = |scene: &mut Scene, driver: bool, suffix_str: &str, count: usize| {
        let mut joints = Vec::new();
        let mut prev = joint_group;
        for (segment, position) in segments.iter().zip(&guide_positions).take(count) {
            let base = if driver {
                naming::swap_suffix(segment, "spine", "spine_driver")
            } else {
                segment.clone()
            };
            let joint = scene.create_joint(
                naming::with_suffix(&base, suffix_str),
                *position,
                Some(prev),
            )?;
            joints.push(joint);
            prev = joint;
        }
        Ok::<_, crate::errors::BuildError>(joints)
    };
    let bind_joints = chain(scene, false, suffix::BONE, SPINE_POSITIONS.len())?;
    let ik_joints = chain(scene, true, suffix::IK_JOINT, SPINE_POSITIONS.len() - 1)?;
    let fk_joints = chain(scene, true, suffix::FK_JOINT, SPINE_POSITIONS.len() - 1)?;

    // Anchor driver joints: pelvis and hips at the base, a chest pair at
    // the top of the column.
    let chest_position = (guide_positions[3] + guide_positions[4]) / 2.;
    let pelvis_joint = scene.create_joint(
        format!("{prefix}_pelvis_JNT"),
        guide_positions[0],
        Some(joint_group),
    )?;
    let hips_joint = scene.create_joint(
        format!("{prefix}_hips_JNT"),
        guide_positions[0],
        Some(joint_group),
    )?;
    let chest_ik_joint = scene.create_joint(
        format!("{prefix}_chest_IK_JNT"),
        chest_position,
        Some(joint_group),
    )?;
    let chest_fk_joint = scene.create_joint(
        format!("{prefix}_chest_FK_JNT"),
        chest_position,
        Some(joint_group),
    )?;
    scene.delete_node(guide_group)?;

    // COG control with nested secondary: the module's attribute surface.
    let control_group = scene.create_transform(ctx.scoped("CTL_GRP"), Some(module_root))?;
    let cog_secondary_name = format!("{prefix}_COG_{}", suffix::SECONDARY_CONTROL);
    let mut cog = create_control(
        scene,
        format!("{prefix}_COG_{}", suffix::CONTROL),
        ControlShape::Box,
        params.primary_color,
        None,
        Transform::from_translation(guide_positions[0]),
    )?;
    let cog_secondary = create_control(
        scene,
        cog_secondary_name,
        ControlShape::Box,
        params.primary_color,
        Some(cog.node),
        Transform::IDENTITY,
    )?;
    let cog_zero = create_offset(scene, cog.node, suffix::ZERO)?;
    cog.offset = cog_zero;
    scene.reparent(cog_zero, Some(control_group), true)?;
    lock_hide(scene, cog.node, &SCALE_AND_VIS)?;
    lock_hide(scene, cog_secondary.node, &SCALE_AND_VIS)?;

    scene.add_attribute(
        cog.node,
        AttrDef::boolean("secondaryVisibility")
            .default_value(false)
            .channel_box_only(),
    )?;
    scene.add_attribute(
        cog.node,
        AttrDef::boolean("spineControlVisibility")
            .default_value(true)
            .channel_box_only(),
    )?;
    scene.add_attribute(cog.node, AttrDef::float("spineIKFK").range(0., 1.))?;
    scene.connect(
        SourcePlug::new(cog.node, "secondaryVisibility"),
        TargetPlug::new(cog_secondary.shape, "visibility"),
        false,
    )?;

    // Anchor controls.
    let mut anchor_controls = Vec::new();
    for (label, shape, joint) in [
        ("pelvis", params.fk_shape, pelvis_joint),
        ("hips", params.fk_shape, hips_joint),
        ("chest_IK", params.ik_shape, chest_ik_joint),
        ("chest_FK", params.fk_shape, chest_fk_joint),
    ] {
        let world = scene.eval_world_transform(joint)?;
        let mut ctrl = create_control(
            scene,
            format!("{prefix}_{label}_{}", suffix::CONTROL),
            shape,
            params.primary_color,
            None,
            world,
        )?;
        let zero = create_offset(scene, ctrl.node, suffix::ZERO)?;
        create_offset(scene, ctrl.node, suffix::OFFSET)?;
        ctrl.offset = zero;
        scene.reparent(zero, Some(cog_secondary.node), true)?;
        scene.create_weighted_constraint(
            ConstraintKind::Parent,
            &[(ctrl.node, 1.)],
            joint,
            true,
        )?;
        lock_hide(scene, ctrl.node, &SCALE_AND_VIS)?;
        anchor_controls.push(ctrl);
    }
    let pelvis_ctrl = &anchor_controls[0];
    let chest_ik_ctrl = &anchor_controls[2];
    let chest_fk_ctrl = &anchor_controls[3];

    // Chain roots follow the pelvis; the top driver joints follow their
    // chest anchor.
    for root in [ik_joints[0], fk_joints[0]] {
        scene.create_weighted_constraint(
            ConstraintKind::Parent,
            &[(pelvis_ctrl.node, 1.)],
            root,
            true,
        )?;
    }
    for (joint, anchor) in [
        (ik_joints[3], chest_ik_joint),
        (ik_joints[4], chest_ik_joint),
        (fk_joints[3], chest_fk_joint),
        (fk_joints[4], chest_fk_joint),
    ] {
        scene.create_weighted_constraint(ConstraintKind::Parent, &[(anchor, 1.)], joint, true)?;
    }

    // Mid-column controls: IK octagons (the middle one half-follows the
    // chest) and an FK chain.
    let mut spine_shape_nodes: Vec<(NodeRef, bool)> = Vec::new();
    for (i, joint) in ik_joints.iter().enumerate().take(3).skip(1) {
        let joint_name = scene.name_of(*joint)?.to_string();
        let world = scene.eval_world_transform(*joint)?;
        let ctrl = create_control(
            scene,
            naming::swap_suffix(&joint_name, "JNT", "CTRL"),
            params.ik_shape,
            params.secondary_color,
            None,
            world,
        )?;
        let zero = create_offset(scene, ctrl.node, suffix::ZERO)?;
        scene.reparent(zero, Some(pelvis_ctrl.node), true)?;
        scene.create_weighted_constraint(
            ConstraintKind::Parent,
            &[(ctrl.node, 1.)],
            *joint,
            false,
        )?;
        lock_hide(scene, ctrl.node, &SCALE_AND_VIS)?;
        if i == 2 {
            scene.create_weighted_constraint(
                ConstraintKind::Parent,
                &[(pelvis_ctrl.node, 0.5), (chest_ik_ctrl.node, 0.5)],
                zero,
                true,
            )?;
        }
        spine_shape_nodes.push((ctrl.shape, true));
    }
    let mut fk_parent = pelvis_ctrl.node;
    let mut last_fk_ctrl = None;
    for joint in fk_joints.iter().take(3).skip(1) {
        let joint_name = scene.name_of(*joint)?.to_string();
        let world = scene.eval_world_transform(*joint)?;
        let ctrl = create_control(
            scene,
            naming::swap_suffix(&joint_name, "JNT", "CTRL"),
            params.fk_shape,
            params.primary_color,
            None,
            world,
        )?;
        let zero = create_offset(scene, ctrl.node, suffix::ZERO)?;
        scene.reparent(zero, Some(fk_parent), true)?;
        scene.create_weighted_constraint(
            ConstraintKind::Parent,
            &[(ctrl.node, 1.)],
            *joint,
            false,
        )?;
        lock_hide(scene, ctrl.node, &SCALE_AND_VIS)?;
        spine_shape_nodes.push((ctrl.shape, false));
        fk_parent = ctrl.node;
        last_fk_ctrl = Some(ctrl.node);
    }
    // Chest controls slot into their chains: IK under the COG secondary
    // (already there), FK at the top of the FK run.
    if let Some(last_fk) = last_fk_ctrl {
        scene.reparent(chest_fk_ctrl.offset, Some(last_fk), true)?;
    }

    // One reverse node complements the switch for weights and visibility.
    let reverse = create_node(scene, NodeKind::Reverse, &ctx.scoped("spineIKFK"))?;
    ctx.track(reverse);
    scene.connect(
        SourcePlug::new(cog.node, "spineIKFK"),
        TargetPlug::new(reverse, Reverse::INPUT),
        false,
    )?;

    for ((fk, ik), bind) in fk_joints.iter().zip(&ik_joints).zip(&bind_joints) {
        let cns = scene.create_weighted_constraint(
            ConstraintKind::Parent,
            &[(*fk, 1.), (*ik, 0.)],
            *bind,
            false,
        )?;
        scene.connect(
            SourcePlug::new(reverse, Reverse::OUTPUT),
            TargetPlug::new(cns, autorig_core::scene::WeightedConstraint::weight_attr(0)),
            false,
        )?;
        scene.connect(
            SourcePlug::new(cog.node, "spineIKFK"),
            TargetPlug::new(cns, autorig_core::scene::WeightedConstraint::weight_attr(1)),
            false,
        )?;
    }

    // Per-shape visibility factors, gated by the control-visibility
    // toggle; the chest shapes read the raw signals.
    for (shape, is_ik) in &spine_shape_nodes {
        let shape_name = scene.name_of(*shape)?.to_string();
        let factor = create_node(scene, NodeKind::MultiplyScalar, &shape_name)?;
        ctx.track(factor);
        scene.connect(
            SourcePlug::new(cog.node, "spineControlVisibility"),
            TargetPlug::new(factor, MultiplyScalar::INPUT_1),
            false,
        )?;
        let signal = if *is_ik {
            SourcePlug::new(cog.node, "spineIKFK")
        } else {
            SourcePlug::new(reverse, Reverse::OUTPUT)
        };
        scene.connect(signal, TargetPlug::new(factor, MultiplyScalar::INPUT_2), false)?;
        scene.connect(
            SourcePlug::new(factor, MultiplyScalar::OUTPUT),
            TargetPlug::new(*shape, "visibility"),
            false,
        )?;
    }
    scene.connect(
        SourcePlug::new(cog.node, "spineIKFK"),
        TargetPlug::new(chest_ik_ctrl.shape, "visibility"),
        false,
    )?;
    scene.connect(
        SourcePlug::new(reverse, Reverse::OUTPUT),
        TargetPlug::new(chest_fk_ctrl.shape, "visibility"),
        false,
    )?;

    let sockets = seal_module(
        scene,
        &mut ctx,
        module_root,
        &[joint_group, control_group],
        bind_joints[0],
        *bind_joints.last().expect("spine chain is never empty"),
        cog.node,
        Some("spineIKFK"),
    )?;

    Ok(SpineModule {
        params: params.clone(),
        plan,
        bind_joints,
        cog_control: cog,
        reverse,
        sockets,
        created: ctx.into_created(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use autorig_core::scene::WeightedConstraint;

    #[test]
    fn spine_switch_weights_complement() {
        let mut scene = Scene::new();
        let module = build_spine_module(&mut scene, &SpineParams::default()).unwrap();
        scene
            .set_attr(module.sockets.surface, "spineIKFK", 0.25)
            .unwrap();
        for (i, bind) in module.bind_joints.iter().enumerate().take(5) {
            let cns = scene
                .children_of(*bind)
                .unwrap()
                .iter()
                .copied()
                .find(|c| {
                    matches!(
                        scene.node(*c).unwrap().kind,
                        autorig_core::scene::SceneNodeKind::Constraint(_)
                    )
                })
                .unwrap_or_else(|| panic!("bind joint {i} has a blend constraint"));
            let w_fk = scene
                .eval_attr(cns, &WeightedConstraint::weight_attr(0))
                .unwrap()
                .as_f32()
                .unwrap();
            let w_ik = scene
                .eval_attr(cns, &WeightedConstraint::weight_attr(1))
                .unwrap()
                .as_f32()
                .unwrap();
            assert!((w_fk - 0.75).abs() < 1e-6);
            assert!((w_ik - 0.25).abs() < 1e-6);
        }
    }

    #[test]
    fn chest_shapes_read_the_raw_signals() {
        let mut scene = Scene::new();
        let module = build_spine_module(&mut scene, &SpineParams::default()).unwrap();
        let chest_ik_shape = scene.node_by_name("C_chest_IK_CTRLShape").unwrap();
        let chest_fk_shape = scene.node_by_name("C_chest_FK_CTRLShape").unwrap();

        scene.set_attr(module.sockets.surface, "spineIKFK", 1.).unwrap();
        assert!(
            scene
                .eval_attr(chest_ik_shape, "visibility")
                .unwrap()
                .as_bool()
                .unwrap()
        );
        assert!(
            !scene
                .eval_attr(chest_fk_shape, "visibility")
                .unwrap()
                .as_bool()
                .unwrap()
        );
    }
}
