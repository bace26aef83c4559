//! Reverse-foot module: a rolled driver chain from heel to ankle, bank
//! pivots, single-chain handles for ball and toe, and a foot control
//! carrying the whole roll/swivel attribute bank.

use bevy::log::info;
use bevy::math::Vec3;
use bevy::transform::components::Transform;

use autorig_builtin_nodes::{AddScalar, Condition, NodeKind, create_node};
use autorig_core::id::{NodeRef, SourcePlug, TargetPlug};
use autorig_core::naming::suffix;
use autorig_core::scene::{AttrDef, ConstraintKind, IkSolver, Scene};

use crate::context::BuildContext;
use crate::controls::{
    ControlHandle, SCALE_AND_VIS, create_control, create_offset, lock_hide,
};
use crate::errors::BuildResult;
use crate::modules::{ModuleSockets, seal_module};
use crate::params::{ControlShape, FootParams};
use crate::topology::SegmentPlan;

/// Reverse chain parts, outside in, with canonical positions.
const REVERSE_PARTS: [(&str, Vec3); 6] = [
    ("bank_out", Vec3::new(2., 0., 0.)),
    ("bank_in", Vec3::new(-2., 0., 0.)),
    ("heel", Vec3::new(0., 0., -4.)),
    ("toe", Vec3::new(0., 0., 5.)),
    ("ball", Vec3::new(0., 1., 2.)),
    ("ankle", Vec3::new(0., 5., -3.)),
];

/// Keyable roll/swivel attribute bank, in channel-box order.
const ROLL_ATTRS: [&str; 9] = [
    "toeBend",
    "ballRoll",
    "toeRoll",
    "heelRoll",
    "ballSwivel",
    "toeSwivel",
    "heelSwivel",
    "footBank",
    "twistOffset",
];

#[derive(Debug)]
pub struct FootModule {
    pub params: FootParams,
    pub reverse_joints: Vec<NodeRef>,
    pub bind_joints: Vec<NodeRef>,
    pub control: ControlHandle,
    pub secondary: ControlHandle,
    pub sockets: ModuleSockets,
    created: Vec<NodeRef>,
}

impl FootModule {
    pub fn delete(self, scene: &mut Scene) -> autorig_core::errors::SceneResult<()> {
        for node in self.created.into_iter().rev() {
            if scene.node(node).is_ok() {
                scene.delete_node(node)?;
            }
        }
        Ok(())
    }
}

pub fn build_foot_module(scene: &mut Scene, params: &FootParams) -> BuildResult<FootModule> {
    let prefix = params.side.prefix();
    let module_name = format!("{prefix}_foot");
    let mut ctx = BuildContext::new(params.side, module_name.clone());
    info!("building foot module `{module_name}`");

    let module_root = scene.create_transform(ctx.scoped(suffix::MODULE), None)?;
    ctx.track(module_root);
    let mirror = ctx.side.mirror();

    // Reverse chain: bank pivots as plain transforms, the rest as joints,
    // each behind its own offset so the rolls read zero at rest.
    let reverse_group = scene.create_transform(ctx.scoped("rev_GRP"), Some(module_root))?;
    let mut prev = reverse_group;
    let mut reverse_joints = Vec::new();
    let mut bank_pivots = Vec::new();
    for (part, position) in REVERSE_PARTS {
        let position = Vec3::new(position.x * mirror, position.y, position.z);
        let bank = part.starts_with("bank");
        let node = if bank {
            let loc = scene.create_transform_at(
                format!("{prefix}_{part}_rev_{}", suffix::LOCATOR),
                Some(prev),
                Transform::from_translation(position),
            )?;
            lock_hide(
                scene,
                loc,
                &["tx", "ty", "tz", "rx", "ry", "sx", "sy", "sz", "v"],
            )?;
            bank_pivots.push(loc);
            loc
        } else {
            let joint =
                scene.create_joint(format!("{prefix}_{part}_rev_JNT"), position, Some(prev))?;
            reverse_joints.push(joint);
            joint
        };
        create_offset(scene, node, suffix::OFFSET)?;
        prev = node;
    }
    let [heel_rev, toe_rev, ball_rev, ankle_rev] = reverse_joints[..] else {
        unreachable!("reverse chain holds exactly four joints");
    };

    // Bind bones ankle-down, positioned off the reverse chain.
    let joint_group = scene.create_transform(ctx.scoped("JNT_GRP"), Some(module_root))?;
    let mut bind_joints = Vec::new();
    let mut prev = joint_group;
    for (part, rev) in [("ankle", ankle_rev), ("ball", ball_rev), ("toe", toe_rev)] {
        let world = scene.world_transform(rev)?.translation;
        let bone = scene.create_joint(
            format!("{prefix}_{part}_{}", suffix::BONE),
            world,
            Some(prev),
        )?;
        bind_joints.push(bone);
        prev = bone;
    }
    let [ankle_bone, ball_bone, toe_bone] = bind_joints[..] else {
        unreachable!("foot bind chain holds exactly three bones");
    };

    // The ankle rides the reverse ankle; its rotation comes from the ball
    // handle's aim, so the two never fight over a channel.
    scene.create_point_constraint(&[(ankle_rev, 1.)], ankle_bone, true, [false; 3])?;

    let ball_handle = scene.create_ik_handle(ankle_bone, ball_bone, IkSolver::SingleChain)?;
    scene.rename(ball_handle, format!("{prefix}_ball_{}", suffix::IK_HANDLE))?;
    scene.reparent(ball_handle, Some(ball_rev), true)?;

    let toe_bend = scene.create_transform_at(
        format!("{prefix}_toe_bend_{}", suffix::DRIVEN),
        Some(toe_rev),
        Transform::from_translation(scene.world_transform(ball_rev)?.translation),
    )?;
    let toe_handle = scene.create_ik_handle(ball_bone, toe_bone, IkSolver::SingleChain)?;
    scene.rename(toe_handle, format!("{prefix}_toe_{}", suffix::IK_HANDLE))?;
    scene.reparent(toe_handle, Some(toe_bend), true)?;

    // Foot control plus nested secondary.
    let control_group = scene.create_transform(ctx.scoped("CTL_GRP"), Some(module_root))?;
    let color = ctx.side.color();
    let ankle_world = scene.world_transform(ankle_bone)?;
    let mut control = create_control(
        scene,
        format!("{prefix}_foot_IK_{}", suffix::CONTROL),
        ControlShape::Box,
        color,
        None,
        Transform::from_translation(ankle_world.translation),
    )?;
    let secondary = create_control(
        scene,
        format!("{prefix}_foot_IK_{}", suffix::SECONDARY_CONTROL),
        ControlShape::Square,
        color,
        Some(control.node),
        Transform::IDENTITY,
    )?;
    let zero = create_offset(scene, control.node, suffix::ZERO)?;
    control.offset = zero;
    scene.reparent(zero, Some(control_group), true)?;
    lock_hide(scene, control.node, &SCALE_AND_VIS)?;
    lock_hide(scene, secondary.node, &SCALE_AND_VIS)?;

    scene.add_attribute(
        control.node,
        AttrDef::boolean("secondaryVisibility")
            .default_value(false)
            .channel_box_only(),
    )?;
    scene.add_attribute(
        control.node,
        AttrDef::boolean("reverseControlVisibility")
            .default_value(false)
            .channel_box_only(),
    )?;
    for attr in ROLL_ATTRS {
        scene.add_attribute(control.node, AttrDef::float(attr))?;
    }
    scene.add_attribute(control.node, AttrDef::float("upperLengthOffset"))?;
    scene.add_attribute(control.node, AttrDef::float("lowerLengthOffset"))?;
    scene.connect(
        SourcePlug::new(control.node, "secondaryVisibility"),
        TargetPlug::new(secondary.shape, "visibility"),
        false,
    )?;

    // Reverse controls for heel, toe and ball, with the roll/swivel sums
    // feeding the reverse joints.
    let reverse_ctl_group =
        scene.create_transform(format!("{prefix}_foot_rev_CTRL_GRP"), Some(control_group))?;
    scene.connect(
        SourcePlug::new(control.node, "reverseControlVisibility"),
        TargetPlug::new(reverse_ctl_group, "visibility"),
        false,
    )?;
    let mut parent_ctrl: Option<NodeRef> = None;
    for (part, rev) in [("heel", heel_rev), ("toe", toe_rev), ("ball", ball_rev)] {
        let world = scene.eval_world_transform(rev)?;
        let rev_ctrl = create_control(
            scene,
            format!("{prefix}_{part}_rev_{}", suffix::CONTROL),
            ControlShape::Circle,
            color,
            None,
            world,
        )?;
        let rev_zero = create_offset(scene, rev_ctrl.node, suffix::ZERO)?;
        scene.reparent(rev_zero, Some(parent_ctrl.unwrap_or(reverse_ctl_group)), true)?;
        lock_hide(scene, rev_ctrl.node, &SCALE_AND_VIS)?;

        let roll = create_node(scene, NodeKind::AddScalar, &format!("{prefix}_{part}_roll"))?;
        ctx.track(roll);
        scene.connect(
            SourcePlug::new(rev_ctrl.node, "rotateX"),
            TargetPlug::new(roll, AddScalar::INPUT_1),
            false,
        )?;
        scene.connect(
            SourcePlug::new(control.node, &format!("{part}Roll")),
            TargetPlug::new(roll, AddScalar::INPUT_2),
            false,
        )?;
        scene.connect(
            SourcePlug::new(roll, AddScalar::OUTPUT),
            TargetPlug::new(rev, "rotateX"),
            false,
        )?;

        let swivel =
            create_node(scene, NodeKind::AddScalar, &format!("{prefix}_{part}_swivel"))?;
        ctx.track(swivel);
        scene.connect(
            SourcePlug::new(rev_ctrl.node, "rotateY"),
            TargetPlug::new(swivel, AddScalar::INPUT_1),
            false,
        )?;
        scene.connect(
            SourcePlug::new(control.node, &format!("{part}Swivel")),
            TargetPlug::new(swivel, AddScalar::INPUT_2),
            false,
        )?;
        scene.connect(
            SourcePlug::new(swivel, AddScalar::OUTPUT),
            TargetPlug::new(rev, "rotateY"),
            false,
        )?;

        scene.connect(
            SourcePlug::new(rev_ctrl.node, "rotateZ"),
            TargetPlug::new(rev, "rotateZ"),
            false,
        )?;
        parent_ctrl = Some(rev_ctrl.node);
    }

    // Bank: positive values tip onto the inner pivot, negative onto the
    // outer one.
    let bank_in_cnd = create_node(scene, NodeKind::Condition, &format!("{prefix}_bank_in"))?;
    ctx.track(bank_in_cnd);
    scene.set_attr(bank_in_cnd, Condition::OPERATION, 3)?;
    let bank_out_cnd = create_node(scene, NodeKind::Condition, &format!("{prefix}_bank_out"))?;
    ctx.track(bank_out_cnd);
    scene.set_attr(bank_out_cnd, Condition::OPERATION, 4)?;
    for (cnd, pivot) in [(bank_in_cnd, bank_pivots[1]), (bank_out_cnd, bank_pivots[0])] {
        scene.connect(
            SourcePlug::new(control.node, "footBank"),
            TargetPlug::new(cnd, Condition::FIRST_TERM),
            false,
        )?;
        scene.connect(
            SourcePlug::new(control.node, "footBank"),
            TargetPlug::new(cnd, Condition::IF_TRUE),
            false,
        )?;
        scene.connect(
            SourcePlug::new(cnd, Condition::OUTPUT),
            TargetPlug::new(pivot, "rotateZ"),
            false,
        )?;
    }

    scene.connect(
        SourcePlug::new(control.node, "toeBend"),
        TargetPlug::new(toe_bend, "rotateX"),
        false,
    )?;

    if params.toes {
        build_toes(scene, &mut ctx, params, ball_bone, control.node, control_group)?;
    }

    let sockets = seal_module(
        scene,
        &mut ctx,
        module_root,
        &[reverse_group, joint_group, control_group],
        ankle_bone,
        toe_bone,
        control.node,
        None,
    )?;

    Ok(FootModule {
        params: params.clone(),
        reverse_joints,
        bind_joints,
        control,
        secondary,
        sockets,
        created: ctx.into_created(),
    })
}

/// Optional toe chains: bones under the ball, one FK control per segment,
/// and a curl attribute per segment on the foot control.
fn build_toes(
    scene: &mut Scene,
    ctx: &mut BuildContext,
    params: &FootParams,
    ball_bone: NodeRef,
    foot_control: NodeRef,
    control_group: NodeRef,
) -> BuildResult<()> {
    let plan = SegmentPlan::build_toes(params.toe_count, params.toe_segments, params.side)?;
    let prefix = params.side.prefix();
    let prefix_len = prefix.len() + 1;
    let ball_world = scene.world_transform(ball_bone)?.translation;

    let toe_ctl_group =
        scene.create_transform(format!("{prefix}_toe_CTRL_GRP"), Some(control_group))?;
    scene.create_weighted_constraint(
        ConstraintKind::Parent,
        &[(ball_bone, 1.)],
        toe_ctl_group,
        true,
    )?;

    scene.add_attribute(
        foot_control,
        AttrDef::enumeration("_", ["Toes"]).channel_box_only(),
    )?;

    let rows = plan.part_count() as f32;
    for (row, (_, segments)) in plan.parts().enumerate() {
        let mut prev_bone = ball_bone;
        let mut parent_ctrl = toe_ctl_group;
        for (i, segment) in segments.iter().enumerate() {
            let position = ball_world
                + Vec3::new(
                    (rows / 2. - row as f32) * params.side.mirror() * 0.5,
                    0.,
                    1. + i as f32,
                );
            let bone = scene.create_joint(
                format!("{segment}_{}", suffix::BONE),
                position,
                Some(prev_bone),
            )?;
            prev_bone = bone;
            if segment.ends_with("END") {
                continue;
            }

            let ctrl = create_control(
                scene,
                format!("{segment}_{}", suffix::CONTROL),
                params.toe_shape,
                params.side.color(),
                None,
                Transform::from_translation(position),
            )?;
            let driven = create_offset(scene, ctrl.node, suffix::DRIVEN)?;
            let outer = if params.offset_groups {
                create_offset(scene, driven, suffix::OFFSET)?
            } else {
                driven
            };
            let zero = create_offset(scene, outer, suffix::ZERO)?;
            scene.reparent(zero, Some(parent_ctrl), true)?;
            scene.create_weighted_constraint(
                ConstraintKind::Parent,
                &[(ctrl.node, 1.)],
                bone,
                true,
            )?;
            if params.limit_channels && i > 0 {
                lock_hide(
                    scene,
                    ctrl.node,
                    &["tx", "ty", "tz", "ry", "rz", "sx", "sy", "sz", "v"],
                )?;
            } else {
                lock_hide(scene, ctrl.node, &SCALE_AND_VIS)?;
            }
            parent_ctrl = ctrl.node;

            let attr_name = &segment[prefix_len..];
            scene.add_attribute(foot_control, AttrDef::float(attr_name))?;
            scene.connect(
                SourcePlug::new(foot_control, attr_name),
                TargetPlug::new(driven, "rotateX"),
                false,
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bank_splits_across_the_two_pivots() {
        let mut scene = Scene::new();
        let module = build_foot_module(&mut scene, &FootParams::default()).unwrap();
        let bank_in = scene.node_by_name("L_bank_in_rev_LOC").unwrap();
        let bank_out = scene.node_by_name("L_bank_out_rev_LOC").unwrap();

        scene.set_attr(module.control.node, "footBank", 20.).unwrap();
        assert!((scene.eval_attr(bank_in, "rotateZ").unwrap().as_f32().unwrap() - 20.).abs() < 1e-5);
        assert_eq!(scene.eval_attr(bank_out, "rotateZ").unwrap().as_f32().unwrap(), 0.);

        scene.set_attr(module.control.node, "footBank", -15.).unwrap();
        assert_eq!(scene.eval_attr(bank_in, "rotateZ").unwrap().as_f32().unwrap(), 0.);
        assert!(
            (scene.eval_attr(bank_out, "rotateZ").unwrap().as_f32().unwrap() + 15.).abs() < 1e-5
        );
    }

    #[test]
    fn rolls_sum_control_and_attribute() {
        let mut scene = Scene::new();
        let module = build_foot_module(&mut scene, &FootParams::default()).unwrap();
        let heel = scene.node_by_name("L_heel_rev_JNT").unwrap();
        let heel_ctrl = scene.node_by_name("L_heel_rev_CTRL").unwrap();

        scene.set_attr(module.control.node, "heelRoll", 10.).unwrap();
        scene.set_attr(heel_ctrl, "rotateX", 5.).unwrap();
        assert!((scene.eval_attr(heel, "rotateX").unwrap().as_f32().unwrap() - 15.).abs() < 1e-5);
    }

    #[test]
    fn toe_bend_drives_the_bend_group() {
        let mut scene = Scene::new();
        let module = build_foot_module(&mut scene, &FootParams::default()).unwrap();
        let bend = scene.node_by_name("L_toe_bend_SRT").unwrap();
        scene.set_attr(module.control.node, "toeBend", 12.).unwrap();
        assert!((scene.eval_attr(bend, "rotateX").unwrap().as_f32().unwrap() - 12.).abs() < 1e-5);
    }

    #[test]
    fn toes_build_with_curl_attributes() {
        let mut scene = Scene::new();
        let params = FootParams {
            toes: true,
            toe_count: 3,
            ..FootParams::default()
        };
        let module = build_foot_module(&mut scene, &params).unwrap();
        // One curl attribute per non-end toe segment.
        assert!(scene.attr(module.control.node, "toeA_01").is_ok());
        assert!(scene.attr(module.control.node, "toeC_01").is_ok());
        assert!(scene.attr(module.control.node, "toeA_END").is_err());
    }
}
