//! Hand/fingers module: per-finger FK chains under one hand control that
//! carries the curl, spread and offset automation.

use bevy::log::info;
use bevy::math::{Quat, Vec3};
use bevy::transform::components::Transform;

use autorig_builtin_nodes::{AddScalar, Condition, MultiplyScalar, NodeKind, create_node};
use autorig_core::id::{NodeRef, SourcePlug, TargetPlug};
use autorig_core::naming::{self, suffix};
use autorig_core::scene::{AttrDef, ConstraintKind, Scene};

use crate::context::BuildContext;
use crate::controls::{ALL_CHANNELS, ControlHandle, SCALE_AND_VIS, create_control, create_offset, lock_hide};
use crate::errors::BuildResult;
use crate::modules::{ModuleSockets, seal_module};
use crate::params::FingerParams;
use crate::topology::SegmentPlan;

const HAND_POSITION: Vec3 = Vec3::new(11., 17., 0.);

/// Per-segment bookkeeping the wiring pass needs.
struct SegmentControl {
    segment: String,
    /// Driven group between the zero and the control; automation lands
    /// here so it never fights hand-keyed values.
    driven: NodeRef,
    zero: NodeRef,
    base: bool,
}

#[derive(Debug)]
pub struct FingerModule {
    pub params: FingerParams,
    pub plan: SegmentPlan,
    pub hand_joint: NodeRef,
    pub hand_control: ControlHandle,
    pub sockets: ModuleSockets,
    created: Vec<NodeRef>,
}

impl FingerModule {
    pub fn delete(self, scene: &mut Scene) -> autorig_core::errors::SceneResult<()> {
        for node in self.created.into_iter().rev() {
            if scene.node(node).is_ok() {
                scene.delete_node(node)?;
            }
        }
        Ok(())
    }
}

pub fn build_finger_module(
    scene: &mut Scene,
    params: &FingerParams,
) -> BuildResult<FingerModule> {
    let plan = SegmentPlan::build_fingers(
        params.finger_count,
        params.thumb,
        params.segment_count,
        params.side,
    )?;
    let module_name = format!("{}_hand", params.side.prefix());
    let mut ctx = BuildContext::new(params.side, module_name.clone());
    info!("building hand module `{module_name}`");

    let module_root = scene.create_transform(ctx.scoped(suffix::MODULE), None)?;
    ctx.track(module_root);

    // Guides: one chain per finger hanging off the hand locator.
    let guide_group = scene.create_transform(ctx.scoped("guide_GRP"), Some(module_root))?;
    let mirror = ctx.side.mirror();
    let hand_position = Vec3::new(HAND_POSITION.x * mirror, HAND_POSITION.y, HAND_POSITION.z);
    let hand_guide = scene.create_transform_at(
        format!("{module_name}_{}", suffix::LOCATOR),
        Some(guide_group),
        Transform::from_translation(hand_position),
    )?;

    let finger_rows = plan.part_count() as f32;
    for (row, (part, segments)) in plan.parts().enumerate() {
        let thumb = part == "thumb";
        let mut prev = hand_guide;
        for (i, segment) in segments.iter().enumerate() {
            let local = if i == 0 {
                if thumb {
                    Transform {
                        translation: Vec3::new(0., 0., finger_rows / 2. + 0.5),
                        rotation: Quat::from_rotation_y((-45f32 * mirror).to_radians()),
                        ..Default::default()
                    }
                } else {
                    Transform::from_translation(Vec3::new(
                        1.,
                        0.,
                        finger_rows / 2. - 1. - row as f32,
                    ))
                }
            } else {
                Transform::from_translation(Vec3::X)
            };
            let guide = scene.create_transform(
                naming::with_suffix(segment, suffix::LOCATOR),
                Some(prev),
            )?;
            scene.set_local_transform(
                guide,
                Some(local.translation),
                Some(local.rotation),
                None,
            )?;
            prev = guide;
        }
    }

    // Bones from the guides, then the guides go away.
    let joint_group = scene.create_transform(ctx.scoped("JNT_GRP"), Some(module_root))?;
    let hand_joint = scene.create_joint(
        format!("{module_name}_{}", suffix::BONE),
        hand_position,
        Some(joint_group),
    )?;
    let mut bones: Vec<(String, NodeRef)> = Vec::new();
    for (_, segments) in plan.parts() {
        let mut prev = hand_joint;
        let mut prev_rot = Quat::IDENTITY;
        for segment in segments {
            let guide = scene
                .node_by_name(&naming::with_suffix(segment, suffix::LOCATOR))
                .ok_or_else(|| {
                    autorig_core::errors::ConfigError::MissingInput(format!(
                        "guide for segment `{segment}`"
                    ))
                })?;
            let world = scene.world_transform(guide)?;
            let bone = scene.create_joint(
                naming::with_suffix(segment, suffix::BONE),
                world.translation,
                Some(prev),
            )?;
            let local_rot = (prev_rot.inverse() * world.rotation).normalize();
            scene.set_local_transform(bone, None, Some(local_rot), None)?;
            bones.push((segment.clone(), bone));
            prev = bone;
            prev_rot = world.rotation;
        }
    }
    scene.delete_node(guide_group)?;

    // Segment controls: control under driven group under zero, chained
    // down each finger.
    let control_group = scene.create_transform(ctx.scoped("CTL_GRP"), Some(module_root))?;
    let color = ctx.side.color();
    let mut segment_controls: Vec<SegmentControl> = Vec::new();
    for (_, segments) in plan.parts() {
        let mut parent_control: Option<NodeRef> = None;
        for (i, segment) in segments.iter().enumerate() {
            if segment.ends_with("END") {
                continue;
            }
            let bone = bones
                .iter()
                .find(|(s, _)| s == segment)
                .map(|(_, b)| *b)
                .expect("every non-end segment has a bone");
            let world = scene.eval_world_transform(bone)?;
            let control = create_control(
                scene,
                naming::with_suffix(segment, suffix::CONTROL),
                params.shape,
                color,
                None,
                world,
            )?;
            let driven = create_offset(scene, control.node, suffix::DRIVEN)?;
            let outer = if params.offset_groups {
                create_offset(scene, driven, suffix::OFFSET)?
            } else {
                driven
            };
            let zero = create_offset(scene, outer, suffix::ZERO)?;
            scene.reparent(zero, Some(parent_control.unwrap_or(control_group)), true)?;

            scene.create_weighted_constraint(
                ConstraintKind::Parent,
                &[(control.node, 1.)],
                bone,
                true,
            )?;
            if params.limit_channels && i > 0 {
                // In-between knuckles curl only.
                lock_hide(
                    scene,
                    control.node,
                    &["tx", "ty", "tz", "rx", "ry", "sx", "sy", "sz", "v"],
                )?;
            } else {
                lock_hide(scene, control.node, &SCALE_AND_VIS)?;
            }

            parent_control = Some(control.node);
            segment_controls.push(SegmentControl {
                segment: segment.clone(),
                driven,
                zero,
                base: i == 0,
            });
        }
    }

    // The hand control: pure attribute surface, every channel locked.
    let hand_world = scene.eval_world_transform(hand_joint)?;
    let hand_control = create_control(
        scene,
        format!("{module_name}_{}", suffix::CONTROL),
        params.hand_shape,
        color,
        Some(control_group),
        hand_world,
    )?;
    lock_hide(scene, hand_control.node, &ALL_CHANNELS)?;

    let hand = hand_control.node;
    scene.add_attribute(hand, AttrDef::float("IKFK").range(0., 1.).default_value(1.))?;
    scene.add_attribute(hand, AttrDef::float("spread").range(-10., 10.))?;
    scene.add_attribute(hand, AttrDef::float("masterRotation"))?;
    scene.add_attribute(hand, AttrDef::float("offset"))?;
    scene.add_attribute(
        hand,
        AttrDef::enumeration("offsetFavor", ["Inner", "Outer"])
            .default_value(1)
            .channel_box_only(),
    )?;
    let prefix_len = params.side.prefix().len() + 1;
    for sc in &segment_controls {
        scene.add_attribute(hand, AttrDef::float(&sc.segment[prefix_len..]))?;
    }
    for (part, _) in plan.parts() {
        scene.add_attribute(
            hand,
            AttrDef::boolean(format!("{part}_Vis"))
                .default_value(true)
                .channel_box_only(),
        )?;
    }

    // Automation network: per finger a favor condition scaling the shared
    // offset, per segment a sum of master + offset + its own attribute.
    let mut offset_factor = 0.;
    let mut reverse_factor = plan.part_count() as f32 - 2.;
    let mut finger_index = 0u32;
    let non_thumb = plan
        .parts()
        .filter(|(p, _)| *p != "thumb")
        .count()
        .max(1) as f32;
    for (part, segments) in plan.parts() {
        let thumb = part == "thumb";
        let finger_scope = format!("{}_{part}", params.side.prefix());
        let mut offset_mdl = None;
        if !thumb {
            let cnd = create_node(scene, NodeKind::Condition, &finger_scope)?;
            ctx.track(cnd);
            scene.set_attr(cnd, Condition::IF_TRUE, offset_factor)?;
            scene.set_attr(cnd, Condition::IF_FALSE, reverse_factor)?;
            scene.set_attr(cnd, Condition::SECOND_TERM, 0.)?;
            scene.set_attr(cnd, Condition::OPERATION, 1)?;
            scene.connect(
                SourcePlug::new(hand, "offsetFavor"),
                TargetPlug::new(cnd, Condition::FIRST_TERM),
                false,
            )?;

            let mdl = create_node(scene, NodeKind::MultiplyScalar, &finger_scope)?;
            ctx.track(mdl);
            scene.connect(
                SourcePlug::new(hand, "offset"),
                TargetPlug::new(mdl, MultiplyScalar::INPUT_1),
                false,
            )?;
            scene.connect(
                SourcePlug::new(cnd, Condition::OUTPUT),
                TargetPlug::new(mdl, MultiplyScalar::INPUT_2),
                false,
            )?;
            offset_mdl = Some(mdl);

            // Spread fans the fingers apart around the middle of the hand.
            let spread_mdl =
                create_node(scene, NodeKind::MultiplyScalar, &format!("{finger_scope}_spread"))?;
            ctx.track(spread_mdl);
            let spread_span = (non_thumb - 1.).max(1.);
            scene.set_attr(
                spread_mdl,
                MultiplyScalar::INPUT_2,
                1. - 2. * finger_index as f32 / spread_span,
            )?;
            scene.connect(
                SourcePlug::new(hand, "spread"),
                TargetPlug::new(spread_mdl, MultiplyScalar::INPUT_1),
                false,
            )?;
            if let Some(base) = segment_controls
                .iter()
                .find(|sc| sc.base && segments.contains(&sc.segment))
            {
                scene.connect(
                    SourcePlug::new(spread_mdl, MultiplyScalar::OUTPUT),
                    TargetPlug::new(base.driven, "rotateY"),
                    false,
                )?;
            }
            finger_index += 1;
        }

        for sc in segment_controls
            .iter()
            .filter(|sc| segments.contains(&sc.segment))
        {
            let attr_name = &sc.segment[prefix_len..];
            if thumb {
                scene.connect(
                    SourcePlug::new(hand, attr_name),
                    TargetPlug::new(sc.driven, "rotateZ"),
                    false,
                )?;
            } else if let Some(mdl) = offset_mdl {
                let sum_a = create_node(scene, NodeKind::AddScalar, &sc.segment)?;
                ctx.track(sum_a);
                scene.connect(
                    SourcePlug::new(hand, "masterRotation"),
                    TargetPlug::new(sum_a, AddScalar::INPUT_1),
                    false,
                )?;
                scene.connect(
                    SourcePlug::new(mdl, MultiplyScalar::OUTPUT),
                    TargetPlug::new(sum_a, AddScalar::INPUT_2),
                    false,
                )?;
                let sum_b =
                    create_node(scene, NodeKind::AddScalar, &format!("{}_offset", sc.segment))?;
                ctx.track(sum_b);
                scene.connect(
                    SourcePlug::new(sum_a, AddScalar::OUTPUT),
                    TargetPlug::new(sum_b, AddScalar::INPUT_1),
                    false,
                )?;
                scene.connect(
                    SourcePlug::new(hand, attr_name),
                    TargetPlug::new(sum_b, AddScalar::INPUT_2),
                    false,
                )?;
                scene.connect(
                    SourcePlug::new(sum_b, AddScalar::OUTPUT),
                    TargetPlug::new(sc.driven, "rotateZ"),
                    false,
                )?;
            }
        }

        // Per-finger visibility gates the base zero group.
        if let Some(base) = segment_controls
            .iter()
            .find(|sc| sc.base && segments.contains(&sc.segment))
        {
            scene.connect(
                SourcePlug::new(hand, &format!("{part}_Vis")),
                TargetPlug::new(base.zero, "visibility"),
                false,
            )?;
        }

        offset_factor += 1.;
        reverse_factor -= 1.;
    }

    let sockets = seal_module(
        scene,
        &mut ctx,
        module_root,
        &[joint_group, control_group],
        hand_joint,
        hand_joint,
        hand,
        Some("IKFK"),
    )?;

    Ok(FingerModule {
        params: params.clone(),
        plan,
        hand_joint,
        hand_control,
        sockets,
        created: ctx.into_created(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn built() -> (Scene, FingerModule) {
        let mut scene = Scene::new();
        let module = build_finger_module(&mut scene, &FingerParams::default()).unwrap();
        (scene, module)
    }

    #[test]
    fn hand_publishes_the_expected_surface() {
        let (scene, module) = built();
        let hand = module.hand_control.node;
        for attr in ["IKFK", "spread", "masterRotation", "offset", "offsetFavor"] {
            assert!(scene.attr(hand, attr).is_ok(), "missing {attr}");
        }
        assert!(scene.attr(hand, "fingerA_01").is_ok());
        assert!(scene.attr(hand, "thumb_01").is_ok());
        assert!(scene.attr(hand, "fingerA_Vis").is_ok());
        // Ends never get curl attributes.
        assert!(scene.attr(hand, "fingerA_END").is_err());
    }

    #[test]
    fn master_rotation_curls_every_nonthumb_segment() {
        let (mut scene, module) = built();
        scene
            .set_attr(module.hand_control.node, "masterRotation", 25.)
            .unwrap();
        let driven = scene.node_by_name("L_fingerB_02_CTRL_SRT").unwrap();
        let value = scene.eval_attr(driven, "rotateZ").unwrap().as_f32().unwrap();
        assert!((value - 25.).abs() < 1e-5);

        // The thumb only listens to its own attributes.
        let thumb_driven = scene.node_by_name("L_thumb_01_CTRL_SRT").unwrap();
        assert_eq!(
            scene.eval_attr(thumb_driven, "rotateZ").unwrap().as_f32().unwrap(),
            0.
        );
        scene.set_attr(module.hand_control.node, "thumb_01", 10.).unwrap();
        assert!(
            (scene.eval_attr(thumb_driven, "rotateZ").unwrap().as_f32().unwrap() - 10.).abs()
                < 1e-5
        );
    }

    #[test]
    fn offset_favor_staggers_the_fingers() {
        let (mut scene, module) = built();
        let hand = module.hand_control.node;
        scene.set_attr(hand, "offset", 10.).unwrap();

        // Favor Outer (enum 1): finger A gets the zero factor.
        let first = scene.node_by_name("L_fingerA_01_CTRL_SRT").unwrap();
        let last = scene.node_by_name("L_fingerD_01_CTRL_SRT").unwrap();
        assert_eq!(scene.eval_attr(first, "rotateZ").unwrap().as_f32().unwrap(), 0.);
        assert!(scene.eval_attr(last, "rotateZ").unwrap().as_f32().unwrap() > 0.);

        // Favor Inner flips the stagger.
        scene.set_attr(hand, "offsetFavor", 0).unwrap();
        assert!(scene.eval_attr(first, "rotateZ").unwrap().as_f32().unwrap() > 0.);
    }

    #[test]
    fn finger_visibility_gates_the_chain_root() {
        let (mut scene, module) = built();
        let zero = scene.node_by_name("L_fingerA_01_CTRL_SRT_ZERO").unwrap();
        assert!(scene.eval_attr(zero, "visibility").unwrap().as_bool().unwrap());
        scene
            .set_attr(module.hand_control.node, "fingerA_Vis", false)
            .unwrap();
        assert!(!scene.eval_attr(zero, "visibility").unwrap().as_bool().unwrap());
    }
}
