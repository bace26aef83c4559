//! The limb pipeline: plan, guides, chains, controls, blend, seal.

use bevy::log::info;

use autorig_core::errors::SceneResult;
use autorig_core::id::{NodeRef, SourcePlug, TargetPlug};
use autorig_core::naming::suffix;
use autorig_core::scene::{AttrDef, Scene};

use crate::blend::{BlendNetwork, wire_control_visibility, wire_ikfk_blend, wire_twist};
use crate::context::BuildContext;
use crate::controls::{ControlSet, build_limb_controls};
use crate::errors::BuildResult;
use crate::guides::place_guides;
use crate::modules::{ModuleSockets, seal_module};
use crate::params::LimbParams;
use crate::skeleton::{InteriorBone, Skeleton, build_skeleton};
use crate::topology::SegmentPlan;

/// A fully built, sealed limb.
#[derive(Debug)]
pub struct LimbModule {
    pub params: LimbParams,
    pub plan: SegmentPlan,
    pub skeleton: Skeleton,
    pub controls: ControlSet,
    pub network: BlendNetwork,
    pub sockets: ModuleSockets,
    created: Vec<NodeRef>,
}

impl LimbModule {
    /// The single normalized switch plug the whole limb hangs off.
    pub fn switch(&self) -> SourcePlug {
        SourcePlug::new(self.sockets.surface, "IKFK")
    }

    /// Tear the module out of the scene, ledger-driven. The scene is left
    /// exactly as if the build had never run.
    pub fn delete(self, scene: &mut Scene) -> SceneResult<()> {
        for node in self.created.into_iter().rev() {
            if scene.node(node).is_ok() {
                scene.delete_node(node)?;
            }
        }
        Ok(())
    }
}

/// Build a complete arm or leg from a flat parameter record.
///
/// Not idempotent: building into a scene that still holds a previous
/// build's nodes raises a naming collision rather than reusing them.
pub fn build_limb(scene: &mut Scene, params: &LimbParams) -> BuildResult<LimbModule> {
    let plan = SegmentPlan::build_limb(params.kind, params.extra_joints, params.side)?;
    let module_name = format!("{}_{}", params.side.prefix(), params.kind.key());
    let mut ctx = BuildContext::new(params.side, module_name.clone());
    info!("building limb module `{module_name}`");

    let module_root = scene.create_transform(ctx.scoped(suffix::MODULE), None)?;
    ctx.track(module_root);

    let guides = place_guides(scene, &mut ctx, &plan, params.kind, module_root)?;
    let skeleton = build_skeleton(scene, &mut ctx, &plan, &guides, module_root)?;

    // Guides are read for placement, then dropped; they never persist in
    // the finished rig.
    let pole_position = scene.world_transform(guides.pole.node)?.translation;
    let pole_base = guides.pole.segment.clone();
    scene.delete_node(guides.group)?;

    let controls = build_limb_controls(
        scene,
        &mut ctx,
        &skeleton.fk,
        &skeleton.ik,
        &pole_base,
        pole_position,
        params,
        module_root,
    )?;

    // Attribute surface: the IK end control publishes the module.
    let surface = controls.ik_primary.node;
    scene.add_attribute(surface, AttrDef::float("IKFK").range(0., 1.))?;
    scene.add_attribute(
        surface,
        AttrDef::float("twistFactor").default_value(1.),
    )?;
    scene.add_attribute(
        surface,
        AttrDef::boolean("controlVisibility")
            .default_value(true)
            .channel_box_only(),
    )?;
    scene.add_attribute(
        surface,
        AttrDef::boolean("secondaryVisibility")
            .default_value(false)
            .channel_box_only(),
    )?;
    for shape in controls.secondary_shapes() {
        scene.connect(
            SourcePlug::new(surface, "secondaryVisibility"),
            TargetPlug::new(shape, "visibility"),
            false,
        )?;
    }

    let switch = SourcePlug::new(surface, "IKFK");
    let core = wire_ikfk_blend(
        scene,
        &mut ctx,
        &switch,
        &skeleton.fk,
        &skeleton.ik,
        &skeleton.bind,
    )?;
    let (fk_vis, ik_vis) = wire_control_visibility(
        scene,
        &mut ctx,
        &switch,
        core.reverse,
        &SourcePlug::new(surface, "controlVisibility"),
        &controls.fk_shapes(),
        &controls.ik_shapes(),
    )?;

    // Twist rides the part adjacent to the end pivot, sourced from the end
    // bind joint's roll.
    let twist = if params.auto_twist {
        let twist_part = plan.part_count().saturating_sub(2);
        let twist_bones: Vec<InteriorBone> = skeleton
            .interiors
            .iter()
            .filter(|b| b.part_index == twist_part)
            .cloned()
            .collect();
        wire_twist(
            scene,
            &mut ctx,
            skeleton.bind.end(),
            &SourcePlug::new(surface, "twistFactor"),
            &twist_bones,
        )?
    } else {
        None
    };
    let network = BlendNetwork {
        core,
        fk_vis,
        ik_vis,
        twist,
    };

    let sockets = seal_module(
        scene,
        &mut ctx,
        module_root,
        &[skeleton.group, controls.group],
        skeleton.bind.root(),
        skeleton.bind.end(),
        surface,
        Some("IKFK"),
    )?;

    Ok(LimbModule {
        params: params.clone(),
        plan,
        skeleton,
        controls,
        network,
        sockets,
        created: ctx.into_created(),
    })
}

#[cfg(test)]
mod tests {
    use bevy::math::Vec3;

    use autorig_core::scene::WeightedConstraint;

    use super::*;
    use crate::errors::BuildError;
    use crate::params::{LimbKind, Side};

    fn built(params: &LimbParams) -> (Scene, LimbModule) {
        let mut scene = Scene::new();
        let module = build_limb(&mut scene, params).unwrap();
        (scene, module)
    }

    fn blend_weights(scene: &Scene, cns: NodeRef) -> (f32, f32) {
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
        (w_fk, w_ik)
    }

    #[test]
    fn switch_weights_always_complement() {
        let (mut scene, module) = built(&LimbParams::default());
        for value in [0., 0.3, 0.5, 1.] {
            scene
                .set_attr(module.sockets.surface, "IKFK", value)
                .unwrap();
            for cns in &module.network.core.constraints {
                let (w_fk, w_ik) = blend_weights(&scene, *cns);
                assert!((w_ik - value).abs() < 1e-6);
                assert!((w_fk - (1. - value)).abs() < 1e-6);
                assert!((w_fk + w_ik - 1.).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn facade_output_matches_end_bind_at_build_time() {
        let (scene, module) = built(&LimbParams::default());
        let out = scene
            .world_transform(module.sockets.output)
            .unwrap();
        let end = scene
            .world_transform(module.skeleton.bind.end())
            .unwrap();
        assert!(out.translation.abs_diff_eq(end.translation, 1e-3));
        // Same rotation up to quaternion sign.
        assert!(out.rotation.dot(end.rotation).abs() > 0.9999);
    }

    #[test]
    fn chains_share_the_bind_pose() {
        let (scene, module) = built(&LimbParams::default());
        for ((fk, ik), bind) in module
            .skeleton
            .fk
            .pivots
            .iter()
            .zip(&module.skeleton.ik.pivots)
            .zip(&module.skeleton.bind.pivots)
        {
            let fk_w = scene.world_transform(*fk).unwrap();
            let ik_w = scene.world_transform(*ik).unwrap();
            let bind_w = scene.world_transform(*bind).unwrap();
            assert!(fk_w.translation.abs_diff_eq(ik_w.translation, 1e-3));
            assert!(fk_w.translation.abs_diff_eq(bind_w.translation, 1e-3));
            assert!(fk_w.rotation.dot(ik_w.rotation).abs() > 0.9999);
        }
    }

    #[test]
    fn twist_is_linear_in_bone_index_and_factor() {
        let (mut scene, module) = built(&LimbParams::default());
        let twist = module.network.twist.as_ref().unwrap();
        assert_eq!(twist.per_bone.len(), 2);

        // Roll the FK wrist control; FK is fully live at the default
        // switch value.
        let wrist_ctrl = module.controls.fk.last().unwrap().node;
        scene
            .set_attr(wrist_ctrl, "rotate", Vec3::new(30., 0., 0.))
            .unwrap();

        let twist_part = module.plan.part_count() - 2;
        let bones: Vec<_> = module
            .skeleton
            .interiors
            .iter()
            .filter(|b| b.part_index == twist_part)
            .collect();
        for bone in &bones {
            let expected = 30. * bone.ordinal as f32 / bone.count as f32;
            let actual = scene
                .eval_attr(bone.joint, "rotateX")
                .unwrap()
                .as_f32()
                .unwrap();
            assert!(
                (actual - expected).abs() < 1e-2,
                "bone {} twisted {actual}, expected {expected}",
                bone.ordinal
            );
        }

        // Doubling the factor exactly doubles every interior bone.
        scene
            .set_attr(module.sockets.surface, "twistFactor", 2.)
            .unwrap();
        for bone in &bones {
            let expected = 60. * bone.ordinal as f32 / bone.count as f32;
            let actual = scene
                .eval_attr(bone.joint, "rotateX")
                .unwrap()
                .as_f32()
                .unwrap();
            assert!((actual - expected).abs() < 1e-2);
        }
    }

    #[test]
    fn zero_extra_joints_skips_interior_wiring() {
        let params = LimbParams {
            extra_joints: 0,
            ..LimbParams::default()
        };
        let (_scene, module) = built(&params);
        assert!(module.network.twist.is_none());
        assert!(module.skeleton.interiors.is_empty());
        assert_eq!(module.skeleton.bind.joints.len(), 3);
    }

    #[test]
    fn visibility_tracks_the_switch_in_lock_step() {
        let (mut scene, module) = built(&LimbParams::default());
        scene.set_attr(module.sockets.surface, "IKFK", 1.).unwrap();
        for shape in module.controls.fk_shapes() {
            assert!(!scene.eval_attr(shape, "visibility").unwrap().as_bool().unwrap());
        }
        for shape in module.controls.ik_shapes() {
            assert!(scene.eval_attr(shape, "visibility").unwrap().as_bool().unwrap());
        }
        scene.set_attr(module.sockets.surface, "IKFK", 0.).unwrap();
        for shape in module.controls.fk_shapes() {
            assert!(scene.eval_attr(shape, "visibility").unwrap().as_bool().unwrap());
        }
        for shape in module.controls.ik_shapes() {
            assert!(!scene.eval_attr(shape, "visibility").unwrap().as_bool().unwrap());
        }
    }

    #[test]
    fn ik_mode_reaches_for_the_end_control() {
        let (mut scene, module) = built(&LimbParams::default());
        scene.set_attr(module.sockets.surface, "IKFK", 1.).unwrap();
        // Pull the end control back toward the shoulder, well within reach.
        scene
            .set_attr(
                module.controls.ik_primary.node,
                "translate",
                Vec3::new(-1., 0., 0.),
            )
            .unwrap();
        let target = scene
            .world_transform(module.controls.ik_handle)
            .unwrap()
            .translation;
        let end = scene
            .world_transform(module.skeleton.bind.end())
            .unwrap()
            .translation;
        assert!(
            end.abs_diff_eq(target, 1e-2),
            "bind end {end} did not reach {target}"
        );
    }

    #[test]
    fn pole_control_is_translation_only() {
        let (mut scene, module) = built(&LimbParams::default());
        let pole = module.controls.pole.node;
        assert!(scene.set_attr(pole, "rotateY", 45.).is_err());
        assert!(scene.set_attr(pole, "scaleX", 2.).is_err());
        assert!(scene.set_attr(pole, "translate", Vec3::ONE).is_ok());
    }

    #[test]
    fn rebuild_after_delete_is_isomorphic() {
        let params = LimbParams::default();
        let (mut scene, module) = built(&params);
        let nodes = scene.node_count();
        let connections = scene.connection_count();

        module.delete(&mut scene).unwrap();
        assert_eq!(scene.node_count(), 0);
        assert_eq!(scene.connection_count(), 0);

        let rebuilt = build_limb(&mut scene, &params).unwrap();
        assert_eq!(scene.node_count(), nodes);
        assert_eq!(scene.connection_count(), connections);
        rebuilt.delete(&mut scene).unwrap();
    }

    #[test]
    fn dirty_scene_collides_instead_of_reusing() {
        let params = LimbParams::default();
        let mut scene = Scene::new();
        build_limb(&mut scene, &params).unwrap();
        assert!(matches!(
            build_limb(&mut scene, &params),
            Err(BuildError::Scene(
                autorig_core::errors::SceneError::NameCollision(_)
            ))
        ));
    }

    #[test]
    fn legs_build_too() {
        let params = LimbParams {
            kind: LimbKind::Leg,
            side: Side::Right,
            ..LimbParams::default()
        };
        let (scene, module) = built(&params);
        assert_eq!(module.plan.part("femur").unwrap().len(), 3);
        // Right side mirrors the lateral axis.
        let root = scene
            .world_transform(module.skeleton.bind.root())
            .unwrap()
            .translation;
        assert!(root.x < 0.);
    }
}
