//! Clavicle module: a two-joint, world-oriented chain with an FK control,
//! a single-chain IK handle and the standard switch blend.

use bevy::log::info;
use bevy::math::Vec3;
use bevy::transform::components::Transform;

use autorig_builtin_nodes::{NodeKind, Reverse, create_node};
use autorig_core::id::{NodeRef, SourcePlug, TargetPlug};
use autorig_core::naming::suffix;
use autorig_core::scene::{AttrDef, ConstraintKind, IkSolver, Scene, WeightedConstraint};

use crate::context::BuildContext;
use crate::controls::{ControlHandle, SCALE_AND_VIS, create_control, create_offset, lock_hide};
use crate::errors::BuildResult;
use crate::modules::{ModuleSockets, seal_module};
use crate::params::ClavicleParams;

/// Canonical base and end positions before side mirroring.
const CLAV_POSITIONS: [Vec3; 2] = [Vec3::new(1., 16., 1.), Vec3::new(3., 17., 0.)];

#[derive(Debug)]
pub struct ClavicleModule {
    pub params: ClavicleParams,
    pub bind_joints: [NodeRef; 2],
    pub fk_control: ControlHandle,
    pub ik_control: ControlHandle,
    pub reverse: NodeRef,
    pub sockets: ModuleSockets,
    created: Vec<NodeRef>,
}

impl ClavicleModule {
    pub fn switch(&self) -> SourcePlug {
        SourcePlug::new(self.sockets.surface, "IKFK")
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

pub fn build_clavicle_module(
    scene: &mut Scene,
    params: &ClavicleParams,
) -> BuildResult<ClavicleModule> {
    let prefix = params.side.prefix();
    let module_name = format!("{prefix}_clav");
    let mut ctx = BuildContext::new(params.side, module_name.clone());
    info!("building clavicle module `{module_name}`");

    let module_root = scene.create_transform(ctx.scoped(suffix::MODULE), None)?;
    ctx.track(module_root);
    let mirror = ctx.side.mirror();
    let base = Vec3::new(CLAV_POSITIONS[0].x * mirror, CLAV_POSITIONS[0].y, CLAV_POSITIONS[0].z);
    let end = Vec3::new(CLAV_POSITIONS[1].x * mirror, CLAV_POSITIONS[1].y, CLAV_POSITIONS[1].z);

    // Three two-joint chains, deliberately world oriented.
    let joint_group = scene.create_transform(ctx.scoped("JNT_GRP"), Some(module_root))?;
    let chain = |scene: &mut Scene, chain_suffix: &str| {
        let root = scene.create_joint(
            format!("{module_name}_{chain_suffix}"),
            base,
            Some(joint_group),
        )?;
        let tip = scene.create_joint(
            format!("{module_name}_END_{chain_suffix}"),
            end,
            Some(root),
        )?;
        Ok::<_, crate::errors::BuildError>([root, tip])
    };
    let bind_joints = chain(scene, suffix::BONE)?;
    let fk_joints = chain(scene, suffix::FK_JOINT)?;
    let ik_joints = chain(scene, suffix::IK_JOINT)?;

    let control_group = scene.create_transform(ctx.scoped("CTL_GRP"), Some(module_root))?;
    let color = ctx.side.color();
    let mirror_scale = Vec3::new(-1., 1., 1.);

    // FK control at the base drives the whole FK chain.
    let mut fk_control = create_control(
        scene,
        format!("{module_name}_FK_{}", suffix::CONTROL),
        params.fk_shape,
        color,
        None,
        Transform::from_translation(base),
    )?;
    let fk_zero = create_offset(scene, fk_control.node, suffix::ZERO)?;
    fk_control.offset = fk_zero;
    scene.reparent(fk_zero, Some(control_group), true)?;
    if params.orient_symmetry {
        scene.set_local_transform(fk_zero, None, None, Some(mirror_scale))?;
    }
    scene.create_weighted_constraint(
        ConstraintKind::Parent,
        &[(fk_control.node, 1.)],
        fk_joints[0],
        true,
    )?;
    lock_hide(scene, fk_control.node, &SCALE_AND_VIS)?;

    // IK control at the end drives a single-chain handle.
    let handle = scene.create_ik_handle(ik_joints[0], ik_joints[1], IkSolver::SingleChain)?;
    scene.rename(handle, format!("{module_name}_{}", suffix::IK_HANDLE))?;
    scene.reparent(handle, Some(control_group), true)?;

    let mut ik_control = create_control(
        scene,
        format!("{module_name}_IK_{}", suffix::CONTROL),
        params.ik_shape,
        color,
        None,
        Transform::from_translation(end),
    )?;
    let ik_zero = create_offset(scene, ik_control.node, suffix::ZERO)?;
    ik_control.offset = ik_zero;
    scene.reparent(ik_zero, Some(control_group), true)?;
    if params.orient_symmetry {
        scene.set_local_transform(ik_zero, None, None, Some(mirror_scale))?;
    }
    scene.create_weighted_constraint(
        ConstraintKind::Parent,
        &[(ik_control.node, 1.)],
        handle,
        true,
    )?;
    lock_hide(scene, ik_control.node, &SCALE_AND_VIS)?;

    // Switch surface on the FK control; both joints blend through it.
    scene.add_attribute(fk_control.node, AttrDef::float("IKFK").range(0., 1.))?;
    let reverse = create_node(scene, NodeKind::Reverse, &ctx.scoped("IKFK"))?;
    ctx.track(reverse);
    scene.connect(
        SourcePlug::new(fk_control.node, "IKFK"),
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
            TargetPlug::new(cns, WeightedConstraint::weight_attr(0)),
            false,
        )?;
        scene.connect(
            SourcePlug::new(fk_control.node, "IKFK"),
            TargetPlug::new(cns, WeightedConstraint::weight_attr(1)),
            false,
        )?;
    }

    // Visibility straight off the two signals.
    scene.connect(
        SourcePlug::new(reverse, Reverse::OUTPUT),
        TargetPlug::new(fk_control.shape, "visibility"),
        false,
    )?;
    scene.connect(
        SourcePlug::new(fk_control.node, "IKFK"),
        TargetPlug::new(ik_control.shape, "visibility"),
        false,
    )?;

    let sockets = seal_module(
        scene,
        &mut ctx,
        module_root,
        &[joint_group, control_group],
        bind_joints[0],
        bind_joints[1],
        fk_control.node,
        Some("IKFK"),
    )?;

    Ok(ClavicleModule {
        params: params.clone(),
        bind_joints,
        fk_control,
        ik_control,
        reverse,
        sockets,
        created: ctx.into_created(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::math::Vec3;

    #[test]
    fn clavicle_blends_both_joints() {
        let mut scene = Scene::new();
        let module = build_clavicle_module(&mut scene, &ClavicleParams::default()).unwrap();
        // FK fully live by default: rotating the FK control swings the
        // bind end.
        let before = scene
            .world_transform(module.bind_joints[1])
            .unwrap()
            .translation;
        scene
            .set_attr(module.fk_control.node, "rotate", Vec3::new(0., 0., 30.))
            .unwrap();
        let after = scene
            .world_transform(module.bind_joints[1])
            .unwrap()
            .translation;
        assert!((after - before).length() > 0.5);

        // In IK mode the FK control stops mattering.
        scene.set_attr(module.sockets.surface, "IKFK", 1.).unwrap();
        let ik_pose = scene
            .world_transform(module.bind_joints[1])
            .unwrap()
            .translation;
        assert!(ik_pose.abs_diff_eq(before, 1e-2));
    }

    #[test]
    fn mirrored_clavicle_flips_the_lateral_axis() {
        let mut scene = Scene::new();
        let params = ClavicleParams {
            side: crate::params::Side::Right,
            ..ClavicleParams::default()
        };
        let module = build_clavicle_module(&mut scene, &params).unwrap();
        let base = scene
            .world_transform(module.bind_joints[0])
            .unwrap()
            .translation;
        assert!(base.x < 0.);
    }
}
