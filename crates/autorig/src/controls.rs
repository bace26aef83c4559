//! Animator-facing controls.
//!
//! Every control sits behind at least one offset ancestor so its channels
//! read zero at rest, drives its joint through a constraint (control to
//! joint, never the reverse), and has its unused channels locked and hidden
//! at creation time. Controls record a shape choice and a color; the curve
//! geometry itself comes from the shape library outside this crate, hung
//! under the `*Shape` child transform.

use bevy::math::Vec3;
use bevy::transform::components::Transform;

use autorig_core::id::NodeRef;
use autorig_core::naming::{self, suffix};
use autorig_core::scene::{ConstraintKind, IkSolver, Scene};

use crate::context::BuildContext;
use crate::errors::BuildResult;
use crate::params::{ControlColor, ControlShape, LimbParams};
use crate::skeleton::JointChain;

pub const SCALE_AND_VIS: [&str; 4] = ["sx", "sy", "sz", "v"];
pub const ROTATE_SCALE_VIS: [&str; 7] = ["rx", "ry", "rz", "sx", "sy", "sz", "v"];
pub const ALL_CHANNELS: [&str; 10] = ["tx", "ty", "tz", "rx", "ry", "rz", "sx", "sy", "sz", "v"];

#[derive(Clone, Debug)]
pub struct ControlHandle {
    pub node: NodeRef,
    /// Shape child; its visibility is what display networks drive.
    pub shape: NodeRef,
    /// Outermost offset ancestor.
    pub offset: NodeRef,
    pub shape_choice: ControlShape,
    pub color: ControlColor,
}

/// Create a control transform with its shape child at a world pose.
pub fn create_control(
    scene: &mut Scene,
    name: impl Into<String>,
    shape_choice: ControlShape,
    color: ControlColor,
    parent: Option<NodeRef>,
    world: Transform,
) -> BuildResult<ControlHandle> {
    let name = name.into();
    let node = scene.create_transform_at(name.clone(), parent, world)?;
    let shape = scene.create_transform(format!("{name}{}", suffix::SHAPE), Some(node))?;
    Ok(ControlHandle {
        node,
        shape,
        offset: node,
        shape_choice,
        color,
    })
}

/// Insert an offset transform above `node`, matched to its world pose, so
/// the node's own channels rest at zero.
pub fn create_offset(
    scene: &mut Scene,
    node: NodeRef,
    offset_suffix: &str,
) -> BuildResult<NodeRef> {
    let name = scene.name_of(node)?.to_string();
    let parent = scene.parent_of(node)?;
    let world = scene.eval_world_transform(node)?;
    let offset =
        scene.create_transform_at(naming::with_suffix(&name, offset_suffix), parent, world)?;
    scene.reparent(node, Some(offset), true)?;
    Ok(offset)
}

pub fn lock_hide(scene: &mut Scene, node: NodeRef, keys: &[&str]) -> BuildResult<()> {
    scene.lock_channels(node, keys, true)?;
    Ok(())
}

/// The limb's full control complement.
#[derive(Debug)]
pub struct ControlSet {
    pub group: NodeRef,
    pub fk: Vec<ControlHandle>,
    pub fk_secondary: ControlHandle,
    pub ik_primary: ControlHandle,
    pub ik_secondary: ControlHandle,
    pub pole: ControlHandle,
    pub ik_handle: NodeRef,
}

impl ControlSet {
    /// Primary FK shapes, the ones the switch-driven display network hides.
    pub fn fk_shapes(&self) -> Vec<NodeRef> {
        self.fk.iter().map(|c| c.shape).collect()
    }

    /// Primary IK-side shapes (end control and pole).
    pub fn ik_shapes(&self) -> Vec<NodeRef> {
        vec![self.ik_primary.shape, self.pole.shape]
    }

    /// Nested fine-adjustment shapes, gated by their own visibility toggle.
    pub fn secondary_shapes(&self) -> Vec<NodeRef> {
        vec![self.fk_secondary.shape, self.ik_secondary.shape]
    }
}

/// Build FK controls down the driver chain, the two-layer IK end control,
/// the pole control and the IK handle.
pub fn build_limb_controls(
    scene: &mut Scene,
    ctx: &mut BuildContext,
    fk_chain: &JointChain,
    ik_chain: &JointChain,
    pole_base: &str,
    pole_position: Vec3,
    params: &LimbParams,
    parent: NodeRef,
) -> BuildResult<ControlSet> {
    let group = scene.create_transform(ctx.scoped("CTL_GRP"), Some(parent))?;
    let color = ctx.side.color();
    let mirror_scale = Vec3::new(-1., 1., 1.);

    // FK: one control per pivot, offsets chained control-under-control.
    let mut fk_controls: Vec<ControlHandle> = Vec::new();
    let mut fk_secondary = None;
    for (index, joint) in fk_chain.pivots.iter().copied().enumerate() {
        let joint_name = scene.name_of(joint)?.to_string();
        let world = scene.eval_world_transform(joint)?;
        let mut ctrl = create_control(
            scene,
            naming::swap_suffix(&joint_name, "JNT", "CTRL"),
            params.fk_shape,
            color,
            None,
            world,
        )?;
        let last = index == fk_chain.pivots.len() - 1;
        if last {
            // The end pivot gets a nested secondary for fine adjustments.
            let scnd = create_control(
                scene,
                naming::swap_suffix(&joint_name, "JNT", "SCND_CTRL"),
                params.fk_shape,
                color,
                Some(ctrl.node),
                Transform::IDENTITY,
            )?;
            lock_hide(scene, scnd.node, &SCALE_AND_VIS)?;
            fk_secondary = Some(scnd);
        }
        let offset = create_offset(scene, ctrl.node, suffix::ZERO)?;
        ctrl.offset = offset;
        let offset_parent = fk_controls.last().map(|c| c.node).unwrap_or(group);
        scene.reparent(offset, Some(offset_parent), true)?;
        if index == 0 && params.orient_symmetry {
            scene.set_local_transform(offset, None, None, Some(mirror_scale))?;
        }

        scene.create_weighted_constraint(ConstraintKind::Parent, &[(ctrl.node, 1.)], joint, true)?;
        lock_hide(scene, ctrl.node, &SCALE_AND_VIS)?;
        fk_controls.push(ctrl);
    }
    let fk_secondary = fk_secondary.expect("limb chains have at least one pivot");

    // IK end: primary drives the handle, secondary orient-corrects the
    // end joint.
    let end_joint = ik_chain.end();
    let end_name = scene.name_of(end_joint)?.to_string();
    let end_world = scene.eval_world_transform(end_joint)?;
    let mut ik_primary = create_control(
        scene,
        naming::swap_suffix(&end_name, "JNT", "CTRL"),
        params.ik_shape,
        color,
        None,
        end_world,
    )?;
    let ik_secondary = create_control(
        scene,
        naming::swap_suffix(&end_name, "JNT", "SCND_CTRL"),
        params.ik_shape,
        color,
        Some(ik_primary.node),
        Transform::IDENTITY,
    )?;
    let space = create_offset(scene, ik_primary.node, suffix::SPACE)?;
    let zero = create_offset(scene, space, suffix::ZERO)?;
    ik_primary.offset = zero;
    scene.reparent(zero, Some(group), true)?;
    if params.orient_symmetry {
        scene.set_local_transform(zero, None, None, Some(mirror_scale))?;
    }
    lock_hide(scene, ik_primary.node, &SCALE_AND_VIS)?;
    lock_hide(scene, ik_secondary.node, &SCALE_AND_VIS)?;

    let ik_handle = scene.create_ik_handle(ik_chain.root(), end_joint, IkSolver::RotatePlane)?;
    scene.rename(
        ik_handle,
        naming::swap_suffix(&end_name, suffix::IK_JOINT, suffix::IK_HANDLE),
    )?;
    scene.reparent(ik_handle, Some(group), true)?;
    scene.create_weighted_constraint(
        ConstraintKind::Parent,
        &[(ik_primary.node, 1.)],
        ik_handle,
        true,
    )?;
    scene.create_weighted_constraint(
        ConstraintKind::Orient,
        &[(ik_secondary.node, 1.)],
        end_joint,
        true,
    )?;

    // Pole control: translation only, rotation and scale are meaningless
    // for a direction hint.
    let mut pole = create_control(
        scene,
        format!("{pole_base}_pv_{}", suffix::CONTROL),
        params.pole_shape,
        color,
        None,
        Transform::from_translation(pole_position),
    )?;
    let pole_space = create_offset(scene, pole.node, suffix::SPACE)?;
    let pole_zero = create_offset(scene, pole_space, suffix::ZERO)?;
    pole.offset = pole_zero;
    scene.reparent(pole_zero, Some(group), true)?;
    if params.orient_symmetry {
        scene.set_local_transform(pole_zero, None, None, Some(mirror_scale))?;
    }
    lock_hide(scene, pole.node, &ROTATE_SCALE_VIS)?;
    scene.set_pole_vector(ik_handle, pole.node)?;

    Ok(ControlSet {
        group,
        fk: fk_controls,
        fk_secondary,
        ik_primary,
        ik_secondary,
        pole,
        ik_handle,
    })
}
