//! The constraint/blend network: one switch, two complements, lock-step
//! weights, visibility and twist.
//!
//! Every (fk, ik, bind) joint triple is tied together by a single
//! two-driver weighted constraint. The IK weight comes straight from the
//! `IKFK` attribute and the FK weight from one shared reverse node, so
//! `wFK + wIK = 1` holds for every switch value by construction. Nothing
//! downstream introduces a second source of that ratio: control visibility
//! hangs off the same two signals.

use autorig_builtin_nodes::{MultiplyScalar, NodeKind, Reverse, create_node};
use autorig_core::id::{NodeRef, SourcePlug, TargetPlug};
use autorig_core::naming;
use autorig_core::scene::{ConstraintKind, Scene, WeightedConstraint};

use crate::context::BuildContext;
use crate::errors::BuildResult;
use crate::skeleton::{InteriorBone, JointChain};

/// The switch core: the shared reverse node and one constraint per triple.
#[derive(Debug)]
pub struct BlendCore {
    pub reverse: NodeRef,
    pub constraints: Vec<NodeRef>,
}

/// Twist distribution nodes: one shared multiply scaling the source by the
/// twist factor, then one multiply per interior bone holding its `i/K`
/// fraction.
#[derive(Debug)]
pub struct TwistChain {
    pub shared: NodeRef,
    pub per_bone: Vec<NodeRef>,
}

#[derive(Debug)]
pub struct BlendNetwork {
    pub core: BlendCore,
    pub fk_vis: NodeRef,
    pub ik_vis: NodeRef,
    pub twist: Option<TwistChain>,
}

/// Wire the IK/FK blend for every pivot triple.
pub fn wire_ikfk_blend(
    scene: &mut Scene,
    ctx: &mut BuildContext,
    switch: &SourcePlug,
    fk: &JointChain,
    ik: &JointChain,
    bind: &JointChain,
) -> BuildResult<BlendCore> {
    let reverse = create_node(scene, NodeKind::Reverse, &ctx.scoped("IKFK"))?;
    ctx.track(reverse);
    scene.connect(
        switch.clone(),
        TargetPlug::new(reverse, Reverse::INPUT),
        false,
    )?;

    let mut constraints = Vec::new();
    for ((fk_joint, ik_joint), bind_joint) in fk
        .pivots
        .iter()
        .zip(&ik.pivots)
        .zip(&bind.pivots)
    {
        let cns = scene.create_weighted_constraint(
            ConstraintKind::Parent,
            &[(*fk_joint, 1.), (*ik_joint, 0.)],
            *bind_joint,
            false,
        )?;
        scene.connect(
            SourcePlug::new(reverse, Reverse::OUTPUT),
            TargetPlug::new(cns, WeightedConstraint::weight_attr(0)),
            false,
        )?;
        scene.connect(
            switch.clone(),
            TargetPlug::new(cns, WeightedConstraint::weight_attr(1)),
            false,
        )?;
        constraints.push(cns);
    }
    Ok(BlendCore {
        reverse,
        constraints,
    })
}

/// Drive control-shape visibility from the switch and its complement,
/// gated by one shared visibility attribute. Scrubbing the switch keeps
/// displayed controls and constraint weights in lock-step because both
/// read the same plugs.
pub fn wire_control_visibility(
    scene: &mut Scene,
    ctx: &mut BuildContext,
    switch: &SourcePlug,
    reverse: NodeRef,
    visibility_attr: &SourcePlug,
    fk_shapes: &[NodeRef],
    ik_shapes: &[NodeRef],
) -> BuildResult<(NodeRef, NodeRef)> {
    let fk_vis = create_node(scene, NodeKind::MultiplyScalar, &ctx.scoped("fkVis"))?;
    ctx.track(fk_vis);
    scene.connect(
        visibility_attr.clone(),
        TargetPlug::new(fk_vis, MultiplyScalar::INPUT_1),
        false,
    )?;
    scene.connect(
        SourcePlug::new(reverse, Reverse::OUTPUT),
        TargetPlug::new(fk_vis, MultiplyScalar::INPUT_2),
        false,
    )?;

    let ik_vis = create_node(scene, NodeKind::MultiplyScalar, &ctx.scoped("ikVis"))?;
    ctx.track(ik_vis);
    scene.connect(
        visibility_attr.clone(),
        TargetPlug::new(ik_vis, MultiplyScalar::INPUT_1),
        false,
    )?;
    scene.connect(
        switch.clone(),
        TargetPlug::new(ik_vis, MultiplyScalar::INPUT_2),
        false,
    )?;

    for shape in fk_shapes {
        scene.connect(
            SourcePlug::new(fk_vis, MultiplyScalar::OUTPUT),
            TargetPlug::new(*shape, "visibility"),
            false,
        )?;
    }
    for shape in ik_shapes {
        scene.connect(
            SourcePlug::new(ik_vis, MultiplyScalar::OUTPUT),
            TargetPlug::new(*shape, "visibility"),
            false,
        )?;
    }
    Ok((fk_vis, ik_vis))
}

/// Distribute the end pivot's twist across the interior bones.
///
/// Bone *i* of *K* receives `source * twistFactor * (i/K)` through one
/// shared multiply, so rescaling the factor rescales every bone
/// identically. Zero interior bones wires nothing and raises nothing.
pub fn wire_twist(
    scene: &mut Scene,
    ctx: &mut BuildContext,
    source_joint: NodeRef,
    factor: &SourcePlug,
    interiors: &[InteriorBone],
) -> BuildResult<Option<TwistChain>> {
    if interiors.is_empty() {
        return Ok(None);
    }

    let shared = create_node(scene, NodeKind::MultiplyScalar, &ctx.scoped("twist"))?;
    ctx.track(shared);
    scene.connect(
        SourcePlug::new(source_joint, "rotateX"),
        TargetPlug::new(shared, MultiplyScalar::INPUT_1),
        false,
    )?;
    scene.connect(
        factor.clone(),
        TargetPlug::new(shared, MultiplyScalar::INPUT_2),
        false,
    )?;

    let mut per_bone = Vec::new();
    for bone in interiors {
        let bone_name = scene.name_of(bone.joint)?.to_string();
        let context = naming::swap_suffix(&bone_name, "_BONE", "_twist");
        let mdl = create_node(scene, NodeKind::MultiplyScalar, &context)?;
        ctx.track(mdl);
        scene.connect(
            SourcePlug::new(shared, MultiplyScalar::OUTPUT),
            TargetPlug::new(mdl, MultiplyScalar::INPUT_1),
            false,
        )?;
        scene.set_attr(
            mdl,
            MultiplyScalar::INPUT_2,
            bone.ordinal as f32 / bone.count as f32,
        )?;
        scene.connect(
            SourcePlug::new(mdl, MultiplyScalar::OUTPUT),
            TargetPlug::new(bone.joint, "rotateX"),
            false,
        )?;
        per_bone.push(mdl);
    }
    Ok(Some(TwistChain { shared, per_bone }))
}
