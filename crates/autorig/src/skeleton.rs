//! Skeleton building: one canonical pose, three parallel chains.
//!
//! The pose (names, world positions, world orientations) is computed once
//! from the guides, then instantiated as the bind, FK-driver and IK-driver
//! chains through a single factory, so the chains cannot drift out of pose
//! sync. Orientation is aim-at-next with a fixed secondary up axis; the
//! terminal joint aims at the orientation guide.
//!
//! Interior segments exist only in the bind chain. They are not parented
//! under any FK/IK joint; each one gets a two-driver weighted point
//! constraint to the bracketing pivot bind joints instead, so interior
//! bones never depend on a chain that itself still needs blending.

use bevy::math::{Mat3, Quat, Vec3};

use autorig_core::id::NodeRef;
use autorig_core::naming::{self, suffix};
use autorig_core::scene::Scene;

use crate::context::BuildContext;
use crate::errors::BuildResult;
use crate::guides::GuideSet;
use crate::topology::SegmentPlan;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainRole {
    Bind,
    Fk,
    Ik,
}

impl ChainRole {
    pub fn suffix(&self) -> &'static str {
        match self {
            ChainRole::Bind => suffix::BONE,
            ChainRole::Fk => suffix::FK_JOINT,
            ChainRole::Ik => suffix::IK_JOINT,
        }
    }
}

/// One skeletal chain, root to end.
#[derive(Clone, Debug)]
pub struct JointChain {
    pub role: ChainRole,
    /// Joints in chain order; the bind chain carries every segment, the
    /// driver chains carry pivots only.
    pub joints: Vec<NodeRef>,
    pub pivots: Vec<NodeRef>,
}

impl JointChain {
    pub fn root(&self) -> NodeRef {
        self.joints[0]
    }

    pub fn end(&self) -> NodeRef {
        *self.joints.last().expect("chains are never empty")
    }
}

/// An interior bind bone with its span fraction toward the far pivot.
#[derive(Clone, Debug)]
pub struct InteriorBone {
    pub joint: NodeRef,
    pub part_index: usize,
    /// 1-based position within its part's interior run.
    pub ordinal: usize,
    /// Interior count of the part.
    pub count: usize,
}

/// The three chains plus the interior-bone bookkeeping the blend network
/// needs for twist.
#[derive(Debug)]
pub struct Skeleton {
    pub bind: JointChain,
    pub fk: JointChain,
    pub ik: JointChain,
    pub interiors: Vec<InteriorBone>,
    pub group: NodeRef,
}

#[derive(Clone, Debug)]
struct PoseEntry {
    segment: String,
    position: Vec3,
    rotation: Quat,
    pivot: bool,
    part_index: usize,
    ordinal: usize,
    interior_count: usize,
}

/// The canonical pose every chain instantiates from.
#[derive(Clone, Debug)]
pub struct ChainPose {
    entries: Vec<PoseEntry>,
}

impl ChainPose {
    pub fn from_guides(
        scene: &Scene,
        plan: &SegmentPlan,
        guides: &GuideSet,
    ) -> BuildResult<ChainPose> {
        let mut entries = Vec::new();
        for (part_index, (part_name, segments)) in plan.parts().enumerate() {
            let interior_count = plan.interiors(part_name).len();
            for (i, segment) in segments.iter().enumerate() {
                let guide = guides.guide_for(segment).ok_or_else(|| {
                    autorig_core::errors::ConfigError::MissingInput(format!(
                        "guide for segment `{segment}`"
                    ))
                })?;
                let position = scene.world_transform(guide.node)?.translation;
                entries.push(PoseEntry {
                    segment: segment.clone(),
                    position,
                    rotation: Quat::IDENTITY,
                    pivot: i == 0,
                    part_index,
                    ordinal: i,
                    interior_count,
                });
            }
        }

        // Aim each joint at its successor; the terminal joint aims at the
        // orientation guide so it stays predictable past the chain.
        let orient_target = scene.world_transform(guides.orient.node)?.translation;
        let count = entries.len();
        for i in 0..count {
            let target = if i + 1 < count {
                entries[i + 1].position
            } else {
                orient_target
            };
            entries[i].rotation = aim_rotation(target - entries[i].position);
        }
        Ok(ChainPose { entries })
    }

    /// Stamp the pose into the scene as one chain.
    ///
    /// Pivots parent pivot-to-pivot. Interior joints hang off their part's
    /// pivot instead of sitting inside the chain, so a pivot's evaluation
    /// never routes through an interior bone that is itself constrained to
    /// the pivots.
    fn instantiate(
        &self,
        scene: &mut Scene,
        role: ChainRole,
        parent: NodeRef,
        pivots_only: bool,
    ) -> BuildResult<JointChain> {
        let mut joints = Vec::new();
        let mut pivots = Vec::new();
        let mut last_pivot = parent;
        let mut last_pivot_rot = scene.world_transform(parent)?.rotation;
        for entry in &self.entries {
            if pivots_only && !entry.pivot {
                continue;
            }
            let name = naming::with_suffix(&entry.segment, role.suffix());
            let joint = scene.create_joint(name, entry.position, Some(last_pivot))?;
            let local_rot = (last_pivot_rot.inverse() * entry.rotation).normalize();
            scene.set_local_transform(joint, None, Some(local_rot), None)?;
            joints.push(joint);
            if entry.pivot {
                pivots.push(joint);
                last_pivot = joint;
                last_pivot_rot = entry.rotation;
            }
        }
        Ok(JointChain {
            role,
            joints,
            pivots,
        })
    }
}

/// Aim-at basis: X down the bone, Y resolved against the world up (Z when
/// the bone runs vertical).
fn aim_rotation(aim: Vec3) -> Quat {
    let x = match aim.try_normalize() {
        Some(x) => x,
        None => return Quat::IDENTITY,
    };
    let mut up = Vec3::Y;
    if x.dot(up).abs() > 0.999 {
        up = Vec3::Z;
    }
    let z = x.cross(up).normalize();
    let y = z.cross(x).normalize();
    Quat::from_mat3(&Mat3::from_cols(x, y, z)).normalize()
}

/// Build the three chains from the guides, sharing one bind pose.
pub fn build_skeleton(
    scene: &mut Scene,
    ctx: &mut BuildContext,
    plan: &SegmentPlan,
    guides: &GuideSet,
    parent: NodeRef,
) -> BuildResult<Skeleton> {
    let group = scene.create_transform(ctx.scoped("JNT_GRP"), Some(parent))?;
    let pose = ChainPose::from_guides(scene, plan, guides)?;

    let bind = pose.instantiate(scene, ChainRole::Bind, group, false)?;
    let fk = pose.instantiate(scene, ChainRole::Fk, group, true)?;
    let ik = pose.instantiate(scene, ChainRole::Ik, group, true)?;

    // Interior bind bones ride the bracketing pivot bind joints. A part
    // with zero interiors simply wires nothing.
    let mut interiors = Vec::new();
    for (index, entry) in pose.entries.iter().enumerate() {
        if entry.pivot {
            continue;
        }
        let near = bind.pivots[entry.part_index];
        let far = bind.pivots[entry.part_index + 1];
        let fraction = entry.ordinal as f32 / (entry.interior_count as f32 + 1.);
        scene.create_point_constraint(
            &[(near, 1. - fraction), (far, fraction)],
            bind.joints[index],
            false,
            [false; 3],
        )?;
        interiors.push(InteriorBone {
            joint: bind.joints[index],
            part_index: entry.part_index,
            ordinal: entry.ordinal,
            count: entry.interior_count,
        });
    }

    Ok(Skeleton {
        bind,
        fk,
        ik,
        interiors,
        group,
    })
}

#[cfg(test)]
mod tests {
    use autorig_core::scene::Scene;

    use super::*;
    use crate::guides::place_guides;
    use crate::params::{LimbKind, Side};

    fn built() -> (Scene, Skeleton) {
        let mut scene = Scene::new();
        let mut ctx = BuildContext::new(Side::Left, "L_arm");
        let root = scene.create_transform("L_arm_MOD", None).unwrap();
        let plan = SegmentPlan::build_limb(LimbKind::Arm, 2, Side::Left).unwrap();
        let guides = place_guides(&mut scene, &mut ctx, &plan, LimbKind::Arm, root).unwrap();
        let skeleton = build_skeleton(&mut scene, &mut ctx, &plan, &guides, root).unwrap();
        (scene, skeleton)
    }

    #[test]
    fn three_chains_share_one_bind_pose() {
        let (scene, skeleton) = built();
        assert_eq!(skeleton.bind.joints.len(), 7);
        assert_eq!(skeleton.fk.joints.len(), 3);
        assert_eq!(skeleton.ik.joints.len(), 3);
        for ((bind, fk), ik) in skeleton
            .bind
            .pivots
            .iter()
            .zip(&skeleton.fk.pivots)
            .zip(&skeleton.ik.pivots)
        {
            let b = scene.world_transform(*bind).unwrap();
            let f = scene.world_transform(*fk).unwrap();
            let i = scene.world_transform(*ik).unwrap();
            assert!(b.translation.abs_diff_eq(f.translation, 1e-4));
            assert!(b.translation.abs_diff_eq(i.translation, 1e-4));
            assert!(b.rotation.abs_diff_eq(f.rotation, 1e-4));
            assert!(b.rotation.abs_diff_eq(i.rotation, 1e-4));
        }
    }

    #[test]
    fn interiors_hang_off_pivots_not_chains() {
        let (scene, skeleton) = built();
        assert_eq!(skeleton.interiors.len(), 4);
        for interior in &skeleton.interiors {
            let parent = scene.parent_of(interior.joint).unwrap().unwrap();
            assert_eq!(parent, skeleton.bind.pivots[interior.part_index]);
        }
        // Pivots chain pivot-to-pivot.
        assert_eq!(
            scene.parent_of(skeleton.bind.pivots[1]).unwrap().unwrap(),
            skeleton.bind.pivots[0]
        );
        assert_eq!(
            scene.parent_of(skeleton.bind.pivots[2]).unwrap().unwrap(),
            skeleton.bind.pivots[1]
        );
    }

    #[test]
    fn interiors_ride_their_bracketing_pivots() {
        let (mut scene, skeleton) = built();
        // Swing the elbow bind pivot; the shoulder interiors follow the
        // blend, a third and two thirds of the way.
        let elbow = skeleton.bind.pivots[1];
        let local = scene.node(elbow).unwrap().local_transform().translation;
        scene
            .set_attr(elbow, "translate", local + bevy::math::Vec3::new(0., 3., 0.))
            .unwrap();

        let shoulder_pos = scene.world_transform(skeleton.bind.pivots[0]).unwrap().translation;
        let elbow_pos = scene.world_transform(elbow).unwrap().translation;
        let first = scene
            .world_transform(skeleton.interiors[0].joint)
            .unwrap()
            .translation;
        let expected = shoulder_pos * (2. / 3.) + elbow_pos * (1. / 3.);
        assert!(first.abs_diff_eq(expected, 1e-3));
    }

    #[test]
    fn aim_rotation_points_x_down_the_bone() {
        let rot = aim_rotation(bevy::math::Vec3::new(0., 0., 3.));
        let x = rot * bevy::math::Vec3::X;
        assert!(x.abs_diff_eq(bevy::math::Vec3::Z, 1e-5));
        // Degenerate aim falls back to identity.
        assert_eq!(aim_rotation(bevy::math::Vec3::ZERO), Quat::IDENTITY);
    }
}
