use bevy::math::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::id::NodeRef;

const MAX_LEN_OFFSET: f32 = 0.01;
const EPS: f32 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IkSolver {
    /// Aims the start joint at the effector target. Two-joint chains.
    SingleChain,
    /// Two-bone solve with a pole-vector plane hint. Three-joint chains.
    RotatePlane,
}

/// Effector handle for a joint chain.
///
/// The handle's own world transform is the reach target; its rotation
/// outputs are wired into the chain joints at creation.
#[derive(Clone, Debug)]
pub struct IkHandle {
    pub start: NodeRef,
    pub end: NodeRef,
    pub solver: IkSolver,
    pub pole: Option<NodeRef>,
}

impl IkHandle {
    pub const OUT_ROOT_ROTATE: &'static str = "rootRotate";
    pub const OUT_MID_ROTATE: &'static str = "midRotate";
}

/// Result of a two-bone solve: world-space rotations for the root and mid
/// joints. The end joint keeps its own orientation.
pub struct TwoBoneSolution {
    pub root_world_rotation: Quat,
    pub mid_world_rotation: Quat,
}

/// Swing-based two-bone IK.
///
/// Starts from the chain's rest pose, swings the root so the chain plane
/// contains the pole direction and the law-of-cosines elbow angle reaches
/// the target, then swings the mid joint onto the target. Unreachable
/// targets clamp to just under full extension. Returns `None` when the
/// target sits on the root.
pub fn two_bone_ik(
    rest_root: (Vec3, Quat),
    rest_mid: (Vec3, Quat),
    rest_end_pos: Vec3,
    target_pos: Vec3,
    pole_pos: Option<Vec3>,
) -> Option<TwoBoneSolution> {
    let (root_pos, root_rot) = rest_root;
    let (mid_pos, mid_rot) = rest_mid;

    let upper_len = root_pos.distance(mid_pos);
    let lower_len = mid_pos.distance(rest_end_pos);
    let max_len = upper_len + lower_len - MAX_LEN_OFFSET;
    if upper_len <= EPS || lower_len <= EPS {
        return None;
    }

    let to_target_offset = (target_pos - root_pos).clamp_length_max(max_len);
    let to_target_dist = to_target_offset.length();
    if to_target_dist <= EPS {
        return None;
    }
    let to_target = to_target_offset / to_target_dist;

    // Pole plane: prefer the explicit hint, fall back to the rest bend.
    let rest_pole = (mid_pos - root_pos).reject_from(rest_end_pos - root_pos);
    let out_pole_vec = pole_pos
        .map(|p| (p - root_pos).reject_from(to_target))
        .filter(|v| v.length_squared() > EPS)
        .or_else(|| {
            let v = rest_pole.reject_from(to_target);
            (v.length_squared() > EPS).then_some(v)
        })
        .map(|v| v.normalize())
        .unwrap_or_else(|| to_target.any_orthonormal_vector());

    // Law of cosines for the elbow opening.
    let denom = 2. * upper_len * to_target_dist;
    let cos_angle = if denom > EPS {
        ((to_target_dist * to_target_dist + upper_len * upper_len - lower_len * lower_len) / denom)
            .clamp(-1., 1.)
    } else {
        0.
    };
    let angle = cos_angle.acos();

    let out_mid_pos =
        root_pos + upper_len * cos_angle * to_target + upper_len * angle.sin() * out_pole_vec;
    let out_end_pos = root_pos + to_target_offset;

    let in_to_mid = (mid_pos - root_pos).normalize();
    let out_to_mid = (out_mid_pos - root_pos).normalize();
    let root_swing = Quat::from_rotation_arc(in_to_mid, out_to_mid);

    let end_with_root_swing = root_pos + root_swing * (rest_end_pos - root_pos);
    let to_in_end = end_with_root_swing - out_mid_pos;
    let to_out_end = out_end_pos - out_mid_pos;
    if to_in_end.length_squared() <= EPS || to_out_end.length_squared() <= EPS {
        return None;
    }
    let mid_swing =
        Quat::from_rotation_arc(to_in_end.normalize(), to_out_end.normalize()) * root_swing;

    Some(TwoBoneSolution {
        root_world_rotation: (root_swing * root_rot).normalize(),
        mid_world_rotation: (mid_swing * mid_rot).normalize(),
    })
}

/// Single-chain solve: the swing that carries the rest aim direction onto
/// the target direction, applied to the root's rest rotation.
pub fn single_chain_aim(
    rest_root: (Vec3, Quat),
    rest_child_pos: Vec3,
    target_pos: Vec3,
) -> Option<Quat> {
    let (root_pos, root_rot) = rest_root;
    let rest_dir = rest_child_pos - root_pos;
    let aim_dir = target_pos - root_pos;
    if rest_dir.length_squared() <= EPS || aim_dir.length_squared() <= EPS {
        return None;
    }
    let swing = Quat::from_rotation_arc(rest_dir.normalize(), aim_dir.normalize());
    Some((swing * root_rot).normalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_vec_close(a: Vec3, b: Vec3) {
        assert!(a.abs_diff_eq(b, 1e-4), "{a} != {b}");
    }

    #[test]
    fn full_extension_straightens_chain() {
        // Rest chain along +X; a target past full reach clamps and the
        // chain ends up nearly straight on the target line.
        let sol = two_bone_ik(
            (Vec3::ZERO, Quat::IDENTITY),
            (Vec3::X * 2., Quat::IDENTITY),
            Vec3::X * 4.,
            Vec3::X * 5.,
            Some(Vec3::new(2., 2., 0.)),
        )
        .unwrap();
        let mid = sol.root_world_rotation * (Vec3::X * 2.);
        let end = mid + sol.mid_world_rotation * (Vec3::X * 2.);
        assert!(end.distance(Vec3::X * 3.99) < 1e-2);
        assert!(mid.y.abs() < 0.2);
    }

    #[test]
    fn bends_toward_pole() {
        let sol = two_bone_ik(
            (Vec3::ZERO, Quat::IDENTITY),
            (Vec3::X * 2., Quat::IDENTITY),
            Vec3::X * 4.,
            Vec3::X * 2.,
            Some(Vec3::new(1., 3., 0.)),
        )
        .unwrap();
        let mid = sol.root_world_rotation * (Vec3::X * 2.);
        // Elbow lifts into the +Y half-plane of the pole.
        assert!(mid.y > 0.5);
        // End effector lands on the target.
        let end = mid + sol.mid_world_rotation * (Vec3::X * 2.);
        assert_vec_close(end, Vec3::X * 2.);
    }

    #[test]
    fn unreachable_target_clamps() {
        let sol = two_bone_ik(
            (Vec3::ZERO, Quat::IDENTITY),
            (Vec3::X * 2., Quat::IDENTITY),
            Vec3::X * 4.,
            Vec3::X * 100.,
            Some(Vec3::new(1., 3., 0.)),
        )
        .unwrap();
        let mid = sol.root_world_rotation * (Vec3::X * 2.);
        let end = mid + sol.mid_world_rotation * (Vec3::X * 2.);
        assert!(end.length() <= 4.0 + 1e-3);
    }

    #[test]
    fn coincident_target_gives_no_solution() {
        assert!(
            two_bone_ik(
                (Vec3::ZERO, Quat::IDENTITY),
                (Vec3::X, Quat::IDENTITY),
                Vec3::X * 2.,
                Vec3::ZERO,
                None,
            )
            .is_none()
        );
    }

    #[test]
    fn single_chain_aims_at_target() {
        let rot = single_chain_aim((Vec3::ZERO, Quat::IDENTITY), Vec3::X, Vec3::Y * 2.).unwrap();
        assert_vec_close(rot * Vec3::X, Vec3::Y);
    }
}
