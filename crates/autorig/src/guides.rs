//! Guide placement: temporary transforms that author the module's
//! proportions before any permanent skeleton exists.
//!
//! Pivot guides sit at canonical per-kind offsets (side-mirrored on the
//! lateral axis) and chain parent-to-parent so nudging a pivot carries its
//! children along. Interior guides ride two-driver weighted point blends of
//! their bracketing pivots, so repositioning a pivot before baking
//! redistributes the interiors on its own. The pole-vector guide is solved
//! geometrically; nobody places it by hand.
//!
//! Placement is not idempotent: running it again while the previous guides
//! still exist collides on names and raises.

use bevy::math::Vec3;
use bevy::transform::components::Transform;

use autorig_core::errors::GeometryError;
use autorig_core::id::NodeRef;
use autorig_core::naming::{self, suffix};
use autorig_core::scene::Scene;

use crate::context::BuildContext;
use crate::errors::BuildResult;
use crate::params::{LimbKind, Side};
use crate::topology::SegmentPlan;

const EPS: f32 = 1e-4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuideRole {
    Pivot,
    Interior,
    /// Derived helpers: the orientation aim target and the pole guide.
    Accessory,
}

#[derive(Clone, Debug)]
pub struct GuideHandle {
    pub node: NodeRef,
    pub role: GuideRole,
    /// Segment base name this guide stands in for.
    pub segment: String,
}

/// Everything guide placement leaves behind. Deleted wholesale (via
/// `group`) once the chains exist; guides never persist in a finished rig.
#[derive(Debug)]
pub struct GuideSet {
    pub group: NodeRef,
    pub all: Vec<GuideHandle>,
    pub pivots: Vec<GuideHandle>,
    pub pole: GuideHandle,
    pub orient: GuideHandle,
}

impl GuideSet {
    pub fn guide_for(&self, segment: &str) -> Option<&GuideHandle> {
        self.all.iter().find(|g| g.segment == segment)
    }
}

/// Canonical pivot positions, root to end, before side mirroring.
fn canonical_pivots(kind: LimbKind) -> [Vec3; 3] {
    match kind {
        LimbKind::Arm => [
            Vec3::new(3., 17., 0.),
            Vec3::new(7., 17., -0.35),
            Vec3::new(11., 17., 0.),
        ],
        LimbKind::Leg => [
            Vec3::new(2., 9., 0.),
            Vec3::new(2., 5., 0.35),
            Vec3::new(2., 1., 0.),
        ],
    }
}

fn mirrored(position: Vec3, side: Side) -> Vec3 {
    Vec3::new(position.x * side.mirror(), position.y, position.z)
}

/// Pole position: project the mid pivot onto the plane orthogonal to the
/// root-to-end axis through its midpoint, then push out along the
/// projection by half the limb span. Returns `None` for collinear pivots.
pub fn solve_pole_position(root: Vec3, mid: Vec3, end: Vec3) -> Option<Vec3> {
    let axis = end - root;
    let span = axis.length();
    if span <= EPS {
        return None;
    }
    let axis = axis / span;
    let bend = (mid - root).reject_from(axis);
    if bend.length_squared() <= EPS * EPS {
        return None;
    }
    let midpoint = (root + end) / 2.;
    Some(midpoint + bend.normalize() * (span / 2.))
}

/// Create the full guide layout for a limb plan.
pub fn place_guides(
    scene: &mut Scene,
    ctx: &mut BuildContext,
    plan: &SegmentPlan,
    kind: LimbKind,
    parent: NodeRef,
) -> BuildResult<GuideSet> {
    let group = scene.create_transform(ctx.scoped("guide_GRP"), Some(parent))?;

    let positions: Vec<Vec3> = canonical_pivots(kind)
        .into_iter()
        .map(|p| mirrored(p, ctx.side))
        .collect();
    let pivot_segments = plan.pivots();

    // Pivot guides chain root-to-end so the whole limb nudges together.
    let mut pivots = Vec::new();
    let mut all = Vec::new();
    let mut prev = group;
    for (segment, position) in pivot_segments.iter().zip(&positions) {
        let node = scene.create_transform_at(
            naming::with_suffix(segment, suffix::LOCATOR),
            Some(prev),
            Transform::from_translation(*position),
        )?;
        let handle = GuideHandle {
            node,
            role: GuideRole::Pivot,
            segment: (*segment).clone(),
        };
        pivots.push(handle.clone());
        all.push(handle);
        prev = node;
    }

    // Interior guides: flat under the guide group, positioned entirely by
    // their weighted blends so they re-distribute when a pivot moves.
    let part_count = plan.part_count();
    for (part_index, (part_name, _)) in plan.parts().enumerate().collect::<Vec<_>>() {
        if part_index + 1 >= part_count {
            break;
        }
        let interiors = plan.interiors(part_name);
        let spans = interiors.len() as f32 + 1.;
        for (ordinal, segment) in interiors.iter().enumerate() {
            let fraction = (ordinal as f32 + 1.) / spans;
            let node =
                scene.create_transform(naming::with_suffix(segment, suffix::LOCATOR), Some(group))?;
            scene.create_point_constraint(
                &[
                    (pivots[part_index].node, 1. - fraction),
                    (pivots[part_index + 1].node, fraction),
                ],
                node,
                false,
                [false; 3],
            )?;
            all.push(GuideHandle {
                node,
                role: GuideRole::Interior,
                segment: segment.clone(),
            });
        }
    }

    // Degeneracy is checked here, before any orientation math runs.
    let root_p = scene.world_transform(pivots[0].node)?.translation;
    let mid_p = scene.world_transform(pivots[1].node)?.translation;
    let end_p = scene.world_transform(pivots[2].node)?.translation;
    check_pivot_geometry(
        &[&pivots[0], &pivots[1], &pivots[2]],
        root_p,
        mid_p,
        end_p,
    )?;

    // Orientation guide: the aim target past the end pivot. Legs keep it
    // level with the ankle so the foot aim survives any knee bend.
    let orient_position = match kind {
        LimbKind::Arm => end_p + (end_p - mid_p).normalize(),
        LimbKind::Leg => {
            // The knee bows toward the foot's forward; flatten that to get
            // a level aim target.
            let mut forward = mid_p - end_p;
            forward.y = 0.;
            if forward.length_squared() <= EPS * EPS {
                forward = Vec3::new(0., 0., 1.);
            }
            end_p + forward.normalize()
        }
    };
    let end_segment = pivot_segments[pivot_segments.len() - 1];
    let orient_node = scene.create_transform_at(
        format!("{end_segment}_aim_{}", suffix::LOCATOR),
        Some(group),
        Transform::from_translation(orient_position),
    )?;
    let orient = GuideHandle {
        node: orient_node,
        role: GuideRole::Accessory,
        segment: end_segment.clone(),
    };
    all.push(orient.clone());

    // Pole guide, solved geometrically.
    let pole_position = solve_pole_position(root_p, mid_p, end_p).ok_or_else(|| {
        GeometryError::CollinearPivots {
            root: guide_name(&pivots[0]),
            mid: guide_name(&pivots[1]),
            end: guide_name(&pivots[2]),
        }
    })?;
    let mid_segment = pivot_segments[1];
    let pole_node = scene.create_transform_at(
        format!("{mid_segment}_pv_{}", suffix::LOCATOR),
        Some(group),
        Transform::from_translation(pole_position),
    )?;
    let pole = GuideHandle {
        node: pole_node,
        role: GuideRole::Accessory,
        segment: mid_segment.clone(),
    };
    all.push(pole.clone());

    ctx.track(group);
    Ok(GuideSet {
        group,
        all,
        pivots,
        pole,
        orient,
    })
}

fn guide_name(guide: &GuideHandle) -> String {
    naming::with_suffix(&guide.segment, suffix::LOCATOR)
}

fn check_pivot_geometry(
    pivots: &[&GuideHandle; 3],
    root: Vec3,
    mid: Vec3,
    end: Vec3,
) -> Result<(), GeometryError> {
    if (end - root).length() <= EPS {
        return Err(GeometryError::ZeroLengthLimb {
            start: guide_name(pivots[0]),
            end: guide_name(pivots[2]),
        });
    }
    for (a, b, pa, pb) in [
        (root, mid, pivots[0], pivots[1]),
        (mid, end, pivots[1], pivots[2]),
    ] {
        if (b - a).length() <= EPS {
            return Err(GeometryError::CoincidentGuides {
                a: guide_name(pa),
                b: guide_name(pb),
            });
        }
    }
    if (mid - root).cross(end - root).length() <= EPS {
        return Err(GeometryError::CollinearPivots {
            root: guide_name(pivots[0]),
            mid: guide_name(pivots[1]),
            end: guide_name(pivots[2]),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pole_sits_in_the_bend_plane_off_the_axis() {
        let root = Vec3::new(0., 10., 0.);
        let mid = Vec3::new(0., 5., 1.);
        let end = Vec3::new(0., 0., 0.);
        let pole = solve_pole_position(root, mid, end).unwrap();

        // In the plane spanned by the three pivots.
        let normal = (mid - root).cross(end - root).normalize();
        assert!(normal.dot(pole - root).abs() < 1e-4);
        // Pushed out on the same side as the bend.
        assert!((pole - (root + end) / 2.).dot(mid - (root + end) / 2.) > 0.);
        // Half the span away from the axis midpoint.
        assert!(((pole - (root + end) / 2.).length() - 5.).abs() < 1e-4);
    }

    #[test]
    fn collinear_pivots_have_no_pole() {
        assert!(solve_pole_position(Vec3::ZERO, Vec3::X * 2., Vec3::X * 4.).is_none());
        assert!(solve_pole_position(Vec3::ZERO, Vec3::X, Vec3::ZERO).is_none());
    }
}

#[cfg(test)]
mod scene_tests {
    use autorig_core::scene::{Scene, WeightedConstraint};

    use super::*;
    use crate::params::Side;

    fn placed() -> (Scene, BuildContext, GuideSet) {
        let mut scene = Scene::new();
        let mut ctx = BuildContext::new(Side::Left, "L_arm");
        let root = scene.create_transform("L_arm_MOD", None).unwrap();
        let plan = SegmentPlan::build_limb(LimbKind::Arm, 2, Side::Left).unwrap();
        let guides = place_guides(&mut scene, &mut ctx, &plan, LimbKind::Arm, root).unwrap();
        (scene, ctx, guides)
    }

    #[test]
    fn interior_blend_weights_sum_to_one() {
        let (scene, _ctx, guides) = placed();
        let mut interior_count = 0;
        for guide in guides.all.iter().filter(|g| g.role == GuideRole::Interior) {
            let cns = scene
                .children_of(guide.node)
                .unwrap()
                .iter()
                .copied()
                .find(|c| {
                    matches!(
                        scene.node(*c).unwrap().kind,
                        autorig_core::scene::SceneNodeKind::Constraint(_)
                    )
                })
                .expect("interior guides are constrained");
            let w0 = scene
                .eval_attr(cns, &WeightedConstraint::weight_attr(0))
                .unwrap()
                .as_f32()
                .unwrap();
            let w1 = scene
                .eval_attr(cns, &WeightedConstraint::weight_attr(1))
                .unwrap()
                .as_f32()
                .unwrap();
            assert!((w0 + w1 - 1.).abs() < 1e-6);
            interior_count += 1;
        }
        assert_eq!(interior_count, 4);
    }

    #[test]
    fn moving_a_pivot_redistributes_interiors() {
        let (mut scene, _ctx, guides) = placed();
        let elbow = guides.pivots[1].node;
        let before = scene.world_transform(elbow).unwrap().translation;
        scene
            .set_attr(elbow, "translate", {
                let local = scene.node(elbow).unwrap().local_transform().translation;
                local + bevy::math::Vec3::new(0., 2., 0.)
            })
            .unwrap();
        let after = scene.world_transform(elbow).unwrap().translation;
        assert!((after - before).abs_diff_eq(bevy::math::Vec3::new(0., 2., 0.), 1e-5));

        // The first shoulder interior sits a third of the way toward the
        // (moved) elbow.
        let shoulder = scene.world_transform(guides.pivots[0].node).unwrap().translation;
        let interior = guides
            .all
            .iter()
            .find(|g| g.segment == "L_shoulder_A")
            .unwrap();
        let position = scene.world_transform(interior.node).unwrap().translation;
        let expected = shoulder * (2. / 3.) + after * (1. / 3.);
        assert!(position.abs_diff_eq(expected, 1e-4));
    }

    #[test]
    fn second_placement_collides_on_names() {
        let (mut scene, mut ctx, _guides) = placed();
        let plan = SegmentPlan::build_limb(LimbKind::Arm, 2, Side::Left).unwrap();
        let root = scene.node_by_name("L_arm_MOD").unwrap();
        assert!(place_guides(&mut scene, &mut ctx, &plan, LimbKind::Arm, root).is_err());
    }

    #[test]
    fn guide_roles_are_complete() {
        let (_scene, _ctx, guides) = placed();
        assert_eq!(guides.pivots.len(), 3);
        assert_eq!(guides.pole.role, GuideRole::Accessory);
        assert_eq!(guides.orient.role, GuideRole::Accessory);
        // 3 pivots + 4 interiors + pole + orient.
        assert_eq!(guides.all.len(), 9);
    }
}
