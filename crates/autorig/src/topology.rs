//! Segment planning: the pure, scene-free first stage of every build.

use indexmap::IndexMap;

use autorig_core::errors::ConfigError;
use autorig_core::naming;

use crate::params::{LimbKind, Side};

/// Ordered mapping of part name to the ordered segment identifiers that
/// make the part up. Built once per module, immutable afterwards; every
/// later stage derives its node names from these identifiers, so the plan
/// fixes the whole module's vocabulary up front.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentPlan {
    parts: IndexMap<String, Vec<String>>,
}

impl SegmentPlan {
    /// Plan a three-pivot limb.
    ///
    /// Non-terminal parts carry the pivot segment plus `extra_joints`
    /// interior segments (`{prefix}_{part}_{A..}`); the terminal part is
    /// always exactly one segment. Safe to call repeatedly for preview.
    pub fn build_limb(
        kind: LimbKind,
        extra_joints: u32,
        side: Side,
    ) -> Result<SegmentPlan, ConfigError> {
        if extra_joints > 26 {
            return Err(ConfigError::SegmentRangeExceeded {
                count: extra_joints,
                max: 26,
            });
        }
        let prefix = side.prefix();
        let part_names = kind.parts();
        let mut parts = IndexMap::new();
        for (index, part) in part_names.iter().enumerate() {
            let base = format!("{prefix}_{part}");
            let mut segments = vec![base.clone()];
            let terminal = index == part_names.len() - 1;
            if !terminal {
                for extra in 1..=extra_joints {
                    let letter = naming::alpha_index(extra)?;
                    segments.push(format!("{base}_{letter}"));
                }
            }
            parts.insert((*part).to_string(), segments);
        }
        Ok(SegmentPlan { parts })
    }

    /// Plan a hand: one part per finger (`fingerA..`), numbered segments
    /// with an `END` tip, optionally a thumb part.
    pub fn build_fingers(
        finger_count: u32,
        thumb: bool,
        segment_count: u32,
        side: Side,
    ) -> Result<SegmentPlan, ConfigError> {
        if finger_count > 26 {
            return Err(ConfigError::SegmentRangeExceeded {
                count: finger_count,
                max: 26,
            });
        }
        let prefix = side.prefix();
        let mut parts = IndexMap::new();
        for finger in 1..=finger_count {
            let letter = naming::alpha_index(finger)?;
            let key = format!("finger{letter}");
            parts.insert(
                key.clone(),
                numbered_segments(&format!("{prefix}_{key}"), segment_count),
            );
        }
        if thumb {
            parts.insert(
                "thumb".to_string(),
                numbered_segments(&format!("{prefix}_thumb"), segment_count),
            );
        }
        Ok(SegmentPlan { parts })
    }

    /// Plan a spine column: one part, numbered segments with an `END` tip.
    pub fn build_spine(segment_count: u32, side: Side) -> Result<SegmentPlan, ConfigError> {
        if segment_count > 99 {
            return Err(ConfigError::SegmentRangeExceeded {
                count: segment_count,
                max: 99,
            });
        }
        let prefix = side.prefix();
        let mut parts = IndexMap::new();
        parts.insert(
            "spine".to_string(),
            numbered_spans(&format!("{prefix}_spine"), segment_count),
        );
        Ok(SegmentPlan { parts })
    }

    /// Plan a set of toes; same shape as fingers.
    pub fn build_toes(
        toe_count: u32,
        segment_count: u32,
        side: Side,
    ) -> Result<SegmentPlan, ConfigError> {
        if toe_count > 26 {
            return Err(ConfigError::SegmentRangeExceeded {
                count: toe_count,
                max: 26,
            });
        }
        let prefix = side.prefix();
        let mut parts = IndexMap::new();
        for toe in 1..=toe_count {
            let letter = naming::alpha_index(toe)?;
            let key = format!("toe{letter}");
            parts.insert(
                key.clone(),
                numbered_segments(&format!("{prefix}_{key}"), segment_count),
            );
        }
        Ok(SegmentPlan { parts })
    }

    pub fn parts(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.parts.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn part(&self, name: &str) -> Option<&[String]> {
        self.parts.get(name).map(|v| v.as_slice())
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// All segments in chain order.
    pub fn segments(&self) -> impl Iterator<Item = &String> {
        self.parts.values().flatten()
    }

    /// The first segment of each part.
    pub fn pivots(&self) -> Vec<&String> {
        self.parts.values().filter_map(|v| v.first()).collect()
    }

    /// Interior segments of a part (everything after the pivot).
    pub fn interiors(&self, part: &str) -> &[String] {
        self.parts
            .get(part)
            .map(|v| &v[1..])
            .unwrap_or(&[])
    }
}

fn numbered_segments(base: &str, segment_count: u32) -> Vec<String> {
    let mut segments: Vec<String> = (1..=segment_count)
        .map(|i| format!("{base}_{}", naming::zero_pad(i)))
        .collect();
    segments.push(format!("{base}_END"));
    segments
}

/// Like [`numbered_segments`] but zero based, the spine's numbering.
fn numbered_spans(base: &str, segment_count: u32) -> Vec<String> {
    let mut segments: Vec<String> = (0..segment_count)
        .map(|i| format!("{base}_{}", naming::zero_pad(i)))
        .collect();
    segments.push(format!("{base}_END"));
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_plan_matches_expected_identifiers() {
        let plan = SegmentPlan::build_limb(LimbKind::Arm, 2, Side::Left).unwrap();
        assert_eq!(
            plan.part("shoulder").unwrap(),
            ["L_shoulder", "L_shoulder_A", "L_shoulder_B"]
        );
        assert_eq!(
            plan.part("elbow").unwrap(),
            ["L_elbow", "L_elbow_A", "L_elbow_B"]
        );
        assert_eq!(plan.part("wrist").unwrap(), ["L_wrist"]);
    }

    #[test]
    fn nonterminal_parts_have_k_plus_one_segments() {
        for k in 0..5 {
            let plan = SegmentPlan::build_limb(LimbKind::Leg, k, Side::Right).unwrap();
            let parts: Vec<_> = plan.parts().collect();
            for (_, segments) in &parts[..parts.len() - 1] {
                assert_eq!(segments.len() as u32, k + 1);
            }
            assert_eq!(parts[parts.len() - 1].1.len(), 1);
        }
    }

    #[test]
    fn plans_are_deterministic() {
        let a = SegmentPlan::build_limb(LimbKind::Arm, 3, Side::Left).unwrap();
        let b = SegmentPlan::build_limb(LimbKind::Arm, 3, Side::Left).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn oversized_counts_are_rejected() {
        assert!(matches!(
            SegmentPlan::build_limb(LimbKind::Arm, 27, Side::Left),
            Err(ConfigError::SegmentRangeExceeded { .. })
        ));
    }

    #[test]
    fn spine_plan_is_zero_based_with_end_tip() {
        let plan = SegmentPlan::build_spine(5, Side::Center).unwrap();
        assert_eq!(
            plan.part("spine").unwrap(),
            [
                "C_spine_00",
                "C_spine_01",
                "C_spine_02",
                "C_spine_03",
                "C_spine_04",
                "C_spine_END"
            ]
        );
    }

    #[test]
    fn finger_plan_numbers_segments_with_end_tip() {
        let plan = SegmentPlan::build_fingers(2, true, 3, Side::Center).unwrap();
        assert_eq!(
            plan.part("fingerA").unwrap(),
            ["C_fingerA_01", "C_fingerA_02", "C_fingerA_03", "C_fingerA_END"]
        );
        assert_eq!(
            plan.part("thumb").unwrap(),
            ["C_thumb_01", "C_thumb_02", "C_thumb_03", "C_thumb_END"]
        );
        assert_eq!(plan.part_count(), 3);
    }
}
