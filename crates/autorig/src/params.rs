//! Flat parameter records, one per module kind.
//!
//! These are the whole surface the parameter-collecting GUI needs: plain
//! serde types loadable from RON, mirroring the way graph assets ship as
//! `*.ron` files elsewhere in the stack.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use autorig_core::errors::ConfigError;

/// Body side. Decides the name prefix, the lateral mirroring of canonical
/// guide positions and the default control color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
    Center,
}

impl Side {
    pub fn prefix(&self) -> &'static str {
        match self {
            Side::Left => "L",
            Side::Right => "R",
            Side::Center => "C",
        }
    }

    pub fn color(&self) -> ControlColor {
        match self {
            Side::Left => ControlColor::Cyan,
            Side::Right => ControlColor::Red,
            Side::Center => ControlColor::Yellow,
        }
    }

    /// Sign applied to the lateral (X) axis of canonical positions.
    pub fn mirror(&self) -> f32 {
        match self {
            Side::Right => -1.,
            _ => 1.,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LimbKind {
    Arm,
    Leg,
}

impl LimbKind {
    pub fn key(&self) -> &'static str {
        match self {
            LimbKind::Arm => "arm",
            LimbKind::Leg => "leg",
        }
    }

    /// Pivot part names, root to end.
    pub fn parts(&self) -> [&'static str; 3] {
        match self {
            LimbKind::Arm => ["shoulder", "elbow", "wrist"],
            LimbKind::Leg => ["femur", "knee", "ankle"],
        }
    }
}

impl FromStr for LimbKind {
    type Err = ConfigError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        match key {
            "arm" => Ok(LimbKind::Arm),
            "leg" => Ok(LimbKind::Leg),
            other => Err(ConfigError::UnknownLimbKind(other.to_string())),
        }
    }
}

/// Which curve from the shape library a control asks for. Only the choice
/// is recorded; the geometry itself lives outside this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlShape {
    Circle,
    Square,
    Triangle,
    Octagon,
    Box,
    Sphere,
    Pyramid,
    Diamond,
    QuadArrow,
    Arrow,
    Plus,
    Ring,
    Locator,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlColor {
    Red,
    Orange,
    Yellow,
    Green,
    Cyan,
    Blue,
    Magenta,
    Purple,
    White,
}

impl ControlColor {
    pub fn rgb(&self) -> [f32; 3] {
        match self {
            ControlColor::Red => [1., 0., 0.],
            ControlColor::Orange => [1., 0.4, 0.],
            ControlColor::Yellow => [1., 1., 0.],
            ControlColor::Green => [0., 1., 0.],
            ControlColor::Cyan => [0., 1., 1.],
            ControlColor::Blue => [0., 0., 1.],
            ControlColor::Magenta | ControlColor::Purple => [1., 0., 1.],
            ControlColor::White => [1., 1., 1.],
        }
    }
}

fn parse_ron<T: for<'de> Deserialize<'de>>(source: &str) -> Result<T, ConfigError> {
    ron::de::from_str(source).map_err(|e| ConfigError::InvalidParameters(e.to_string()))
}

/// Parameters of an arm or leg module.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LimbParams {
    pub side: Side,
    pub kind: LimbKind,
    /// Interior joints inserted into each non-terminal part.
    pub extra_joints: u32,
    /// Wire twist distribution across the interior bones.
    pub auto_twist: bool,
    pub fk_shape: ControlShape,
    pub ik_shape: ControlShape,
    pub pole_shape: ControlShape,
    /// Mirror the control offsets so a copied animation curve reads the
    /// same on both sides.
    pub orient_symmetry: bool,
}

impl Default for LimbParams {
    fn default() -> Self {
        Self {
            side: Side::Left,
            kind: LimbKind::Arm,
            extra_joints: 2,
            auto_twist: true,
            fk_shape: ControlShape::Ring,
            ik_shape: ControlShape::Box,
            pole_shape: ControlShape::Diamond,
            orient_symmetry: false,
        }
    }
}

impl LimbParams {
    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        parse_ron(source)
    }
}

/// Parameters of a hand/fingers module.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerParams {
    pub side: Side,
    /// Fingers beside the thumb.
    pub finger_count: u32,
    pub thumb: bool,
    pub segment_count: u32,
    pub shape: ControlShape,
    pub hand_shape: ControlShape,
    /// Insert an extra offset group per segment control.
    pub offset_groups: bool,
    /// Lock segment controls down to the curl axis.
    pub limit_channels: bool,
}

impl Default for FingerParams {
    fn default() -> Self {
        Self {
            side: Side::Left,
            finger_count: 4,
            thumb: true,
            segment_count: 3,
            shape: ControlShape::Box,
            hand_shape: ControlShape::Triangle,
            offset_groups: false,
            limit_channels: true,
        }
    }
}

impl FingerParams {
    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        parse_ron(source)
    }
}

/// Parameters of a reverse-foot module.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FootParams {
    pub side: Side,
    pub toes: bool,
    pub toe_count: u32,
    pub toe_segments: u32,
    pub toe_shape: ControlShape,
    pub offset_groups: bool,
    pub limit_channels: bool,
}

impl Default for FootParams {
    fn default() -> Self {
        Self {
            side: Side::Left,
            toes: false,
            toe_count: 5,
            toe_segments: 1,
            toe_shape: ControlShape::Box,
            offset_groups: false,
            limit_channels: true,
        }
    }
}

impl FootParams {
    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        parse_ron(source)
    }
}

/// Parameters of a spine module.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SpineParams {
    pub side: Side,
    pub fk_shape: ControlShape,
    pub ik_shape: ControlShape,
    pub primary_color: ControlColor,
    pub secondary_color: ControlColor,
}

impl Default for SpineParams {
    fn default() -> Self {
        Self {
            side: Side::Center,
            fk_shape: ControlShape::Circle,
            ik_shape: ControlShape::Octagon,
            primary_color: ControlColor::Yellow,
            secondary_color: ControlColor::Orange,
        }
    }
}

impl SpineParams {
    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        parse_ron(source)
    }
}

/// Parameters of a clavicle module.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClavicleParams {
    pub side: Side,
    pub fk_shape: ControlShape,
    pub ik_shape: ControlShape,
    pub orient_symmetry: bool,
}

impl Default for ClavicleParams {
    fn default() -> Self {
        Self {
            side: Side::Left,
            fk_shape: ControlShape::Ring,
            ik_shape: ControlShape::Plus,
            orient_symmetry: false,
        }
    }
}

impl ClavicleParams {
    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        parse_ron(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limb_params_load_from_ron() {
        let params = LimbParams::from_ron(
            "(side: Right, kind: Leg, extra_joints: 3, auto_twist: false)",
        )
        .unwrap();
        assert_eq!(params.side, Side::Right);
        assert_eq!(params.kind, LimbKind::Leg);
        assert_eq!(params.extra_joints, 3);
        assert!(!params.auto_twist);
        // Unspecified fields fall back to defaults.
        assert_eq!(params.fk_shape, ControlShape::Ring);
    }

    #[test]
    fn malformed_records_are_configuration_errors() {
        assert!(matches!(
            LimbParams::from_ron("(side: Up)"),
            Err(ConfigError::InvalidParameters(_))
        ));
    }

    #[test]
    fn sides_mirror_and_color() {
        assert_eq!(Side::Right.mirror(), -1.);
        assert_eq!(Side::Left.mirror(), 1.);
        assert_eq!(Side::Left.color(), ControlColor::Cyan);
        assert_eq!(Side::Center.prefix(), "C");
    }
}
