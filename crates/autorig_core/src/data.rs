//! Typed values flowing through plugs and stored in attributes.

use bevy::math::{EulerRot, Mat4, Quat, Vec3};
use bevy::reflect::Reflect;
use serde::{Deserialize, Serialize};

use crate::errors::GraphError;

/// The type of a plug or attribute.
#[derive(Reflect, Default, Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum DataSpec {
    #[default]
    F32,
    I32,
    Bool,
    Vec3,
    Quat,
    Mat4,
    /// Integer index into a per-attribute name list.
    Enum,
}

impl DataSpec {
    pub fn default_value(&self) -> DataValue {
        match self {
            DataSpec::F32 => DataValue::F32(0.),
            DataSpec::I32 => DataValue::I32(0),
            DataSpec::Bool => DataValue::Bool(false),
            DataSpec::Vec3 => DataValue::Vec3(Vec3::ZERO),
            DataSpec::Quat => DataValue::Quat(Quat::IDENTITY),
            DataSpec::Mat4 => DataValue::Mat4(Mat4::IDENTITY),
            DataSpec::Enum => DataValue::Enum(0),
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataSpec::F32 | DataSpec::I32 | DataSpec::Bool | DataSpec::Enum
        )
    }

    /// Whether a value of `source` may drive a plug of `target`.
    ///
    /// Scalar kinds convert implicitly between each other, the way a float
    /// output may drive a visibility switch. Structured kinds must match.
    pub fn compatible(source: DataSpec, target: DataSpec) -> bool {
        source == target || (source.is_numeric() && target.is_numeric())
    }
}

/// A value held by an attribute or produced by an operator output.
#[derive(Reflect, Clone, Copy, Debug, PartialEq)]
pub enum DataValue {
    F32(f32),
    I32(i32),
    Bool(bool),
    Vec3(Vec3),
    Quat(Quat),
    Mat4(Mat4),
    Enum(i32),
}

impl Default for DataValue {
    fn default() -> Self {
        Self::F32(0.)
    }
}

impl DataValue {
    pub fn spec(&self) -> DataSpec {
        match self {
            DataValue::F32(_) => DataSpec::F32,
            DataValue::I32(_) => DataSpec::I32,
            DataValue::Bool(_) => DataSpec::Bool,
            DataValue::Vec3(_) => DataSpec::Vec3,
            DataValue::Quat(_) => DataSpec::Quat,
            DataValue::Mat4(_) => DataSpec::Mat4,
            DataValue::Enum(_) => DataSpec::Enum,
        }
    }

    /// Scalar read with implicit conversion from the other scalar kinds.
    pub fn as_f32(&self) -> Result<f32, GraphError> {
        match self {
            DataValue::F32(x) => Ok(*x),
            DataValue::I32(x) | DataValue::Enum(x) => Ok(*x as f32),
            DataValue::Bool(b) => Ok(if *b { 1. } else { 0. }),
            other => Err(GraphError::MismatchedDataType {
                expected: DataSpec::F32,
                found: other.spec(),
            }),
        }
    }

    pub fn as_i32(&self) -> Result<i32, GraphError> {
        match self {
            DataValue::I32(x) | DataValue::Enum(x) => Ok(*x),
            DataValue::F32(x) => Ok(*x as i32),
            DataValue::Bool(b) => Ok(if *b { 1 } else { 0 }),
            other => Err(GraphError::MismatchedDataType {
                expected: DataSpec::I32,
                found: other.spec(),
            }),
        }
    }

    /// Boolean read; any non-zero scalar counts as true.
    pub fn as_bool(&self) -> Result<bool, GraphError> {
        match self {
            DataValue::Bool(b) => Ok(*b),
            DataValue::F32(x) => Ok(*x != 0.),
            DataValue::I32(x) | DataValue::Enum(x) => Ok(*x != 0),
            other => Err(GraphError::MismatchedDataType {
                expected: DataSpec::Bool,
                found: other.spec(),
            }),
        }
    }

    pub fn as_vec3(&self) -> Result<Vec3, GraphError> {
        match self {
            DataValue::Vec3(v) => Ok(*v),
            other => Err(GraphError::MismatchedDataType {
                expected: DataSpec::Vec3,
                found: other.spec(),
            }),
        }
    }

    pub fn as_quat(&self) -> Result<Quat, GraphError> {
        match self {
            DataValue::Quat(q) => Ok(*q),
            other => Err(GraphError::MismatchedDataType {
                expected: DataSpec::Quat,
                found: other.spec(),
            }),
        }
    }

    pub fn as_mat4(&self) -> Result<Mat4, GraphError> {
        match self {
            DataValue::Mat4(m) => Ok(*m),
            other => Err(GraphError::MismatchedDataType {
                expected: DataSpec::Mat4,
                found: other.spec(),
            }),
        }
    }

    #[must_use]
    pub fn into_f32(self) -> Option<f32> {
        match self {
            Self::F32(x) => Some(x),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_vec3(self) -> Option<Vec3> {
        match self {
            Self::Vec3(v) => Some(v),
            _ => None,
        }
    }
}

impl From<f32> for DataValue {
    fn from(value: f32) -> Self {
        Self::F32(value)
    }
}

impl From<i32> for DataValue {
    fn from(value: i32) -> Self {
        Self::I32(value)
    }
}

impl From<bool> for DataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec3> for DataValue {
    fn from(value: Vec3) -> Self {
        Self::Vec3(value)
    }
}

impl From<Quat> for DataValue {
    fn from(value: Quat) -> Self {
        Self::Quat(value)
    }
}

impl From<Mat4> for DataValue {
    fn from(value: Mat4) -> Self {
        Self::Mat4(value)
    }
}

/// Rotations cross plug boundaries as XYZ euler degrees, the way animators
/// read them in a channel box.
pub fn quat_to_euler_deg(q: Quat) -> Vec3 {
    let (x, y, z) = q.to_euler(EulerRot::XYZ);
    Vec3::new(x.to_degrees(), y.to_degrees(), z.to_degrees())
}

pub fn euler_deg_to_quat(e: Vec3) -> Quat {
    Quat::from_euler(
        EulerRot::XYZ,
        e.x.to_radians(),
        e.y.to_radians(),
        e.z.to_radians(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_kinds_convert() {
        assert_eq!(DataValue::Bool(true).as_f32().unwrap(), 1.);
        assert_eq!(DataValue::F32(0.3).as_bool().unwrap(), true);
        assert_eq!(DataValue::Enum(2).as_i32().unwrap(), 2);
        assert!(DataValue::Vec3(Vec3::ONE).as_f32().is_err());
    }

    #[test]
    fn structured_kinds_do_not_convert() {
        assert!(DataSpec::compatible(DataSpec::F32, DataSpec::Bool));
        assert!(DataSpec::compatible(DataSpec::Enum, DataSpec::I32));
        assert!(!DataSpec::compatible(DataSpec::F32, DataSpec::Vec3));
        assert!(!DataSpec::compatible(DataSpec::Mat4, DataSpec::Quat));
    }

    #[test]
    fn euler_degrees_roundtrip() {
        let q = euler_deg_to_quat(Vec3::new(30., 0., 0.));
        let e = quat_to_euler_deg(q);
        assert!(e.abs_diff_eq(Vec3::new(30., 0., 0.), 1e-4));
    }
}
