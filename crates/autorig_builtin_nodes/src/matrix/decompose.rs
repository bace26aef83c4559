use autorig_core::data::{DataSpec, quat_to_euler_deg};
use autorig_core::errors::GraphError;
use autorig_core::id::PinId;
use autorig_core::operator::{OpContext, Operator};

/// Split a matrix into translate, rotate (XYZ euler degrees) and scale.
/// The node behind every world-space mirror in the rig.
#[derive(Clone, Debug, Default)]
pub struct DecomposeMatrix;

impl DecomposeMatrix {
    pub const INPUT: &'static str = "inputMatrix";
    pub const OUTPUT_TRANSLATE: &'static str = "outputTranslate";
    pub const OUTPUT_ROTATE: &'static str = "outputRotate";
    pub const OUTPUT_SCALE: &'static str = "outputScale";

    pub fn new() -> Self {
        Self
    }
}

impl Operator for DecomposeMatrix {
    fn kind_tag(&self) -> &'static str {
        "DCPM"
    }

    fn display_name(&self) -> String {
        "Decompose Matrix".into()
    }

    fn input_spec(&self) -> Vec<(PinId, DataSpec)> {
        vec![(Self::INPUT.into(), DataSpec::Mat4)]
    }

    fn output_spec(&self) -> Vec<(PinId, DataSpec)> {
        vec![
            (Self::OUTPUT_TRANSLATE.into(), DataSpec::Vec3),
            (Self::OUTPUT_ROTATE.into(), DataSpec::Vec3),
            (Self::OUTPUT_SCALE.into(), DataSpec::Vec3),
        ]
    }

    fn update(&self, ctx: &mut OpContext) -> Result<(), GraphError> {
        let input = ctx.data_back(Self::INPUT)?.as_mat4()?;
        let (scale, rotation, translation) = input.to_scale_rotation_translation();

        ctx.set_data_fwd(Self::OUTPUT_TRANSLATE, translation);
        ctx.set_data_fwd(Self::OUTPUT_ROTATE, quat_to_euler_deg(rotation));
        ctx.set_data_fwd(Self::OUTPUT_SCALE, scale);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::math::{Mat4, Quat, Vec3};
    use bevy::platform::collections::HashMap;

    #[test]
    fn roundtrips_a_rigid_transform() {
        let matrix = Mat4::from_rotation_translation(
            Quat::from_rotation_y(0.5),
            Vec3::new(1., 2., 3.),
        );
        let mut inputs = HashMap::new();
        inputs.insert(DecomposeMatrix::INPUT.to_string(), matrix.into());
        let mut ctx = OpContext::new(inputs);
        DecomposeMatrix::new().update(&mut ctx).unwrap();

        let t = ctx
            .output(DecomposeMatrix::OUTPUT_TRANSLATE)
            .unwrap()
            .as_vec3()
            .unwrap();
        let s = ctx
            .output(DecomposeMatrix::OUTPUT_SCALE)
            .unwrap()
            .as_vec3()
            .unwrap();
        assert!(t.abs_diff_eq(Vec3::new(1., 2., 3.), 1e-5));
        assert!(s.abs_diff_eq(Vec3::ONE, 1e-5));
    }
}
