use bevy::math::{Mat4, Vec3};

use autorig_core::data::{DataSpec, DataValue, euler_deg_to_quat};
use autorig_core::errors::GraphError;
use autorig_core::id::PinId;
use autorig_core::operator::{OpContext, Operator};

/// Build a matrix from translate, rotate (XYZ euler degrees) and scale.
#[derive(Clone, Debug, Default)]
pub struct ComposeMatrix;

impl ComposeMatrix {
    pub const INPUT_TRANSLATE: &'static str = "inputTranslate";
    pub const INPUT_ROTATE: &'static str = "inputRotate";
    pub const INPUT_SCALE: &'static str = "inputScale";
    pub const OUTPUT: &'static str = "outputMatrix";

    pub fn new() -> Self {
        Self
    }
}

impl Operator for ComposeMatrix {
    fn kind_tag(&self) -> &'static str {
        "CMPM"
    }

    fn display_name(&self) -> String {
        "Compose Matrix".into()
    }

    fn input_spec(&self) -> Vec<(PinId, DataSpec)> {
        vec![
            (Self::INPUT_TRANSLATE.into(), DataSpec::Vec3),
            (Self::INPUT_ROTATE.into(), DataSpec::Vec3),
            (Self::INPUT_SCALE.into(), DataSpec::Vec3),
        ]
    }

    fn input_defaults(&self) -> Vec<(PinId, DataValue)> {
        vec![
            (Self::INPUT_TRANSLATE.into(), DataValue::Vec3(Vec3::ZERO)),
            (Self::INPUT_ROTATE.into(), DataValue::Vec3(Vec3::ZERO)),
            (Self::INPUT_SCALE.into(), DataValue::Vec3(Vec3::ONE)),
        ]
    }

    fn output_spec(&self) -> Vec<(PinId, DataSpec)> {
        vec![(Self::OUTPUT.into(), DataSpec::Mat4)]
    }

    fn update(&self, ctx: &mut OpContext) -> Result<(), GraphError> {
        let translate = ctx.data_back(Self::INPUT_TRANSLATE)?.as_vec3()?;
        let rotate = ctx.data_back(Self::INPUT_ROTATE)?.as_vec3()?;
        let scale = ctx.data_back(Self::INPUT_SCALE)?.as_vec3()?;

        let matrix =
            Mat4::from_scale_rotation_translation(scale, euler_deg_to_quat(rotate), translate);
        ctx.set_data_fwd(Self::OUTPUT, matrix);
        Ok(())
    }
}
