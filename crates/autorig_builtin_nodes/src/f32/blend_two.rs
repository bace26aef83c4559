use autorig_core::data::DataSpec;
use autorig_core::errors::GraphError;
use autorig_core::id::PinId;
use autorig_core::operator::{OpContext, Operator};

/// Linear blend of two scalars by a `[0, 1]` blender.
#[derive(Clone, Debug, Default)]
pub struct BlendTwo;

impl BlendTwo {
    pub const BLENDER: &'static str = "attributesBlender";
    pub const INPUT_0: &'static str = "input0";
    pub const INPUT_1: &'static str = "input1";
    pub const OUTPUT: &'static str = "output";

    pub fn new() -> Self {
        Self
    }
}

impl Operator for BlendTwo {
    fn kind_tag(&self) -> &'static str {
        "BTA"
    }

    fn display_name(&self) -> String {
        "Blend Two".into()
    }

    fn input_spec(&self) -> Vec<(PinId, DataSpec)> {
        vec![
            (Self::BLENDER.into(), DataSpec::F32),
            (Self::INPUT_0.into(), DataSpec::F32),
            (Self::INPUT_1.into(), DataSpec::F32),
        ]
    }

    fn output_spec(&self) -> Vec<(PinId, DataSpec)> {
        vec![(Self::OUTPUT.into(), DataSpec::F32)]
    }

    fn update(&self, ctx: &mut OpContext) -> Result<(), GraphError> {
        let blender = ctx.data_back(Self::BLENDER)?.as_f32()?;
        let input_0 = ctx.data_back(Self::INPUT_0)?.as_f32()?;
        let input_1 = ctx.data_back(Self::INPUT_1)?.as_f32()?;

        ctx.set_data_fwd(Self::OUTPUT, input_0 + (input_1 - input_0) * blender);
        Ok(())
    }
}
