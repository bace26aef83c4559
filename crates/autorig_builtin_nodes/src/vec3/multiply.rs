use autorig_core::data::DataSpec;
use autorig_core::errors::GraphError;
use autorig_core::id::PinId;
use autorig_core::operator::{OpContext, Operator};

/// Component-wise vector multiply.
#[derive(Clone, Debug, Default)]
pub struct MultiplyVec3;

impl MultiplyVec3 {
    pub const INPUT_1: &'static str = "input1";
    pub const INPUT_2: &'static str = "input2";
    pub const OUTPUT: &'static str = "output";

    pub fn new() -> Self {
        Self
    }
}

impl Operator for MultiplyVec3 {
    fn kind_tag(&self) -> &'static str {
        "VMD"
    }

    fn display_name(&self) -> String {
        "× Multiply Vec3".into()
    }

    fn input_spec(&self) -> Vec<(PinId, DataSpec)> {
        vec![
            (Self::INPUT_1.into(), DataSpec::Vec3),
            (Self::INPUT_2.into(), DataSpec::Vec3),
        ]
    }

    fn output_spec(&self) -> Vec<(PinId, DataSpec)> {
        vec![(Self::OUTPUT.into(), DataSpec::Vec3)]
    }

    fn update(&self, ctx: &mut OpContext) -> Result<(), GraphError> {
        let input_1 = ctx.data_back(Self::INPUT_1)?.as_vec3()?;
        let input_2 = ctx.data_back(Self::INPUT_2)?.as_vec3()?;

        ctx.set_data_fwd(Self::OUTPUT, input_1 * input_2);
        Ok(())
    }
}
