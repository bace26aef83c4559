use autorig_core::data::DataSpec;
use autorig_core::errors::GraphError;
use autorig_core::id::PinId;
use autorig_core::operator::{OpContext, Operator};

#[derive(Clone, Debug, Default)]
pub struct SubtractScalar;

impl SubtractScalar {
    pub const INPUT_1: &'static str = "input1";
    pub const INPUT_2: &'static str = "input2";
    pub const OUTPUT: &'static str = "output";

    pub fn new() -> Self {
        Self
    }
}

impl Operator for SubtractScalar {
    fn kind_tag(&self) -> &'static str {
        "SUB"
    }

    fn display_name(&self) -> String {
        "- Subtract".into()
    }

    fn input_spec(&self) -> Vec<(PinId, DataSpec)> {
        vec![
            (Self::INPUT_1.into(), DataSpec::F32),
            (Self::INPUT_2.into(), DataSpec::F32),
        ]
    }

    fn output_spec(&self) -> Vec<(PinId, DataSpec)> {
        vec![(Self::OUTPUT.into(), DataSpec::F32)]
    }

    fn update(&self, ctx: &mut OpContext) -> Result<(), GraphError> {
        let input_1 = ctx.data_back(Self::INPUT_1)?.as_f32()?;
        let input_2 = ctx.data_back(Self::INPUT_2)?.as_f32()?;

        ctx.set_data_fwd(Self::OUTPUT, input_1 - input_2);
        Ok(())
    }
}
