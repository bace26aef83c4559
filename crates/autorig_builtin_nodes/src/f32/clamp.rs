use autorig_core::data::DataSpec;
use autorig_core::errors::GraphError;
use autorig_core::id::PinId;
use autorig_core::operator::{OpContext, Operator};

#[derive(Clone, Debug, Default)]
pub struct Clamp;

impl Clamp {
    pub const INPUT: &'static str = "input";
    pub const MIN: &'static str = "min";
    pub const MAX: &'static str = "max";
    pub const OUTPUT: &'static str = "output";

    pub fn new() -> Self {
        Self
    }
}

impl Operator for Clamp {
    fn kind_tag(&self) -> &'static str {
        "CLMP"
    }

    fn display_name(&self) -> String {
        "Clamp".into()
    }

    fn input_spec(&self) -> Vec<(PinId, DataSpec)> {
        vec![
            (Self::INPUT.into(), DataSpec::F32),
            (Self::MIN.into(), DataSpec::F32),
            (Self::MAX.into(), DataSpec::F32),
        ]
    }

    fn output_spec(&self) -> Vec<(PinId, DataSpec)> {
        vec![(Self::OUTPUT.into(), DataSpec::F32)]
    }

    fn update(&self, ctx: &mut OpContext) -> Result<(), GraphError> {
        let input = ctx.data_back(Self::INPUT)?.as_f32()?;
        let min = ctx.data_back(Self::MIN)?.as_f32()?;
        let max = ctx.data_back(Self::MAX)?.as_f32()?;

        ctx.set_data_fwd(Self::OUTPUT, input.clamp(min, max.max(min)));
        Ok(())
    }
}
