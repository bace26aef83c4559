use autorig_core::data::DataSpec;
use autorig_core::errors::GraphError;
use autorig_core::id::PinId;
use autorig_core::operator::{OpContext, Operator};

#[derive(Clone, Debug, Default)]
pub struct InverseMatrix;

impl InverseMatrix {
    pub const INPUT: &'static str = "inputMatrix";
    pub const OUTPUT: &'static str = "outputMatrix";

    pub fn new() -> Self {
        Self
    }
}

impl Operator for InverseMatrix {
    fn kind_tag(&self) -> &'static str {
        "INVM"
    }

    fn display_name(&self) -> String {
        "Inverse Matrix".into()
    }

    fn input_spec(&self) -> Vec<(PinId, DataSpec)> {
        vec![(Self::INPUT.into(), DataSpec::Mat4)]
    }

    fn output_spec(&self) -> Vec<(PinId, DataSpec)> {
        vec![(Self::OUTPUT.into(), DataSpec::Mat4)]
    }

    fn update(&self, ctx: &mut OpContext) -> Result<(), GraphError> {
        let input = ctx.data_back(Self::INPUT)?.as_mat4()?;
        ctx.set_data_fwd(Self::OUTPUT, input.inverse());
        Ok(())
    }
}
