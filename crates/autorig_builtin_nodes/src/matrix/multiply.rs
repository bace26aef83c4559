use autorig_core::data::DataSpec;
use autorig_core::errors::GraphError;
use autorig_core::id::PinId;
use autorig_core::operator::{OpContext, Operator};

/// `matrixIn1 * matrixIn0`: input 0 applied first, the composition order
/// space-switching networks expect.
#[derive(Clone, Debug, Default)]
pub struct MultiplyMatrix;

impl MultiplyMatrix {
    pub const MATRIX_IN_0: &'static str = "matrixIn0";
    pub const MATRIX_IN_1: &'static str = "matrixIn1";
    pub const OUTPUT: &'static str = "matrixSum";

    pub fn new() -> Self {
        Self
    }
}

impl Operator for MultiplyMatrix {
    fn kind_tag(&self) -> &'static str {
        "MM"
    }

    fn display_name(&self) -> String {
        "Mult Matrix".into()
    }

    fn input_spec(&self) -> Vec<(PinId, DataSpec)> {
        vec![
            (Self::MATRIX_IN_0.into(), DataSpec::Mat4),
            (Self::MATRIX_IN_1.into(), DataSpec::Mat4),
        ]
    }

    fn output_spec(&self) -> Vec<(PinId, DataSpec)> {
        vec![(Self::OUTPUT.into(), DataSpec::Mat4)]
    }

    fn update(&self, ctx: &mut OpContext) -> Result<(), GraphError> {
        let matrix_0 = ctx.data_back(Self::MATRIX_IN_0)?.as_mat4()?;
        let matrix_1 = ctx.data_back(Self::MATRIX_IN_1)?.as_mat4()?;

        ctx.set_data_fwd(Self::OUTPUT, matrix_1 * matrix_0);
        Ok(())
    }
}
