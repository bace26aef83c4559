use autorig_core::data::DataSpec;
use autorig_core::errors::GraphError;
use autorig_core::id::PinId;
use autorig_core::operator::{OpContext, Operator};

/// `1 - x`, the complement node every IK/FK switch hangs off.
#[derive(Clone, Debug, Default)]
pub struct Reverse;

impl Reverse {
    pub const INPUT: &'static str = "inputX";
    pub const OUTPUT: &'static str = "outputX";

    pub fn new() -> Self {
        Self
    }
}

impl Operator for Reverse {
    fn kind_tag(&self) -> &'static str {
        "REV"
    }

    fn display_name(&self) -> String {
        "Reverse".into()
    }

    fn input_spec(&self) -> Vec<(PinId, DataSpec)> {
        vec![(Self::INPUT.into(), DataSpec::F32)]
    }

    fn output_spec(&self) -> Vec<(PinId, DataSpec)> {
        vec![(Self::OUTPUT.into(), DataSpec::F32)]
    }

    fn update(&self, ctx: &mut OpContext) -> Result<(), GraphError> {
        let x = ctx.data_back(Self::INPUT)?.as_f32()?;
        ctx.set_data_fwd(Self::OUTPUT, 1. - x);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::platform::collections::HashMap;

    #[test]
    fn complements() {
        let mut inputs = HashMap::new();
        inputs.insert(Reverse::INPUT.to_string(), 0.3.into());
        let mut ctx = OpContext::new(inputs);
        Reverse::new().update(&mut ctx).unwrap();
        assert_eq!(ctx.output(Reverse::OUTPUT).unwrap().as_f32().unwrap(), 0.7);
    }
}
