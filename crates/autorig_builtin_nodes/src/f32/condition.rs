use autorig_core::data::DataSpec;
use autorig_core::errors::GraphError;
use autorig_core::id::PinId;
use autorig_core::operator::{OpContext, Operator};

/// Numeric select: compares two terms, forwards one of two values.
///
/// Operations follow the classic condition-node indices:
/// 0 equal, 1 not equal, 2 greater, 3 greater or equal, 4 less,
/// 5 less or equal. Unknown indices behave as not-equal.
#[derive(Clone, Debug, Default)]
pub struct Condition;

impl Condition {
    pub const FIRST_TERM: &'static str = "firstTerm";
    pub const SECOND_TERM: &'static str = "secondTerm";
    pub const OPERATION: &'static str = "operation";
    pub const IF_TRUE: &'static str = "colorIfTrue";
    pub const IF_FALSE: &'static str = "colorIfFalse";
    pub const OUTPUT: &'static str = "outColor";

    pub fn new() -> Self {
        Self
    }
}

impl Operator for Condition {
    fn kind_tag(&self) -> &'static str {
        "CND"
    }

    fn display_name(&self) -> String {
        "Condition".into()
    }

    fn input_spec(&self) -> Vec<(PinId, DataSpec)> {
        vec![
            (Self::FIRST_TERM.into(), DataSpec::F32),
            (Self::SECOND_TERM.into(), DataSpec::F32),
            (Self::OPERATION.into(), DataSpec::I32),
            (Self::IF_TRUE.into(), DataSpec::F32),
            (Self::IF_FALSE.into(), DataSpec::F32),
        ]
    }

    fn output_spec(&self) -> Vec<(PinId, DataSpec)> {
        vec![(Self::OUTPUT.into(), DataSpec::F32)]
    }

    fn update(&self, ctx: &mut OpContext) -> Result<(), GraphError> {
        let first = ctx.data_back(Self::FIRST_TERM)?.as_f32()?;
        let second = ctx.data_back(Self::SECOND_TERM)?.as_f32()?;
        let operation = ctx.data_back(Self::OPERATION)?.as_i32()?;
        let if_true = ctx.data_back(Self::IF_TRUE)?.as_f32()?;
        let if_false = ctx.data_back(Self::IF_FALSE)?.as_f32()?;

        let holds = match operation {
            0 => first == second,
            2 => first > second,
            3 => first >= second,
            4 => first < second,
            5 => first <= second,
            _ => first != second,
        };
        ctx.set_data_fwd(Self::OUTPUT, if holds { if_true } else { if_false });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::platform::collections::HashMap;

    fn run(first: f32, second: f32, operation: i32) -> f32 {
        let mut inputs = HashMap::new();
        inputs.insert(Condition::FIRST_TERM.to_string(), first.into());
        inputs.insert(Condition::SECOND_TERM.to_string(), second.into());
        inputs.insert(Condition::OPERATION.to_string(), operation.into());
        inputs.insert(Condition::IF_TRUE.to_string(), 1.0.into());
        inputs.insert(Condition::IF_FALSE.to_string(), (-1.0).into());
        let mut ctx = OpContext::new(inputs);
        Condition::new().update(&mut ctx).unwrap();
        ctx.output(Condition::OUTPUT).unwrap().as_f32().unwrap()
    }

    #[test]
    fn comparison_operations() {
        assert_eq!(run(1., 1., 0), 1.);
        assert_eq!(run(1., 2., 0), -1.);
        assert_eq!(run(3., 2., 2), 1.);
        assert_eq!(run(2., 2., 3), 1.);
        assert_eq!(run(1., 2., 4), 1.);
        assert_eq!(run(3., 2., 5), -1.);
        assert_eq!(run(1., 2., 1), 1.);
    }
}
