use autorig_core::data::DataSpec;
use autorig_core::errors::GraphError;
use autorig_core::id::PinId;
use autorig_core::operator::{OpContext, Operator};

#[derive(Clone, Debug, Default)]
pub struct Distance;

impl Distance {
    pub const POINT_1: &'static str = "point1";
    pub const POINT_2: &'static str = "point2";
    pub const OUTPUT: &'static str = "distance";

    pub fn new() -> Self {
        Self
    }
}

impl Operator for Distance {
    fn kind_tag(&self) -> &'static str {
        "DIST"
    }

    fn display_name(&self) -> String {
        "Distance Between".into()
    }

    fn input_spec(&self) -> Vec<(PinId, DataSpec)> {
        vec![
            (Self::POINT_1.into(), DataSpec::Vec3),
            (Self::POINT_2.into(), DataSpec::Vec3),
        ]
    }

    fn output_spec(&self) -> Vec<(PinId, DataSpec)> {
        vec![(Self::OUTPUT.into(), DataSpec::F32)]
    }

    fn update(&self, ctx: &mut OpContext) -> Result<(), GraphError> {
        let point_1 = ctx.data_back(Self::POINT_1)?.as_vec3()?;
        let point_2 = ctx.data_back(Self::POINT_2)?.as_vec3()?;

        ctx.set_data_fwd(Self::OUTPUT, point_1.distance(point_2));
        Ok(())
    }
}
