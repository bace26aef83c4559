mod add;
mod blend_two;
mod clamp;
mod condition;
mod divide;
mod multiply;
mod reverse;
mod subtract;

pub use add::AddScalar;
pub use blend_two::BlendTwo;
pub use clamp::Clamp;
pub use condition::Condition;
pub use divide::DivideScalar;
pub use multiply::MultiplyScalar;
pub use reverse::Reverse;
pub use subtract::SubtractScalar;
