mod compose;
mod decompose;
mod inverse;
mod multiply;

pub use compose::ComposeMatrix;
pub use decompose::DecomposeMatrix;
pub use inverse::InverseMatrix;
pub use multiply::MultiplyMatrix;
