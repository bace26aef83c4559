use thiserror::Error;

use autorig_core::errors::{ConfigError, GeometryError, GraphError, SceneError};

/// Single error surface of a build: each stage either fully completes or
/// raises one of these; partial output is never rolled back automatically.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

pub type BuildResult<T> = Result<T, BuildError>;
