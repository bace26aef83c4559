use thiserror::Error;

use crate::data::DataSpec;
use crate::id::{NodeRef, PinId, SourcePlug, TargetPlug};

/// Errors produced while pulling values through the dataflow network.
#[non_exhaustive]
#[derive(Debug, Error, Clone)]
pub enum GraphError {
    #[error("no value or edge behind the target {0:?}")]
    MissingInputData(TargetPlug),
    #[error("operator update did not produce output for pin `{0}`")]
    MissingInputPin(PinId),
    #[error("node update did not produce output for {0:?}")]
    OutputMissing(SourcePlug),
    #[error("tried to convert to incorrect data type: expected {expected:?}, got {found:?}")]
    MismatchedDataType { expected: DataSpec, found: DataSpec },
    #[error("evaluation cycled back through {0}")]
    EvaluationCycle(String),
    #[error("unknown node referenced during evaluation: {0:?}")]
    MissingNode(NodeRef),
    #[error("no pin `{pin}` to evaluate on node `{node}`")]
    UnknownPin { node: String, pin: String },
    #[error("ik handle chain is broken between {start:?} and {end:?}")]
    BrokenIkChain { start: NodeRef, end: NodeRef },
}

pub type GraphResult<T> = Result<T, GraphError>;
