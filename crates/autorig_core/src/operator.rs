//! The computation-node abstraction behind utility scene nodes.
//!
//! An [`Operator`] is a small pure function with named, typed input and
//! output pins. Concrete kinds live in the builtin-nodes crate; the scene
//! only ever sees the trait object.

use std::fmt::Debug;

use bevy::platform::collections::HashMap;

use crate::data::{DataSpec, DataValue};
use crate::errors::GraphError;
use crate::id::PinId;

pub trait Operator: OperatorClone + Debug + Send + Sync + 'static {
    /// Canonical suffix appended to the node name, e.g. `REV` or `DCPM`.
    fn kind_tag(&self) -> &'static str;

    fn display_name(&self) -> String;

    /// Ordered input pins with their types. Inputs are materialized as
    /// attributes on the owning scene node so they hold defaults and accept
    /// connections.
    fn input_spec(&self) -> Vec<(PinId, DataSpec)>;

    /// Ordered output pins with their types.
    fn output_spec(&self) -> Vec<(PinId, DataSpec)>;

    /// Default values for input pins. Kinds whose neutral element is not
    /// the type default (a compose scale, say) override this.
    fn input_defaults(&self) -> Vec<(PinId, DataValue)> {
        self.input_spec()
            .into_iter()
            .map(|(pin, spec)| (pin, spec.default_value()))
            .collect()
    }

    /// Compute all outputs from the resolved inputs.
    fn update(&self, ctx: &mut OpContext) -> Result<(), GraphError>;
}

pub trait OperatorClone {
    fn clone_operator(&self) -> Box<dyn Operator>;
}

impl<T> OperatorClone for T
where
    T: 'static + Operator + Clone,
{
    fn clone_operator(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Operator> {
    fn clone(&self) -> Self {
        self.clone_operator()
    }
}

/// Resolved inputs handed to an operator, and the outputs it writes back.
pub struct OpContext {
    inputs: HashMap<PinId, DataValue>,
    outputs: HashMap<PinId, DataValue>,
}

impl OpContext {
    pub fn new(inputs: HashMap<PinId, DataValue>) -> Self {
        Self {
            inputs,
            outputs: HashMap::new(),
        }
    }

    /// Read a resolved input value.
    pub fn data_back(&self, pin: &str) -> Result<DataValue, GraphError> {
        self.inputs
            .get(pin)
            .copied()
            .ok_or_else(|| GraphError::MissingInputPin(pin.to_string()))
    }

    /// Publish an output value.
    pub fn set_data_fwd(&mut self, pin: &str, value: impl Into<DataValue>) {
        self.outputs.insert(pin.to_string(), value.into());
    }

    pub fn output(&self, pin: &str) -> Option<DataValue> {
        self.outputs.get(pin).copied()
    }

    pub fn into_outputs(self) -> HashMap<PinId, DataValue> {
        self.outputs
    }
}
