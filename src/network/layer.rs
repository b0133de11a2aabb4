use crate::activation::ActivationFunction;

/// Bias neuron value of hidden and input layers built by the convenience constructors.
pub const DEFAULT_BIAS_ACTIVATION: f64 = 1.0;

/// A bias activation of zero means the layer carries no bias neuron.
pub const NO_BIAS_ACTIVATION: f64 = 0.0;

/// Build-time description of one layer.
///
/// Only consulted while the flat arrays are derived, the network does not keep it.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatLayer {
    pub count: usize,
    pub bias_activation: f64,
    pub activation: ActivationFunction,
    /// Index (in declaration order) of the layer whose output is copied into
    /// this layer's context neurons after every pass.
    pub context_fed_by: Option<usize>,
    pub dropout_rate: f64,
}

impl FlatLayer {
    pub fn new(activation: ActivationFunction, count: usize, bias_activation: f64) -> Self {
        FlatLayer {
            count,
            bias_activation,
            activation,
            context_fed_by: None,
            dropout_rate: 0.0,
        }
    }

    pub fn with_context_fed_by(mut self, layer: usize) -> Self {
        self.context_fed_by = Some(layer);
        self
    }

    pub fn with_dropout_rate(mut self, rate: f64) -> Self {
        self.dropout_rate = rate;
        self
    }

    pub fn has_bias(&self) -> bool {
        self.bias_activation != NO_BIAS_ACTIVATION
    }
}
