use thiserror::Error;

pub type Result<T> = std::result::Result<T, NetworkError>;

/// Everything that can go wrong while building, evaluating or restoring a flat network.
///
/// All of these are caller defects, nothing is retried internally.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NetworkError {
    #[error("a flat network needs at least two layers, got {count}")]
    TooFewLayers { count: usize },
    #[error("layer {layer} names layer {source_layer} as context source, which does not exist")]
    ContextSourceOutOfRange { layer: usize, source_layer: usize },
    #[error("layer {source_layer} feeds the context of more than one layer")]
    DuplicateContextSource { source_layer: usize },
    #[error("context of slot {slot} expects {expected} neurons but its source provides {actual}")]
    ContextMismatch {
        slot: usize,
        expected: usize,
        actual: usize,
    },
    #[error("input has length {actual}, network expects {expected}")]
    InputLength { expected: usize, actual: usize },
    #[error("input must be a single row, got a {rows}x{columns} matrix")]
    InputShape { rows: usize, columns: usize },
    #[error("output has length {actual}, network produces {expected}")]
    OutputLength { expected: usize, actual: usize },
    #[error("incompatible weight sizes, can't assign length {actual} to length {expected}")]
    WeightLength { expected: usize, actual: usize },
    #[error("invalid layer number: {layer}")]
    InvalidLayer { layer: usize },
    #[error("invalid neuron number {neuron} in layer {layer}")]
    InvalidNeuron { layer: usize, neuron: usize },
    #[error("layer {layer} is not connected to a following layer")]
    NotConnected { layer: usize },
    #[error("activation {activation} has no parameter {index}")]
    InvalidParameter {
        activation: &'static str,
        index: usize,
    },
    #[error("network arrays are inconsistent: {0}")]
    CorruptNetwork(String),
    #[error("persistence failed: {0}")]
    Persistence(String),
    #[error("radial basis setup failed: {0}")]
    Rbf(String),
}
