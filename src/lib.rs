pub mod activation;
pub mod error;
pub mod flat;
pub mod network;
pub mod rbf;

pub use activation::ActivationFunction;
pub use error::{NetworkError, Result};
pub use flat::{fabricator::FlatFabricator, persist, FlatNetwork};
pub use network::{Fabricator, FlatLayer, NetworkIO, StatefulEvaluator};
pub use rbf::{FlatNetworkRbf, RadialBasisFunction, RbfKind};
