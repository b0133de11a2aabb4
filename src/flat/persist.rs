//! Persisted form of a [`FlatNetwork`]: the derived arrays themselves.
//!
//! Loading never re-runs index construction, it only checks that the arrays agree
//! with each other before handing out a network.

use std::convert::TryFrom;

use log::debug;
use ron::ser::PrettyConfig;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    activation::ActivationFunction,
    error::{NetworkError, Result},
};

use super::{fabricator::shared_activation, FlatNetwork};

/// Deserialization shape of [`FlatNetwork`], checked before conversion.
#[derive(Debug, Deserialize)]
pub struct FlatNetworkData {
    input_count: usize,
    output_count: usize,
    layer_counts: Vec<usize>,
    layer_feed_counts: Vec<usize>,
    layer_context_count: Vec<usize>,
    layer_index: Vec<usize>,
    weight_index: Vec<usize>,
    context_target_offset: Vec<usize>,
    context_target_size: Vec<usize>,
    bias_activation: Vec<f64>,
    activation_functions: Vec<ActivationFunction>,
    layer_dropout_rates: Vec<f64>,
    weights: Vec<f64>,
    layer_output: Vec<f64>,
    layer_sums: Vec<f64>,
    begin_training: usize,
    end_training: usize,
    connection_limit: f64,
    is_limited: bool,
    has_context: bool,
}

impl TryFrom<FlatNetworkData> for FlatNetwork {
    type Error = NetworkError;

    fn try_from(data: FlatNetworkData) -> Result<Self> {
        data.validate()?;

        let same_activation = shared_activation(&data.activation_functions);

        Ok(FlatNetwork {
            input_count: data.input_count,
            output_count: data.output_count,
            layer_counts: data.layer_counts,
            layer_feed_counts: data.layer_feed_counts,
            layer_context_count: data.layer_context_count,
            layer_index: data.layer_index,
            weight_index: data.weight_index,
            context_target_offset: data.context_target_offset,
            context_target_size: data.context_target_size,
            bias_activation: data.bias_activation,
            activation_functions: data.activation_functions,
            layer_dropout_rates: data.layer_dropout_rates,
            weights: data.weights,
            layer_output: data.layer_output,
            layer_sums: data.layer_sums,
            begin_training: data.begin_training,
            end_training: data.end_training,
            connection_limit: data.connection_limit,
            is_limited: data.is_limited,
            has_context: data.has_context,
            same_activation,
        })
    }
}

fn corrupt(message: String) -> NetworkError {
    NetworkError::CorruptNetwork(message)
}

impl FlatNetworkData {
    fn validate(&self) -> Result<()> {
        let slots = self.layer_counts.len();
        if slots < 2 {
            return Err(NetworkError::TooFewLayers { count: slots });
        }

        let per_slot = [
            ("layer_feed_counts", self.layer_feed_counts.len()),
            ("layer_context_count", self.layer_context_count.len()),
            ("layer_index", self.layer_index.len()),
            ("weight_index", self.weight_index.len()),
            ("context_target_offset", self.context_target_offset.len()),
            ("context_target_size", self.context_target_size.len()),
            ("bias_activation", self.bias_activation.len()),
            ("activation_functions", self.activation_functions.len()),
            ("layer_dropout_rates", self.layer_dropout_rates.len()),
        ];
        for (name, len) in per_slot.iter() {
            if *len != slots {
                return Err(corrupt(format!("{} has {} entries, expected {}", name, len, slots)));
            }
        }

        let mut neurons = 0;
        for slot in 0..slots {
            let bias = (self.bias_activation[slot] != 0.0) as usize;
            let expected = self.layer_feed_counts[slot] + bias + self.layer_context_count[slot];
            if self.layer_counts[slot] != expected {
                return Err(corrupt(format!(
                    "slot {} counts {} neurons, feed, bias and context add up to {}",
                    slot, self.layer_counts[slot], expected
                )));
            }
            if self.layer_index[slot] != neurons {
                return Err(corrupt(format!("slot {} starts at the wrong neuron", slot)));
            }
            if slot > 0 {
                let block = self.layer_counts[slot] * self.layer_feed_counts[slot - 1];
                if self.weight_index[slot] != self.weight_index[slot - 1] + block {
                    return Err(corrupt(format!("slot {} starts at the wrong weight", slot)));
                }
            } else if self.weight_index[0] != 0 {
                return Err(corrupt("slot 0 starts at the wrong weight".into()));
            }
            neurons += self.layer_counts[slot];
        }

        if self.layer_output.len() != neurons || self.layer_sums.len() != neurons {
            return Err(corrupt(format!(
                "{} neurons but {} outputs and {} sums",
                neurons,
                self.layer_output.len(),
                self.layer_sums.len()
            )));
        }
        if self.weights.len() != self.weight_index[slots - 1] {
            return Err(NetworkError::WeightLength {
                expected: self.weight_index[slots - 1],
                actual: self.weights.len(),
            });
        }
        if self.input_count != self.layer_feed_counts[slots - 1]
            || self.output_count != self.layer_feed_counts[0]
        {
            return Err(corrupt("input or output count disagrees with the slots".into()));
        }

        for slot in 0..slots {
            let size = self.context_target_size[slot];
            if size > 0 && size != self.layer_feed_counts[slot] {
                return Err(NetworkError::ContextMismatch {
                    slot,
                    expected: size,
                    actual: self.layer_feed_counts[slot],
                });
            }
            if size > 0 && self.context_target_offset[slot] + size > neurons {
                return Err(corrupt(format!("context target of slot {} is out of range", slot)));
            }
        }

        if self.begin_training > self.end_training || self.end_training >= slots {
            return Err(corrupt("training window out of range".into()));
        }

        Ok(())
    }
}

/// Networks that are stored as their raw arrays and checked on the way back in.
pub trait Persist: Serialize + Sized {
    type Data: DeserializeOwned;

    fn restore(data: Self::Data) -> Result<Self>;
}

impl Persist for FlatNetwork {
    type Data = FlatNetworkData;

    fn restore(data: FlatNetworkData) -> Result<Self> {
        FlatNetwork::try_from(data)
    }
}

/// Serializes any network of this crate to RON.
pub fn to_ron<T: Serialize>(network: &T) -> Result<String> {
    let text = ron::ser::to_string_pretty(network, PrettyConfig::default())
        .map_err(|e| NetworkError::Persistence(e.to_string()))?;
    debug!("serialized network into {} bytes of ron", text.len());
    Ok(text)
}

/// Restores a network from RON.
///
/// Malformed text is a [`NetworkError::Persistence`], arrays that contradict each
/// other come back as the validation error itself.
pub fn from_ron<T: Persist>(text: &str) -> Result<T> {
    debug!("restoring network from {} bytes of ron", text.len());
    let data: T::Data =
        ron::from_str(text).map_err(|e| NetworkError::Persistence(e.to_string()))?;
    T::restore(data)
}

#[cfg(test)]
mod tests {
    use std::convert::TryFrom;

    use rand::{rngs::StdRng, SeedableRng};

    use super::{from_ron, to_ron, FlatNetworkData};
    use crate::{
        activation::ActivationFunction,
        error::NetworkError,
        flat::FlatNetwork,
        network::{
            layer::{DEFAULT_BIAS_ACTIVATION, NO_BIAS_ACTIVATION},
            FlatLayer, StatefulEvaluator,
        },
    };

    fn recurrent() -> FlatNetwork {
        let mut net = FlatNetwork::new(&[
            FlatLayer::new(ActivationFunction::linear(), 2, DEFAULT_BIAS_ACTIVATION)
                .with_context_fed_by(1),
            FlatLayer::new(
                ActivationFunction::Step {
                    center: 0.1,
                    low: -1.0,
                    high: 2.0,
                },
                3,
                DEFAULT_BIAS_ACTIVATION,
            ),
            FlatLayer::new(
                ActivationFunction::Competitive { max_winners: 2 },
                3,
                NO_BIAS_ACTIVATION,
            ),
        ])
        .unwrap();
        net.randomize_with(&mut StdRng::seed_from_u64(23), -1.0, 1.0);
        net
    }

    #[test]
    fn restores_identical_network() {
        let mut net = recurrent();
        net.evaluate(vec![0.5, -0.5]).unwrap();

        let text = to_ron(&net).unwrap();
        let mut restored: FlatNetwork = from_ron(&text).unwrap();
        assert_eq!(restored, net);

        assert_eq!(
            restored.evaluate(vec![0.25, 0.75]).unwrap(),
            net.evaluate(vec![0.25, 0.75]).unwrap()
        );
    }

    fn arrays(net: &FlatNetwork) -> FlatNetworkData {
        ron::from_str(&to_ron(net).unwrap()).unwrap()
    }

    fn corrupt(result: Result<FlatNetwork, NetworkError>) -> bool {
        matches!(result, Err(NetworkError::CorruptNetwork(_)))
    }

    #[test]
    fn rejects_malformed_text() {
        assert!(matches!(
            from_ron::<FlatNetwork>("(input_count: 1)"),
            Err(NetworkError::Persistence(_))
        ));
    }

    #[test]
    fn validation_errors_reach_the_caller() {
        let net = recurrent();
        let text = to_ron(&net).unwrap();

        let widened = text.replacen("begin_training: 0", "begin_training: 9", 1);
        assert!(corrupt(from_ron::<FlatNetwork>(&widened)));

        let lengthened = text.replacen("weights: [", "weights: [0.5, ", 1);
        assert_eq!(
            from_ron::<FlatNetwork>(&lengthened),
            Err(NetworkError::WeightLength {
                expected: net.weights().len(),
                actual: net.weights().len() + 1
            })
        );
    }

    #[test]
    fn rejects_wrong_layer_counts() {
        let mut data = arrays(&recurrent());
        data.layer_counts[1] += 1;
        assert!(corrupt(FlatNetwork::try_from(data)));
    }

    #[test]
    fn rejects_wrong_layer_index() {
        let mut data = arrays(&recurrent());
        data.layer_index[1] += 1;
        assert!(corrupt(FlatNetwork::try_from(data)));
    }

    #[test]
    fn rejects_context_target_out_of_range() {
        let mut data = arrays(&recurrent());
        // hidden slot 1 feeds the input slot's context
        data.context_target_offset[1] = data.layer_output.len();
        assert!(corrupt(FlatNetwork::try_from(data)));
    }

    #[test]
    fn rejects_context_size_mismatch() {
        let mut data = arrays(&recurrent());
        data.context_target_size[1] = 2;
        assert_eq!(
            FlatNetwork::try_from(data),
            Err(NetworkError::ContextMismatch {
                slot: 1,
                expected: 2,
                actual: 3
            })
        );
    }

    #[test]
    fn rejects_training_window_outside_slots() {
        let mut data = arrays(&recurrent());
        data.end_training = 3;
        assert!(corrupt(FlatNetwork::try_from(data)));

        let mut data = arrays(&recurrent());
        data.begin_training = 2;
        data.end_training = 1;
        assert!(corrupt(FlatNetwork::try_from(data)));
    }
}
