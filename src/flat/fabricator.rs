use log::debug;

use crate::{
    activation::ActivationFunction,
    error::{NetworkError, Result},
    network::{Fabricator, FlatLayer},
};

use super::FlatNetwork;

pub struct FlatFabricator;

impl Fabricator for FlatFabricator {
    type Output = FlatNetwork;

    fn fabricate(layers: &[FlatLayer]) -> Result<Self::Output> {
        Self::build(layers)
    }
}

impl FlatFabricator {
    pub(crate) fn build(layers: &[FlatLayer]) -> Result<FlatNetwork> {
        if layers.len() < 2 {
            return Err(NetworkError::TooFewLayers {
                count: layers.len(),
            });
        }

        let context_counts = context_counts(layers)?;
        let total = |layer: usize| {
            layers[layer].count + layers[layer].has_bias() as usize + context_counts[layer]
        };

        let slots = layers.len();
        let mut layer_counts = vec![0; slots];
        let mut layer_feed_counts = vec![0; slots];
        let mut layer_context_count = vec![0; slots];
        let mut layer_index = vec![0; slots];
        let mut weight_index = vec![0; slots];
        let mut context_target_offset = vec![0; slots];
        let mut context_target_size = vec![0; slots];
        let mut bias_activation = vec![0.0; slots];
        let mut activation_functions = Vec::with_capacity(slots);
        let mut layer_dropout_rates = vec![0.0; slots];

        let mut neuron_count = 0;
        let mut weight_count = 0;

        // walk from output to input, slot 0 is the last declared layer
        for (slot, (declared, layer)) in layers.iter().enumerate().rev().enumerate() {
            bias_activation[slot] = layer.bias_activation;
            layer_counts[slot] = total(declared);
            layer_feed_counts[slot] = layer.count;
            layer_context_count[slot] = context_counts[declared];
            activation_functions.push(layer.activation);
            layer_dropout_rates[slot] = layer.dropout_rate;

            neuron_count += layer_counts[slot];

            if declared > 0 {
                weight_count += layer.count * total(declared - 1);
            }

            if slot > 0 {
                weight_index[slot] =
                    weight_index[slot - 1] + layer_counts[slot] * layer_feed_counts[slot - 1];
                layer_index[slot] = layer_index[slot - 1] + layer_counts[slot - 1];
            }

            // the context region sits at the tail of the consuming layer's block,
            // sized from this layer's count by context_counts
            let mut neuron_index = 0;
            for (target, other) in layers.iter().enumerate().rev() {
                if other.context_fed_by == Some(declared) {
                    context_target_size[slot] = layer.count;
                    context_target_offset[slot] =
                        neuron_index + total(target) - context_counts[target];
                }
                neuron_index += total(target);
            }
        }

        debug_assert_eq!(weight_count, weight_index[slots - 1]);

        let has_context = context_target_size.iter().any(|&size| size > 0);
        let same_activation = shared_activation(&activation_functions);

        debug!(
            "fabricated flat network: {} slots, {} neurons, {} weights, context: {}",
            slots, neuron_count, weight_count, has_context
        );

        let mut network = FlatNetwork {
            input_count: layers[0].count,
            output_count: layers[slots - 1].count,
            layer_counts,
            layer_feed_counts,
            layer_context_count,
            layer_index,
            weight_index,
            context_target_offset,
            context_target_size,
            bias_activation,
            activation_functions,
            layer_dropout_rates,
            weights: vec![0.0; weight_count],
            layer_output: vec![0.0; neuron_count],
            layer_sums: vec![0.0; neuron_count],
            begin_training: 0,
            end_training: slots - 1,
            connection_limit: 0.0,
            is_limited: false,
            has_context,
            same_activation,
        };

        network.clear_context();

        Ok(network)
    }
}

/// Context neurons per declared layer: the feed count of the layer it is fed by.
fn context_counts(layers: &[FlatLayer]) -> Result<Vec<usize>> {
    let mut fed = vec![false; layers.len()];

    layers
        .iter()
        .enumerate()
        .map(|(layer, description)| match description.context_fed_by {
            None => Ok(0),
            Some(source) if source >= layers.len() => Err(NetworkError::ContextSourceOutOfRange {
                layer,
                source_layer: source,
            }),
            Some(source) if fed[source] => Err(NetworkError::DuplicateContextSource {
                source_layer: source,
            }),
            Some(source) => {
                fed[source] = true;
                Ok(layers[source].count)
            }
        })
        .collect()
}

pub(crate) fn shared_activation(functions: &[ActivationFunction]) -> Option<ActivationFunction> {
    let first = functions.first()?;
    if functions.iter().all(|function| function == first) {
        Some(*first)
    } else {
        None
    }
}
