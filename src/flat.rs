//! Flat (array packed) neural networks.
//!
//! The whole network lives in a handful of vectors instead of a graph of neuron
//! objects. Slot order is reversed relative to declaration: slot `0` holds the output
//! layer, the highest slot holds the input layer, so the network result is always the
//! head of [`FlatNetwork::layer_output`].
//!
//! Weights between a "from" slot `s` and the "to" slot `s - 1` start at
//! `weight_index[s - 1]` and are stored to-neuron major:
//! `weights[weight_index[s - 1] + from_neuron + to_neuron * layer_counts[s]]`.

use log::debug;
use nalgebra::DMatrix;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use rand::Rng;
use serde::Serialize;

use crate::{
    activation::ActivationFunction,
    error::{NetworkError, Result},
    network::{
        layer::{DEFAULT_BIAS_ACTIVATION, NO_BIAS_ACTIVATION},
        FlatLayer,
    },
};

pub mod evaluator;
pub mod fabricator;
pub mod persist;

#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
#[serde(try_from = "persist::FlatNetworkData")]
pub struct FlatNetwork {
    pub(crate) input_count: usize,
    pub(crate) output_count: usize,
    /// Total neurons per slot: feed + bias + context.
    pub(crate) layer_counts: Vec<usize>,
    pub(crate) layer_feed_counts: Vec<usize>,
    pub(crate) layer_context_count: Vec<usize>,
    /// Offset of each slot into `layer_output`.
    pub(crate) layer_index: Vec<usize>,
    /// Offset of each slot's incoming weight block into `weights`.
    pub(crate) weight_index: Vec<usize>,
    pub(crate) context_target_offset: Vec<usize>,
    pub(crate) context_target_size: Vec<usize>,
    pub(crate) bias_activation: Vec<f64>,
    pub(crate) activation_functions: Vec<ActivationFunction>,
    pub(crate) layer_dropout_rates: Vec<f64>,
    pub(crate) weights: Vec<f64>,
    pub(crate) layer_output: Vec<f64>,
    /// Weighted sums before activation, parallel to `layer_output`.
    pub(crate) layer_sums: Vec<f64>,
    pub(crate) begin_training: usize,
    pub(crate) end_training: usize,
    pub(crate) connection_limit: f64,
    pub(crate) is_limited: bool,
    pub(crate) has_context: bool,
    #[serde(skip)]
    pub(crate) same_activation: Option<ActivationFunction>,
}

impl FlatNetwork {
    /// Builds a network from layer descriptions, input first.
    pub fn new(layers: &[FlatLayer]) -> Result<Self> {
        fabricator::FlatFabricator::build(layers)
    }

    /// Input layer, up to two hidden layers (zero skips one) and an output layer.
    ///
    /// The input layer is linear, all others use tanh or sigmoid. Every layer but the
    /// output carries a bias neuron.
    pub fn standard(
        input: usize,
        hidden1: usize,
        hidden2: usize,
        output: usize,
        tanh: bool,
    ) -> Result<Self> {
        let act = if tanh {
            ActivationFunction::tanh()
        } else {
            ActivationFunction::sigmoid()
        };

        let mut layers = vec![FlatLayer::new(
            ActivationFunction::linear(),
            input,
            DEFAULT_BIAS_ACTIVATION,
        )];
        layers.extend(
            [hidden1, hidden2]
                .iter()
                .filter(|&&count| count > 0)
                .map(|&count| FlatLayer::new(act, count, DEFAULT_BIAS_ACTIVATION)),
        );
        layers.push(FlatLayer::new(act, output, NO_BIAS_ACTIVATION));

        Self::new(&layers)
    }

    pub fn input_count(&self) -> usize {
        self.input_count
    }

    pub fn output_count(&self) -> usize {
        self.output_count
    }

    pub fn layer_counts(&self) -> &[usize] {
        &self.layer_counts
    }

    pub fn layer_feed_counts(&self) -> &[usize] {
        &self.layer_feed_counts
    }

    pub fn layer_context_count(&self) -> &[usize] {
        &self.layer_context_count
    }

    pub fn layer_index(&self) -> &[usize] {
        &self.layer_index
    }

    pub fn weight_index(&self) -> &[usize] {
        &self.weight_index
    }

    pub fn context_target_offset(&self) -> &[usize] {
        &self.context_target_offset
    }

    pub fn context_target_size(&self) -> &[usize] {
        &self.context_target_size
    }

    pub fn bias_activation(&self) -> &[f64] {
        &self.bias_activation
    }

    pub fn activation_functions(&self) -> &[ActivationFunction] {
        &self.activation_functions
    }

    pub fn layer_dropout_rates(&self) -> &[f64] {
        &self.layer_dropout_rates
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Direct weight access for gradient trainers. Index arrays stay untouched.
    pub fn weights_mut(&mut self) -> &mut [f64] {
        &mut self.weights
    }

    pub fn layer_output(&self) -> &[f64] {
        &self.layer_output
    }

    pub fn layer_sums(&self) -> &[f64] {
        &self.layer_sums
    }

    pub fn slot_count(&self) -> usize {
        self.layer_counts.len()
    }

    pub fn neuron_count(&self) -> usize {
        self.layer_counts.iter().sum()
    }

    pub fn encode_length(&self) -> usize {
        self.weights.len()
    }

    pub fn has_context(&self) -> bool {
        self.has_context
    }

    /// The activation shared by every slot, if all slots use the same one.
    pub fn same_activation(&self) -> Option<ActivationFunction> {
        self.same_activation
    }

    pub fn begin_training(&self) -> usize {
        self.begin_training
    }

    pub fn end_training(&self) -> usize {
        self.end_training
    }

    pub fn set_training_window(&mut self, begin: usize, end: usize) -> Result<()> {
        let last = self.slot_count() - 1;
        if begin > end || end > last {
            return Err(NetworkError::InvalidLayer {
                layer: if end > last { end } else { begin },
            });
        }
        self.begin_training = begin;
        self.end_training = end;
        Ok(())
    }

    pub fn connection_limit(&self) -> f64 {
        self.connection_limit
    }

    pub fn is_limited(&self) -> bool {
        self.is_limited
    }

    /// Weights whose magnitude falls below `limit` count as absent connections.
    pub fn set_connection_limit(&mut self, limit: f64) {
        self.connection_limit = limit;
        self.is_limited = limit > 0.0;
    }

    pub fn clear_connection_limit(&mut self) {
        self.connection_limit = 0.0;
        self.is_limited = false;
    }

    /// Replaces the activation of a layer in declaration order.
    pub fn set_activation(&mut self, layer: usize, activation: ActivationFunction) -> Result<()> {
        let slot = self.slot_of(layer)?;
        self.activation_functions[slot] = activation;
        self.same_activation = fabricator::shared_activation(&self.activation_functions);
        Ok(())
    }

    /// Zeroes every neuron except bias neurons, which are reset to their bias activation.
    ///
    /// Call before feeding an unrelated sequence into a recurrent network.
    pub fn clear_context(&mut self) {
        let mut index = 0;

        for slot in 0..self.layer_index.len() {
            let feed = self.layer_feed_counts[slot];
            let context = self.layer_context_count[slot];
            let has_bias = feed + context != self.layer_counts[slot];

            self.layer_output[index..index + feed].fill(0.0);
            index += feed;

            if has_bias {
                self.layer_output[index] = self.bias_activation[slot];
                index += 1;
            }

            self.layer_output[index..index + context].fill(0.0);
            index += context;
        }
    }

    /// Uniformly random weights in `[lo, hi)`.
    pub fn randomize(&mut self, lo: f64, hi: f64) {
        self.randomize_with(&mut rand::thread_rng(), lo, hi);
    }

    pub fn randomize_with<R: Rng + ?Sized>(&mut self, rng: &mut R, lo: f64, hi: f64) {
        for weight in self.weights.iter_mut() {
            *weight = rng.gen::<f64>() * (hi - lo) + lo;
        }
    }

    /// Copies the weights out, the whole state an evolutionary trainer needs.
    pub fn encode_to_array(&self) -> Vec<f64> {
        self.weights.clone()
    }

    pub fn decode_from_array(&mut self, data: &[f64]) -> Result<()> {
        if data.len() != self.weights.len() {
            return Err(NetworkError::WeightLength {
                expected: self.weights.len(),
                actual: data.len(),
            });
        }
        self.weights.copy_from_slice(data);
        Ok(())
    }

    /// Total neurons (bias and context included) of a layer in declaration order.
    pub fn layer_total_neuron_count(&self, layer: usize) -> Result<usize> {
        Ok(self.layer_counts[self.slot_of(layer)?])
    }

    /// Fed neurons of a layer in declaration order.
    pub fn layer_neuron_count(&self, layer: usize) -> Result<usize> {
        Ok(self.layer_feed_counts[self.slot_of(layer)?])
    }

    /// Weight between `from_neuron` of layer `from_layer` and `to_neuron` of the
    /// following layer. Layers are numbered in declaration order, input is `0`.
    ///
    /// The from side ranges over all neurons including bias and context, the to side
    /// only over fed neurons.
    pub fn weight(&self, from_layer: usize, from_neuron: usize, to_neuron: usize) -> Result<f64> {
        let index = self.weight_position(from_layer, from_neuron, to_neuron)?;
        Ok(self.weights[index])
    }

    pub fn set_weight(
        &mut self,
        from_layer: usize,
        from_neuron: usize,
        to_neuron: usize,
        value: f64,
    ) -> Result<()> {
        let index = self.weight_position(from_layer, from_neuron, to_neuron)?;
        self.weights[index] = value;
        Ok(())
    }

    /// False if the connection is pruned by the connection limit.
    pub fn is_connected(&self, from_layer: usize, from_neuron: usize, to_neuron: usize) -> Result<bool> {
        let weight = self.weight(from_layer, from_neuron, to_neuron)?;
        Ok(!self.is_limited || weight.abs() >= self.connection_limit)
    }

    /// Dense view of the weights leaving `from_layer`.
    ///
    /// One row per fed neuron of the following layer, one column per neuron of `from_layer`.
    pub fn weight_matrix(&self, from_layer: usize) -> Result<DMatrix<f64>> {
        let (from_slot, to_slot) = self.boundary_of(from_layer)?;
        let rows = self.layer_feed_counts[to_slot];
        let columns = self.layer_counts[from_slot];
        let start = self.weight_index[to_slot];

        Ok(DMatrix::from_row_slice(
            rows,
            columns,
            &self.weights[start..start + rows * columns],
        ))
    }

    /// Like [`weight_matrix`](Self::weight_matrix) but only with connections that exist,
    /// zero weights and weights pruned by the connection limit are left out.
    pub fn sparse_weight_matrix(&self, from_layer: usize) -> Result<CsrMatrix<f64>> {
        let dense = self.weight_matrix(from_layer)?;
        let mut coo = CooMatrix::new(dense.nrows(), dense.ncols());
        let mut pruned = 0;

        for row in 0..dense.nrows() {
            for column in 0..dense.ncols() {
                let weight = dense[(row, column)];
                if self.is_limited && weight.abs() < self.connection_limit {
                    pruned += 1;
                } else if weight != 0.0 {
                    coo.push(row, column, weight);
                }
            }
        }

        if pruned > 0 {
            debug!(
                "connection limit {} pruned {} weights leaving layer {}",
                self.connection_limit, pruned, from_layer
            );
        }

        Ok(CsrMatrix::from(&coo))
    }

    /// Derivative of a layer's activation at the current output of one of its fed neurons.
    /// Layers are numbered in declaration order.
    pub fn derivative(&self, layer: usize, neuron: usize) -> Result<Option<f64>> {
        let slot = self.slot_of(layer)?;
        if neuron >= self.layer_feed_counts[slot] {
            return Err(NetworkError::InvalidNeuron { layer, neuron });
        }
        let output = self.layer_output[self.layer_index[slot] + neuron];
        Ok(self.activation_functions[slot].derivative(output))
    }

    fn slot_of(&self, layer: usize) -> Result<usize> {
        let slots = self.slot_count();
        if layer >= slots {
            return Err(NetworkError::InvalidLayer { layer });
        }
        Ok(slots - layer - 1)
    }

    fn boundary_of(&self, from_layer: usize) -> Result<(usize, usize)> {
        let from_slot = self.slot_of(from_layer)?;
        if from_slot == 0 {
            return Err(NetworkError::NotConnected { layer: from_layer });
        }
        Ok((from_slot, from_slot - 1))
    }

    fn weight_position(&self, from_layer: usize, from_neuron: usize, to_neuron: usize) -> Result<usize> {
        let (from_slot, to_slot) = self.boundary_of(from_layer)?;

        if from_neuron >= self.layer_counts[from_slot] {
            return Err(NetworkError::InvalidNeuron {
                layer: from_layer,
                neuron: from_neuron,
            });
        }
        if to_neuron >= self.layer_feed_counts[to_slot] {
            return Err(NetworkError::InvalidNeuron {
                layer: from_layer + 1,
                neuron: to_neuron,
            });
        }

        Ok(self.weight_index[to_slot] + from_neuron + to_neuron * self.layer_counts[from_slot])
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, SeedableRng};

    use super::FlatNetwork;
    use crate::{
        activation::ActivationFunction,
        error::NetworkError,
        network::{
            layer::{DEFAULT_BIAS_ACTIVATION, NO_BIAS_ACTIVATION},
            FlatLayer,
        },
    };

    fn elman() -> FlatNetwork {
        FlatNetwork::new(&[
            FlatLayer::new(ActivationFunction::linear(), 2, DEFAULT_BIAS_ACTIVATION)
                .with_context_fed_by(1),
            FlatLayer::new(ActivationFunction::tanh(), 3, DEFAULT_BIAS_ACTIVATION),
            FlatLayer::new(ActivationFunction::linear(), 1, NO_BIAS_ACTIVATION),
        ])
        .unwrap()
    }

    #[test]
    fn standard_skips_empty_hidden_layers() {
        let net = FlatNetwork::standard(2, 0, 3, 1, true).unwrap();
        assert_eq!(net.slot_count(), 3);
        assert_eq!(net.layer_feed_counts(), &[1, 3, 2]);
        assert_eq!(net.layer_counts(), &[1, 4, 3]);
        assert_eq!(net.activation_functions()[2], ActivationFunction::linear());
        assert_eq!(net.activation_functions()[0], ActivationFunction::tanh());
        assert_eq!(net.same_activation(), None);

        let net = FlatNetwork::standard(2, 0, 0, 1, false).unwrap();
        assert_eq!(net.slot_count(), 2);
    }

    #[test]
    fn clear_context_restores_bias() {
        let mut net = elman();
        net.layer_output.iter_mut().for_each(|v| *v = 7.0);
        net.clear_context();

        // slots: output [o], hidden [h h h b], input [i i b c c c]
        assert_eq!(
            net.layer_output(),
            &[0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]
        );
    }

    #[test]
    fn encode_decode_round_trip() {
        let mut net = elman();
        net.randomize_with(&mut StdRng::seed_from_u64(7), -1.0, 1.0);
        let encoded = net.encode_to_array();

        let mut other = elman();
        other.decode_from_array(&encoded).unwrap();
        assert_eq!(other.weights(), net.weights());
        assert_eq!(other.encode_to_array(), encoded);
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let mut net = elman();
        let len = net.encode_length();
        assert_eq!(
            net.decode_from_array(&vec![0.0; len + 1]),
            Err(NetworkError::WeightLength {
                expected: len,
                actual: len + 1
            })
        );
    }

    #[test]
    fn randomize_stays_in_range() {
        let mut net = FlatNetwork::standard(4, 6, 5, 2, true).unwrap();
        net.randomize(-0.5, 0.5);
        assert!(net.weights().iter().all(|w| (-0.5..0.5).contains(w)));
    }

    #[test]
    fn weight_accessors_follow_layout() {
        let mut net = elman();
        // input (2 + bias + 3 context) -> hidden (3)
        net.set_weight(0, 5, 2, 0.25).unwrap();
        assert_eq!(net.weight(0, 5, 2).unwrap(), 0.25);
        let input_slot = 2;
        let index = net.weight_index()[input_slot - 1] + 5 + 2 * net.layer_counts()[input_slot];
        assert_eq!(net.weights()[index], 0.25);

        // hidden bias -> output
        net.set_weight(1, 3, 0, -2.0).unwrap();
        assert_eq!(net.weights()[3], -2.0);
    }

    #[test]
    fn weight_accessors_reject_bad_coordinates() {
        let net = elman();
        assert_eq!(
            net.weight(0, 6, 0),
            Err(NetworkError::InvalidNeuron {
                layer: 0,
                neuron: 6
            })
        );
        assert_eq!(
            net.weight(0, 0, 3),
            Err(NetworkError::InvalidNeuron {
                layer: 1,
                neuron: 3
            })
        );
        assert_eq!(net.weight(2, 0, 0), Err(NetworkError::NotConnected { layer: 2 }));
        assert_eq!(net.weight(3, 0, 0), Err(NetworkError::InvalidLayer { layer: 3 }));
    }

    #[test]
    fn weight_matrix_rows_are_to_neurons() {
        let mut net = FlatNetwork::standard(2, 0, 0, 2, false).unwrap();
        net.decode_from_array(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();

        let matrix = net.weight_matrix(0).unwrap();
        assert_eq!(matrix.shape(), (2, 3));
        assert_eq!(matrix[(0, 2)], 3.0);
        assert_eq!(matrix[(1, 0)], 4.0);
        assert_eq!(matrix[(1, 0)], net.weight(0, 0, 1).unwrap());
    }

    #[test]
    fn connection_limit_prunes_sparse_view() {
        let mut net = FlatNetwork::standard(2, 0, 0, 1, false).unwrap();
        net.decode_from_array(&[0.05, -0.5, 0.0]).unwrap();

        assert_eq!(net.sparse_weight_matrix(0).unwrap().nnz(), 2);

        net.set_connection_limit(0.1);
        assert!(net.is_limited());
        assert!(!net.is_connected(0, 0, 0).unwrap());
        assert!(net.is_connected(0, 1, 0).unwrap());
        let sparse = net.sparse_weight_matrix(0).unwrap();
        assert_eq!(sparse.nnz(), 1);
        assert_eq!(sparse.triplet_iter().next(), Some((0, 1, &-0.5)));

        net.clear_connection_limit();
        assert!(!net.is_limited());
        assert!(net.is_connected(0, 0, 0).unwrap());
    }

    #[test]
    fn derivative_reads_current_output() {
        let mut net = FlatNetwork::standard(1, 0, 0, 1, false).unwrap();
        // output layer: declared 1, stored first
        net.layer_output[0] = 0.5;
        assert_relative_eq!(net.derivative(1, 0).unwrap().unwrap(), 0.25);
        // linear input layer
        assert_relative_eq!(net.derivative(0, 0).unwrap().unwrap(), 1.0);
        assert_eq!(
            net.derivative(1, 1),
            Err(NetworkError::InvalidNeuron {
                layer: 1,
                neuron: 1
            })
        );
        assert_eq!(net.derivative(2, 0), Err(NetworkError::InvalidLayer { layer: 2 }));
    }

    #[test]
    fn training_window_is_validated() {
        let mut net = elman();
        assert_eq!((net.begin_training(), net.end_training()), (0, 2));
        net.set_training_window(1, 2).unwrap();
        assert_eq!(net.begin_training(), 1);
        assert!(net.set_training_window(2, 1).is_err());
        assert!(net.set_training_window(0, 3).is_err());
    }

    #[test]
    fn set_activation_updates_shared_flag() {
        let mut net = FlatNetwork::standard(2, 2, 0, 1, true).unwrap();
        assert_eq!(net.same_activation(), None);
        // the input layer is the only linear one
        net.set_activation(0, ActivationFunction::tanh()).unwrap();
        assert_eq!(net.same_activation(), Some(ActivationFunction::tanh()));
        assert_eq!(net.activation_functions()[2], ActivationFunction::tanh());
        assert!(net.set_activation(3, ActivationFunction::Sin).is_err());
    }
}
