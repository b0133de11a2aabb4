use std::convert::TryFrom;

use log::debug;
use nalgebra::DMatrix;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    activation::ActivationFunction,
    error::{NetworkError, Result},
    flat::{
        persist::{FlatNetworkData, Persist},
        FlatNetwork,
    },
    network::{
        layer::{DEFAULT_BIAS_ACTIVATION, NO_BIAS_ACTIVATION},
        FlatLayer, NetworkIO, StatefulEvaluator,
    },
};

use super::{RadialBasisFunction, RbfKind};

/// Slot of the radial basis layer: output is slot 0, input slot 2.
const HIDDEN_SLOT: usize = 1;

/// Peak of every function laid out by the center and width helpers.
pub const DEFAULT_PEAK: f64 = 0.5;

/// A three layer flat network whose hidden layer answers with radial basis responses
/// to the raw input instead of weighted sums. The output layer is a plain linear
/// flat layer over the hidden responses and a bias neuron.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FlatNetworkRbfData")]
pub struct FlatNetworkRbf {
    flat: FlatNetwork,
    rbf: Vec<RadialBasisFunction>,
}

/// Deserialization shape of [`FlatNetworkRbf`], checked before conversion.
#[derive(Debug, Deserialize)]
pub struct FlatNetworkRbfData {
    flat: FlatNetworkData,
    rbf: Vec<RadialBasisFunction>,
}

impl TryFrom<FlatNetworkRbfData> for FlatNetworkRbf {
    type Error = NetworkError;

    fn try_from(data: FlatNetworkRbfData) -> Result<Self> {
        let flat = FlatNetwork::try_from(data.flat)?;
        if flat.slot_count() != 3 {
            return Err(NetworkError::CorruptNetwork(format!(
                "rbf network needs 3 slots, found {}",
                flat.slot_count()
            )));
        }
        let network = FlatNetworkRbf {
            flat,
            rbf: data.rbf,
        };
        network.check_functions(&network.rbf)?;
        Ok(network)
    }
}

impl Persist for FlatNetworkRbf {
    type Data = FlatNetworkRbfData;

    fn restore(data: FlatNetworkRbfData) -> Result<Self> {
        FlatNetworkRbf::try_from(data)
    }
}

impl FlatNetworkRbf {
    /// One hidden neuron per radial basis function.
    pub fn new(
        input_count: usize,
        output_count: usize,
        rbf: Vec<RadialBasisFunction>,
    ) -> Result<Self> {
        let flat = FlatNetwork::new(&[
            FlatLayer::new(ActivationFunction::linear(), input_count, NO_BIAS_ACTIVATION),
            FlatLayer::new(ActivationFunction::linear(), rbf.len(), DEFAULT_BIAS_ACTIVATION),
            FlatLayer::new(ActivationFunction::linear(), output_count, NO_BIAS_ACTIVATION),
        ])?;
        let network = FlatNetworkRbf { flat, rbf };
        network.check_functions(&network.rbf)?;

        debug!(
            "rbf network with {} inputs, {} radial basis neurons, {} outputs",
            input_count,
            network.rbf.len(),
            output_count
        );
        Ok(network)
    }

    /// Hidden neurons of one kind spread over `[-1, 1]` in every input dimension.
    ///
    /// When `hidden_count` is an integer power of `input_count` the centers sit on an
    /// even grid, otherwise centers and widths are random.
    pub fn with_kind(
        input_count: usize,
        hidden_count: usize,
        output_count: usize,
        kind: RbfKind,
    ) -> Result<Self> {
        if hidden_count == 0 {
            return Err(NetworkError::Rbf(
                "rbf network needs at least one hidden neuron".into(),
            ));
        }

        let rbf = (0..hidden_count)
            .map(|_| RadialBasisFunction::new(kind, vec![0.0; input_count], DEFAULT_PEAK, 1.0))
            .collect();
        let mut network = Self::new(input_count, output_count, rbf)?;

        if grid_side(input_count, hidden_count).is_some() {
            // a common default for the width of volume neurons
            let width = 2.0 / hidden_count as f64;
            network.set_centers_and_widths_equal_spacing(-1.0, 1.0, kind, width, false)?;
        } else {
            debug!(
                "{} radial basis neurons do not fill a grid over {} inputs, randomizing",
                hidden_count, input_count
            );
            network.randomize_centers_and_widths(-1.0, 1.0, kind)?;
        }
        Ok(network)
    }

    pub fn flat(&self) -> &FlatNetwork {
        &self.flat
    }

    /// The underlying flat network, e.g. for trainers that adjust the output weights.
    pub fn flat_mut(&mut self) -> &mut FlatNetwork {
        &mut self.flat
    }

    pub fn rbf(&self) -> &[RadialBasisFunction] {
        &self.rbf
    }

    pub fn set_rbf(&mut self, rbf: Vec<RadialBasisFunction>) -> Result<()> {
        if rbf.len() != self.rbf.len() {
            return Err(NetworkError::Rbf(format!(
                "expected {} radial basis functions, got {}",
                self.rbf.len(),
                rbf.len()
            )));
        }
        self.check_functions(&rbf)?;
        self.rbf = rbf;
        Ok(())
    }

    pub fn input_count(&self) -> usize {
        self.flat.input_count()
    }

    pub fn output_count(&self) -> usize {
        self.flat.output_count()
    }

    pub fn set_centers_and_widths(
        &mut self,
        centers: &[Vec<f64>],
        widths: &[f64],
        kind: RbfKind,
    ) -> Result<()> {
        if centers.len() != self.rbf.len() || widths.len() != self.rbf.len() {
            return Err(NetworkError::Rbf(format!(
                "{} radial basis neurons but {} centers and {} widths",
                self.rbf.len(),
                centers.len(),
                widths.len()
            )));
        }

        let rbf = centers
            .iter()
            .zip(widths)
            .map(|(center, &width)| {
                RadialBasisFunction::new(kind, center.clone(), DEFAULT_PEAK, width)
            })
            .collect();
        self.set_rbf(rbf)
    }

    /// Lays the centers on a regular grid with `side` points per input dimension,
    /// where `side` to the power of the input count equals the hidden count.
    ///
    /// With `use_wide_edges` neurons on the border of the grid get 2.5 times the width.
    pub fn set_centers_and_widths_equal_spacing(
        &mut self,
        min: f64,
        max: f64,
        kind: RbfKind,
        width: f64,
        use_wide_edges: bool,
    ) -> Result<()> {
        let dimensions = self.input_count();
        let hidden = self.rbf.len();

        let side = grid_side(dimensions, hidden).ok_or_else(|| {
            NetworkError::Rbf(format!(
                "{} radial basis neurons are not an integer to the power of {}",
                hidden, dimensions
            ))
        })?;

        let spacing = if side > 1 {
            (max - min).abs() / (side - 1) as f64
        } else {
            0.0
        };
        let edge_width = 2.5 * width;

        let mut centers = Vec::with_capacity(hidden);
        let mut widths = Vec::with_capacity(hidden);

        for neuron in 0..hidden {
            let mut position = neuron;
            let center: Vec<f64> = (0..dimensions)
                .map(|_| {
                    let step = position % side;
                    position /= side;
                    step as f64 * spacing + min
                })
                .collect();

            let on_edge = center.iter().any(|&c| c == min || c == max);
            widths.push(if on_edge && use_wide_edges {
                edge_width
            } else {
                width
            });
            centers.push(center);
        }

        debug!(
            "spaced {} radial basis centers on a grid of side {}",
            hidden, side
        );

        self.set_centers_and_widths(&centers, &widths, kind)
    }

    /// Random centers and widths, all drawn uniformly from `[min, max)`.
    pub fn randomize_centers_and_widths(&mut self, min: f64, max: f64, kind: RbfKind) -> Result<()> {
        self.randomize_centers_and_widths_with(&mut rand::thread_rng(), min, max, kind)
    }

    pub fn randomize_centers_and_widths_with<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        min: f64,
        max: f64,
        kind: RbfKind,
    ) -> Result<()> {
        let dimensions = self.input_count();
        let mut draw = || rng.gen::<f64>() * (max - min) + min;

        let (centers, widths): (Vec<Vec<f64>>, Vec<f64>) = (0..self.rbf.len())
            .map(|_| ((0..dimensions).map(|_| draw()).collect::<Vec<f64>>(), draw()))
            .unzip();

        self.set_centers_and_widths(&centers, &widths, kind)
    }

    pub fn encode_to_array(&self) -> Vec<f64> {
        self.flat.encode_to_array()
    }

    pub fn decode_from_array(&mut self, data: &[f64]) -> Result<()> {
        self.flat.decode_from_array(data)
    }

    /// Fills the hidden slot with radial basis responses, then runs the output layer.
    pub fn compute(&mut self, input: &[f64], output: &mut [f64]) -> Result<()> {
        if output.len() != self.flat.output_count {
            return Err(NetworkError::OutputLength {
                expected: self.flat.output_count,
                actual: output.len(),
            });
        }

        self.flat.load_input(input)?;

        let start = self.flat.layer_index[HIDDEN_SLOT];
        for (neuron, function) in self.rbf.iter().enumerate() {
            let value = function.calculate(input)?;
            self.flat.layer_sums[start + neuron] = value;
            self.flat.layer_output[start + neuron] = value;
        }

        self.flat.compute_layer(HIDDEN_SLOT);

        output.copy_from_slice(&self.flat.layer_output[..self.flat.output_count]);
        Ok(())
    }

    fn check_functions(&self, rbf: &[RadialBasisFunction]) -> Result<()> {
        let hidden = self.flat.layer_feed_counts[HIDDEN_SLOT];
        if rbf.len() != hidden {
            return Err(NetworkError::Rbf(format!(
                "{} radial basis functions for {} hidden neurons",
                rbf.len(),
                hidden
            )));
        }
        match rbf
            .iter()
            .find(|function| function.dimensions() != self.flat.input_count)
        {
            Some(function) => Err(NetworkError::Rbf(format!(
                "center has {} dimensions, network has {} inputs",
                function.dimensions(),
                self.flat.input_count
            ))),
            None => Ok(()),
        }
    }
}

/// Points per dimension of a grid with `hidden` points over `dimensions` inputs.
fn grid_side(dimensions: usize, hidden: usize) -> Option<usize> {
    if dimensions == 0 {
        return None;
    }
    let side = (hidden as f64).powf(1.0 / dimensions as f64).round() as usize;
    if side.checked_pow(dimensions as u32) == Some(hidden) {
        Some(side)
    } else {
        None
    }
}

impl StatefulEvaluator for FlatNetworkRbf {
    fn evaluate<T: NetworkIO>(&mut self, input: T) -> Result<T> {
        let input = NetworkIO::input(input)?;
        let mut output = vec![0.0; self.flat.output_count];
        self.compute(input.as_slice(), &mut output)?;
        Ok(NetworkIO::output(DMatrix::from_vec(
            1,
            self.flat.output_count,
            output,
        )))
    }

    fn reset_internal_state(&mut self) {
        self.flat.clear_context();
    }
}
