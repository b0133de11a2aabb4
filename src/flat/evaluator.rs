use log::trace;
use nalgebra::DMatrix;

use crate::{
    error::{NetworkError, Result},
    network::{NetworkIO, StatefulEvaluator},
};

use super::FlatNetwork;

impl FlatNetwork {
    /// Runs one forward pass, writing `output_count` values into `output`.
    pub fn compute(&mut self, input: &[f64], output: &mut [f64]) -> Result<()> {
        if output.len() != self.output_count {
            return Err(NetworkError::OutputLength {
                expected: self.output_count,
                actual: output.len(),
            });
        }

        self.load_input(input)?;

        for slot in (1..self.layer_index.len()).rev() {
            self.compute_layer(slot);
        }

        // slot 0 is computed last, its context copy waits for the loop to finish
        self.copy_context(0);

        output.copy_from_slice(&self.layer_output[..self.output_count]);
        Ok(())
    }

    /// Root mean square error of the network over `(input, ideal)` pairs.
    pub fn calculate_error(&mut self, data: &[(Vec<f64>, Vec<f64>)]) -> Result<f64> {
        if data.is_empty() {
            return Ok(0.0);
        }

        let mut actual = vec![0.0; self.output_count];
        let mut sum = 0.0;
        let mut count = 0;

        for (input, ideal) in data {
            if ideal.len() != self.output_count {
                return Err(NetworkError::OutputLength {
                    expected: self.output_count,
                    actual: ideal.len(),
                });
            }
            self.compute(input, &mut actual)?;
            sum += actual
                .iter()
                .zip(ideal)
                .map(|(a, i)| (i - a) * (i - a))
                .sum::<f64>();
            count += ideal.len();
        }

        Ok((sum / count.max(1) as f64).sqrt())
    }

    /// Copies `input` into the input slot, the highest one.
    pub(crate) fn load_input(&mut self, input: &[f64]) -> Result<()> {
        if input.len() != self.input_count {
            return Err(NetworkError::InputLength {
                expected: self.input_count,
                actual: input.len(),
            });
        }
        let start = self.layer_index[self.layer_index.len() - 1];
        self.layer_output[start..start + self.input_count].copy_from_slice(input);
        Ok(())
    }

    /// Computes slot `slot - 1` from the outputs of slot `slot`.
    pub(crate) fn compute_layer(&mut self, slot: usize) {
        let to = slot - 1;
        let input_index = self.layer_index[slot];
        let output_index = self.layer_index[to];
        let input_size = self.layer_counts[slot];
        let output_size = self.layer_feed_counts[to];
        let keep = 1.0 - self.layer_dropout_rates[to];

        let mut index = self.weight_index[to];

        for x in output_index..output_index + output_size {
            let row = &self.weights[index..index + input_size];
            let sum = row
                .iter()
                .zip(&self.layer_output[input_index..input_index + input_size])
                .map(|(weight, value)| weight * value)
                .sum::<f64>()
                * keep;
            self.layer_sums[x] = sum;
            self.layer_output[x] = sum;
            index += input_size;
        }

        self.activation_functions[to]
            .apply(&mut self.layer_output[output_index..output_index + output_size]);

        trace!("computed slot {} ({} neurons)", to, output_size);

        if to > 0 {
            self.copy_context(to);
        }
    }

    fn copy_context(&mut self, slot: usize) {
        let size = self.context_target_size[slot];
        if size == 0 {
            return;
        }
        let source = self.layer_index[slot];
        self.layer_output
            .copy_within(source..source + size, self.context_target_offset[slot]);
    }
}

impl StatefulEvaluator for FlatNetwork {
    fn evaluate<T: NetworkIO>(&mut self, input: T) -> Result<T> {
        let input = NetworkIO::input(input)?;
        let mut output = vec![0.0; self.output_count];
        self.compute(input.as_slice(), &mut output)?;
        Ok(NetworkIO::output(DMatrix::from_vec(
            1,
            self.output_count,
            output,
        )))
    }

    fn reset_internal_state(&mut self) {
        self.clear_context();
    }
}
