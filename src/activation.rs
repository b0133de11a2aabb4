//! Activation functions applied in place over a layer's slice of the shared output array.

use serde::{Deserialize, Serialize};

use crate::error::{NetworkError, Result};

/// A tagged activation function with its named parameters.
///
/// Element-wise variants transform every value on its own, `SoftMax` and `Competitive`
/// normalize across the whole slice they are applied to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ActivationFunction {
    Linear {
        slope: f64,
    },
    Sigmoid {
        slope: f64,
    },
    Tanh {
        slope: f64,
    },
    /// `1` for positive values, `-1` otherwise (zero included).
    BiPolar,
    Step {
        center: f64,
        low: f64,
        high: f64,
    },
    Ramp {
        threshold_high: f64,
        threshold_low: f64,
        high: f64,
        low: f64,
    },
    Gaussian {
        center: f64,
        peak: f64,
        width: f64,
    },
    Log,
    Sin,
    SoftMax,
    /// Keeps the `max_winners` largest values rescaled to sum to one, zeroes the rest.
    Competitive {
        max_winners: usize,
    },
}

impl ActivationFunction {
    pub fn linear() -> Self {
        ActivationFunction::Linear { slope: 1.0 }
    }

    pub fn sigmoid() -> Self {
        ActivationFunction::Sigmoid { slope: 1.0 }
    }

    pub fn tanh() -> Self {
        ActivationFunction::Tanh { slope: 1.0 }
    }

    pub fn step() -> Self {
        ActivationFunction::Step {
            center: 0.0,
            low: 0.0,
            high: 1.0,
        }
    }

    pub fn ramp() -> Self {
        ActivationFunction::Ramp {
            threshold_high: 1.0,
            threshold_low: 0.0,
            high: 1.0,
            low: 0.0,
        }
    }

    pub fn gaussian() -> Self {
        ActivationFunction::Gaussian {
            center: 0.0,
            peak: 1.0,
            width: 1.0,
        }
    }

    pub fn competitive() -> Self {
        ActivationFunction::Competitive { max_winners: 1 }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActivationFunction::Linear { .. } => "linear",
            ActivationFunction::Sigmoid { .. } => "sigmoid",
            ActivationFunction::Tanh { .. } => "tanh",
            ActivationFunction::BiPolar => "bipolar",
            ActivationFunction::Step { .. } => "step",
            ActivationFunction::Ramp { .. } => "ramp",
            ActivationFunction::Gaussian { .. } => "gaussian",
            ActivationFunction::Log => "log",
            ActivationFunction::Sin => "sin",
            ActivationFunction::SoftMax => "softmax",
            ActivationFunction::Competitive { .. } => "competitive",
        }
    }

    /// Applies the function in place to every value of `values`.
    pub fn apply(&self, values: &mut [f64]) {
        match *self {
            ActivationFunction::Linear { slope } => values.iter_mut().for_each(|v| *v *= slope),
            ActivationFunction::Sigmoid { slope } => values
                .iter_mut()
                .for_each(|v| *v = 1.0 / (1.0 + (-slope * *v).exp())),
            ActivationFunction::Tanh { slope } => {
                values.iter_mut().for_each(|v| *v = (slope * *v).tanh())
            }
            ActivationFunction::BiPolar => values
                .iter_mut()
                .for_each(|v| *v = if *v > 0.0 { 1.0 } else { -1.0 }),
            ActivationFunction::Step { center, low, high } => values
                .iter_mut()
                .for_each(|v| *v = if *v >= center { high } else { low }),
            ActivationFunction::Ramp {
                threshold_high,
                threshold_low,
                high,
                low,
            } => {
                let slope = (threshold_high - threshold_low) / (high - low);
                for v in values.iter_mut() {
                    *v = if *v < threshold_low {
                        low
                    } else if *v > threshold_high {
                        high
                    } else {
                        slope * *v
                    };
                }
            }
            ActivationFunction::Gaussian {
                center,
                peak,
                width,
            } => values.iter_mut().for_each(|v| {
                *v = peak * (-(*v - center).powi(2) / (2.0 * width * width)).exp()
            }),
            ActivationFunction::Log => values
                .iter_mut()
                .for_each(|v| *v = v.signum() * v.abs().ln_1p()),
            ActivationFunction::Sin => values.iter_mut().for_each(|v| *v = v.sin()),
            ActivationFunction::SoftMax => soft_max(values),
            ActivationFunction::Competitive { max_winners } => competitive(values, max_winners),
        }
    }

    /// Derivative evaluated at a value already produced by [`apply`](Self::apply).
    ///
    /// `None` for the normalizing variants, which have no per-neuron derivative.
    pub fn derivative(&self, value: f64) -> Option<f64> {
        match *self {
            ActivationFunction::Linear { slope } => Some(slope),
            ActivationFunction::Sigmoid { slope } => Some(slope * value * (1.0 - value)),
            ActivationFunction::Tanh { slope } => Some(slope * (1.0 - value * value)),
            ActivationFunction::BiPolar
            | ActivationFunction::Step { .. }
            | ActivationFunction::Ramp { .. } => Some(1.0),
            ActivationFunction::Gaussian {
                center,
                peak,
                width,
            } => {
                let w2 = width * width;
                let d = value - center;
                Some(-peak * d / w2 * (-(d * d) / (2.0 * w2)).exp())
            }
            ActivationFunction::Log => Some(1.0 / (1.0 + value.abs())),
            ActivationFunction::Sin => Some(value.cos()),
            ActivationFunction::SoftMax | ActivationFunction::Competitive { .. } => None,
        }
    }

    pub fn has_derivative(&self) -> bool {
        !matches!(
            self,
            ActivationFunction::SoftMax | ActivationFunction::Competitive { .. }
        )
    }

    pub fn param_names(&self) -> &'static [&'static str] {
        match self {
            ActivationFunction::Linear { .. }
            | ActivationFunction::Sigmoid { .. }
            | ActivationFunction::Tanh { .. } => &["slope"],
            ActivationFunction::Step { .. } => &["center", "low", "high"],
            ActivationFunction::Ramp { .. } => &["threshold_high", "threshold_low", "high", "low"],
            ActivationFunction::Gaussian { .. } => &["center", "peak", "width"],
            ActivationFunction::Competitive { .. } => &["max_winners"],
            ActivationFunction::BiPolar
            | ActivationFunction::Log
            | ActivationFunction::Sin
            | ActivationFunction::SoftMax => &[],
        }
    }

    /// Parameter values in the order of [`param_names`](Self::param_names).
    pub fn params(&self) -> Vec<f64> {
        match *self {
            ActivationFunction::Linear { slope }
            | ActivationFunction::Sigmoid { slope }
            | ActivationFunction::Tanh { slope } => vec![slope],
            ActivationFunction::Step { center, low, high } => vec![center, low, high],
            ActivationFunction::Ramp {
                threshold_high,
                threshold_low,
                high,
                low,
            } => vec![threshold_high, threshold_low, high, low],
            ActivationFunction::Gaussian {
                center,
                peak,
                width,
            } => vec![center, peak, width],
            ActivationFunction::Competitive { max_winners } => vec![max_winners as f64],
            ActivationFunction::BiPolar
            | ActivationFunction::Log
            | ActivationFunction::Sin
            | ActivationFunction::SoftMax => Vec::new(),
        }
    }

    pub fn set_param(&mut self, index: usize, value: f64) -> Result<()> {
        let name = self.name();
        let slot = match (self, index) {
            (ActivationFunction::Linear { slope }, 0)
            | (ActivationFunction::Sigmoid { slope }, 0)
            | (ActivationFunction::Tanh { slope }, 0) => slope,
            (ActivationFunction::Step { center, .. }, 0) => center,
            (ActivationFunction::Step { low, .. }, 1) => low,
            (ActivationFunction::Step { high, .. }, 2) => high,
            (ActivationFunction::Ramp { threshold_high, .. }, 0) => threshold_high,
            (ActivationFunction::Ramp { threshold_low, .. }, 1) => threshold_low,
            (ActivationFunction::Ramp { high, .. }, 2) => high,
            (ActivationFunction::Ramp { low, .. }, 3) => low,
            (ActivationFunction::Gaussian { center, .. }, 0) => center,
            (ActivationFunction::Gaussian { peak, .. }, 1) => peak,
            (ActivationFunction::Gaussian { width, .. }, 2) => width,
            (ActivationFunction::Competitive { max_winners }, 0) => {
                *max_winners = value.max(0.0).round() as usize;
                return Ok(());
            }
            _ => {
                return Err(NetworkError::InvalidParameter {
                    activation: name,
                    index,
                })
            }
        };
        *slot = value;
        Ok(())
    }
}

fn soft_max(values: &mut [f64]) {
    // shifting by the maximum leaves the result unchanged but keeps exp() finite
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    for v in values.iter_mut() {
        *v /= sum;
    }
}

fn competitive(values: &mut [f64], max_winners: usize) {
    let mut winners = vec![false; values.len()];
    let mut sum_winners = 0.0;

    for _ in 0..max_winners.min(values.len()) {
        let mut winner: Option<usize> = None;
        for (index, &value) in values.iter().enumerate() {
            // strict comparison keeps the first occurrence on ties
            if !winners[index] && winner.map_or(true, |w| value > values[w]) {
                winner = Some(index);
            }
        }
        if let Some(index) = winner {
            winners[index] = true;
            sum_winners += values[index];
        }
    }

    for (value, &won) in values.iter_mut().zip(&winners) {
        *value = if !won {
            0.0
        } else if sum_winners != 0.0 {
            *value / sum_winners
        } else {
            *value
        };
    }
}
