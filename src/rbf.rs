//! Radial basis functions and the RBF specialization of the flat network.

use nalgebra::{DVector, DVectorView};
use serde::{Deserialize, Serialize};

use crate::error::{NetworkError, Result};

pub mod network;

pub use network::FlatNetworkRbf;

/// Shape of the response curve over the distance `r` to the center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RbfKind {
    /// `e^(-r² / 2w²)`
    Gaussian,
    /// `√(r² + w²)`
    Multiquadric,
    /// `1 / √(r² + w²)`
    InverseMultiquadric,
    /// `(1 - r²/w²) e^(-r² / 2w²)`
    MexicanHat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadialBasisFunction {
    pub kind: RbfKind,
    pub center: DVector<f64>,
    pub peak: f64,
    pub width: f64,
}

impl RadialBasisFunction {
    pub fn new(kind: RbfKind, center: Vec<f64>, peak: f64, width: f64) -> Self {
        RadialBasisFunction {
            kind,
            center: DVector::from_vec(center),
            peak,
            width,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.center.len()
    }

    /// Response to `input`, which must have as many dimensions as the center.
    pub fn calculate(&self, input: &[f64]) -> Result<f64> {
        if input.len() != self.dimensions() {
            return Err(NetworkError::InputLength {
                expected: self.dimensions(),
                actual: input.len(),
            });
        }

        let r2 = DVectorView::from_slice(input, input.len())
            .metric_distance(&self.center)
            .powi(2);
        let w2 = self.width * self.width;

        let value = match self.kind {
            RbfKind::Gaussian => (-r2 / (2.0 * w2)).exp(),
            RbfKind::Multiquadric => (r2 + w2).sqrt(),
            RbfKind::InverseMultiquadric => 1.0 / (r2 + w2).sqrt(),
            RbfKind::MexicanHat => (1.0 - r2 / w2) * (-r2 / (2.0 * w2)).exp(),
        };

        Ok(self.peak * value)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::{RadialBasisFunction, RbfKind};

    #[test]
    fn gaussian_peaks_at_center() {
        let rbf = RadialBasisFunction::new(RbfKind::Gaussian, vec![1.0, 2.0], 3.0, 0.5);
        assert_relative_eq!(rbf.calculate(&[1.0, 2.0]).unwrap(), 3.0);
        // distance 0.5 equals the width
        assert_relative_eq!(
            rbf.calculate(&[1.0, 2.5]).unwrap(),
            3.0 * (-0.5f64).exp()
        );
    }

    #[test]
    fn quadric_kinds() {
        let multi = RadialBasisFunction::new(RbfKind::Multiquadric, vec![0.0, 0.0], 2.0, 4.0);
        assert_relative_eq!(multi.calculate(&[3.0, 0.0]).unwrap(), 10.0);

        let inverse = RadialBasisFunction::new(RbfKind::InverseMultiquadric, vec![0.0, 0.0], 2.0, 4.0);
        assert_relative_eq!(inverse.calculate(&[0.0, 3.0]).unwrap(), 0.4);
    }

    #[test]
    fn mexican_hat_crosses_zero_at_width() {
        let hat = RadialBasisFunction::new(RbfKind::MexicanHat, vec![0.0], 1.0, 2.0);
        assert_relative_eq!(hat.calculate(&[0.0]).unwrap(), 1.0);
        assert_relative_eq!(hat.calculate(&[2.0]).unwrap(), 0.0);
        assert!(hat.calculate(&[3.0]).unwrap() < 0.0);
    }

    #[test]
    fn rejects_dimension_mismatch() {
        let rbf = RadialBasisFunction::new(RbfKind::Gaussian, vec![0.0, 0.0], 1.0, 1.0);
        assert!(rbf.calculate(&[1.0]).is_err());
    }
}
