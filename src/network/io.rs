use nalgebra::{DMatrix, DVector};

use crate::error::{NetworkError, Result};

/// Data structures implementing this trait can be used as input and output of networks.
///
/// Values travel as a single row matrix, anything else is rejected on the way in.
pub trait NetworkIO {
    fn input(input: Self) -> Result<DMatrix<f64>>;
    fn output(output: DMatrix<f64>) -> Self;
}

impl NetworkIO for DMatrix<f64> {
    fn input(input: Self) -> Result<DMatrix<f64>> {
        if input.nrows() != 1 {
            return Err(NetworkError::InputShape {
                rows: input.nrows(),
                columns: input.ncols(),
            });
        }
        Ok(input)
    }
    fn output(output: DMatrix<f64>) -> Self {
        output
    }
}

impl NetworkIO for DVector<f64> {
    fn input(input: Self) -> Result<DMatrix<f64>> {
        Ok(DMatrix::from_row_slice(1, input.len(), input.as_slice()))
    }
    fn output(output: DMatrix<f64>) -> Self {
        DVector::from_iterator(output.len(), output.iter().cloned())
    }
}

impl NetworkIO for Vec<f64> {
    fn input(input: Self) -> Result<DMatrix<f64>> {
        Ok(DMatrix::from_vec(1, input.len(), input))
    }
    fn output(output: DMatrix<f64>) -> Self {
        output.iter().cloned().collect()
    }
}

#[cfg(feature = "ndarray")]
impl NetworkIO for ndarray::Array1<f64> {
    fn input(input: Self) -> Result<DMatrix<f64>> {
        Ok(DMatrix::from_iterator(1, input.len(), input.into_iter()))
    }
    fn output(output: DMatrix<f64>) -> Self {
        output.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::{dmatrix, dvector, DMatrix, DVector};

    use super::NetworkIO;
    use crate::error::NetworkError;

    #[test]
    fn vec_travels_as_row() {
        let row = NetworkIO::input(vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(row, dmatrix![1.0, 2.0, 3.0]);

        let back: Vec<f64> = NetworkIO::output(row);
        assert_eq!(back, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn dvector_travels_as_row() {
        let row: DMatrix<f64> = NetworkIO::input(dvector![4.0, 5.0]).unwrap();
        assert_eq!(row.nrows(), 1);
        assert_eq!(row, dmatrix![4.0, 5.0]);

        let back: DVector<f64> = NetworkIO::output(row);
        assert_eq!(back, dvector![4.0, 5.0]);
    }

    #[test]
    fn matrix_must_be_single_row() {
        assert_eq!(
            NetworkIO::input(dmatrix![1.0; 2.0]),
            Err(NetworkError::InputShape {
                rows: 2,
                columns: 1
            })
        );
    }

    #[cfg(feature = "ndarray")]
    #[test]
    fn array_travels_as_row() {
        let row = NetworkIO::input(ndarray::arr1(&[0.5, 1.5])).unwrap();
        assert_eq!(row, dmatrix![0.5, 1.5]);

        let back: ndarray::Array1<f64> = NetworkIO::output(row);
        assert_eq!(back, ndarray::arr1(&[0.5, 1.5]));
    }
}
