//! Conversion between host point lists and `[N, D]` burn tensors.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};

use crate::error::{Result, TransformError};

/// Read a `[N, D]` tensor into host points.
pub fn points_from_tensor<B: Backend, const D: usize>(points: Tensor<B, 2>) -> Result<Vec<[f64; D]>> {
    let [n, d] = points.dims();
    if d != D {
        return Err(TransformError::incompatible(format!(
            "Point dimensionality {} does not match {}-D space",
            d, D
        )));
    }
    if n == 0 {
        return Ok(Vec::new());
    }
    let flat = points
        .into_data()
        .convert::<f64>()
        .to_vec::<f64>()
        .map_err(|e| TransformError::tensor_data(format!("{e:?}")))?;
    points_from_flat(&flat)
}

/// Write host points into a `[N, D]` tensor.
pub fn points_to_tensor<B: Backend, const D: usize>(
    points: &[[f64; D]],
    device: &B::Device,
) -> Tensor<B, 2> {
    let flat: Vec<f64> = points.iter().flat_map(|p| p.iter().copied()).collect();
    Tensor::<B, 2>::from_data(TensorData::new(flat, [points.len(), D]), device)
}

/// Group an interleaved coordinate buffer `[x0, y0, z0, x1, …]` into points.
pub fn points_from_flat<const D: usize>(flat: &[f64]) -> Result<Vec<[f64; D]>> {
    if flat.len() % D != 0 {
        return Err(TransformError::incompatible(format!(
            "Coordinate buffer of length {} is not a multiple of {}",
            flat.len(),
            D
        )));
    }
    Ok(flat
        .chunks_exact(D)
        .map(|c| std::array::from_fn(|i| c[i]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_tensor_roundtrip() {
        let device = Default::default();
        let points = vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let tensor = points_to_tensor::<TestBackend, 3>(&points, &device);
        assert_eq!(tensor.dims(), [2, 3]);
        let back = points_from_tensor::<TestBackend, 3>(tensor).unwrap();
        assert_eq!(back, points);
    }

    #[test]
    fn test_dimensionality_mismatch() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 2>::zeros([4, 2], &device);
        let err = points_from_tensor::<TestBackend, 3>(tensor).unwrap_err();
        assert!(matches!(err, TransformError::IncompatibleSpaceError(_)));
    }

    #[test]
    fn test_flat_buffer() {
        let points = points_from_flat::<2>(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(points, vec![[1.0, 2.0], [3.0, 4.0]]);
        assert!(points_from_flat::<3>(&[1.0, 2.0]).is_err());
    }
}
