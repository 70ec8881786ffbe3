//! Image type pairing tensor data with a grid coordinate space.
//!
//! This module provides the Image struct: one or more scalar channels that
//! share a voxel grid, plus the grid space describing how voxel indices map
//! to world coordinates.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::error::{Result, TransformError};
use crate::spatial::{AffineMatrix, CoordinateSpace, ImageGrid};

/// Gridded image with one or more channels.
///
/// # Type Parameters
/// * `B` - The backend (CPU or GPU) for tensor operations
/// * `D` - The spatial dimensionality of the image (2 or 3)
///
/// # Coordinate Systems
/// * **Index Space**: voxel indices, tensor dimension `i` is index axis `i`
/// * **World Space**: the grid space's affine maps indices to world coordinates
///
/// # Examples
/// ```rust
/// use transkit_core::image::Image;
/// use transkit_core::spatial::{AffineMatrix, CoordinateSpace};
/// use burn::tensor::Tensor;
/// use burn_ndarray::NdArray;
///
/// type Backend = NdArray<f32>;
///
/// let device = Default::default();
/// let data = Tensor::<Backend, 3>::zeros([10, 10, 10], &device);
/// let space = CoordinateSpace::grid("scanner", [10, 10, 10], AffineMatrix::identity()).unwrap();
/// let image = Image::new(data, space).unwrap();
/// assert_eq!(image.channel_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Image<B: Backend, const D: usize> {
    /// Channels, all with the grid's shape.
    channels: Vec<Tensor<B, D>>,
    /// Grid space the channels are sampled on.
    space: CoordinateSpace<D>,
}

impl<B: Backend, const D: usize> Image<B, D> {
    /// Create a single-channel image.
    ///
    /// # Errors
    /// `ConfigError` if `space` is not a grid or its shape differs from the
    /// tensor shape.
    pub fn new(data: Tensor<B, D>, space: CoordinateSpace<D>) -> Result<Self> {
        Self::from_channels(vec![data], space)
    }

    /// Create a multi-channel image; every channel shares the grid.
    pub fn from_channels(channels: Vec<Tensor<B, D>>, space: CoordinateSpace<D>) -> Result<Self> {
        let grid = space.image_grid().ok_or_else(|| {
            TransformError::config(format!("Image space {} must be a grid space", space))
        })?;
        if channels.is_empty() {
            return Err(TransformError::config("An image needs at least one channel"));
        }
        for (i, channel) in channels.iter().enumerate() {
            let dims = channel.dims();
            if dims != grid.shape() {
                return Err(TransformError::config(format!(
                    "Channel {} has shape {:?}, grid shape is {:?}",
                    i,
                    dims,
                    grid.shape()
                )));
            }
        }
        Ok(Self { channels, space })
    }

    /// The first channel.
    pub fn data(&self) -> &Tensor<B, D> {
        &self.channels[0]
    }

    /// All channels.
    pub fn channels(&self) -> &[Tensor<B, D>] {
        &self.channels
    }

    /// Channel `index`, if present.
    pub fn channel(&self, index: usize) -> Option<&Tensor<B, D>> {
        self.channels.get(index)
    }

    /// Number of channels, at least 1.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// The grid space.
    pub fn space(&self) -> &CoordinateSpace<D> {
        &self.space
    }

    /// Get the image shape as an array.
    pub fn shape(&self) -> [usize; D] {
        self.channels[0].dims()
    }

    /// The voxel-to-world affine.
    pub fn affine(&self) -> Option<&AffineMatrix<D>> {
        self.grid().map(|g| g.affine())
    }

    /// The voxel grid.
    pub fn grid(&self) -> Option<&ImageGrid<D>> {
        self.space.image_grid()
    }

    /// Convert a world point to a continuous voxel index.
    pub fn world_to_index(&self, point: &[f64; D]) -> Option<[f64; D]> {
        self.grid().map(|g| g.index(point))
    }

    /// Convert a continuous voxel index to a world point.
    pub fn index_to_world(&self, index: &[f64; D]) -> Option<[f64; D]> {
        self.grid().map(|g| g.world(index))
    }

    /// Consume the image, returning its channels.
    pub fn into_channels(self) -> Vec<Tensor<B, D>> {
        self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn space(shape: [usize; 3]) -> CoordinateSpace<3> {
        let affine = AffineMatrix::from_row_slice(&[
            2.0, 0.0, 0.0, 10.0, //
            0.0, 2.0, 0.0, 20.0, //
            0.0, 0.0, 2.0, 30.0, //
            0.0, 0.0, 0.0, 1.0,
        ])
        .unwrap();
        CoordinateSpace::grid("scanner", shape, affine).unwrap()
    }

    #[test]
    fn test_image_creation() {
        let device = Default::default();
        let data = Tensor::<TestBackend, 3>::zeros([10, 10, 10], &device);
        let image = Image::new(data, space([10, 10, 10])).unwrap();

        assert_eq!(image.shape(), [10, 10, 10]);
        assert_eq!(image.channel_count(), 1);
        assert!(image.channel(1).is_none());
    }

    #[test]
    fn test_index_world_roundtrip() {
        let device = Default::default();
        let data = Tensor::<TestBackend, 3>::zeros([4, 4, 4], &device);
        let image = Image::new(data, space([4, 4, 4])).unwrap();

        let world = image.index_to_world(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(world, [12.0, 24.0, 36.0]);
        let index = image.world_to_index(&world).unwrap();
        for i in 0..3 {
            assert!((index[i] - [1.0, 2.0, 3.0][i]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_shape_mismatch() {
        let device = Default::default();
        let data = Tensor::<TestBackend, 3>::zeros([4, 4, 5], &device);
        let err = Image::new(data, space([4, 4, 4])).unwrap_err();
        assert!(matches!(err, TransformError::ConfigError(_)));
    }

    #[test]
    fn test_world_space_rejected() {
        let device = Default::default();
        let data = Tensor::<TestBackend, 3>::zeros([4, 4, 4], &device);
        let err = Image::new(data, CoordinateSpace::world("scanner").unwrap()).unwrap_err();
        assert!(matches!(err, TransformError::ConfigError(_)));
    }

    #[test]
    fn test_multi_channel() {
        let device = Default::default();
        let channels = vec![
            Tensor::<TestBackend, 3>::zeros([4, 4, 4], &device),
            Tensor::<TestBackend, 3>::ones([4, 4, 4], &device),
        ];
        let image = Image::from_channels(channels, space([4, 4, 4])).unwrap();
        assert_eq!(image.channel_count(), 2);
        assert!(Image::<TestBackend, 3>::from_channels(Vec::new(), space([4, 4, 4])).is_err());
    }
}
