//! Warp a synthetic volume through a chain of an affine and a dense field.
//!
//! Run with `RUST_LOG=debug` to see chain collapse and block scheduling.

use anyhow::Result;
use burn::tensor::{Tensor, TensorData};
use burn_ndarray::NdArray;
use transkit_core::{
    resample, AffineMatrix, CoordinateSpace, DisplacementFieldTransform, FieldInversion,
    FieldOptions, Image, LinearTransform, ResampleOptions, SpatialTransform, Transform,
    TransformChain,
};

type Backend = NdArray<f32>;

const SHAPE: [usize; 3] = [32, 32, 16];

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let device = Default::default();
    let affine = AffineMatrix::from_row_slice(&[
        1.0, 0.0, 0.0, -16.0, //
        0.0, 1.0, 0.0, -16.0, //
        0.0, 0.0, 2.0, -16.0, //
        0.0, 0.0, 0.0, 1.0,
    ])?;
    let scanner = CoordinateSpace::grid("scanner", SHAPE, affine)?;
    let grid = scanner.image_grid().cloned().ok_or_else(|| anyhow::anyhow!("not a grid"))?;

    // A sphere of radius 10 around the world origin
    let values: Vec<f32> = grid
        .ndcoords()
        .iter()
        .map(|p| if p.iter().map(|v| v * v).sum::<f64>() < 100.0 { 1.0 } else { 0.0 })
        .collect();
    let image = Image::new(
        Tensor::<Backend, 3>::from_data(TensorData::new(values, SHAPE), &device),
        scanner.clone(),
    )?;

    // Smooth swirl about the z axis, stored as displacements
    let swirl: Vec<f64> = grid
        .ndcoords()
        .iter()
        .flat_map(|p| {
            let angle = 0.2 * (-(p[0] * p[0] + p[1] * p[1]) / 200.0).exp();
            let (s, c) = angle.sin_cos();
            [c * p[0] - s * p[1] - p[0], s * p[0] + c * p[1] - p[1], 0.0]
        })
        .collect();
    let field = DisplacementFieldTransform::from_values(scanner.clone(), swirl, true)?
        .with_options(FieldOptions::new().with_inversion(FieldInversion::default()))?;

    let shift = LinearTransform::translation([2.0, 0.0, 0.0], scanner.clone(), scanner.clone())?;
    let chain = TransformChain::new(vec![
        SpatialTransform::from(shift),
        SpatialTransform::from(field.clone()),
    ])?;
    tracing::info!("Chain of {} members, linear: {}", chain.len(), chain.is_linear());

    let warped = resample(&image, &chain, &scanner, ResampleOptions::new())?;
    let flat = chain.flatten(Some(&scanner))?;
    let warped_flat = resample(&image, &flat, &scanner, ResampleOptions::new())?;

    let a = warped.data().clone().into_data().to_vec::<f32>().map_err(|e| anyhow::anyhow!("{e:?}"))?;
    let b = warped_flat.data().clone().into_data().to_vec::<f32>().map_err(|e| anyhow::anyhow!("{e:?}"))?;
    let max_diff = a.iter().zip(&b).map(|(x, y)| (x - y).abs()).fold(0.0f32, f32::max);
    tracing::info!("Chain vs flattened field: max voxel difference {:.3e}", max_diff);

    let inverse = field.inverse()?;
    let point = [[5.0, -3.0, 0.0]];
    let back = inverse.apply(&field.apply(&point)?)?;
    tracing::info!("Swirl round trip {:?} -> {:?}", point[0], back[0]);

    Ok(())
}
