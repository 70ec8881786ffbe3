//! B-Spline interpolation implementation.
//!
//! This module provides B-Spline interpolation of degree 2 to 5 for smooth
//! sampling of image values at continuous coordinates. Basis weights are
//! evaluated on the tensor backend; samples are turned into spline
//! coefficients by a separable recursive prefilter with mirror-symmetric
//! boundaries, so the spline passes through the original samples.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};

use super::boundary::Boundary;
use super::trait_::{axis_column, strides, weighted_gather, Interpolator, Tap};
use crate::error::{Result, TransformError};

/// Poles of the B-spline prefilter for each supported degree.
fn poles(degree: usize) -> &'static [f64] {
    match degree {
        2 => &[-0.171_572_875_253_809_9], // sqrt(8) - 3
        3 => &[-0.267_949_192_431_122_7], // sqrt(3) - 2
        4 => &[-0.361_341_225_900_220_2, -0.013_725_429_297_339_121],
        5 => &[-0.430_575_347_099_973_8, -0.043_096_288_203_264_654],
        _ => &[],
    }
}

/// B-Spline interpolator of degree 2 to 5.
///
/// Sampling reads `data` as spline coefficients. Run
/// [`BSplineInterpolator::prefilter`] on raw samples first for the spline to
/// pass through them; without it the result is slightly smoothed.
#[derive(Debug, Clone, Copy)]
pub struct BSplineInterpolator {
    degree: usize,
    boundary: Boundary,
}

impl BSplineInterpolator {
    /// Create a cubic B-Spline interpolator.
    pub fn new() -> Self {
        Self {
            degree: 3,
            boundary: Boundary::Nearest,
        }
    }

    /// Create an interpolator of the given spline degree.
    pub fn with_degree(degree: usize) -> Result<Self> {
        if !(2..=5).contains(&degree) {
            return Err(TransformError::config(format!(
                "B-spline degree must be between 2 and 5, got {}",
                degree
            )));
        }
        Ok(Self {
            degree,
            boundary: Boundary::Nearest,
        })
    }

    /// Use `boundary` for taps past the edges.
    pub fn with_boundary(mut self, boundary: Boundary) -> Self {
        self.boundary = boundary;
        self
    }

    /// Spline degree.
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Convert samples into spline coefficients of this degree.
    ///
    /// The recursive filter runs on host memory; the result is moved back to
    /// the device of `data`.
    pub fn prefilter<B: Backend, const D: usize>(&self, data: Tensor<B, D>) -> Result<Tensor<B, D>> {
        let device = data.device();
        let shape = data.dims();
        let mut values = data
            .into_data()
            .convert::<f64>()
            .to_vec::<f64>()
            .map_err(|e| TransformError::tensor_data(format!("{:?}", e)))?;
        spline_prefilter(&mut values, &shape, self.degree);
        Ok(Tensor::from_data(TensorData::new(values, shape), &device))
    }

    /// Basis weights of the `degree + 1` taps, highest tap first.
    ///
    /// `u` is the offset of the sample from the highest tap's knot, in `[0, 1)`.
    fn weights<B: Backend>(&self, u: Tensor<B, 1>) -> Vec<Tensor<B, 1>> {
        // Cox-de Boor recursion on uniform knots
        let mut weights = vec![u.ones_like()];
        for d in 1..=self.degree {
            let next = (0..=d)
                .map(|m| {
                    let rising = (m < d).then(|| u.clone().add_scalar(m as f64) * weights[m].clone());
                    let falling = (m > 0).then(|| {
                        u.clone().neg().add_scalar((d + 1 - m) as f64) * weights[m - 1].clone()
                    });
                    let sum = match (rising, falling) {
                        (Some(a), Some(b)) => a + b,
                        (Some(a), None) | (None, Some(a)) => a,
                        (None, None) => u.zeros_like(),
                    };
                    sum.div_scalar(d as f64)
                })
                .collect();
            weights = next;
        }
        weights
    }
}

impl Default for BSplineInterpolator {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> Interpolator<B> for BSplineInterpolator {
    fn interpolate<const D: usize>(&self, data: &Tensor<B, D>, indices: Tensor<B, 2>) -> Tensor<B, 1> {
        let shape = data.dims();
        let batch_size = indices.dims()[0];
        let flat_data = data.clone().reshape([shape.iter().product::<usize>()]);
        let half_support = (self.degree + 1) as f64 / 2.0;
        // Prefiltered coefficients extend mirror-symmetrically past the edges
        let tap_boundary = match self.boundary {
            Boundary::Nearest => Boundary::Mirror,
            boundary => boundary,
        };

        let taps: Vec<Vec<Tap<B>>> = shape
            .iter()
            .enumerate()
            .map(|(axis, &n)| {
                let x = self.boundary.fold(axis_column(&indices, axis), n);
                // Highest tap index and the offset from it
                let shifted = x.add_scalar(half_support);
                let top = shifted.clone().floor();
                let u = shifted - top.clone();
                self.weights(u)
                    .into_iter()
                    .enumerate()
                    .map(|(m, weight)| Tap {
                        index: tap_boundary.tap(top.clone().sub_scalar(m as f64), n),
                        weight,
                    })
                    .collect()
            })
            .collect();

        weighted_gather(&flat_data, &strides(&shape), &taps, batch_size)
    }
}

/// Convert row-major samples to B-spline coefficients of `degree` in place,
/// axis by axis.
pub fn spline_prefilter(values: &mut [f64], shape: &[usize], degree: usize) {
    let poles = poles(degree);
    if poles.is_empty() {
        return;
    }
    let strides = strides(shape);
    let mut line = Vec::new();
    for (axis, &n) in shape.iter().enumerate() {
        if n < 2 {
            continue;
        }
        let stride = strides[axis];
        line.resize(n, 0.0);
        for start in 0..values.len() {
            if (start / stride) % n != 0 {
                continue;
            }
            for (k, v) in line.iter_mut().enumerate() {
                *v = values[start + k * stride];
            }
            filter_line(&mut line, poles);
            for (k, v) in line.iter().enumerate() {
                values[start + k * stride] = *v;
            }
        }
    }
}

fn filter_line(c: &mut [f64], poles: &[f64]) {
    let n = c.len();
    let gain: f64 = poles.iter().map(|&z| (1.0 - z) * (1.0 - 1.0 / z)).product();
    for v in c.iter_mut() {
        *v *= gain;
    }
    for &z in poles {
        // causal
        c[0] = initial_causal(c, z);
        for k in 1..n {
            c[k] += z * c[k - 1];
        }
        // anti-causal
        c[n - 1] = (z / (z * z - 1.0)) * (z * c[n - 2] + c[n - 1]);
        for k in (0..n - 1).rev() {
            c[k] = z * (c[k + 1] - c[k]);
        }
    }
}

fn initial_causal(c: &[f64], z: f64) -> f64 {
    let n = c.len();
    let horizon = (f64::EPSILON.ln() / z.abs().ln()).ceil() as usize;
    if horizon < n {
        // truncated sum, the tail is below machine precision
        let mut zn = z;
        let mut sum = c[0];
        for v in c.iter().take(horizon).skip(1) {
            sum += zn * v;
            zn *= z;
        }
        sum
    } else {
        let iz = 1.0 / z;
        let mut zn = z;
        let mut z2n = z.powi((n - 1) as i32);
        let mut sum = c[0] + z2n * c[n - 1];
        z2n *= z2n * iz;
        for v in c.iter().take(n - 1).skip(1) {
            sum += (zn + z2n) * v;
            zn *= z;
            z2n *= iz;
        }
        sum / (1.0 - zn * zn)
    }
}
