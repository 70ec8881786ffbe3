//! Boundary extension for interpolation kernels.
//!
//! A boundary folds continuous coordinates and integer taps that fall outside
//! `[0, n - 1]` back onto the grid.

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};
use serde::{Deserialize, Serialize};

/// How a kernel extends the data past its edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Boundary {
    /// Repeat the edge sample.
    #[default]
    Nearest,
    /// Reflect about the edge sample centers (`d c b | a b c d | c b a`).
    Mirror,
    /// Reflect about the edge voxel boundaries (`c b a | a b c d | d c b`).
    Reflect,
    /// Wrap around periodically (`b c d | a b c d | a b c`).
    Wrap,
}

impl Boundary {
    /// Fold continuous coordinates along an axis of length `n` onto `[0, n - 1]`
    /// (`[0, n)` for `Wrap`).
    pub fn fold<B: Backend>(&self, x: Tensor<B, 1>, n: usize) -> Tensor<B, 1> {
        let last = n.saturating_sub(1) as f64;
        match self {
            Boundary::Nearest => x.clamp(0.0, last),
            Boundary::Mirror => {
                if n <= 1 {
                    x.zeros_like()
                } else {
                    mirror(x, last)
                }
            }
            Boundary::Reflect => {
                let n = n as f64;
                let y = modulo(x.add_scalar(0.5), 2.0 * n);
                // n - |n - y| lies in [0, n]; shift back to voxel centers
                (y.neg().add_scalar(n).abs().neg().add_scalar(n))
                    .sub_scalar(0.5)
                    .clamp(0.0, last)
            }
            // Wrapped taps reach across the seam, so no clamp here
            Boundary::Wrap => modulo(x, n.max(1) as f64),
        }
    }

    /// Fold integer-valued taps along an axis of length `n` to valid indices.
    pub fn tap<B: Backend>(&self, i: Tensor<B, 1>, n: usize) -> Tensor<B, 1, Int> {
        let last = n.saturating_sub(1) as f64;
        let folded = match self {
            Boundary::Nearest => i,
            Boundary::Wrap => modulo(i, n.max(1) as f64),
            Boundary::Reflect => {
                let n = n as f64;
                let y = modulo(i.add_scalar(0.5), 2.0 * n);
                y.neg().add_scalar(n).abs().neg().add_scalar(n).sub_scalar(0.5)
            }
            Boundary::Mirror => {
                if n <= 1 {
                    i.zeros_like()
                } else {
                    mirror(i, last)
                }
            }
        };
        folded.clamp(0.0, last).round().int()
    }
}

/// `x mod p`, always in `[0, p)`.
fn modulo<B: Backend>(x: Tensor<B, 1>, p: f64) -> Tensor<B, 1> {
    let q = x.clone().div_scalar(p).floor().mul_scalar(p);
    x - q
}

/// Whole-sample symmetric reflection with period `2 * last`.
fn mirror<B: Backend>(x: Tensor<B, 1>, last: f64) -> Tensor<B, 1> {
    let y = modulo(x, 2.0 * last);
    y.sub_scalar(last).abs().neg().add_scalar(last)
}
