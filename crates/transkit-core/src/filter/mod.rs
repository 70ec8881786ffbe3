//! Image filters.

pub mod resample;

pub use resample::{resample, Resampler};
