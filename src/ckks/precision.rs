//! Error statistics between expected and decoded slot values.

use rustfft::num_complex::Complex64;

use crate::error::{CkksError, Result};

/// Absolute error summary. Bits are -log2(err), capped when the error is zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PrecisionStats {
    pub max_error: f64,
    pub mean_error: f64,
    pub min_bits: f64,
    pub mean_bits: f64,
}

/// Reported precision for an exact match.
const EXACT_BITS: f64 = 64.0;

fn bits(err: f64) -> f64 {
    if err > 0.0 { (-err.log2()).min(EXACT_BITS) } else { EXACT_BITS }
}

impl PrecisionStats {
    /// Compare complex slots pairwise; extra decoded slots are ignored.
    pub fn compare(expected: &[Complex64], actual: &[Complex64]) -> Result<Self> {
        if actual.len() < expected.len() {
            return Err(CkksError::DimensionMismatch { expected: expected.len(), got: actual.len() });
        }
        Self::from_errors(expected.iter().zip(actual.iter()).map(|(e, a)| (e - a).norm()))
    }

    pub fn compare_real(expected: &[f64], actual: &[f64]) -> Result<Self> {
        if actual.len() < expected.len() {
            return Err(CkksError::DimensionMismatch { expected: expected.len(), got: actual.len() });
        }
        Self::from_errors(expected.iter().zip(actual.iter()).map(|(e, a)| (e - a).abs()))
    }

    fn from_errors(errors: impl Iterator<Item = f64>) -> Result<Self> {
        let (mut max, mut sum, mut count) = (0.0f64, 0.0f64, 0usize);
        for err in errors {
            if !err.is_finite() {
                return Err(CkksError::InvalidParameter("non-finite slot error".into()));
            }
            max = max.max(err);
            sum += err;
            count += 1;
        }
        let mean = if count == 0 { 0.0 } else { sum / count as f64 };
        Ok(Self { max_error: max, mean_error: mean, min_bits: bits(max), mean_bits: bits(mean) })
    }
}
