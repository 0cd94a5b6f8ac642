use std::sync::Arc;

use crate::error::Result;
use crate::params::{CkksParams, CkksParamsBuilder};

/// The reference parameter literal: logN = 12, LogQ = [55, 45, 45], LogP = [61],
/// Δ = 2^45. Two multiplicative levels.
///
/// log2(QP) ≈ 206 exceeds the 128-bit bound for N = 4096, so building it logs
/// a security warning. Use [`n8192_depth4`] when security matters.
pub fn demo_n4096() -> Result<Arc<CkksParams>> {
    CkksParamsBuilder::new()
        .log_n(12)
        .log_q(vec![55, 45, 45])
        .log_p(vec![61])
        .log_default_scale(45)
        .build()
}

/// Small parameters for fast tests and examples.
/// N = 1024, LogQ = [50, 40, 40], LogP = [55], Δ = 2^40. Not secure.
pub fn compact() -> Result<Arc<CkksParams>> {
    CkksParamsBuilder::new()
        .ring_degree(1024)
        .log_q(vec![50, 40, 40])
        .log_p(vec![55])
        .log_default_scale(40)
        .build()
}

/// N = 8192 with four multiplicative levels and a two-prime P (digits of two
/// Q moduli). log2(QP) ≈ 340; meets 128-bit security only at N = 16384, so
/// this set trades security margin for depth like the reference literal.
pub fn n8192_depth4() -> Result<Arc<CkksParams>> {
    CkksParamsBuilder::new()
        .log_n(13)
        .log_q(vec![60, 40, 40, 40, 40])
        .log_p(vec![60, 60])
        .log_default_scale(40)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_literal() {
        let params = demo_n4096().unwrap();
        assert_eq!(params.ring_degree, 4096);
        let bits: Vec<u32> = params.q_moduli.iter().map(|q| 64 - q.leading_zeros()).collect();
        assert_eq!(bits, vec![55, 45, 45]);
        assert_eq!(64 - params.p_moduli[0].leading_zeros(), 61);
        assert_eq!(params.default_scale, 2f64.powi(45));
    }

    #[test]
    fn test_compact() {
        let params = compact().unwrap();
        assert_eq!(params.max_level(), 2);
        assert_eq!(params.num_digits(params.max_level()), 3);
    }

    #[test]
    fn test_n8192_depth4() {
        let params = n8192_depth4().unwrap();
        assert_eq!(params.max_level(), 4);
        assert_eq!(params.digit_size(), 2);
        assert_eq!(params.num_digits(4), 3);
    }
}
