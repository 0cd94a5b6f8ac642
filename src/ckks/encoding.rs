//! CKKS encode/decode via the canonical embedding.
//!
//! Slot k holds m(ζ^{5^k}) with ζ = e^{iπ/N}; its complex conjugate sits at
//! ζ^{-5^k}, so a polynomial with real coefficients carries N/2 complex slots.
//! Evaluating m at every odd power ζ^{2t+1} is a DFT of the twisted
//! coefficients m_j·ζ^j, which rustfft computes in O(N log N).

use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive};
use rustfft::num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

use crate::ckks::Plaintext;
use crate::error::{CkksError, Result};
use crate::params::CkksParams;
use crate::ring::rns::RnsPoly;

/// Scaled coefficients below this magnitude take the i64 path into RNS.
const I64_SAFE_BOUND: f64 = (1u64 << 62) as f64;

/// Encoder/decoder for one parameter set.
///
/// Holds precomputed FFT plans, twist factors ζ^j and the slot permutation;
/// immutable after construction and safe to share across threads.
pub struct Encoder {
    params: Arc<CkksParams>,
    fft: Arc<dyn Fft<f64>>,
    ifft: Arc<dyn Fft<f64>>,
    /// ζ^j for j = 0..N
    twist: Vec<Complex64>,
    /// Position of slot k among the odd powers: (5^k mod 2N - 1) / 2.
    slot_index: Vec<usize>,
    /// Position of the conjugate of slot k: (-5^k mod 2N - 1) / 2.
    conj_index: Vec<usize>,
}

impl Encoder {
    pub fn new(params: Arc<CkksParams>) -> Self {
        let n = params.ring_degree;
        let two_n = 2 * n;

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n);
        let ifft = planner.plan_fft_inverse(n);

        let twist = (0..n)
            .map(|j| Complex64::from_polar(1.0, PI * j as f64 / n as f64))
            .collect();

        let slots = n / 2;
        let mut slot_index = Vec::with_capacity(slots);
        let mut conj_index = Vec::with_capacity(slots);
        let mut e = 1usize;
        for _ in 0..slots {
            slot_index.push((e - 1) / 2);
            conj_index.push((two_n - e - 1) / 2);
            e = (e * 5) % two_n;
        }

        Self { params, fft, ifft, twist, slot_index, conj_index }
    }

    pub fn params(&self) -> &Arc<CkksParams> {
        &self.params
    }

    /// Number of complex slots (N/2).
    pub fn slots(&self) -> usize {
        self.slot_index.len()
    }

    /// Encode up to N/2 complex values at `level` with scale `scale`.
    ///
    /// Missing slots are zero. The result is in NTT form over q_0..q_level.
    pub fn encode(&self, values: &[Complex64], level: usize, scale: f64) -> Result<Plaintext> {
        let n = self.params.ring_degree;
        if values.len() > self.slots() {
            return Err(CkksError::DimensionMismatch { expected: self.slots(), got: values.len() });
        }
        if level > self.params.max_level() {
            return Err(CkksError::InvalidParameter(format!(
                "level {level} exceeds max level {}",
                self.params.max_level()
            )));
        }
        if !scale.is_finite() || scale <= 1.0 {
            return Err(CkksError::InvalidParameter(format!("scale must be finite and > 1, got {scale}")));
        }
        if let Some(v) = values.iter().find(|v| !v.re.is_finite() || !v.im.is_finite()) {
            return Err(CkksError::InvalidParameter(format!("cannot encode non-finite value {v}")));
        }

        let mut buf = vec![Complex64::new(0.0, 0.0); n];
        for (k, &z) in values.iter().enumerate() {
            buf[self.slot_index[k]] = z;
            buf[self.conj_index[k]] = z.conj();
        }

        // inverse of the + sign DFT: forward transform divided by N
        self.fft.process(&mut buf);
        let inv_n = 1.0 / n as f64;
        let coeffs: Vec<f64> = buf.iter()
            .zip(self.twist.iter())
            .map(|(b, t)| ((b * t.conj()).re * inv_n * scale).round())
            .collect();

        let max_abs = coeffs.iter().fold(0.0f64, |m, c| m.max(c.abs()));
        let moduli = self.params.q_moduli_at(level);
        let log_q: f64 = moduli.iter().map(|&q| (q as f64).log2()).sum();
        if max_abs >= 1.0 && max_abs.log2() >= log_q - 1.0 {
            return Err(CkksError::InvalidParameter(format!(
                "scaled values reach 2^{:.1}, beyond Q/2 at level {level} (2^{:.1})",
                max_abs.log2(),
                log_q - 1.0
            )));
        }

        let poly = if max_abs < I64_SAFE_BOUND {
            let ints: Vec<i64> = coeffs.iter().map(|&c| c as i64).collect();
            RnsPoly::from_signed(&ints, moduli)
        } else {
            let ints = coeffs.iter()
                .map(|&c| BigInt::from_f64(c).ok_or_else(|| {
                    CkksError::InvalidParameter(format!("cannot represent coefficient {c}"))
                }))
                .collect::<Result<Vec<_>>>()?;
            RnsPoly::from_bigint(&ints, moduli)
        };

        Ok(Plaintext {
            poly: poly.into_ntt(&self.params.ring)?,
            level,
            scale,
            params: self.params.clone(),
        })
    }

    /// Encode real values; imaginary parts are zero.
    pub fn encode_real(&self, values: &[f64], level: usize, scale: f64) -> Result<Plaintext> {
        let complex: Vec<Complex64> = values.iter().map(|&v| Complex64::new(v, 0.0)).collect();
        self.encode(&complex, level, scale)
    }

    /// Decode all N/2 slots.
    pub fn decode(&self, pt: &Plaintext) -> Result<Vec<Complex64>> {
        if !self.params.is_compatible(&pt.params) {
            return Err(CkksError::ParamsMismatch);
        }
        let coeffs = pt.poly.clone().into_coeff(&self.params.ring)?.reconstruct_centered()?;

        let mut buf = coeffs.iter()
            .zip(self.twist.iter())
            .map(|(c, t)| {
                let v = c.to_f64().ok_or_else(|| {
                    CkksError::InvalidParameter("coefficient does not fit in f64".into())
                })?;
                Ok(t * (v / pt.scale))
            })
            .collect::<Result<Vec<Complex64>>>()?;

        self.ifft.process(&mut buf);
        Ok(self.slot_index.iter().map(|&i| buf[i]).collect())
    }

    /// Decode all N/2 slots, keeping real parts.
    pub fn decode_real(&self, pt: &Plaintext) -> Result<Vec<f64>> {
        Ok(self.decode(pt)?.into_iter().map(|z| z.re).collect())
    }
}

impl fmt::Debug for Encoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encoder")
            .field("ring_degree", &self.params.ring_degree)
            .field("slots", &self.slots())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::presets::{compact, demo_n4096};
    use crate::params::CkksParamsBuilder;
    use crate::ring::rns::Domain;

    fn max_err(a: &[Complex64], b: &[Complex64]) -> f64 {
        a.iter().zip(b.iter()).map(|(x, y)| (x - y).norm()).fold(0.0, f64::max)
    }

    #[test]
    fn test_roundtrip_complex() {
        let params = compact().unwrap();
        let encoder = Encoder::new(params.clone());
        let values: Vec<Complex64> = (0..encoder.slots())
            .map(|i| Complex64::new((i as f64 * 0.37).sin() * 10.0, (i as f64 * 0.11).cos()))
            .collect();

        let pt = encoder.encode(&values, params.max_level(), params.default_scale).unwrap();
        assert_eq!(pt.poly.domain, Domain::Ntt);
        assert_eq!(pt.poly.num_limbs(), 3);
        let decoded = encoder.decode(&pt).unwrap();
        assert!(max_err(&values, &decoded) < 1e-8);
    }

    #[test]
    fn test_roundtrip_real_has_zero_imaginary() {
        let params = demo_n4096().unwrap();
        let encoder = Encoder::new(params.clone());
        let values = [1.5, -2.25, 0.0, 3.125];
        let pt = encoder.encode_real(&values, 2, params.default_scale).unwrap();
        let decoded = encoder.decode(&pt).unwrap();
        for (k, z) in decoded.iter().enumerate() {
            let want = values.get(k).copied().unwrap_or(0.0);
            assert!((z.re - want).abs() < 1e-9, "slot {k}: {z}");
            assert!(z.im.abs() < 1e-9, "slot {k}: {z}");
        }
    }

    #[test]
    fn test_slot_is_evaluation_at_root() {
        // A constant c encodes as the constant polynomial c·Δ.
        let params = compact().unwrap();
        let encoder = Encoder::new(params.clone());
        let values = vec![Complex64::new(2.0, 0.0); encoder.slots()];
        let pt = encoder.encode(&values, 0, 1024.0).unwrap();
        let coeffs = pt.poly.clone().into_coeff(&params.ring).unwrap().reconstruct_centered().unwrap();
        assert_eq!(coeffs[0], BigInt::from(2048));
        assert!(coeffs[1..].iter().all(|c| *c == BigInt::from(0)));
    }

    #[test]
    fn test_lower_level_and_large_scale() {
        let params = compact().unwrap();
        let encoder = Encoder::new(params.clone());
        let values = [0.25, -0.5];
        // Δ² path: coefficients exceed i64 but fit in Q at the top level
        let scale = params.default_scale * params.default_scale;
        let pt = encoder.encode_real(&values, 2, scale).unwrap();
        let decoded = encoder.decode_real(&pt).unwrap();
        assert!((decoded[0] - 0.25).abs() < 1e-9);
        assert!((decoded[1] + 0.5).abs() < 1e-9);

        let pt0 = encoder.encode_real(&values, 0, params.default_scale).unwrap();
        assert_eq!(pt0.poly.num_limbs(), 1);
        assert!((encoder.decode_real(&pt0).unwrap()[1] + 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_encode_rejects_bad_input() {
        let params = compact().unwrap();
        let encoder = Encoder::new(params.clone());
        let too_many = vec![0.0; encoder.slots() + 1];
        assert!(matches!(
            encoder.encode_real(&too_many, 0, 1e6),
            Err(CkksError::DimensionMismatch { .. })
        ));
        assert!(encoder.encode_real(&[1.0], 3, 1e6).is_err());
        assert!(encoder.encode_real(&[1.0], 0, 1.0).is_err());
        assert!(encoder.encode_real(&[f64::NAN], 0, 1e6).is_err());
        // 2^20 · 2^45 overflows the 50-bit q_0
        assert!(encoder.encode_real(&[1048576.0], 0, 2f64.powi(45)).is_err());
    }

    #[test]
    fn test_decode_rejects_foreign_params() {
        let a = compact().unwrap();
        let b = CkksParamsBuilder::new().ring_degree(1024).log_q(vec![45]).build().unwrap();
        let pt = Encoder::new(b).encode_real(&[1.0], 0, 1e6).unwrap();
        assert!(matches!(Encoder::new(a).decode(&pt), Err(CkksError::ParamsMismatch)));
    }
}
