use std::sync::Arc;

use crate::ckks::keygen::RelinearizationKey;
use crate::ckks::keyswitch::switch_key;
use crate::ckks::{Ciphertext, Plaintext};
use crate::error::{CkksError, Result};
use crate::params::CkksParams;
use crate::ring::RnsPoly;

/// Relative tolerance when comparing scales of two operands.
const SCALE_TOLERANCE: f64 = 1e-9;

/// Evaluation keys handed to an [`Evaluator`]. Public material only.
#[derive(Clone, Debug, Default)]
pub struct EvaluationKeySet {
    pub relin: Option<RelinearizationKey>,
}

impl EvaluationKeySet {
    pub fn with_relin(rlk: RelinearizationKey) -> Self {
        Self { relin: Some(rlk) }
    }
}

/// Homomorphic operations on ciphertexts of one parameter set.
#[derive(Clone, Debug)]
pub struct Evaluator {
    params: Arc<CkksParams>,
    keys: EvaluationKeySet,
}

fn scales_match(a: f64, b: f64) -> bool {
    (a - b).abs() <= SCALE_TOLERANCE * a.abs().max(b.abs())
}

impl Evaluator {
    pub fn new(params: Arc<CkksParams>, keys: EvaluationKeySet) -> Result<Self> {
        if let Some(rlk) = &keys.relin {
            if !params.is_compatible(&rlk.params) {
                return Err(CkksError::ParamsMismatch);
            }
        }
        Ok(Self { params, keys })
    }

    pub fn params(&self) -> &Arc<CkksParams> {
        &self.params
    }

    fn check_params(&self, other: &CkksParams) -> Result<()> {
        if !self.params.is_compatible(other) {
            return Err(CkksError::ParamsMismatch);
        }
        Ok(())
    }

    fn check_ciphertext(&self, ct: &Ciphertext) -> Result<()> {
        self.check_params(&ct.params)?;
        ct.validate()
    }

    fn check_plaintext(&self, pt: &Plaintext) -> Result<()> {
        self.check_params(&pt.params)?;
        pt.validate()
    }

    fn check_level(left: usize, right: usize) -> Result<()> {
        if left != right {
            return Err(CkksError::LevelMismatch { left, right });
        }
        Ok(())
    }

    fn check_scale(left: f64, right: f64) -> Result<()> {
        if !scales_match(left, right) {
            return Err(CkksError::ScaleMismatch { left, right });
        }
        Ok(())
    }

    fn check_additive(&self, a: &Ciphertext, b: &Ciphertext) -> Result<()> {
        self.check_ciphertext(a)?;
        self.check_ciphertext(b)?;
        Self::check_level(a.level, b.level)?;
        Self::check_scale(a.scale, b.scale)
    }

    fn with_components(&self, ct: &Ciphertext, c: Vec<RnsPoly>, scale: f64) -> Ciphertext {
        Ciphertext { c, level: ct.level, scale, params: self.params.clone() }
    }

    /// Homomorphic addition. Sizes may differ; the shorter operand is
    /// zero-padded.
    pub fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        self.check_additive(a, b)?;
        let max_len = a.c.len().max(b.c.len());
        let mut c = Vec::with_capacity(max_len);

        for i in 0..max_len {
            match (a.c.get(i), b.c.get(i)) {
                (Some(x), Some(y)) => c.push(x.add(y)?),
                (Some(x), None) => c.push(x.clone()),
                (None, Some(y)) => c.push(y.clone()),
                (None, None) => unreachable!(),
            }
        }
        Ok(self.with_components(a, c, a.scale))
    }

    /// Homomorphic subtraction: a - b.
    pub fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        self.check_additive(a, b)?;
        let max_len = a.c.len().max(b.c.len());
        let mut c = Vec::with_capacity(max_len);

        for i in 0..max_len {
            match (a.c.get(i), b.c.get(i)) {
                (Some(x), Some(y)) => c.push(x.sub(y)?),
                (Some(x), None) => c.push(x.clone()),
                (None, Some(y)) => c.push(y.neg()),
                (None, None) => unreachable!(),
            }
        }
        Ok(self.with_components(a, c, a.scale))
    }

    pub fn neg(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        self.check_ciphertext(ct)?;
        let c = ct.c.iter().map(|ci| ci.neg()).collect();
        Ok(self.with_components(ct, c, ct.scale))
    }

    /// Add an encoded plaintext to c0.
    pub fn add_plaintext(&self, ct: &Ciphertext, pt: &Plaintext) -> Result<Ciphertext> {
        self.check_ciphertext(ct)?;
        self.check_plaintext(pt)?;
        Self::check_level(ct.level, pt.level)?;
        Self::check_scale(ct.scale, pt.scale)?;

        let mut c = ct.c.clone();
        c[0].add_assign(&pt.poly)?;
        Ok(self.with_components(ct, c, ct.scale))
    }

    /// Multiply every component by an encoded plaintext; scales multiply.
    pub fn multiply_plaintext(&self, ct: &Ciphertext, pt: &Plaintext) -> Result<Ciphertext> {
        self.check_ciphertext(ct)?;
        self.check_plaintext(pt)?;
        Self::check_level(ct.level, pt.level)?;

        let c = ct.c.iter()
            .map(|ci| ci.mul(&pt.poly))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.with_components(ct, c, ct.scale * pt.scale))
    }

    /// Tensor product of two size-2 ciphertexts.
    ///
    /// Returns (a0·b0, a0·b1 + a1·b0, a1·b1), decryptable under (1, s, s²),
    /// with scale Δ_a·Δ_b.
    pub fn multiply(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        self.check_ciphertext(a)?;
        self.check_ciphertext(b)?;
        for ct in [a, b] {
            if ct.c.len() != 2 {
                return Err(CkksError::InvalidCiphertextSize { expected: 2, got: ct.c.len() });
            }
        }
        Self::check_level(a.level, b.level)?;

        let (a0, a1) = (&a.c[0], &a.c[1]);
        let (b0, b1) = (&b.c[0], &b.c[1]);

        let d0 = a0.mul(b0)?;
        let d1 = a0.mul(b1)?.add(&a1.mul(b0)?)?;
        let d2 = a1.mul(b1)?;

        Ok(self.with_components(a, vec![d0, d1, d2], a.scale * b.scale))
    }

    /// Bring a size-3 ciphertext back to size 2 with the relinearization key.
    pub fn relinearize(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        self.check_ciphertext(ct)?;
        match ct.c.len() {
            2 => return Ok(ct.clone()),
            3 => {}
            got => return Err(CkksError::InvalidCiphertextSize { expected: 3, got }),
        }
        let rlk = self.keys.relin.as_ref()
            .ok_or_else(|| CkksError::MissingKey("relinearization key".into()))?;

        // c2·s² ≈ u0 + u1·s
        let (u0, u1) = switch_key(&ct.c[2], ct.level, &rlk.keys, &self.params)?;
        let c0 = ct.c[0].add(&u0)?;
        let c1 = ct.c[1].add(&u1)?;

        tracing::trace!(level = ct.level, scale = ct.scale, "relinearized");
        Ok(self.with_components(ct, vec![c0, c1], ct.scale))
    }

    pub fn multiply_relin(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        self.relinearize(&self.multiply(a, b)?)
    }

    /// Divide by q_level with rounding: level drops by one, scale /= q_level.
    pub fn rescale(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        self.check_ciphertext(ct)?;
        if ct.level == 0 {
            return Err(CkksError::LevelExhausted);
        }
        let q_last = self.params.q_moduli[ct.level];

        let c = ct.c.iter()
            .map(|ci| ci.div_round_by_last_limb(&self.params.ring))
            .collect::<Result<Vec<_>>>()?;
        let scale = ct.scale / q_last as f64;

        tracing::trace!(from = ct.level, to = ct.level - 1, scale, "rescaled");
        Ok(Ciphertext { c, level: ct.level - 1, scale, params: self.params.clone() })
    }

    /// Drop the top `levels` limbs without dividing; the scale is unchanged.
    pub fn drop_level(&self, ct: &Ciphertext, levels: usize) -> Result<Ciphertext> {
        self.check_ciphertext(ct)?;
        if levels > ct.level {
            return Err(CkksError::LevelExhausted);
        }
        let level = ct.level - levels;
        let c = ct.c.iter()
            .map(|ci| ci.truncate(level + 1))
            .collect::<Result<Vec<_>>>()?;
        Ok(Ciphertext { c, level, scale: ct.scale, params: self.params.clone() })
    }
}
