pub mod encoding;
pub mod encrypt;
pub mod eval;
pub mod keygen;
pub mod keyswitch;
pub mod precision;

pub use encoding::Encoder;
pub use encrypt::{decrypt, encrypt_pk, encrypt_sk, Decryptor, Encryptor};
pub use eval::{EvaluationKeySet, Evaluator};
pub use keygen::{gen_public_key, gen_relin_key, gen_secret_key, PublicKey, RelinearizationKey, SecretKey};
pub use precision::PrecisionStats;

use std::sync::Arc;

use crate::error::{CkksError, Result};
use crate::params::CkksParams;
use crate::ring::rns::RnsPoly;

/// An encoded message: one polynomial over q_0..q_level in NTT form.
#[derive(Clone, Debug)]
pub struct Plaintext {
    pub poly: RnsPoly,
    /// Index into the modulus chain.
    pub level: usize,
    /// Δ actually baked into the coefficients.
    pub scale: f64,
    pub params: Arc<CkksParams>,
}

/// A CKKS ciphertext: (c0, c1, ..., c_k) with k = 1 when fresh and k = 2 after
/// multiplication, before relinearization.
///
/// Every component is in NTT form over q_0..q_level. Decrypting and dividing by
/// `scale` recovers the encoded values up to noise.
#[derive(Clone, Debug)]
pub struct Ciphertext {
    pub c: Vec<RnsPoly>,
    pub level: usize,
    pub scale: f64,
    pub params: Arc<CkksParams>,
}

fn check_level(level: usize, params: &CkksParams) -> Result<()> {
    if level > params.max_level() {
        return Err(CkksError::LevelMismatch { left: level, right: params.max_level() });
    }
    Ok(())
}

impl Plaintext {
    /// Level within the chain and polynomial limbs matching it.
    pub fn validate(&self) -> Result<()> {
        check_level(self.level, &self.params)?;
        if self.poly.moduli != self.params.q_moduli_at(self.level) {
            return Err(CkksError::ModulusMismatch);
        }
        Ok(())
    }
}

impl Ciphertext {
    pub fn degree(&self) -> usize {
        self.c.len().saturating_sub(1)
    }

    /// At least two components, a level within the chain, and every
    /// component over exactly q_0..q_level.
    pub fn validate(&self) -> Result<()> {
        if self.c.len() < 2 {
            return Err(CkksError::InvalidCiphertextSize { expected: 2, got: self.c.len() });
        }
        check_level(self.level, &self.params)?;
        let moduli = self.params.q_moduli_at(self.level);
        if self.c.iter().any(|ci| ci.moduli != moduli) {
            return Err(CkksError::ModulusMismatch);
        }
        Ok(())
    }
}

impl PartialEq for Ciphertext {
    fn eq(&self, other: &Self) -> bool {
        self.params.is_compatible(&other.params)
            && self.level == other.level
            && self.scale.to_bits() == other.scale.to_bits()
            && self.c == other.c
    }
}

impl PartialEq for Plaintext {
    fn eq(&self, other: &Self) -> bool {
        self.params.is_compatible(&other.params)
            && self.level == other.level
            && self.scale.to_bits() == other.scale.to_bits()
            && self.poly == other.poly
    }
}
