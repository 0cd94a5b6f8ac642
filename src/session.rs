//! Single-party session: one parameter set with its keys and helpers.

use std::sync::Arc;

use crate::ckks::{
    gen_public_key, gen_relin_key, gen_secret_key, Ciphertext, Decryptor, Encoder, Encryptor,
    EvaluationKeySet, Evaluator, PublicKey, SecretKey,
};
use crate::error::{CkksError, Result};
use crate::params::CkksParams;
use crate::serialize::{ciphertext_from_bytes, ciphertext_to_bytes};

/// Owns keys, encoder, encryptor, decryptor and evaluator for one parameter set.
///
/// Fresh ciphertexts are encrypted at the top level with the default scale.
#[derive(Debug)]
pub struct CkksSession {
    params: Arc<CkksParams>,
    encoder: Encoder,
    public_key: Arc<PublicKey>,
    encryptor: Encryptor,
    decryptor: Decryptor,
    evaluator: Evaluator,
}

impl CkksSession {
    /// Generate a fresh key set from OS randomness.
    pub fn new(params: Arc<CkksParams>) -> Result<Self> {
        let sk = Arc::new(gen_secret_key(&params)?);
        let public_key = Arc::new(gen_public_key(&sk)?);
        let keys = if params.p_moduli.is_empty() {
            EvaluationKeySet::default()
        } else {
            EvaluationKeySet::with_relin(gen_relin_key(&sk)?)
        };
        Self::from_keys(params, sk, public_key, keys)
    }

    pub fn from_keys(
        params: Arc<CkksParams>,
        sk: Arc<SecretKey>,
        public_key: Arc<PublicKey>,
        keys: EvaluationKeySet,
    ) -> Result<Self> {
        if !params.is_compatible(&sk.params) || !params.is_compatible(&public_key.params) {
            return Err(CkksError::ParamsMismatch);
        }
        tracing::debug!(
            ring_degree = params.ring_degree,
            max_level = params.max_level(),
            relin = keys.relin.is_some(),
            "created session"
        );
        Ok(Self {
            encoder: Encoder::new(params.clone()),
            encryptor: Encryptor::with_public_key(public_key.clone()),
            decryptor: Decryptor::new(sk),
            evaluator: Evaluator::new(params.clone(), keys)?,
            public_key,
            params,
        })
    }

    pub fn params(&self) -> &Arc<CkksParams> {
        &self.params
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn public_key(&self) -> &Arc<PublicKey> {
        &self.public_key
    }

    pub fn encrypt(&self, values: &[f64]) -> Result<Ciphertext> {
        let pt = self.encoder.encode_real(values, self.params.max_level(), self.params.default_scale)?;
        self.encryptor.encrypt(&pt)
    }

    pub fn encrypt_to_bytes(&self, values: &[f64]) -> Result<Vec<u8>> {
        ciphertext_to_bytes(&self.encrypt(values)?)
    }

    pub fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        self.evaluator.add(a, b)
    }

    /// Add two serialized ciphertexts; the sum is returned serialized.
    pub fn add_serialized(&self, a: &[u8], b: &[u8]) -> Result<Vec<u8>> {
        let a = ciphertext_from_bytes(a, &self.params)?;
        let b = ciphertext_from_bytes(b, &self.params)?;
        ciphertext_to_bytes(&self.evaluator.add(&a, &b)?)
    }

    /// Multiply, relinearize and rescale.
    pub fn multiply(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        self.evaluator.rescale(&self.evaluator.multiply_relin(a, b)?)
    }

    /// Decrypt and decode every slot's real part.
    pub fn decrypt(&self, ct: &Ciphertext) -> Result<Vec<f64>> {
        self.encoder.decode_real(&self.decryptor.decrypt(ct)?)
    }

    /// Decrypt a serialized ciphertext and return its first `count` slots.
    pub fn decrypt_from_bytes(&self, bytes: &[u8], count: usize) -> Result<Vec<f64>> {
        if count > self.encoder.slots() {
            return Err(CkksError::DimensionMismatch { expected: self.encoder.slots(), got: count });
        }
        let mut values = self.decrypt(&ciphertext_from_bytes(bytes, &self.params)?)?;
        values.truncate(count);
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::presets::{compact, demo_n4096};
    use crate::params::CkksParamsBuilder;

    #[test]
    fn test_serialized_add() {
        let session = CkksSession::new(demo_n4096().unwrap()).unwrap();
        let a = session.encrypt_to_bytes(&[1.5, -2.25]).unwrap();
        let b = session.encrypt_to_bytes(&[0.5, 0.25]).unwrap();
        let sum = session.add_serialized(&a, &b).unwrap();
        let out = session.decrypt_from_bytes(&sum, 2).unwrap();
        assert_eq!(out.len(), 2);
        assert!((out[0] - 2.0).abs() < 1e-6);
        assert!((out[1] + 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_multiply_drops_level() {
        let session = CkksSession::new(compact().unwrap()).unwrap();
        let a = session.encrypt(&[3.0, 0.5]).unwrap();
        let b = session.encrypt(&[-2.0, 8.0]).unwrap();
        let prod = session.multiply(&a, &b).unwrap();
        assert_eq!(prod.level, a.level - 1);
        assert_eq!(prod.c.len(), 2);
        let out = session.decrypt(&prod).unwrap();
        assert!((out[0] + 6.0).abs() < 1e-3);
        assert!((out[1] - 4.0).abs() < 1e-3);
    }

    #[test]
    fn test_without_aux_modulus() {
        let params = CkksParamsBuilder::new().ring_degree(1024).log_q(vec![50, 40]).build().unwrap();
        let session = CkksSession::new(params).unwrap();
        let a = session.encrypt(&[1.0]).unwrap();
        assert!(matches!(session.multiply(&a, &a), Err(CkksError::MissingKey(_))));
        assert!(session.decrypt_from_bytes(&[], session.encoder().slots() + 1).is_err());
    }
}
