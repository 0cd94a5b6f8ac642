use thiserror::Error;

use crate::ring::rns::Domain;

#[derive(Debug, Error)]
pub enum CkksError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("ring degree must be a power of 2 in [16, 2^17], got {0}")]
    InvalidRingDegree(usize),

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("modulus mismatch")]
    ModulusMismatch,

    #[error("domain mismatch: expected {expected:?}, got {got:?}")]
    DomainMismatch { expected: Domain, got: Domain },

    #[error("level mismatch: {left} vs {right}")]
    LevelMismatch { left: usize, right: usize },

    #[error("scale mismatch: {left} vs {right}")]
    ScaleMismatch { left: f64, right: f64 },

    #[error("level exhausted: no modulus left to drop")]
    LevelExhausted,

    #[error("operands were built under different parameters")]
    ParamsMismatch,

    #[error("unsupported ciphertext size: expected {expected}, got {got}")]
    InvalidCiphertextSize { expected: usize, got: usize },

    #[error("key not available: {0}")]
    MissingKey(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("randomness source failure: {0}")]
    Randomness(String),
}

pub type Result<T> = std::result::Result<T, CkksError>;
