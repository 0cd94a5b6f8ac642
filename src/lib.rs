//! # ckks-engine: leveled RNS-CKKS approximate homomorphic encryption
//!
//! Vectors of real or complex numbers are packed into polynomial slots,
//! encrypted under RLWE, and combined with addition, multiplication,
//! relinearization and rescaling without decrypting. Results are approximate:
//! every operation adds a small amount of noise.
//!
//! Ciphertext moduli are kept in residue number system form over a chain of
//! NTT-friendly primes q_0..q_L, with auxiliary primes P for hybrid key
//! switching.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ckks_engine::prelude::*;
//!
//! // N = 4096, Q = [55, 45, 45] bits, P = [61] bits, Δ = 2^45
//! let params = ckks_engine::params::presets::demo_n4096().unwrap();
//! let session = CkksSession::new(params).unwrap();
//!
//! let a = session.encrypt(&[1.5, -2.25]).unwrap();
//! let b = session.encrypt(&[0.5, 0.25]).unwrap();
//!
//! let sum = session.add(&a, &b).unwrap();
//! let product = session.multiply(&a, &b).unwrap();
//!
//! let out = session.decrypt(&sum).unwrap();
//! assert!((out[0] - 2.0).abs() < 1e-6);
//! let out = session.decrypt(&product).unwrap();
//! assert!((out[1] + 0.5625).abs() < 1e-3);
//! ```

pub mod error;
pub mod params;
pub mod ring;
pub mod sampling;
pub mod ckks;
pub mod serialize;
pub mod session;

/// Convenient re-exports for common types and functions.
pub mod prelude {
    pub use crate::error::{CkksError, Result};
    pub use crate::params::{CkksParams, CkksParamsBuilder, SecretDistribution};
    pub use crate::ring::{Domain, RnsBasis, RnsPoly};
    pub use crate::ckks::{
        Ciphertext, Plaintext, Encoder, Encryptor, Decryptor, Evaluator, EvaluationKeySet,
        SecretKey, PublicKey, RelinearizationKey, PrecisionStats,
        gen_secret_key, gen_public_key, gen_relin_key,
        encrypt_pk, encrypt_sk, decrypt,
    };
    pub use crate::serialize::{
        ciphertext_from_bytes, ciphertext_to_bytes, public_key_from_bytes, public_key_to_bytes,
        relin_key_from_bytes, relin_key_to_bytes, secret_key_from_bytes, secret_key_to_bytes,
    };
    pub use crate::session::CkksSession;
    pub use rustfft::num_complex::Complex64;
}
