pub mod gaussian;
pub mod uniform;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use crate::error::{CkksError, Result};

pub use gaussian::sample_gaussian_coeffs;
pub use uniform::{sample_sparse_ternary_coeffs, sample_ternary_coeffs, sample_uniform_coeffs, sample_uniform_limbs};

/// ChaCha20 seeded from the operating system's entropy source.
///
/// An entropy failure is reported, never papered over with a weaker seed.
pub fn os_rng() -> Result<ChaCha20Rng> {
    ChaCha20Rng::try_from_os_rng().map_err(|e| CkksError::Randomness(e.to_string()))
}
