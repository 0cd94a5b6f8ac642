use std::fmt::Debug;
use std::sync::Arc;
use concrete_ntt::prime64::Plan;

use crate::error::{CkksError, Result};

/// Negacyclic NTT over Z_q[X]/(X^n + 1) for a single RNS limb.
///
/// Everything above the ring layer reaches the transform through this trait,
/// so a different backend can be plugged into [`crate::ring::rns::RnsBasis`]
/// without touching the encoder or the evaluator. The evaluation-domain
/// ordering is backend-defined; only pointwise operations may depend on it.
pub trait NttBackend: Send + Sync + Debug {
    /// The prime this table was built for.
    fn modulus(&self) -> u64;

    /// In-place coefficient → evaluation transform.
    fn forward(&self, data: &mut [u64]);

    /// In-place evaluation → coefficient transform, including the 1/n factor.
    fn inverse(&self, data: &mut [u64]);
}

/// `concrete-ntt` plans (AVX2/AVX-512/NEON accelerated) are the default backend.
impl NttBackend for Plan {
    fn modulus(&self) -> u64 {
        Plan::modulus(self)
    }

    fn forward(&self, data: &mut [u64]) {
        self.fwd(data);
    }

    fn inverse(&self, data: &mut [u64]) {
        self.inv(data);
        self.normalize(data);
    }
}

/// Build the default NTT backend for ring degree `n` and prime `modulus`.
pub fn make_plan(n: usize, modulus: u64) -> Result<Arc<dyn NttBackend>> {
    if !n.is_power_of_two() || n < 16 {
        return Err(CkksError::InvalidRingDegree(n));
    }
    // concrete-ntt requires modulus to be prime and ≡ 1 (mod 2n)
    let plan = Plan::try_new(n, modulus)
        .ok_or_else(|| CkksError::InvalidParameter(
            format!("cannot create NTT plan for n={n}, q={modulus} (need prime q ≡ 1 mod {})", 2 * n)
        ))?;
    Ok(Arc::new(plan))
}
