use std::fmt;
use std::sync::Arc;

use zeroize::{Zeroize, Zeroizing};

use crate::error::{CkksError, Result};
use crate::params::{CkksParams, SecretDistribution};
use crate::ring::modular::{barrett_constant, mod_mul};
use crate::ring::rns::{Domain, RnsPoly};
use crate::sampling::{
    os_rng, sample_gaussian_coeffs, sample_sparse_ternary_coeffs, sample_ternary_coeffs, sample_uniform_limbs,
};

/// CKKS secret key: s ternary, stored in NTT form over the full Q∪P chain.
///
/// Not `Clone`: share it through `Arc` inside the decrypting party.
pub struct SecretKey {
    pub poly: RnsPoly,
    pub params: Arc<CkksParams>,
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        // Zero out secret key material
        self.poly.zeroize();
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey").finish_non_exhaustive()
    }
}

/// CKKS public key: (b, a) = (-a·s + e, a) over q_0..q_L, NTT form.
#[derive(Clone, Debug)]
pub struct PublicKey {
    pub b: RnsPoly,
    pub a: RnsPoly,
    pub params: Arc<CkksParams>,
}

/// Relinearization key: one pair per key-switching digit, over Q∪P in NTT form.
#[derive(Clone, Debug)]
pub struct RelinearizationKey {
    /// Digit j holds (b_j, a_j) with b_j + a_j·s = e_j + P·g_j·s², where
    /// g_j ≡ 1 mod every q_i of digit j and ≡ 0 mod every other modulus.
    pub keys: Vec<(RnsPoly, RnsPoly)>,
    pub params: Arc<CkksParams>,
}

fn sample_error<R: rand::Rng>(params: &CkksParams, moduli: &[u64], rng: &mut R) -> Result<RnsPoly> {
    let e = sample_gaussian_coeffs(params.ring_degree, params.sigma, rng);
    RnsPoly::from_signed(&e, moduli).into_ntt(&params.ring)
}

fn sample_uniform<R: rand::Rng>(params: &CkksParams, moduli: &[u64], rng: &mut R) -> RnsPoly {
    // a uniform vector of NTT values is a uniform polynomial
    RnsPoly {
        limbs: sample_uniform_limbs(params.ring_degree, moduli, rng),
        moduli: moduli.to_vec(),
        domain: Domain::Ntt,
    }
}

/// Fresh RLWE sample (-a·s + e, a) over the moduli `s` is active on.
fn rlwe_zero<R: rand::Rng>(s: &RnsPoly, params: &CkksParams, rng: &mut R) -> Result<(RnsPoly, RnsPoly)> {
    let a = sample_uniform(params, &s.moduli, rng);
    let e = sample_error(params, &s.moduli, rng)?;
    let b = a.mul(s)?.neg().add(&e)?;
    Ok((b, a))
}

/// Generate a secret key from the parameters' secret distribution.
pub fn gen_secret_key(params: &Arc<CkksParams>) -> Result<SecretKey> {
    let mut rng = os_rng()?;
    gen_secret_key_with_rng(params, &mut rng)
}

/// Generate a secret key with a provided RNG.
pub fn gen_secret_key_with_rng<R: rand::Rng>(
    params: &Arc<CkksParams>,
    rng: &mut R,
) -> Result<SecretKey> {
    let n = params.ring_degree;
    let mut coeffs = match params.secret_distribution {
        SecretDistribution::Ternary { density } => sample_ternary_coeffs(n, density, rng),
        SecretDistribution::SparseTernary { hamming_weight } => sample_sparse_ternary_coeffs(n, hamming_weight, rng),
    };

    let poly = RnsPoly::from_signed(&coeffs, &params.qp_moduli()).into_ntt(&params.ring);
    coeffs.zeroize();

    tracing::debug!(ring_degree = n, distribution = ?params.secret_distribution, "generated secret key");
    Ok(SecretKey { poly: poly?, params: params.clone() })
}

/// Generate a public key from a secret key.
pub fn gen_public_key(sk: &SecretKey) -> Result<PublicKey> {
    let mut rng = os_rng()?;
    gen_public_key_with_rng(sk, &mut rng)
}

/// Generate a public key with a provided RNG.
pub fn gen_public_key_with_rng<R: rand::Rng>(
    sk: &SecretKey,
    rng: &mut R,
) -> Result<PublicKey> {
    let params = &sk.params;
    let s = Zeroizing::new(sk.poly.select(&params.q_moduli)?);
    let (b, a) = rlwe_zero(&s, params, rng)?;

    tracing::debug!(level = params.max_level(), "generated public key");
    Ok(PublicKey { b, a, params: params.clone() })
}

/// Generate a relinearization key.
///
/// Requires at least one auxiliary modulus: the key encrypts P·s² under s
/// over Q·P so that switching noise is divided by P afterwards.
pub fn gen_relin_key(sk: &SecretKey) -> Result<RelinearizationKey> {
    let mut rng = os_rng()?;
    gen_relin_key_with_rng(sk, &mut rng)
}

/// Generate relinearization key with provided RNG.
pub fn gen_relin_key_with_rng<R: rand::Rng>(
    sk: &SecretKey,
    rng: &mut R,
) -> Result<RelinearizationKey> {
    let params = &sk.params;
    if params.p_moduli.is_empty() {
        return Err(CkksError::InvalidParameter(
            "relinearization key needs at least one auxiliary modulus".into()
        ));
    }

    let s = &sk.poly;
    let s_sq = Zeroizing::new(s.mul(s)?);

    // P mod q_i for each Q limb
    let p_mod_q: Vec<u64> = params.q_moduli.iter()
        .map(|&q| {
            let bk = barrett_constant(q);
            params.p_moduli.iter().fold(1u64, |acc, &p| mod_mul(acc, p % q, q, bk))
        })
        .collect();

    let num_digits = params.num_digits(params.max_level());
    let mut keys = Vec::with_capacity(num_digits);
    for j in 0..num_digits {
        let (b, a) = rlwe_zero(s, params, rng)?;

        let digit = params.digit_range(j, params.max_level());
        let gadget: Vec<u64> = (0..s.num_limbs())
            .map(|i| if digit.contains(&i) { p_mod_q[i] } else { 0 })
            .collect();
        let b = b.add(&s_sq.mul_limb_scalars(&gadget))?;

        keys.push((b, a));
    }

    tracing::debug!(digits = num_digits, digit_size = params.digit_size(), "generated relinearization key");
    Ok(RelinearizationKey { keys, params: params.clone() })
}
