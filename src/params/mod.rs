pub mod presets;
pub mod primes;
pub mod security;

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::error::{CkksError, Result};
use crate::ring::modular::is_prime;
use crate::ring::rns::RnsBasis;

use self::primes::{generate_chain, MAX_MODULUS_BITS};

/// Largest supported ring degree.
pub const MAX_RING_DEGREE: usize = 1 << 17;
/// Smallest ring degree the NTT backend accepts.
pub const MIN_RING_DEGREE: usize = 16;

/// Distribution of secret key coefficients.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SecretDistribution {
    /// Each coefficient is non-zero with probability `density`, ±1 equally likely.
    Ternary { density: f64 },
    /// Exactly `hamming_weight` coefficients are ±1, the rest zero.
    SparseTernary { hamming_weight: usize },
}

impl Default for SecretDistribution {
    /// Uniform over {-1, 0, 1}.
    fn default() -> Self {
        SecretDistribution::Ternary { density: 2.0 / 3.0 }
    }
}

/// Parameters of a CKKS instance.
///
/// Built once through [`CkksParamsBuilder`] and shared read-only as
/// `Arc<CkksParams>` by every encoder, key and ciphertext.
#[derive(Clone)]
pub struct CkksParams {
    /// Ring degree N (power of 2).
    pub ring_degree: usize,
    /// Ciphertext modulus chain q_0..q_L; level ℓ uses the first ℓ+1.
    pub q_moduli: Vec<u64>,
    /// Auxiliary key-switching moduli p_0..p_{k-1}.
    pub p_moduli: Vec<u64>,
    /// Scale Δ used when the caller does not pick one.
    pub default_scale: f64,
    /// Gaussian noise standard deviation.
    pub sigma: f64,
    pub secret_distribution: SecretDistribution,
    /// NTT tables over Q∪P.
    pub ring: RnsBasis,
}

impl CkksParams {
    pub fn log_n(&self) -> u32 {
        self.ring_degree.trailing_zeros()
    }

    /// Highest level L = |Q| - 1.
    pub fn max_level(&self) -> usize {
        self.q_moduli.len() - 1
    }

    /// Number of complex slots, N/2.
    pub fn max_slots(&self) -> usize {
        self.ring_degree / 2
    }

    /// Active ciphertext moduli at `level`.
    pub fn q_moduli_at(&self, level: usize) -> &[u64] {
        &self.q_moduli[..=level]
    }

    /// q_0..q_level followed by every P modulus.
    pub fn qp_moduli_at(&self, level: usize) -> Vec<u64> {
        let mut moduli = self.q_moduli_at(level).to_vec();
        moduli.extend_from_slice(&self.p_moduli);
        moduli
    }

    /// Full Q∪P chain, the basis keys live over.
    pub fn qp_moduli(&self) -> Vec<u64> {
        self.qp_moduli_at(self.max_level())
    }

    /// Key-switching digit size α = |P|.
    pub fn digit_size(&self) -> usize {
        self.p_moduli.len()
    }

    /// Number of key-switching digits covering q_0..q_level.
    pub fn num_digits(&self, level: usize) -> usize {
        let alpha = self.digit_size();
        if alpha == 0 {
            return 0;
        }
        (level + 1).div_ceil(alpha)
    }

    /// Indices into `q_moduli` of digit `j` at `level`.
    pub fn digit_range(&self, j: usize, level: usize) -> Range<usize> {
        let alpha = self.digit_size();
        let start = j * alpha;
        start..((j + 1) * alpha).min(level + 1)
    }

    pub fn log_q(&self) -> f64 {
        self.q_moduli.iter().map(|&q| (q as f64).log2()).sum()
    }

    pub fn log_p(&self) -> f64 {
        self.p_moduli.iter().map(|&p| (p as f64).log2()).sum()
    }

    pub fn log_qp(&self) -> f64 {
        self.log_q() + self.log_p()
    }

    /// Whether objects built under `other` can be mixed with objects built under `self`.
    pub fn is_compatible(&self, other: &CkksParams) -> bool {
        std::ptr::eq(self, other)
            || (self.ring_degree == other.ring_degree
                && self.q_moduli == other.q_moduli
                && self.p_moduli == other.p_moduli)
    }
}

impl fmt::Debug for CkksParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CkksParams")
            .field("ring_degree", &self.ring_degree)
            .field("q_moduli", &self.q_moduli)
            .field("p_moduli", &self.p_moduli)
            .field("default_scale", &self.default_scale)
            .field("sigma", &self.sigma)
            .field("secret_distribution", &self.secret_distribution)
            .finish_non_exhaustive()
    }
}

/// Builder for CkksParams.
///
/// Moduli are given either explicitly or as bit sizes, in which case
/// NTT-friendly primes are generated deterministically.
#[derive(Clone, Debug)]
pub struct CkksParamsBuilder {
    ring_degree: usize,
    q_moduli: Vec<u64>,
    p_moduli: Vec<u64>,
    log_q: Vec<u32>,
    log_p: Vec<u32>,
    default_scale: Option<f64>,
    sigma: f64,
    secret_distribution: SecretDistribution,
}

impl Default for CkksParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CkksParamsBuilder {
    pub fn new() -> Self {
        Self {
            ring_degree: 4096,
            q_moduli: Vec::new(),
            p_moduli: Vec::new(),
            log_q: Vec::new(),
            log_p: Vec::new(),
            default_scale: None,
            sigma: 3.2,
            secret_distribution: SecretDistribution::default(),
        }
    }

    pub fn ring_degree(mut self, n: usize) -> Self {
        self.ring_degree = n;
        self
    }

    pub fn log_n(mut self, log_n: u32) -> Self {
        self.ring_degree = 1usize.checked_shl(log_n).unwrap_or(0);
        self
    }

    pub fn q_moduli(mut self, moduli: Vec<u64>) -> Self {
        self.q_moduli = moduli;
        self
    }

    pub fn p_moduli(mut self, moduli: Vec<u64>) -> Self {
        self.p_moduli = moduli;
        self
    }

    /// Bit sizes of the Q chain; primes are generated at build time.
    pub fn log_q(mut self, sizes: Vec<u32>) -> Self {
        self.log_q = sizes;
        self
    }

    /// Bit sizes of the P chain; primes are generated at build time.
    pub fn log_p(mut self, sizes: Vec<u32>) -> Self {
        self.log_p = sizes;
        self
    }

    pub fn default_scale(mut self, scale: f64) -> Self {
        self.default_scale = Some(scale);
        self
    }

    pub fn log_default_scale(mut self, log_scale: u32) -> Self {
        self.default_scale = Some(2f64.powi(log_scale as i32));
        self
    }

    pub fn sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    pub fn secret_distribution(mut self, dist: SecretDistribution) -> Self {
        self.secret_distribution = dist;
        self
    }

    pub fn build(self) -> Result<Arc<CkksParams>> {
        let n = self.ring_degree;
        if !n.is_power_of_two() || !(MIN_RING_DEGREE..=MAX_RING_DEGREE).contains(&n) {
            return Err(CkksError::InvalidRingDegree(n));
        }

        if !self.q_moduli.is_empty() && !self.log_q.is_empty() {
            return Err(CkksError::InvalidParameter("give either q_moduli or log_q, not both".into()));
        }
        if !self.p_moduli.is_empty() && !self.log_p.is_empty() {
            return Err(CkksError::InvalidParameter("give either p_moduli or log_p, not both".into()));
        }

        let mut explicit = self.q_moduli.clone();
        explicit.extend_from_slice(&self.p_moduli);

        let q_moduli = if self.log_q.is_empty() {
            self.q_moduli
        } else {
            generate_chain(&self.log_q, n, &explicit)?
        };
        if q_moduli.is_empty() {
            return Err(CkksError::InvalidParameter("must specify at least one ciphertext modulus".into()));
        }

        let p_moduli = if self.log_p.is_empty() {
            self.p_moduli
        } else {
            let mut used = q_moduli.clone();
            used.extend_from_slice(&explicit);
            generate_chain(&self.log_p, n, &used)?
        };

        let all: Vec<u64> = q_moduli.iter().chain(p_moduli.iter()).copied().collect();
        for (i, &q) in all.iter().enumerate() {
            validate_modulus(q, n)?;
            if all[..i].contains(&q) {
                return Err(CkksError::InvalidParameter(format!("modulus {q} appears twice")));
            }
        }

        let min_q_bits = q_moduli.iter().map(|&q| bit_width(q)).min().unwrap_or(0);
        let default_scale = self.default_scale.unwrap_or_else(|| 2f64.powi(min_q_bits as i32));
        if !default_scale.is_finite() || default_scale <= 1.0 {
            return Err(CkksError::InvalidParameter(format!("scale must be finite and > 1, got {default_scale}")));
        }
        if default_scale.log2() > min_q_bits as f64 {
            return Err(CkksError::InvalidParameter(format!(
                "log2(scale) = {:.2} exceeds the {min_q_bits}-bit smallest modulus",
                default_scale.log2()
            )));
        }

        if !self.sigma.is_finite() || self.sigma <= 0.0 {
            return Err(CkksError::InvalidParameter(format!("sigma must be > 0, got {}", self.sigma)));
        }
        match self.secret_distribution {
            SecretDistribution::Ternary { density } if !(density > 0.0 && density <= 1.0) => {
                return Err(CkksError::InvalidParameter(format!("ternary density must be in (0, 1], got {density}")));
            }
            SecretDistribution::SparseTernary { hamming_weight } if hamming_weight == 0 || hamming_weight > n => {
                return Err(CkksError::InvalidParameter(format!(
                    "hamming weight must be in [1, {n}], got {hamming_weight}"
                )));
            }
            _ => {}
        }

        let ring = RnsBasis::new(all, n)?;

        let params = CkksParams {
            ring_degree: n,
            q_moduli,
            p_moduli,
            default_scale,
            sigma: self.sigma,
            secret_distribution: self.secret_distribution,
            ring,
        };

        tracing::debug!(
            log_n = params.log_n(),
            levels = params.max_level() + 1,
            aux_moduli = params.p_moduli.len(),
            log_qp = params.log_qp(),
            log_scale = params.default_scale.log2(),
            "built CKKS parameters"
        );
        warn_if_weak(&params);

        Ok(Arc::new(params))
    }
}

fn bit_width(q: u64) -> u32 {
    64 - q.leading_zeros()
}

fn validate_modulus(q: u64, n: usize) -> Result<()> {
    let bits = bit_width(q);
    if !(2..=MAX_MODULUS_BITS).contains(&bits) {
        return Err(CkksError::InvalidParameter(format!(
            "modulus {q} has {bits} bits, must be in [2, {MAX_MODULUS_BITS}]"
        )));
    }
    if !is_prime(q) {
        return Err(CkksError::InvalidParameter(format!("modulus {q} is not prime")));
    }
    if q % (2 * n as u64) != 1 {
        return Err(CkksError::InvalidParameter(format!("modulus {q} is not ≡ 1 mod {}", 2 * n)));
    }
    Ok(())
}

fn warn_if_weak(params: &CkksParams) {
    let log_qp = params.log_qp();
    if !security::meets_128_bit(params.ring_degree, log_qp) {
        tracing::warn!(
            ring_degree = params.ring_degree,
            log_qp,
            max_log_qp = security::max_log_qp_128(params.ring_degree),
            "parameters exceed the 128-bit security bound"
        );
    }

    if params.p_moduli.is_empty() {
        return;
    }
    let log_p = params.log_p();
    let widest_digit = (0..params.num_digits(params.max_level()))
        .map(|j| {
            params.digit_range(j, params.max_level())
                .map(|i| (params.q_moduli[i] as f64).log2())
                .sum::<f64>()
        })
        .fold(0.0f64, f64::max);
    if log_p < widest_digit {
        tracing::warn!(
            log_p,
            widest_digit,
            "auxiliary modulus P is smaller than a key-switching digit; relinearization noise will be large"
        );
    }
}
