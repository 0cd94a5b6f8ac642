use std::sync::Arc;

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Zero};
use rayon::prelude::*;
use zeroize::Zeroize;

use crate::error::{CkksError, Result};
use crate::ring::modular::{barrett_constant, center, mod_add, mod_inv, mod_mul, mod_neg, mod_sub, reduce_i64};
use crate::ring::ntt::{make_plan, NttBackend};
use crate::ring::poly::CoeffPoly;

/// Representation a polynomial is currently stored in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Domain {
    Coefficient,
    Ntt,
}

/// NTT tables for every modulus a polynomial may live under.
///
/// One basis covers the full Q∪P chain; polynomials activate a subset of it.
#[derive(Clone, Debug)]
pub struct RnsBasis {
    pub moduli: Vec<u64>,
    pub backends: Vec<Arc<dyn NttBackend>>,
    pub ring_degree: usize,
}

impl RnsBasis {
    /// Create a new RNS basis from a list of NTT-friendly primes.
    pub fn new(moduli: Vec<u64>, ring_degree: usize) -> Result<Self> {
        let backends = moduli.iter()
            .map(|&q| make_plan(ring_degree, q))
            .collect::<Result<Vec<_>>>()?;
        Self::with_backends(moduli, backends, ring_degree)
    }

    /// Create a basis from caller-supplied backends (one per modulus, same order).
    pub fn with_backends(
        moduli: Vec<u64>,
        backends: Vec<Arc<dyn NttBackend>>,
        ring_degree: usize,
    ) -> Result<Self> {
        if moduli.len() != backends.len() {
            return Err(CkksError::DimensionMismatch {
                expected: moduli.len(),
                got: backends.len(),
            });
        }
        for (i, &q) in moduli.iter().enumerate() {
            if moduli[..i].contains(&q) {
                return Err(CkksError::InvalidParameter(format!("duplicate modulus {q}")));
            }
            if backends[i].modulus() != q {
                return Err(CkksError::ModulusMismatch);
            }
        }
        Ok(Self { moduli, backends, ring_degree })
    }

    pub fn num_moduli(&self) -> usize {
        self.moduli.len()
    }

    pub fn index_of(&self, q: u64) -> Option<usize> {
        self.moduli.iter().position(|&m| m == q)
    }

    /// NTT backend for modulus `q`.
    pub fn backend(&self, q: u64) -> Result<&Arc<dyn NttBackend>> {
        self.index_of(q)
            .map(|i| &self.backends[i])
            .ok_or(CkksError::ModulusMismatch)
    }

    fn backends_for(&self, moduli: &[u64]) -> Result<Vec<Arc<dyn NttBackend>>> {
        moduli.iter().map(|&q| self.backend(q).cloned()).collect()
    }
}

/// Polynomial in RNS (Residue Number System) representation.
///
/// `limbs[i]` holds the N residues mod `moduli[i]`, all in `[0, q_i)`. The
/// polynomial lives in Z_Q[X]/(X^n+1) with Q = ∏ q_i, but Q itself is only
/// ever formed by [`RnsPoly::reconstruct_centered`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RnsPoly {
    pub limbs: Vec<Vec<u64>>,
    pub moduli: Vec<u64>,
    pub domain: Domain,
}

/// Wipes every limb; the modulus set and domain tag are kept.
impl Zeroize for RnsPoly {
    fn zeroize(&mut self) {
        for limb in &mut self.limbs {
            limb.zeroize();
        }
    }
}

impl RnsPoly {
    /// Create a zero polynomial over the given moduli.
    pub fn zero(n: usize, moduli: &[u64], domain: Domain) -> Self {
        Self {
            limbs: vec![vec![0u64; n]; moduli.len()],
            moduli: moduli.to_vec(),
            domain,
        }
    }

    /// Lift small signed coefficients into every limb (coefficient domain).
    pub fn from_signed(coeffs: &[i64], moduli: &[u64]) -> Self {
        let limbs = moduli.iter()
            .map(|&q| coeffs.iter().map(|&c| reduce_i64(c, q)).collect())
            .collect();
        Self { limbs, moduli: moduli.to_vec(), domain: Domain::Coefficient }
    }

    /// Reduce arbitrary-size signed coefficients into every limb (coefficient domain).
    pub fn from_bigint(coeffs: &[BigInt], moduli: &[u64]) -> Self {
        let limbs = moduli.iter()
            .map(|&q| coeffs.iter().map(|c| bigint_mod(c, q)).collect())
            .collect();
        Self { limbs, moduli: moduli.to_vec(), domain: Domain::Coefficient }
    }

    pub fn ring_degree(&self) -> usize {
        self.limbs.first().map_or(0, Vec::len)
    }

    pub fn num_limbs(&self) -> usize {
        self.limbs.len()
    }

    /// Limb `i` as a standalone coefficient polynomial.
    pub fn limb_poly(&self, i: usize) -> CoeffPoly {
        CoeffPoly { coeffs: self.limbs[i].clone(), modulus: self.moduli[i] }
    }

    fn check_compatible(&self, other: &Self) -> Result<()> {
        if self.moduli != other.moduli {
            return Err(CkksError::ModulusMismatch);
        }
        if self.domain != other.domain {
            return Err(CkksError::DomainMismatch { expected: self.domain, got: other.domain });
        }
        if self.ring_degree() != other.ring_degree() {
            return Err(CkksError::DimensionMismatch {
                expected: self.ring_degree(),
                got: other.ring_degree(),
            });
        }
        Ok(())
    }

    fn require_domain(&self, domain: Domain) -> Result<()> {
        if self.domain != domain {
            return Err(CkksError::DomainMismatch { expected: domain, got: self.domain });
        }
        Ok(())
    }

    fn zip_limbs(&self, other: &Self, op: impl Fn(u64, u64, u64) -> u64 + Sync) -> Self {
        let limbs = self.limbs.par_iter()
            .zip(other.limbs.par_iter())
            .zip(self.moduli.par_iter())
            .map(|((a, b), &q)| a.iter().zip(b.iter()).map(|(&x, &y)| op(x, y, q)).collect())
            .collect();
        Self { limbs, moduli: self.moduli.clone(), domain: self.domain }
    }

    /// Component-wise addition in RNS.
    pub fn add(&self, other: &Self) -> Result<Self> {
        self.check_compatible(other)?;
        Ok(self.zip_limbs(other, mod_add))
    }

    /// Component-wise subtraction in RNS.
    pub fn sub(&self, other: &Self) -> Result<Self> {
        self.check_compatible(other)?;
        Ok(self.zip_limbs(other, mod_sub))
    }

    /// In-place addition, used when accumulating key-switching products.
    pub fn add_assign(&mut self, other: &Self) -> Result<()> {
        self.check_compatible(other)?;
        for ((a, b), &q) in self.limbs.iter_mut().zip(other.limbs.iter()).zip(self.moduli.iter()) {
            for (x, &y) in a.iter_mut().zip(b.iter()) {
                *x = mod_add(*x, y, q);
            }
        }
        Ok(())
    }

    /// Negate.
    pub fn neg(&self) -> Self {
        let limbs = self.limbs.iter()
            .zip(self.moduli.iter())
            .map(|(a, &q)| a.iter().map(|&x| mod_neg(x, q)).collect())
            .collect();
        Self { limbs, moduli: self.moduli.clone(), domain: self.domain }
    }

    /// Polynomial multiplication; both operands must be in NTT domain.
    pub fn mul(&self, other: &Self) -> Result<Self> {
        self.check_compatible(other)?;
        self.require_domain(Domain::Ntt)?;
        Ok(self.zip_limbs(other, |x, y, q| mod_mul(x, y, q, barrett_constant(q))))
    }

    /// Multiply limb `i` by `scalars[i]`, which must already be reduced mod `q_i`.
    ///
    /// Works in either domain.
    pub fn mul_limb_scalars(&self, scalars: &[u64]) -> Self {
        let limbs = self.limbs.iter()
            .zip(self.moduli.iter())
            .zip(scalars.iter())
            .map(|((a, &q), &s)| {
                let bk = barrett_constant(q);
                a.iter().map(|&x| mod_mul(x, s, q, bk)).collect()
            })
            .collect();
        Self { limbs, moduli: self.moduli.clone(), domain: self.domain }
    }

    /// Forward NTT on every limb (no-op if already in NTT domain).
    pub fn to_ntt(&mut self, basis: &RnsBasis) -> Result<()> {
        if self.domain == Domain::Ntt {
            return Ok(());
        }
        self.transform(basis, |backend, limb| backend.forward(limb))?;
        self.domain = Domain::Ntt;
        Ok(())
    }

    /// Inverse NTT on every limb (no-op if already in coefficient domain).
    pub fn to_coeff(&mut self, basis: &RnsBasis) -> Result<()> {
        if self.domain == Domain::Coefficient {
            return Ok(());
        }
        self.transform(basis, |backend, limb| backend.inverse(limb))?;
        self.domain = Domain::Coefficient;
        Ok(())
    }

    /// Owned variant of [`RnsPoly::to_ntt`].
    pub fn into_ntt(mut self, basis: &RnsBasis) -> Result<Self> {
        self.to_ntt(basis)?;
        Ok(self)
    }

    /// Owned variant of [`RnsPoly::to_coeff`].
    pub fn into_coeff(mut self, basis: &RnsBasis) -> Result<Self> {
        self.to_coeff(basis)?;
        Ok(self)
    }

    fn transform(
        &mut self,
        basis: &RnsBasis,
        f: impl Fn(&dyn NttBackend, &mut [u64]) + Sync,
    ) -> Result<()> {
        if self.ring_degree() != basis.ring_degree {
            return Err(CkksError::DimensionMismatch {
                expected: basis.ring_degree,
                got: self.ring_degree(),
            });
        }
        let backends = basis.backends_for(&self.moduli)?;
        self.limbs.par_iter_mut()
            .zip(backends.par_iter())
            .for_each(|(limb, backend)| f(backend.as_ref(), limb.as_mut_slice()));
        Ok(())
    }

    /// Keep the first `num_limbs` limbs.
    pub fn truncate(&self, num_limbs: usize) -> Result<Self> {
        if num_limbs == 0 || num_limbs > self.num_limbs() {
            return Err(CkksError::DimensionMismatch {
                expected: self.num_limbs(),
                got: num_limbs,
            });
        }
        Ok(Self {
            limbs: self.limbs[..num_limbs].to_vec(),
            moduli: self.moduli[..num_limbs].to_vec(),
            domain: self.domain,
        })
    }

    /// Restrict to the given moduli, in the given order.
    pub fn select(&self, moduli: &[u64]) -> Result<Self> {
        let limbs = moduli.iter()
            .map(|q| {
                self.moduli.iter()
                    .position(|m| m == q)
                    .map(|i| self.limbs[i].clone())
                    .ok_or(CkksError::ModulusMismatch)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { limbs, moduli: moduli.to_vec(), domain: self.domain })
    }

    /// Apply X → X^k to every limb (coefficient domain, k odd).
    pub fn automorphism(&self, k: usize) -> Result<Self> {
        self.require_domain(Domain::Coefficient)?;
        let limbs = (0..self.num_limbs())
            .map(|i| self.limb_poly(i).automorphism(k).map(|p| p.coeffs))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { limbs, moduli: self.moduli.clone(), domain: self.domain })
    }

    /// Divide by the last modulus with rounding and drop that limb.
    ///
    /// For each coefficient x, returns (x - r) / q_last mod q_i where r is the
    /// centered residue of x mod q_last, i.e. round(x / q_last). The result
    /// stays in the input's domain.
    pub fn div_round_by_last_limb(&self, basis: &RnsBasis) -> Result<Self> {
        let k = self.num_limbs();
        if k < 2 {
            return Err(CkksError::LevelExhausted);
        }
        let q_last = self.moduli[k - 1];
        let mut last = self.limbs[k - 1].clone();
        if self.domain == Domain::Ntt {
            basis.backend(q_last)?.inverse(&mut last);
        }
        let centered: Vec<i64> = last.iter().map(|&c| center(c, q_last)).collect();

        let limbs = self.limbs[..k - 1].par_iter()
            .zip(self.moduli[..k - 1].par_iter())
            .map(|(limb, &q)| -> Result<Vec<u64>> {
                let mut r: Vec<u64> = centered.iter().map(|&c| reduce_i64(c, q)).collect();
                if self.domain == Domain::Ntt {
                    basis.backend(q)?.forward(&mut r);
                }
                let inv = mod_inv(q_last % q, q).ok_or(CkksError::ModulusMismatch)?;
                let bk = barrett_constant(q);
                Ok(limb.iter()
                    .zip(r.iter())
                    .map(|(&x, &y)| mod_mul(mod_sub(x, y, q), inv, q, bk))
                    .collect())
            })
            .collect::<Result<Vec<Vec<u64>>>>()?;

        Ok(Self { limbs, moduli: self.moduli[..k - 1].to_vec(), domain: self.domain })
    }

    /// CRT-reconstruct every coefficient as a centered integer in (-Q/2, Q/2].
    pub fn reconstruct_centered(&self) -> Result<Vec<BigInt>> {
        self.require_domain(Domain::Coefficient)?;
        let n = self.ring_degree();

        if self.num_limbs() == 1 {
            let q = self.moduli[0];
            return Ok(self.limbs[0].iter().map(|&c| BigInt::from(center(c, q))).collect());
        }

        let crt = CrtFactors::new(&self.moduli)?;
        let big_q = BigInt::from_biguint(Sign::Plus, crt.product.clone());
        let half_q = &crt.product >> 1u32;

        let coeffs = (0..n).into_par_iter()
            .map(|j| {
                let mut acc = BigUint::zero();
                for (i, &q) in self.moduli.iter().enumerate() {
                    let t = mod_mul(self.limbs[i][j], crt.q_star_inv[i], q, barrett_constant(q));
                    acc += &crt.q_star[i] * t;
                }
                acc %= &crt.product;
                if acc > half_q {
                    BigInt::from_biguint(Sign::Plus, acc) - &big_q
                } else {
                    BigInt::from_biguint(Sign::Plus, acc)
                }
            })
            .collect();
        Ok(coeffs)
    }

    /// Approximate base extension to the moduli `to` (coefficient domain in and out).
    ///
    /// With k source limbs the result is x + α·Q for some 0 ≤ α < k, where x is the
    /// representative of the input in [0, Q). A single source limb takes the exact
    /// centered lift instead, so α = 0 relative to the centered representative.
    pub fn fast_base_extend(&self, to: &[u64]) -> Result<Self> {
        self.require_domain(Domain::Coefficient)?;
        let n = self.ring_degree();

        if self.num_limbs() == 1 {
            let q = self.moduli[0];
            let centered: Vec<i64> = self.limbs[0].iter().map(|&c| center(c, q)).collect();
            return Ok(Self::from_signed(&centered, to));
        }

        // t_i = c_i * (Q/q_i)^{-1} mod q_i
        let crt = CrtFactors::new(&self.moduli)?;
        let t: Vec<Vec<u64>> = self.limbs.iter()
            .zip(self.moduli.iter())
            .zip(crt.q_star_inv.iter())
            .map(|((limb, &q), &inv)| {
                let bk = barrett_constant(q);
                limb.iter().map(|&c| mod_mul(c, inv, q, bk)).collect()
            })
            .collect();

        // x mod p ≈ Σ_i t_i * (Q/q_i) mod p
        let limbs = to.par_iter()
            .map(|&p| {
                let bk = barrett_constant(p);
                let q_star_mod_p: Vec<u64> = (0..self.moduli.len())
                    .map(|i| {
                        self.moduli.iter()
                            .enumerate()
                            .filter(|&(k, _)| k != i)
                            .fold(1u64, |acc, (_, &qk)| mod_mul(acc, qk % p, p, bk))
                    })
                    .collect();
                (0..n)
                    .map(|pos| {
                        t.iter().zip(q_star_mod_p.iter()).fold(0u64, |acc, (ti, &qs)| {
                            mod_add(acc, mod_mul(ti[pos] % p, qs, p, bk), p)
                        })
                    })
                    .collect()
            })
            .collect();

        Ok(Self { limbs, moduli: to.to_vec(), domain: Domain::Coefficient })
    }
}

/// CRT constants for a set of pairwise coprime moduli.
struct CrtFactors {
    product: BigUint,
    /// Q / q_i
    q_star: Vec<BigUint>,
    /// (Q / q_i)^{-1} mod q_i
    q_star_inv: Vec<u64>,
}

impl CrtFactors {
    fn new(moduli: &[u64]) -> Result<Self> {
        let product = moduli.iter().fold(BigUint::one(), |acc, &q| acc * q);
        let q_star = moduli.iter().map(|&q| &product / q).collect();
        let q_star_inv = moduli.iter()
            .enumerate()
            .map(|(i, &q)| {
                let bk = barrett_constant(q);
                let prod = moduli.iter()
                    .enumerate()
                    .filter(|&(j, _)| j != i)
                    .fold(1u64, |acc, (_, &qj)| mod_mul(acc, qj % q, q, bk));
                mod_inv(prod, q).ok_or_else(|| {
                    CkksError::InvalidParameter("RNS moduli must be pairwise coprime".into())
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { product, q_star, q_star_inv })
    }
}

/// Signed big integer reduced into [0, q).
fn bigint_mod(c: &BigInt, q: u64) -> u64 {
    let r = c.magnitude()
        .iter_u64_digits()
        .rev()
        .fold(0u64, |r, d| ((((r as u128) << 64) | d as u128) % q as u128) as u64);
    if c.sign() == Sign::Minus { mod_neg(r, q) } else { r }
}
