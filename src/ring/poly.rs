use crate::error::{CkksError, Result};
use crate::ring::modular::{mod_add, mod_sub, mod_mul, barrett_constant};

/// Polynomial in coefficient representation over Z_q[X]/(X^n + 1).
///
/// Single-limb view of an [`crate::ring::rns::RnsPoly`].
#[derive(Clone, Debug)]
pub struct CoeffPoly {
    pub coeffs: Vec<u64>,
    pub modulus: u64,
}

impl CoeffPoly {
    /// Create a polynomial from coefficients (reduced mod q).
    pub fn from_coeffs(coeffs: Vec<u64>, modulus: u64) -> Self {
        let mut p = Self { coeffs, modulus };
        p.reduce();
        p
    }

    /// Ring degree (number of coefficients).
    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }

    /// Reduce all coefficients mod q.
    pub fn reduce(&mut self) {
        for c in self.coeffs.iter_mut() {
            *c %= self.modulus;
        }
    }

    fn check_compatible(&self, other: &Self) -> Result<()> {
        if self.len() != other.len() {
            return Err(CkksError::DimensionMismatch {
                expected: self.len(),
                got: other.len(),
            });
        }
        if self.modulus != other.modulus {
            return Err(CkksError::ModulusMismatch);
        }
        Ok(())
    }

    /// Schoolbook multiply in Z_q[X]/(X^n+1).
    /// Reference for the NTT path; O(n^2).
    pub fn mul_naive(&self, other: &Self) -> Result<Self> {
        self.check_compatible(other)?;
        let n = self.len();
        let bk = barrett_constant(self.modulus);
        let mut result = vec![0u64; n];

        for i in 0..n {
            if self.coeffs[i] == 0 {
                continue;
            }
            for j in 0..n {
                if other.coeffs[j] == 0 {
                    continue;
                }
                let prod = mod_mul(self.coeffs[i], other.coeffs[j], self.modulus, bk);
                let idx = i + j;
                if idx < n {
                    result[idx] = mod_add(result[idx], prod, self.modulus);
                } else {
                    // X^n ≡ -1 in X^n+1, so wrap with negation
                    let idx = idx - n;
                    result[idx] = mod_sub(result[idx], prod, self.modulus);
                }
            }
        }

        Ok(Self { coeffs: result, modulus: self.modulus })
    }

    /// Apply the automorphism X → X^k.
    ///
    /// The map sends X^i to X^{ik} reduced modulo X^n+1. Since X^n = -1,
    /// this is a signed permutation of the coefficients; k must be odd.
    pub fn automorphism(&self, k: usize) -> Result<Self> {
        let n = self.len();
        if k % 2 == 0 {
            return Err(CkksError::InvalidParameter(
                format!("automorphism exponent must be odd, got {k}")
            ));
        }
        let q = self.modulus;
        let mut result = vec![0u64; n];

        for (i, &c) in self.coeffs.iter().enumerate() {
            let new_exp = (i * k) % (2 * n);
            if new_exp < n {
                result[new_exp] = mod_add(result[new_exp], c, q);
            } else {
                // X^{n+j} = -X^j in X^n+1
                let j = new_exp - n;
                result[j] = mod_sub(result[j], c, q);
            }
        }

        Ok(Self { coeffs: result, modulus: q })
    }

}

impl PartialEq for CoeffPoly {
    fn eq(&self, other: &Self) -> bool {
        self.modulus == other.modulus && self.coeffs == other.coeffs
    }
}
