//! Hybrid (RNS-aided) key switching with the auxiliary modulus P.
//!
//! The input is split into digits of |P| consecutive Q limbs. Each digit is
//! raised to Q_ℓ·P (ModUp), multiplied by the matching key pair and
//! accumulated; the sum is then divided by P with rounding (ModDown).

use crate::error::{CkksError, Result};
use crate::params::CkksParams;
use crate::ring::rns::{Domain, RnsPoly};

/// Extend the residues of one digit to every modulus of `target`.
///
/// Limbs the digit already has are copied; the rest come from fast base
/// extension, so the result is d + α·Q_j for a small α. That overflow only
/// adds α·Q_j·e/P to the switched noise. Output is in coefficient domain.
pub fn mod_up(digit: &RnsPoly, target: &[u64]) -> Result<RnsPoly> {
    let others: Vec<u64> = target.iter()
        .copied()
        .filter(|q| !digit.moduli.contains(q))
        .collect();
    let extended = digit.fast_base_extend(&others)?;

    let limbs = target.iter()
        .map(|q| {
            let from_digit = digit.moduli.iter().position(|m| m == q).map(|i| &digit.limbs[i]);
            let from_ext = || extended.moduli.iter().position(|m| m == q).map(|i| &extended.limbs[i]);
            from_digit.or_else(from_ext).cloned().ok_or(CkksError::ModulusMismatch)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RnsPoly { limbs, moduli: target.to_vec(), domain: Domain::Coefficient })
}

/// Divide a polynomial over q_0..q_level, p_0..p_{k-1} by P with rounding,
/// leaving q_0..q_level. Domain is preserved.
pub fn mod_down(poly: &RnsPoly, params: &CkksParams) -> Result<RnsPoly> {
    let mut out = poly.clone();
    for &p in params.p_moduli.iter().rev() {
        if out.moduli.last() != Some(&p) {
            return Err(CkksError::ModulusMismatch);
        }
        out = out.div_round_by_last_limb(&params.ring)?;
    }
    Ok(out)
}

/// Key-switch `d` (NTT form over q_0..q_level) with a digit-wise key over Q∪P.
///
/// Returns (u0, u1) over q_0..q_level in NTT form such that
/// u0 + u1·s ≈ d·s' where the key encrypts P·s' under s.
pub fn switch_key(
    d: &RnsPoly,
    level: usize,
    keys: &[(RnsPoly, RnsPoly)],
    params: &CkksParams,
) -> Result<(RnsPoly, RnsPoly)> {
    let q_moduli = params.q_moduli_at(level);
    if d.moduli != q_moduli {
        return Err(CkksError::ModulusMismatch);
    }
    let num_digits = params.num_digits(level);
    if num_digits == 0 || keys.len() < num_digits {
        return Err(CkksError::MissingKey(format!(
            "key-switching key has {} digits, level {level} needs {num_digits}",
            keys.len()
        )));
    }

    let target = params.qp_moduli_at(level);
    let d_coeff = d.clone().into_coeff(&params.ring)?;

    let mut acc0 = RnsPoly::zero(params.ring_degree, &target, Domain::Ntt);
    let mut acc1 = RnsPoly::zero(params.ring_degree, &target, Domain::Ntt);

    for (j, (b, a)) in keys.iter().take(num_digits).enumerate() {
        let range = params.digit_range(j, level);
        let digit = d_coeff.select(&q_moduli[range])?;
        let raised = mod_up(&digit, &target)?.into_ntt(&params.ring)?;

        acc0.add_assign(&raised.mul(&b.select(&target)?)?)?;
        acc1.add_assign(&raised.mul(&a.select(&target)?)?)?;
    }

    Ok((mod_down(&acc0, params)?, mod_down(&acc1, params)?))
}
