use crate::error::{CkksError, Result};
use crate::ring::modular::is_prime;

/// Largest usable modulus width: products of two residues must fit in u128
/// and concrete-ntt's prime64 plans need a couple of spare bits.
pub const MAX_MODULUS_BITS: u32 = 61;

/// Generate `count` NTT-friendly primes of exactly `bits` bits for ring degree `n`.
///
/// Candidates are q ≡ 1 (mod 2n), scanned downward from 2^bits in steps of 2n;
/// primes already in `exclude` are skipped so repeated bit sizes in a chain
/// yield distinct moduli.
pub fn generate_ntt_primes(bits: u32, n: usize, count: usize, exclude: &[u64]) -> Result<Vec<u64>> {
    let two_n = 2 * n as u64;
    if !(2..=MAX_MODULUS_BITS).contains(&bits) {
        return Err(CkksError::InvalidParameter(
            format!("modulus bit size must be in [2, {MAX_MODULUS_BITS}], got {bits}")
        ));
    }
    if (1u64 << bits) <= two_n {
        return Err(CkksError::InvalidParameter(
            format!("{bits}-bit moduli cannot be ≡ 1 mod {two_n}")
        ));
    }

    let lower = 1u64 << (bits - 1);
    let mut primes = Vec::with_capacity(count);
    let mut candidate = (1u64 << bits) - two_n + 1;

    while primes.len() < count {
        if candidate <= lower {
            return Err(CkksError::InvalidParameter(
                format!("not enough {bits}-bit primes ≡ 1 mod {two_n}")
            ));
        }
        if is_prime(candidate) && !exclude.contains(&candidate) && !primes.contains(&candidate) {
            primes.push(candidate);
        }
        candidate -= two_n;
    }
    Ok(primes)
}

/// Generate one prime per entry of `log_sizes`, all distinct from each other and from `exclude`.
pub fn generate_chain(log_sizes: &[u32], n: usize, exclude: &[u64]) -> Result<Vec<u64>> {
    let mut used = exclude.to_vec();
    let mut chain = Vec::with_capacity(log_sizes.len());
    for &bits in log_sizes {
        let q = generate_ntt_primes(bits, n, 1, &used)?[0];
        used.push(q);
        chain.push(q);
    }
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primes_are_ntt_friendly() {
        let n = 4096;
        let primes = generate_ntt_primes(45, n, 3, &[]).unwrap();
        assert_eq!(primes.len(), 3);
        for &q in &primes {
            assert!(is_prime(q));
            assert_eq!(q % (2 * n as u64), 1);
            assert_eq!(64 - q.leading_zeros(), 45);
        }
        assert!(primes[0] > primes[1] && primes[1] > primes[2]);
    }

    #[test]
    fn test_chain_is_distinct_and_deterministic() {
        let chain = generate_chain(&[55, 45, 45], 4096, &[]).unwrap();
        assert_ne!(chain[1], chain[2]);
        assert_eq!(chain, generate_chain(&[55, 45, 45], 4096, &[]).unwrap());

        let p = generate_chain(&[45], 4096, &chain).unwrap();
        assert!(!chain.contains(&p[0]));
    }

    #[test]
    fn test_rejects_bad_sizes() {
        assert!(generate_ntt_primes(62, 1024, 1, &[]).is_err());
        assert!(generate_ntt_primes(11, 1024, 1, &[]).is_err());
        // only a handful of 14-bit primes ≡ 1 mod 2048 exist
        assert!(generate_ntt_primes(14, 1024, 50, &[]).is_err());
    }
}
