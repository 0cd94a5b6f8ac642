use rand::Rng;

/// Sample `n` coefficients uniformly from [0, modulus).
pub fn sample_uniform_coeffs<R: Rng>(n: usize, modulus: u64, rng: &mut R) -> Vec<u64> {
    // Rejection sampling to avoid bias
    let mask = if modulus.is_power_of_two() {
        modulus - 1
    } else {
        (1u64 << (64 - modulus.leading_zeros())) - 1
    };

    (0..n)
        .map(|_| {
            loop {
                let val = rng.random::<u64>() & mask;
                if val < modulus {
                    break val;
                }
            }
        })
        .collect()
}

/// Sample a uniform element of Z_Q[X]/(X^n+1) directly in RNS form: one
/// independent uniform limb per modulus (CRT makes this uniform mod Q).
pub fn sample_uniform_limbs<R: Rng>(n: usize, moduli: &[u64], rng: &mut R) -> Vec<Vec<u64>> {
    moduli.iter().map(|&q| sample_uniform_coeffs(n, q, rng)).collect()
}

/// Ternary coefficients: each is non-zero with probability `density`, and a
/// non-zero coefficient is ±1 with equal probability.
///
/// `density = 2/3` is the uniform distribution over {-1, 0, 1}.
pub fn sample_ternary_coeffs<R: Rng>(n: usize, density: f64, rng: &mut R) -> Vec<i64> {
    (0..n)
        .map(|_| {
            if rng.random::<f64>() < density {
                if rng.random::<bool>() { 1 } else { -1 }
            } else {
                0
            }
        })
        .collect()
}

/// Ternary coefficients with exactly `hamming_weight` non-zero entries at
/// uniformly chosen positions.
pub fn sample_sparse_ternary_coeffs<R: Rng>(n: usize, hamming_weight: usize, rng: &mut R) -> Vec<i64> {
    let mut coeffs = vec![0i64; n];
    for idx in rand::seq::index::sample(rng, n, hamming_weight.min(n)) {
        coeffs[idx] = if rng.random::<bool>() { 1 } else { -1 };
    }
    coeffs
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_uniform() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let coeffs = sample_uniform_coeffs(1024, 65537, &mut rng);
        assert_eq!(coeffs.len(), 1024);
        assert!(coeffs.iter().all(|&c| c < 65537));
        // top half of the range is hit
        assert!(coeffs.iter().any(|&c| c > 65537 / 2));
    }

    #[test]
    fn test_uniform_limbs() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let moduli = [12289u64, 65537, 786433];
        let limbs = sample_uniform_limbs(256, &moduli, &mut rng);
        assert_eq!(limbs.len(), 3);
        for (limb, &q) in limbs.iter().zip(moduli.iter()) {
            assert!(limb.iter().all(|&c| c < q));
        }
    }

    #[test]
    fn test_ternary() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let coeffs = sample_ternary_coeffs(1024, 2.0 / 3.0, &mut rng);
        assert!(coeffs.iter().all(|&c| (-1..=1).contains(&c)));
        // Check roughly 1/3 each
        let zeros = coeffs.iter().filter(|&&c| c == 0).count();
        let ones = coeffs.iter().filter(|&&c| c == 1).count();
        let neg_ones = coeffs.iter().filter(|&&c| c == -1).count();
        assert!(zeros > 200 && zeros < 500, "zeros = {zeros}");
        assert!(ones > 200 && ones < 500, "ones = {ones}");
        assert!(neg_ones > 200 && neg_ones < 500, "neg_ones = {neg_ones}");
    }

    #[test]
    fn test_sparse_ternary_weight() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let coeffs = sample_sparse_ternary_coeffs(1024, 64, &mut rng);
        assert_eq!(coeffs.iter().filter(|&&c| c != 0).count(), 64);
        assert!(coeffs.iter().all(|&c| (-1..=1).contains(&c)));
    }
}
