use rand::Rng;

/// Cumulative distribution table for the discrete Gaussian over Z, tail-cut at ±6σ.
///
/// Built once per polynomial so the per-coefficient cost is a single table scan.
struct Cdt {
    tail: i64,
    cdf: Vec<f64>,
}

impl Cdt {
    fn new(sigma: f64) -> Self {
        let tail = (6.0 * sigma).ceil() as i64;
        let two_sigma_sq = 2.0 * sigma * sigma;
        let mut cumulative = 0.0f64;
        let cdf = (-tail..=tail)
            .map(|x| {
                cumulative += (-((x * x) as f64) / two_sigma_sq).exp();
                cumulative
            })
            .collect();
        Self { tail, cdf }
    }

    /// Branchless scan: every entry is visited and the lowest index i with
    /// u < cdf[i] is selected through integer masks, so timing does not
    /// depend on the sampled value.
    fn sample<R: Rng>(&self, rng: &mut R) -> i64 {
        let total = self.cdf[self.cdf.len() - 1];
        let u: f64 = rng.random::<f64>() * total;

        let mut result = self.tail;
        for (i, &c) in self.cdf.iter().enumerate().rev() {
            let mask = ((u < c) as i64).wrapping_neg();
            let candidate = -self.tail + i as i64;
            result = (candidate & mask) | (result & !mask);
        }
        result
    }
}

/// Sample `n` coefficients from the centered discrete Gaussian with standard
/// deviation `sigma` (3.2 in every shipped parameter set).
///
/// Coefficients are returned signed; callers lift them into each RNS limb
/// with [`crate::ring::RnsPoly::from_signed`].
pub fn sample_gaussian_coeffs<R: Rng>(n: usize, sigma: f64, rng: &mut R) -> Vec<i64> {
    let cdt = Cdt::new(sigma);
    (0..n).map(|_| cdt.sample(rng)).collect()
}
