/// Maximum log2(QP) for 128-bit classical security with a ternary secret and
/// σ ≈ 3.2, from the homomorphic encryption security standard.
const MAX_LOG_QP_128: &[(usize, u32)] = &[
    (1024, 27),
    (2048, 54),
    (4096, 109),
    (8192, 218),
    (16384, 438),
    (32768, 881),
];

/// Largest total modulus size (bits) that still gives 128-bit security at this
/// ring degree. `None` for degrees outside the standard's table.
pub fn max_log_qp_128(ring_degree: usize) -> Option<u32> {
    MAX_LOG_QP_128.iter()
        .find(|&&(n, _)| n == ring_degree)
        .map(|&(_, bits)| bits)
}

/// Whether `log_qp` bits of modulus at `ring_degree` reach 128-bit security.
///
/// Degrees above the table are treated as secure for any modulus it lists for
/// N = 32768; degrees below it are never considered secure.
pub fn meets_128_bit(ring_degree: usize, log_qp: f64) -> bool {
    match max_log_qp_128(ring_degree) {
        Some(max) => log_qp <= max as f64,
        None if ring_degree > 32768 => log_qp <= 881.0,
        None => false,
    }
}
