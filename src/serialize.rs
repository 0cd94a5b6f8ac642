//! Binary encoding of ciphertexts and keys.
//!
//! Layout (all integers little-endian, varints unsigned LEB128):
//!
//! ```text
//! u8      tag        1 = ciphertext, 2 = public key, 3 = relinearization key, 4 = secret key
//! u8      version    1
//! varint  level
//! f64     scale      ciphertext only
//! varint  polynomial count
//! per polynomial:
//!   varint N
//!   varint limb count
//!   limb count × N × u64   coefficient domain, residues in [0, q)
//! ```
//!
//! Polynomials travel in coefficient form so the bytes do not depend on the
//! NTT ordering of a backend. Decoding is strict: anything that disagrees with
//! the receiving parameters is rejected.

use std::sync::Arc;

use crate::ckks::{Ciphertext, PublicKey, RelinearizationKey, SecretKey};
use crate::error::{CkksError, Result};
use crate::params::CkksParams;
use crate::ring::rns::{Domain, RnsBasis, RnsPoly};
use zeroize::Zeroizing;

pub const FORMAT_VERSION: u8 = 1;

/// Longest LEB128 encoding of a u64.
const MAX_VARINT_BYTES: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ObjectTag {
    Ciphertext = 1,
    PublicKey = 2,
    RelinearizationKey = 3,
    SecretKey = 4,
}

fn malformed(msg: impl Into<String>) -> CkksError {
    CkksError::Deserialization(msg.into())
}

struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    fn new(tag: ObjectTag, level: usize) -> Self {
        let mut w = Self { buf: Vec::new() };
        w.buf.push(tag as u8);
        w.buf.push(FORMAT_VERSION);
        w.varint(level as u64);
        w
    }

    fn varint(&mut self, mut v: u64) {
        while v >= 0x80 {
            self.buf.push((v as u8 & 0x7f) | 0x80);
            v >>= 7;
        }
        self.buf.push(v as u8);
    }

    fn f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn polys(&mut self, polys: &[&RnsPoly], basis: &RnsBasis) -> Result<()> {
        self.varint(polys.len() as u64);
        for poly in polys {
            // the copy may be secret key material
            let mut coeff = Zeroizing::new((*poly).clone());
            coeff.to_coeff(basis)?;
            self.varint(coeff.ring_degree() as u64);
            self.varint(coeff.num_limbs() as u64);
            self.buf.reserve(coeff.num_limbs() * coeff.ring_degree() * 8);
            for limb in &coeff.limbs {
                for &c in limb {
                    self.buf.extend_from_slice(&c.to_le_bytes());
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Check tag and version; returns the level field.
    fn open(bytes: &'a [u8], tag: ObjectTag) -> Result<(Self, usize)> {
        let mut r = Self { bytes, pos: 0 };
        let got = r.u8()?;
        if got != tag as u8 {
            return Err(malformed(format!("expected tag {}, got {got}", tag as u8)));
        }
        let version = r.u8()?;
        if version != FORMAT_VERSION {
            return Err(malformed(format!("unsupported format version {version}")));
        }
        let level = r.usize()?;
        Ok((r, level))
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| malformed("truncated input"))?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn varint(&mut self) -> Result<u64> {
        let mut v = 0u64;
        for i in 0..MAX_VARINT_BYTES {
            let byte = self.u8()?;
            let bits = (byte & 0x7f) as u64;
            if i == MAX_VARINT_BYTES - 1 && bits > 1 {
                return Err(malformed("varint overflows u64"));
            }
            v |= bits << (7 * i);
            if byte & 0x80 == 0 {
                if i > 0 && byte == 0 {
                    return Err(malformed("non-minimal varint"));
                }
                return Ok(v);
            }
        }
        Err(malformed("varint longer than 10 bytes"))
    }

    fn usize(&mut self) -> Result<usize> {
        usize::try_from(self.varint()?).map_err(|_| malformed("varint does not fit in usize"))
    }

    fn f64(&mut self) -> Result<f64> {
        let raw: [u8; 8] = self.take(8)?
            .try_into()
            .map_err(|_| malformed("truncated f64"))?;
        Ok(f64::from_le_bytes(raw))
    }

    fn expect_count(&mut self, what: &str, expected: usize) -> Result<()> {
        let got = self.usize()?;
        if got != expected {
            return Err(malformed(format!("{what}: expected {expected}, got {got}")));
        }
        Ok(())
    }

    /// Read one polynomial over `moduli`; returned in NTT form.
    fn poly(&mut self, moduli: &[u64], params: &CkksParams) -> Result<RnsPoly> {
        let n = params.ring_degree;
        self.expect_count("ring degree", n)?;
        self.expect_count("limb count", moduli.len())?;

        let raw = self.take(moduli.len() * n * 8)?;
        let limbs = raw.chunks_exact(n * 8)
            .zip(moduli.iter())
            .map(|(chunk, &q)| {
                chunk.chunks_exact(8)
                    .map(|b| {
                        let mut le = [0u8; 8];
                        le.copy_from_slice(b);
                        let c = u64::from_le_bytes(le);
                        if c >= q {
                            return Err(malformed(format!("residue {c} out of range for modulus {q}")));
                        }
                        Ok(c)
                    })
                    .collect::<Result<Vec<u64>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        RnsPoly { limbs, moduli: moduli.to_vec(), domain: Domain::Coefficient }.into_ntt(&params.ring)
    }

    fn finish(self) -> Result<()> {
        if self.pos != self.bytes.len() {
            return Err(malformed(format!("{} trailing bytes", self.bytes.len() - self.pos)));
        }
        Ok(())
    }
}

fn expect_top_level(level: usize, params: &CkksParams) -> Result<()> {
    if level != params.max_level() {
        return Err(malformed(format!("key level {level}, parameters have {}", params.max_level())));
    }
    Ok(())
}

pub fn ciphertext_to_bytes(ct: &Ciphertext) -> Result<Vec<u8>> {
    let mut w = ByteWriter::new(ObjectTag::Ciphertext, ct.level);
    w.f64(ct.scale);
    let polys: Vec<&RnsPoly> = ct.c.iter().collect();
    w.polys(&polys, &ct.params.ring)?;
    Ok(w.finish())
}

pub fn ciphertext_from_bytes(bytes: &[u8], params: &Arc<CkksParams>) -> Result<Ciphertext> {
    let (mut r, level) = ByteReader::open(bytes, ObjectTag::Ciphertext)?;
    if level > params.max_level() {
        return Err(malformed(format!("level {level} above max level {}", params.max_level())));
    }
    let scale = r.f64()?;
    if !scale.is_finite() || scale <= 0.0 {
        return Err(malformed(format!("invalid scale {scale}")));
    }
    let count = r.usize()?;
    if !(2..=3).contains(&count) {
        return Err(malformed(format!("ciphertext with {count} polynomials")));
    }

    let moduli = params.q_moduli_at(level);
    let c = (0..count)
        .map(|_| r.poly(moduli, params))
        .collect::<Result<Vec<_>>>()?;
    r.finish()?;

    Ok(Ciphertext { c, level, scale, params: params.clone() })
}

pub fn public_key_to_bytes(pk: &PublicKey) -> Result<Vec<u8>> {
    let mut w = ByteWriter::new(ObjectTag::PublicKey, pk.params.max_level());
    w.polys(&[&pk.b, &pk.a], &pk.params.ring)?;
    Ok(w.finish())
}

pub fn public_key_from_bytes(bytes: &[u8], params: &Arc<CkksParams>) -> Result<PublicKey> {
    let (mut r, level) = ByteReader::open(bytes, ObjectTag::PublicKey)?;
    expect_top_level(level, params)?;
    r.expect_count("polynomial count", 2)?;
    let b = r.poly(&params.q_moduli, params)?;
    let a = r.poly(&params.q_moduli, params)?;
    r.finish()?;
    Ok(PublicKey { b, a, params: params.clone() })
}

pub fn relin_key_to_bytes(rlk: &RelinearizationKey) -> Result<Vec<u8>> {
    let mut w = ByteWriter::new(ObjectTag::RelinearizationKey, rlk.params.max_level());
    let polys: Vec<&RnsPoly> = rlk.keys.iter().flat_map(|(b, a)| [b, a]).collect();
    w.polys(&polys, &rlk.params.ring)?;
    Ok(w.finish())
}

pub fn relin_key_from_bytes(bytes: &[u8], params: &Arc<CkksParams>) -> Result<RelinearizationKey> {
    let (mut r, level) = ByteReader::open(bytes, ObjectTag::RelinearizationKey)?;
    expect_top_level(level, params)?;
    let digits = params.num_digits(level);
    if digits == 0 {
        return Err(malformed("parameters have no auxiliary modulus"));
    }
    r.expect_count("polynomial count", 2 * digits)?;

    let qp = params.qp_moduli();
    let keys = (0..digits)
        .map(|_| -> Result<(RnsPoly, RnsPoly)> { Ok((r.poly(&qp, params)?, r.poly(&qp, params)?)) })
        .collect::<Result<Vec<_>>>()?;
    r.finish()?;
    Ok(RelinearizationKey { keys, params: params.clone() })
}

pub fn secret_key_to_bytes(sk: &SecretKey) -> Result<Vec<u8>> {
    let mut w = ByteWriter::new(ObjectTag::SecretKey, sk.params.max_level());
    w.polys(&[&sk.poly], &sk.params.ring)?;
    Ok(w.finish())
}

pub fn secret_key_from_bytes(bytes: &[u8], params: &Arc<CkksParams>) -> Result<SecretKey> {
    let (mut r, level) = ByteReader::open(bytes, ObjectTag::SecretKey)?;
    expect_top_level(level, params)?;
    r.expect_count("polynomial count", 1)?;
    // owned by the key before the trailing check so a reject still wipes it
    let sk = SecretKey { poly: r.poly(&params.qp_moduli(), params)?, params: params.clone() };
    r.finish()?;
    Ok(sk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ckks::encrypt::{decrypt, encrypt_pk_with_rng};
    use crate::ckks::keygen::{gen_public_key_with_rng, gen_relin_key_with_rng, gen_secret_key_with_rng};
    use crate::ckks::{Encoder, EvaluationKeySet, Evaluator};
    use crate::params::presets::compact;
    use crate::params::CkksParamsBuilder;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    struct Keys {
        params: Arc<CkksParams>,
        sk: SecretKey,
        pk: PublicKey,
        rlk: RelinearizationKey,
        rng: ChaCha20Rng,
    }

    fn keys(seed: u64) -> Keys {
        let params = compact().unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let sk = gen_secret_key_with_rng(&params, &mut rng).unwrap();
        let pk = gen_public_key_with_rng(&sk, &mut rng).unwrap();
        let rlk = gen_relin_key_with_rng(&sk, &mut rng).unwrap();
        Keys { params, sk, pk, rlk, rng }
    }

    fn ciphertext(k: &mut Keys, values: &[f64]) -> Ciphertext {
        let pt = Encoder::new(k.params.clone())
            .encode_real(values, k.params.max_level(), k.params.default_scale)
            .unwrap();
        encrypt_pk_with_rng(&pt, &k.pk, &mut k.rng).unwrap()
    }

    #[test]
    fn test_varint_encoding() {
        for v in [0u64, 1, 127, 128, 300, 1 << 35, u64::MAX] {
            let mut w = ByteWriter { buf: Vec::new() };
            w.varint(v);
            let mut r = ByteReader { bytes: &w.buf, pos: 0 };
            assert_eq!(r.varint().unwrap(), v);
            r.finish().unwrap();
        }

        let overlong = [0x80u8, 0x00];
        assert!(ByteReader { bytes: &overlong, pos: 0 }.varint().is_err());
        let too_long = [0xffu8; 11];
        assert!(ByteReader { bytes: &too_long, pos: 0 }.varint().is_err());
        let overflow = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x02];
        assert!(ByteReader { bytes: &overflow, pos: 0 }.varint().is_err());
    }

    #[test]
    fn test_ciphertext_roundtrip_is_bit_identical() {
        let mut k = keys(1);
        let ct = ciphertext(&mut k, &[1.0, -2.0]);
        let bytes = ciphertext_to_bytes(&ct).unwrap();
        assert_eq!(bytes[0], ObjectTag::Ciphertext as u8);
        assert_eq!(bytes[1], FORMAT_VERSION);

        let back = ciphertext_from_bytes(&bytes, &k.params).unwrap();
        assert_eq!(back, ct);
        assert_eq!(ciphertext_to_bytes(&back).unwrap(), bytes);

        // size-3 product form also travels
        let eval = Evaluator::new(k.params.clone(), EvaluationKeySet::default()).unwrap();
        let tensor = eval.multiply(&ct, &ct).unwrap();
        let back = ciphertext_from_bytes(&ciphertext_to_bytes(&tensor).unwrap(), &k.params).unwrap();
        assert_eq!(back, tensor);
    }

    #[test]
    fn test_keys_roundtrip_and_work() {
        let mut k = keys(2);
        let pk = public_key_from_bytes(&public_key_to_bytes(&k.pk).unwrap(), &k.params).unwrap();
        let sk = secret_key_from_bytes(&secret_key_to_bytes(&k.sk).unwrap(), &k.params).unwrap();
        let rlk = relin_key_from_bytes(&relin_key_to_bytes(&k.rlk).unwrap(), &k.params).unwrap();
        assert_eq!(pk.b, k.pk.b);
        assert_eq!(sk.poly, k.sk.poly);
        assert_eq!(rlk.keys, k.rlk.keys);

        let encoder = Encoder::new(k.params.clone());
        let pt = encoder.encode_real(&[4.5], 2, k.params.default_scale).unwrap();
        let ct = encrypt_pk_with_rng(&pt, &pk, &mut k.rng).unwrap();
        let out = encoder.decode_real(&decrypt(&ct, &sk).unwrap()).unwrap();
        assert!((out[0] - 4.5).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_malformed() {
        let mut k = keys(3);
        let ct = ciphertext(&mut k, &[1.0]);
        let bytes = ciphertext_to_bytes(&ct).unwrap();
        let rejects = |b: &[u8]| matches!(ciphertext_from_bytes(b, &k.params), Err(CkksError::Deserialization(_)));

        let mut wrong_tag = bytes.clone();
        wrong_tag[0] = ObjectTag::PublicKey as u8;
        assert!(rejects(&wrong_tag));

        let mut wrong_version = bytes.clone();
        wrong_version[1] = 2;
        assert!(rejects(&wrong_version));

        assert!(rejects(&bytes[..bytes.len() - 1]));
        assert!(rejects(&bytes[..2]));

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert!(rejects(&trailing));

        // scale follows tag, version and the one-byte level
        let mut nan_scale = bytes.clone();
        nan_scale[3..11].copy_from_slice(&f64::NAN.to_le_bytes());
        assert!(rejects(&nan_scale));
        let mut neg_scale = bytes.clone();
        neg_scale[3..11].copy_from_slice(&(-1.0f64).to_le_bytes());
        assert!(rejects(&neg_scale));

        // first residue: count (1) + N (2) + limbs (1) after the scale
        let mut out_of_range = bytes.clone();
        out_of_range[15..23].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(rejects(&out_of_range));

        let mut bad_level = bytes.clone();
        bad_level[2] = 9;
        assert!(rejects(&bad_level));

        // limb count must match the level
        let mut wrong_limbs = bytes.clone();
        wrong_limbs[14] = 2;
        assert!(rejects(&wrong_limbs));

        // N = 512 as a two-byte varint
        let mut wrong_degree = bytes.clone();
        wrong_degree[12..14].copy_from_slice(&[0x80, 0x04]);
        assert!(rejects(&wrong_degree));

        let mut one_poly = bytes.clone();
        one_poly[11] = 1;
        assert!(rejects(&one_poly));

        // a ciphertext is not a public key
        assert!(public_key_from_bytes(&bytes, &k.params).is_err());
    }

    fn is_malformed<T>(r: Result<T>) -> bool {
        matches!(r, Err(CkksError::Deserialization(_)))
    }

    // key layout: tag, version, level, count, N (2 bytes), limbs, residues
    #[test]
    fn test_keys_reject_malformed() {
        let k = keys(4);
        let p = &k.params;

        let pk = public_key_to_bytes(&k.pk).unwrap();
        assert_eq!(pk[3], 2);
        assert_eq!(pk[6], 3);
        let mut lower = pk.clone();
        lower[2] = 1;
        assert!(is_malformed(public_key_from_bytes(&lower, p)));
        let mut three = pk.clone();
        three[3] = 3;
        assert!(is_malformed(public_key_from_bytes(&three, p)));
        let mut degree = pk.clone();
        degree[4..6].copy_from_slice(&[0x80, 0x04]);
        assert!(is_malformed(public_key_from_bytes(&degree, p)));
        let mut limbs = pk.clone();
        limbs[6] = 2;
        assert!(is_malformed(public_key_from_bytes(&limbs, p)));
        assert!(is_malformed(public_key_from_bytes(&pk[..pk.len() - 8], p)));

        // secret key lives over Q and P
        let sk = secret_key_to_bytes(&k.sk).unwrap();
        assert_eq!(sk[3], 1);
        assert_eq!(sk[6], 4);
        let mut lower = sk.clone();
        lower[2] = 0;
        assert!(is_malformed(secret_key_from_bytes(&lower, p)));
        let mut two = sk.clone();
        two[3] = 2;
        assert!(is_malformed(secret_key_from_bytes(&two, p)));
        let mut q_only = sk.clone();
        q_only[6] = 3;
        assert!(is_malformed(secret_key_from_bytes(&q_only, p)));
        assert!(is_malformed(secret_key_from_bytes(&sk[..sk.len() - 1], p)));
        let mut trailing = sk.clone();
        trailing.push(0);
        assert!(is_malformed(secret_key_from_bytes(&trailing, p)));

        let rlk = relin_key_to_bytes(&k.rlk).unwrap();
        assert_eq!(rlk[3], 6);
        let mut lower = rlk.clone();
        lower[2] = 1;
        assert!(is_malformed(relin_key_from_bytes(&lower, p)));
        let mut four = rlk.clone();
        four[3] = 4;
        assert!(is_malformed(relin_key_from_bytes(&four, p)));
        assert!(is_malformed(relin_key_from_bytes(&rlk[..rlk.len() / 2], p)));
        let mut trailing = rlk.clone();
        trailing.push(0);
        assert!(is_malformed(relin_key_from_bytes(&trailing, p)));

        let no_aux = CkksParamsBuilder::new().ring_degree(1024).log_q(vec![50, 40, 40]).build().unwrap();
        assert!(is_malformed(relin_key_from_bytes(&rlk, &no_aux)));

        // tags are not interchangeable
        assert!(is_malformed(secret_key_from_bytes(&pk, p)));
        assert!(is_malformed(relin_key_from_bytes(&sk, p)));
    }
}
