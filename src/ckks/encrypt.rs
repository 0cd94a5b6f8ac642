use std::sync::Arc;

use zeroize::Zeroizing;

use crate::ckks::keygen::{PublicKey, SecretKey};
use crate::ckks::{Ciphertext, Plaintext};
use crate::error::{CkksError, Result};
use crate::params::CkksParams;
use crate::ring::rns::{Domain, RnsPoly};
use crate::sampling::{os_rng, sample_gaussian_coeffs, sample_ternary_coeffs, sample_uniform_limbs};

/// Density of the ephemeral ternary polynomial u in public-key encryption.
const EPHEMERAL_DENSITY: f64 = 0.5;

fn small_ntt(coeffs: &[i64], moduli: &[u64], params: &CkksParams) -> Result<RnsPoly> {
    RnsPoly::from_signed(coeffs, moduli).into_ntt(&params.ring)
}

fn check_params(a: &CkksParams, b: &CkksParams) -> Result<()> {
    if !a.is_compatible(b) {
        return Err(CkksError::ParamsMismatch);
    }
    Ok(())
}

/// Encrypt a plaintext using the public key.
///
/// ct = (b·u + e0 + m, a·u + e1) at the plaintext's level and scale,
/// where u is ternary and e0, e1 are Gaussian errors.
pub fn encrypt_pk(pt: &Plaintext, pk: &PublicKey) -> Result<Ciphertext> {
    let mut rng = os_rng()?;
    encrypt_pk_with_rng(pt, pk, &mut rng)
}

/// Encrypt with provided RNG (for deterministic testing).
pub fn encrypt_pk_with_rng<R: rand::Rng>(
    pt: &Plaintext,
    pk: &PublicKey,
    rng: &mut R,
) -> Result<Ciphertext> {
    let params = &pt.params;
    check_params(params, &pk.params)?;
    pt.validate()?;
    let n = params.ring_degree;
    let moduli = params.q_moduli_at(pt.level);

    // u alone decrypts the result; wiped on return
    let u_coeffs = Zeroizing::new(sample_ternary_coeffs(n, EPHEMERAL_DENSITY, rng));
    let u = Zeroizing::new(small_ntt(&u_coeffs, moduli, params)?);
    let e0 = small_ntt(&sample_gaussian_coeffs(n, params.sigma, rng), moduli, params)?;
    let e1 = small_ntt(&sample_gaussian_coeffs(n, params.sigma, rng), moduli, params)?;

    let b = pk.b.truncate(pt.level + 1)?;
    let a = pk.a.truncate(pt.level + 1)?;

    // c0 = b·u + e0 + m
    let c0 = b.mul(&u)?.add(&e0)?.add(&pt.poly)?;
    // c1 = a·u + e1
    let c1 = a.mul(&u)?.add(&e1)?;

    Ok(Ciphertext {
        c: vec![c0, c1],
        level: pt.level,
        scale: pt.scale,
        params: params.clone(),
    })
}

/// Encrypt using the secret key (symmetric encryption).
///
/// ct = (-a·s + e + m, a); fresh noise is a single Gaussian term.
pub fn encrypt_sk(pt: &Plaintext, sk: &SecretKey) -> Result<Ciphertext> {
    let mut rng = os_rng()?;
    encrypt_sk_with_rng(pt, sk, &mut rng)
}

/// Encrypt with secret key and provided RNG.
pub fn encrypt_sk_with_rng<R: rand::Rng>(
    pt: &Plaintext,
    sk: &SecretKey,
    rng: &mut R,
) -> Result<Ciphertext> {
    let params = &pt.params;
    check_params(params, &sk.params)?;
    pt.validate()?;
    let moduli = params.q_moduli_at(pt.level);
    let s = Zeroizing::new(sk.poly.select(moduli)?);

    let a = RnsPoly {
        limbs: sample_uniform_limbs(params.ring_degree, moduli, rng),
        moduli: moduli.to_vec(),
        domain: Domain::Ntt,
    };
    let e = small_ntt(&sample_gaussian_coeffs(params.ring_degree, params.sigma, rng), moduli, params)?;

    // c0 = -a·s + e + m
    let a_s = Zeroizing::new(a.mul(&s)?);
    let c0 = a_s.neg().add(&e)?.add(&pt.poly)?;

    Ok(Ciphertext {
        c: vec![c0, a],
        level: pt.level,
        scale: pt.scale,
        params: params.clone(),
    })
}

/// Decrypt a ciphertext of any size: m = c0 + c1·s + c2·s² + ...
///
/// The plaintext keeps the ciphertext's level and scale; noise is still present.
pub fn decrypt(ct: &Ciphertext, sk: &SecretKey) -> Result<Plaintext> {
    check_params(&ct.params, &sk.params)?;
    ct.validate()?;
    let s = Zeroizing::new(sk.poly.select(ct.params.q_moduli_at(ct.level))?);

    let mut phase = ct.c[0].clone();
    let mut s_power = s.clone();
    for i in 1..ct.c.len() {
        phase.add_assign(&ct.c[i].mul(&s_power)?)?;
        if i < ct.c.len() - 1 {
            // the previous power is wiped when replaced
            s_power = Zeroizing::new(s_power.mul(&s)?);
        }
    }

    Ok(Plaintext {
        poly: phase,
        level: ct.level,
        scale: ct.scale,
        params: ct.params.clone(),
    })
}

/// Key an [`Encryptor`] encrypts under.
#[derive(Clone, Debug)]
pub enum EncryptionKey {
    Public(Arc<PublicKey>),
    Secret(Arc<SecretKey>),
}

/// Encrypts plaintexts under a fixed key.
#[derive(Clone, Debug)]
pub struct Encryptor {
    key: EncryptionKey,
}

impl Encryptor {
    pub fn with_public_key(pk: Arc<PublicKey>) -> Self {
        Self { key: EncryptionKey::Public(pk) }
    }

    pub fn with_secret_key(sk: Arc<SecretKey>) -> Self {
        Self { key: EncryptionKey::Secret(sk) }
    }

    pub fn encrypt(&self, pt: &Plaintext) -> Result<Ciphertext> {
        let mut rng = os_rng()?;
        self.encrypt_with_rng(pt, &mut rng)
    }

    pub fn encrypt_with_rng<R: rand::Rng>(&self, pt: &Plaintext, rng: &mut R) -> Result<Ciphertext> {
        match &self.key {
            EncryptionKey::Public(pk) => encrypt_pk_with_rng(pt, pk, rng),
            EncryptionKey::Secret(sk) => encrypt_sk_with_rng(pt, sk, rng),
        }
    }
}

/// Decrypts ciphertexts with a shared secret key.
#[derive(Clone, Debug)]
pub struct Decryptor {
    sk: Arc<SecretKey>,
}

impl Decryptor {
    pub fn new(sk: Arc<SecretKey>) -> Self {
        Self { sk }
    }

    pub fn decrypt(&self, ct: &Ciphertext) -> Result<Plaintext> {
        decrypt(ct, &self.sk)
    }
}
