use criterion::{criterion_group, criterion_main, Criterion, black_box};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use ckks_engine::ckks::encrypt::{decrypt, encrypt_pk_with_rng, encrypt_sk_with_rng};
use ckks_engine::ckks::keygen::{gen_public_key_with_rng, gen_relin_key_with_rng, gen_secret_key_with_rng};
use ckks_engine::ckks::{Encoder, EvaluationKeySet, Evaluator};
use ckks_engine::params::presets::demo_n4096;
use ckks_engine::ring::rns::{Domain, RnsPoly};
use ckks_engine::sampling::sample_uniform_limbs;
use ckks_engine::serialize::{ciphertext_from_bytes, ciphertext_to_bytes};

fn ntt(c: &mut Criterion) {
    let params = demo_n4096().unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(0);
    let poly = RnsPoly {
        limbs: sample_uniform_limbs(params.ring_degree, &params.q_moduli, &mut rng),
        moduli: params.q_moduli.clone(),
        domain: Domain::Coefficient,
    };

    c.bench_function("rns_forward_ntt_n4096_l3", |b| {
        b.iter(|| black_box(&poly).clone().into_ntt(&params.ring))
    });
}

fn keygen(c: &mut Criterion) {
    let params = demo_n4096().unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(1);

    c.bench_function("ckks_keygen_secret", |b| {
        b.iter(|| gen_secret_key_with_rng(black_box(&params), &mut rng))
    });

    let sk = gen_secret_key_with_rng(&params, &mut rng).unwrap();
    c.bench_function("ckks_keygen_public", |b| {
        b.iter(|| gen_public_key_with_rng(black_box(&sk), &mut rng))
    });

    c.bench_function("ckks_keygen_relin", |b| {
        b.iter(|| gen_relin_key_with_rng(black_box(&sk), &mut rng))
    });
}

fn encode_encrypt(c: &mut Criterion) {
    let params = demo_n4096().unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(2);
    let sk = gen_secret_key_with_rng(&params, &mut rng).unwrap();
    let pk = gen_public_key_with_rng(&sk, &mut rng).unwrap();
    let encoder = Encoder::new(params.clone());
    let values: Vec<f64> = (0..encoder.slots()).map(|i| (i as f64).sin()).collect();

    c.bench_function("ckks_encode_full", |b| {
        b.iter(|| encoder.encode_real(black_box(&values), params.max_level(), params.default_scale))
    });

    let pt = encoder.encode_real(&values, params.max_level(), params.default_scale).unwrap();
    c.bench_function("ckks_decode_full", |b| {
        b.iter(|| encoder.decode_real(black_box(&pt)))
    });

    c.bench_function("ckks_encrypt_pk", |b| {
        b.iter(|| encrypt_pk_with_rng(black_box(&pt), &pk, &mut rng))
    });

    c.bench_function("ckks_encrypt_sk", |b| {
        b.iter(|| encrypt_sk_with_rng(black_box(&pt), &sk, &mut rng))
    });

    let ct = encrypt_pk_with_rng(&pt, &pk, &mut rng).unwrap();
    c.bench_function("ckks_decrypt", |b| {
        b.iter(|| decrypt(black_box(&ct), &sk))
    });
}

fn eval(c: &mut Criterion) {
    let params = demo_n4096().unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(3);
    let sk = gen_secret_key_with_rng(&params, &mut rng).unwrap();
    let rlk = gen_relin_key_with_rng(&sk, &mut rng).unwrap();
    let evaluator = Evaluator::new(params.clone(), EvaluationKeySet::with_relin(rlk)).unwrap();
    let encoder = Encoder::new(params.clone());

    let pt = encoder.encode_real(&[1.5, -2.25, 0.125], params.max_level(), params.default_scale).unwrap();
    let ct1 = encrypt_sk_with_rng(&pt, &sk, &mut rng).unwrap();
    let ct2 = encrypt_sk_with_rng(&pt, &sk, &mut rng).unwrap();

    c.bench_function("ckks_add", |b| {
        b.iter(|| evaluator.add(black_box(&ct1), black_box(&ct2)))
    });

    c.bench_function("ckks_multiply", |b| {
        b.iter(|| evaluator.multiply(black_box(&ct1), black_box(&ct2)))
    });

    let tensor = evaluator.multiply(&ct1, &ct2).unwrap();
    c.bench_function("ckks_relinearize", |b| {
        b.iter(|| evaluator.relinearize(black_box(&tensor)))
    });

    let relin = evaluator.relinearize(&tensor).unwrap();
    c.bench_function("ckks_rescale", |b| {
        b.iter(|| evaluator.rescale(black_box(&relin)))
    });

    let bytes = ciphertext_to_bytes(&ct1).unwrap();
    c.bench_function("ckks_ciphertext_to_bytes", |b| {
        b.iter(|| ciphertext_to_bytes(black_box(&ct1)))
    });
    c.bench_function("ckks_ciphertext_from_bytes", |b| {
        b.iter(|| ciphertext_from_bytes(black_box(&bytes), &params))
    });
}

criterion_group!(benches, ntt, keygen, encode_encrypt, eval);
criterion_main!(benches);
