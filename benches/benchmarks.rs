//! # Cast 性能基准测试
//!
//! 使用 Criterion 测量 CSR 校验与证书指纹的开销

use cast_ca::crypto;
use cast_ca::{DigestAlgorithm, SubjectOptions};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

// CSR 校验性能测试
fn bench_verify_csr(c: &mut Criterion) {
    let key_pair = crypto::generate_key_pair(256).expect("密钥生成失败");
    let csr_text = crypto::generate_csr(&key_pair, &SubjectOptions::new("bench.example.com"))
        .expect("CSR 生成失败");

    c.bench_function("verify_csr", |b| {
        b.iter(|| crypto::verify_csr(black_box(&csr_text)));
    });
}

// 证书指纹性能测试
fn bench_fingerprint(c: &mut Criterion) {
    let key_pair = crypto::generate_key_pair(256).expect("密钥生成失败");
    let certificate_pem = crypto::generate_self_signed(&key_pair, &SubjectOptions::new("bench.example.com"), 30)
        .expect("证书生成失败");

    c.bench_function("fingerprint_sha1", |b| {
        b.iter(|| crypto::fingerprint_pem(black_box(&certificate_pem), DigestAlgorithm::Sha1));
    });
    c.bench_function("fingerprint_sha256", |b| {
        b.iter(|| crypto::fingerprint_pem(black_box(&certificate_pem), DigestAlgorithm::Sha256));
    });
}

criterion_group!(benches, bench_verify_csr, bench_fingerprint);
criterion_main!(benches);
