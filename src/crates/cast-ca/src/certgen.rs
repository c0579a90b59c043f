//! # 面向文件的证书生成工具
//!
//! 以文件路径为输入输出组合 [`crate::crypto`] 的原语，供初始化脚本和
//! 节点端生成密钥、CSR 使用。

use std::path::Path;
use tracing::info;

use crate::crypto;
use crate::error::{CaError, CaResult};
use crate::serial::SerialAllocator;
use crate::storage;
use crate::types::SubjectOptions;

async fn read_required(path: &Path) -> CaResult<String> {
    storage::read_optional(path)
        .await?
        .ok_or_else(|| CaError::NotFound(path.display().to_string()))
}

/// 生成私钥并写入文件（权限 0600）
pub async fn gen_key_file(key_path: &Path, bits: u32) -> CaResult<()> {
    let key_pair = crypto::run_blocking(move || crypto::generate_key_pair(bits)).await?;
    storage::write_file_atomic(key_path, key_pair.serialize_pem().as_bytes(), true).await?;
    info!("已生成私钥: {}", key_path.display());
    Ok(())
}

/// 用已有私钥生成 CSR 并写入文件
pub async fn gen_csr_file(key_path: &Path, csr_path: &Path, subject: &SubjectOptions) -> CaResult<String> {
    let key_pem = read_required(key_path).await?;
    let subject = subject.clone();

    let csr_text = crypto::run_blocking(move || {
        let key_pair = crypto::load_key_pair(&key_pem)?;
        crypto::generate_csr(&key_pair, &subject)
    })
    .await?;

    storage::write_file_atomic(csr_path, csr_text.as_bytes(), false).await?;
    info!("已生成 CSR: {}", csr_path.display());
    Ok(csr_text)
}

/// 生成私钥与自签名证书并分别写入文件
pub async fn gen_self_signed_files(
    key_path: &Path,
    certificate_path: &Path,
    subject: &SubjectOptions,
    bits: u32,
    validity_days: u32,
) -> CaResult<String> {
    let subject = subject.clone();
    let (key_pem, certificate_pem) = crypto::run_blocking(move || {
        let key_pair = crypto::generate_key_pair(bits)?;
        let certificate_pem = crypto::generate_self_signed(&key_pair, &subject, validity_days)?;
        Ok((key_pair.serialize_pem(), certificate_pem))
    })
    .await?;

    storage::write_file_atomic(key_path, key_pem.as_bytes(), true).await?;
    storage::write_file_atomic(certificate_path, certificate_pem.as_bytes(), false).await?;
    info!("已生成自签名证书: {}", certificate_path.display());
    Ok(certificate_pem)
}

/// 用 CA 文件签发 CSR 文件
///
/// 从序列号文件分配序列号，签发结果写入 `output_path`，返回使用的序列号。
/// 进程内对同一序列号文件的分配与 [`SerialAllocator`] 共用一把锁。
pub async fn sign_csr_file(
    csr_path: &Path,
    ca_certificate_path: &Path,
    ca_key_path: &Path,
    serial_path: &Path,
    output_path: &Path,
    validity_days: u32,
) -> CaResult<u64> {
    let csr_text = read_required(csr_path).await?;
    let ca_certificate_pem = read_required(ca_certificate_path).await?;
    let ca_key_pem = read_required(ca_key_path).await?;

    let verified = csr_text.clone();
    crypto::run_blocking(move || crypto::verify_csr(&verified)).await?;

    let serial = SerialAllocator::open(serial_path).await?.next_serial().await?;

    let certificate_pem = crypto::run_blocking(move || {
        let ca_key = crypto::load_key_pair(&ca_key_pem)?;
        crypto::sign_csr(&csr_text, &ca_certificate_pem, &ca_key, serial, validity_days)
    })
    .await?;

    storage::write_file_atomic(output_path, certificate_pem.as_bytes(), false).await?;
    info!("已签发 {} -> {}", csr_path.display(), output_path.display());
    Ok(serial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DigestAlgorithm;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_gen_key_file() {
        let temp_dir = TempDir::new().unwrap();
        let key_path = temp_dir.path().join("t.key");

        gen_key_file(&key_path, 256).await.unwrap();
        let contents = std::fs::read_to_string(&key_path).unwrap();
        assert!(contents.contains("BEGIN PRIVATE KEY"));
        crypto::load_key_pair(&contents).expect("写出的私钥应可重新加载");
    }

    #[tokio::test]
    async fn test_self_signed_files() {
        let temp_dir = TempDir::new().unwrap();
        let key_path = temp_dir.path().join("t.key");
        let certificate_path = temp_dir.path().join("t.crt");

        gen_self_signed_files(&key_path, &certificate_path, &SubjectOptions::new("testhost.example.com"), 256, 30)
            .await
            .unwrap();

        let summary = crypto::describe_certificate(&std::fs::read_to_string(&certificate_path).unwrap()).unwrap();
        assert_eq!(summary.common_name.as_deref(), Some("testhost.example.com"));
        assert_eq!(summary.issuer_common_name.as_deref(), Some("testhost.example.com"));

        let fingerprint = crypto::fingerprint(&certificate_path, DigestAlgorithm::Sha1).await.unwrap();
        assert_eq!(fingerprint.len(), 59);
    }

    #[tokio::test]
    async fn test_ca_signing_flow() {
        let temp_dir = TempDir::new().unwrap();
        let path = |name: &str| temp_dir.path().join(name);

        gen_self_signed_files(&path("ca.key"), &path("ca.crt"), &SubjectOptions::new("ca.example.com"), 256, 3650)
            .await
            .unwrap();
        crate::serial::init_serial_file(&path("ca.srl")).await.unwrap();

        gen_key_file(&path("client.key"), 256).await.unwrap();
        let subject = SubjectOptions::new("client.example.com").with_email("foouser@example.com");
        let csr_text = gen_csr_file(&path("client.key"), &path("client.csr"), &subject).await.unwrap();
        crypto::verify_csr(&csr_text).unwrap();

        let serial = sign_csr_file(
            &path("client.csr"),
            &path("ca.crt"),
            &path("ca.key"),
            &path("ca.srl"),
            &path("client.crt"),
            365,
        )
        .await
        .unwrap();
        assert_eq!(serial, 1);

        let certificate = std::fs::read_to_string(path("client.crt")).unwrap();
        let ca_certificate = std::fs::read_to_string(path("ca.crt")).unwrap();
        crypto::verify_certificate(&certificate, &ca_certificate).unwrap();

        let summary = crypto::describe_certificate(&certificate).unwrap();
        assert_eq!(summary.common_name.as_deref(), Some("client.example.com"));
        assert_eq!(summary.email.as_deref(), Some("foouser@example.com"));
        assert_eq!(summary.issuer_common_name.as_deref(), Some("ca.example.com"));
        assert_eq!(summary.serial, "01");
        assert_eq!(std::fs::read_to_string(path("ca.srl")).unwrap(), "02\n");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_file_signing_has_unique_serials() {
        use std::collections::HashSet;
        use std::sync::Arc;

        let temp_dir = Arc::new(TempDir::new().unwrap());
        let path = |name: &str| temp_dir.path().join(name);

        gen_self_signed_files(&path("ca.key"), &path("ca.crt"), &SubjectOptions::new("ca.example.com"), 256, 3650)
            .await
            .unwrap();
        gen_key_file(&path("client.key"), 256).await.unwrap();
        gen_csr_file(&path("client.key"), &path("client.csr"), &SubjectOptions::new("client.example.com"))
            .await
            .unwrap();

        // 与文件签发并行使用的常驻分配器
        let live = SerialAllocator::open(path("ca.srl")).await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..16 {
            let temp_dir = Arc::clone(&temp_dir);
            tasks.push(tokio::spawn(async move {
                let path = |name: &str| temp_dir.path().join(name);
                sign_csr_file(
                    &path("client.csr"),
                    &path("ca.crt"),
                    &path("ca.key"),
                    &path("ca.srl"),
                    &path(&format!("client-{}.crt", i)),
                    30,
                )
                .await
            }));
        }
        let mut live_serials = Vec::new();
        for _ in 0..16 {
            live_serials.push(live.next_serial().await.unwrap());
        }

        let mut seen: HashSet<u64> = live_serials.into_iter().collect();
        for task in tasks {
            let serial = task.await.unwrap().expect("并发签发不应失败");
            assert!(seen.insert(serial), "序列号重复: {}", serial);
        }
        assert_eq!(seen, (1..=32).collect::<HashSet<u64>>());
        assert_eq!(std::fs::read_to_string(path("ca.srl")).unwrap(), "21\n");
    }

    #[tokio::test]
    async fn test_missing_key_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = gen_csr_file(
            &temp_dir.path().join("absent.key"),
            &temp_dir.path().join("out.csr"),
            &SubjectOptions::new("x.example.com"),
        )
        .await;
        assert!(matches!(result, Err(CaError::NotFound(_))));
    }
}
