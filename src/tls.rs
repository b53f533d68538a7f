// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 证书准备与 TLS 接入
//!
//! 启用 TLS 时，监听端口之前必须拿到一对可读的证书与私钥，否则启动失败。
//! 配置了 `auto_generate` 且两个文件都不存在时，调用系统中的 `openssl`
//! 生成一份自签名证书。

use std::{
    fs::File,
    io::BufReader,
    path::Path,
    process::Command,
    sync::Arc,
};

use log::{info, warn};
use rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

use crate::{
    config::CertificateConfig,
    exception::{Exception, Result},
};

/// 校验（必要时生成）证书文件并构造 TLS 接入器。
pub fn acceptor(config: &CertificateConfig) -> Result<TlsAcceptor> {
    provision(config)?;
    let certs = load_certs(&config.cert_file)?;
    let key = load_key(&config.key_file)?;
    let server_config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| Exception::Certificate(e.to_string()))?;
    info!("TLS已启用，证书：{}", config.cert_file.display());
    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

/// 确保证书与私钥都存在。
pub fn provision(config: &CertificateConfig) -> Result<()> {
    let cert_exists = config.cert_file.is_file();
    let key_exists = config.key_file.is_file();
    if config.auto_generate && !cert_exists && !key_exists {
        warn!("证书文件不存在，尝试调用openssl生成自签名证书");
        generate(&config.cert_file, &config.key_file)?;
    }
    if !config.cert_file.is_file() || !config.key_file.is_file() {
        return Err(Exception::Certificate(format!(
            "the certificate files are missing: {}, {}",
            config.cert_file.display(),
            config.key_file.display()
        )));
    }
    Ok(())
}

fn generate(cert: &Path, key: &Path) -> Result<()> {
    for dir in [cert.parent(), key.parent()].into_iter().flatten() {
        std::fs::create_dir_all(dir)?;
    }
    run(Command::new("openssl").arg("genrsa").arg("-out").arg(key).arg("2048"))?;
    run(Command::new("openssl")
        .args(["req", "-new", "-x509", "-key"])
        .arg(key)
        .arg("-out")
        .arg(cert)
        .args(["-days", "3650", "-subj", "/CN=localhost"]))?;
    info!("自签名证书已生成：{}", cert.display());
    Ok(())
}

fn run(command: &mut Command) -> Result<()> {
    let output = command
        .output()
        .map_err(|e| Exception::Certificate(format!("couldn't invoke openssl: {}", e)))?;
    if output.status.success() {
        Ok(())
    } else {
        Err(Exception::Certificate(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ))
    }
}

fn load_certs(path: &Path) -> Result<Vec<rustls::pki_types::CertificateDer<'static>>> {
    let mut reader = BufReader::new(File::open(path)?);
    let certs = rustls_pemfile::certs(&mut reader).collect::<std::io::Result<Vec<_>>>()?;
    if certs.is_empty() {
        return Err(Exception::Certificate(format!(
            "no certificate found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<rustls::pki_types::PrivateKeyDer<'static>> {
    let mut reader = BufReader::new(File::open(path)?);
    rustls_pemfile::private_key(&mut reader)?
        .ok_or_else(|| Exception::Certificate(format!("no private key found in {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn certificate(dir: &TempDir, auto_generate: bool) -> CertificateConfig {
        CertificateConfig {
            enabled: true,
            auto_generate,
            cert_file: dir.path().join("server.crt"),
            key_file: dir.path().join("server.key"),
        }
    }

    #[test]
    fn test_missing_files_fail() {
        let dir = TempDir::new().unwrap();
        let result = provision(&certificate(&dir, false));
        assert!(matches!(result, Err(Exception::Certificate(_))));
    }

    /// 只缺一个文件时不会自动生成，以免覆盖现有证书
    #[test]
    fn test_partial_pair_is_not_regenerated() {
        let dir = TempDir::new().unwrap();
        let config = certificate(&dir, true);
        fs::write(&config.cert_file, "cert").unwrap();
        assert!(matches!(provision(&config), Err(Exception::Certificate(_))));
        assert_eq!(fs::read_to_string(&config.cert_file).unwrap(), "cert");
    }

    #[test]
    fn test_unparseable_pem_fails() {
        let dir = TempDir::new().unwrap();
        let config = certificate(&dir, false);
        fs::write(&config.cert_file, "not a pem").unwrap();
        fs::write(&config.key_file, "not a pem").unwrap();
        assert!(matches!(acceptor(&config), Err(Exception::Certificate(_))));
    }
}
