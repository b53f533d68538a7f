// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde_derive::Deserialize;
use serde_derive::Serialize;

use crate::exception::{Exception, Result};

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub development: bool,
    /// 0 表示按 CPU 核数自动设置
    pub worker_threads: usize,
    pub max_request_size: usize,
    pub compression: bool,
    /// 跨域设置，供应用自己的 CORS 中间件读取
    pub allowed_origins: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub exposed_headers: Vec<String>,
    pub allow_credentials: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            development: false,
            worker_threads: 0,
            max_request_size: 1048576, // 1MB
            compression: true,
            allowed_origins: Vec::new(),
            allowed_headers: Vec::new(),
            allowed_methods: Vec::new(),
            exposed_headers: Vec::new(),
            allow_credentials: false,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct CertificateConfig {
    pub enabled: bool,
    /// 证书与私钥都不存在时调用 openssl 生成自签名证书
    pub auto_generate: bool,
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ViewsConfig {
    pub path: PathBuf,
    pub cache_size: usize,
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("views"),
            cache_size: 16,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct QueueConfig {
    pub workers: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { workers: 10 }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    /// SMTP PLAIN 认证的授权身份，通常留空
    pub identity: String,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub certificate: CertificateConfig,
    pub views: ViewsConfig,
    pub queue: QueueConfig,
    pub mail: MailConfig,
}

impl Config {
    pub fn new() -> Self {
        let mut config = Self::default();
        config.server.worker_threads = num_cpus::get();
        config
    }

    /// 读取 TOML 配置文件。相对的证书路径与视图根目录以配置文件所在目录为基准。
    pub fn from_toml(filename: impl AsRef<Path>) -> Result<Self> {
        let filename = filename.as_ref();
        let text = fs::read_to_string(filename).map_err(|e| {
            Exception::Config(format!("can't read {}: {}", filename.display(), e))
        })?;
        let mut config = Self::from_toml_str(&text)?;

        let base = filename.parent().unwrap_or_else(|| Path::new("."));
        config.views.path = absolutize(base, &config.views.path);
        if config.certificate.enabled {
            config.certificate.cert_file = absolutize(base, &config.certificate.cert_file);
            config.certificate.key_file = absolutize(base, &config.certificate.key_file);
        }
        info!("配置文件{}已载入", filename.display());
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(text).map_err(|e| Exception::Config(e.to_string()))?;
        if config.server.worker_threads == 0 {
            config.server.worker_threads = num_cpus::get();
        }
        if config.queue.workers == 0 {
            warn!("queue.workers被设置为0，但任务池至少需要一个工作者，因此该值将被改为1。");
            config.queue.workers = 1;
        }
        if config.certificate.enabled
            && (config.certificate.cert_file.as_os_str().is_empty()
                || config.certificate.key_file.as_os_str().is_empty())
        {
            return Err(Exception::Config(
                "certificate.enabled requires cert_file and key_file".to_string(),
            ));
        }
        Ok(config)
    }

    /// 监听地址，例如 `127.0.0.1:8080`
    pub fn address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_for_missing_sections() {
        let config = Config::from_toml_str("[server]\nport = 9000\n").unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(!config.server.development);
        assert!(config.server.worker_threads > 0);
        assert!(!config.certificate.enabled);
        assert_eq!(config.views.path, PathBuf::from("views"));
        assert_eq!(config.queue.workers, 10);
    }

    #[test]
    fn test_full_config() {
        let text = r#"
            [server]
            host = "0.0.0.0"
            port = 443
            development = true
            worker_threads = 4
            compression = false

            [certificate]
            enabled = true
            auto_generate = true
            cert_file = "certs/server.crt"
            key_file = "certs/server.key"

            [views]
            path = "templates"

            [queue]
            workers = 0

            [mail]
            host = "smtp.example.com"
            port = 587
            from = "noreply@example.com"
        "#;
        let config = Config::from_toml_str(text).unwrap();
        assert_eq!(config.address(), "0.0.0.0:443");
        assert!(config.server.development);
        assert_eq!(config.server.worker_threads, 4);
        assert!(!config.server.compression);
        assert!(config.certificate.auto_generate);
        assert_eq!(config.queue.workers, 1);
        assert_eq!(config.mail.from, "noreply@example.com");
    }

    #[test]
    fn test_cors_and_mail_identity() {
        let text = r#"
            [server]
            allowed_origins = ["https://example.com"]
            allowed_methods = ["GET", "POST"]
            exposed_headers = ["X-Request-Id"]
            allow_credentials = true

            [mail]
            identity = "relay"
        "#;
        let config = Config::from_toml_str(text).unwrap();
        assert_eq!(config.server.allowed_origins, vec!["https://example.com"]);
        assert_eq!(config.server.allowed_methods, vec!["GET", "POST"]);
        assert!(config.server.allowed_headers.is_empty());
        assert_eq!(config.server.exposed_headers, vec!["X-Request-Id"]);
        assert!(config.server.allow_credentials);
        assert_eq!(config.mail.identity, "relay");
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            Config::from_toml_str("[server\nport = "),
            Err(Exception::Config(_))
        ));
    }

    #[test]
    fn test_tls_requires_files() {
        let result = Config::from_toml_str("[certificate]\nenabled = true\n");
        assert!(matches!(result, Err(Exception::Config(_))));
    }

    #[test]
    fn test_relative_paths_resolved_against_config_dir() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("pulsar.toml");
        fs::write(
            &file,
            "[certificate]\nenabled = true\ncert_file = \"a.crt\"\nkey_file = \"/abs/a.key\"\n[views]\npath = \"views\"\n",
        )
        .unwrap();

        let config = Config::from_toml(&file).unwrap();
        assert_eq!(config.views.path, dir.path().join("views"));
        assert_eq!(config.certificate.cert_file, dir.path().join("a.crt"));
        assert_eq!(config.certificate.key_file, PathBuf::from("/abs/a.key"));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::from_toml("/definitely/not/here.toml"),
            Err(Exception::Config(_))
        ));
    }
}
