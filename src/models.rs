//! Data models and structures
//!
//! Defines the in-flight values of an upload (request, transform outcome,
//! stored object) and the environment-driven configuration.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// One uploaded file as handed over by the HTTP layer.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub data: Vec<u8>,
    pub content_type: String,
    /// Only consulted for the extension when the transform falls back.
    pub filename: String,
}

impl UploadRequest {
    pub fn new(data: Vec<u8>, content_type: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            data,
            content_type: content_type.into(),
            filename: filename.into(),
        }
    }
}

/// Normalized output of the image transformer.
#[derive(Debug, Clone)]
pub struct TransformedImage {
    pub data: Vec<u8>,
    pub extension: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Bytes chosen for storage. Exactly one variant is produced per upload.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformResult {
    Transformed { data: Vec<u8>, extension: String },
    Fallback { data: Vec<u8>, extension: String },
}

impl TransformResult {
    pub fn data(&self) -> &[u8] {
        match self {
            TransformResult::Transformed { data, .. } | TransformResult::Fallback { data, .. } => {
                data
            }
        }
    }

    pub fn extension(&self) -> &str {
        match self {
            TransformResult::Transformed { extension, .. }
            | TransformResult::Fallback { extension, .. } => extension,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, TransformResult::Fallback { .. })
    }
}

/// A successfully ingested upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredObject {
    pub url: String,
    pub storage_key: String,
}

/// JSON body returned by the upload endpoint on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub url: String,
    pub filename: String,
}

/// JSON body returned by the upload endpoint on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadErrorResponse {
    pub success: bool,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    WebP,
    Jpeg,
}

impl TargetFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::WebP => "webp",
            TargetFormat::Jpeg => "jpg",
        }
    }
}

impl FromStr for TargetFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webp" => Ok(TargetFormat::WebP),
            "jpeg" | "jpg" => Ok(TargetFormat::Jpeg),
            other => Err(crate::Error::Config(format!(
                "Unknown MEDIA_TARGET_FORMAT '{}'. Expected webp or jpeg",
                other
            ))),
        }
    }
}

/// How uploaded images are normalized before storage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaPolicy {
    /// Upper bound on the longer side after resizing.
    pub max_dimension: u32,
    /// Compression quality, 0-100.
    pub quality: u8,
    pub target_format: TargetFormat,
}

impl Default for MediaPolicy {
    fn default() -> Self {
        Self {
            max_dimension: 1200,
            quality: 80,
            target_format: TargetFormat::WebP,
        }
    }
}

/// Connection settings for the FTP image host.
#[derive(Clone)]
pub struct FtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub upload_dir: String,
    pub connect_timeout: Duration,
    pub io_timeout: Duration,
}

// Hand-written so the password never lands in logs.
impl std::fmt::Debug for FtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("upload_dir", &self.upload_dir)
            .field("connect_timeout", &self.connect_timeout)
            .field("io_timeout", &self.io_timeout)
            .finish()
    }
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub ftp: FtpConfig,
    pub public_base_url: String,
    pub media: MediaPolicy,
    /// Deadline for one upload to be accepted by the remote store.
    pub upload_timeout: Duration,
    pub max_upload_bytes: usize,
    pub dry_run: bool,
}

impl Config {
    pub fn from_env() -> crate::Result<Self> {
        load_dotenv(dotenvy::dotenv())?;
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. `from_env` is this over
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| crate::Error::Config(format!("{} not set", key)))
        };

        let quality: u8 = parse_or(&lookup, "MEDIA_QUALITY", 80)?;
        if quality > 100 {
            return Err(crate::Error::Config(format!(
                "MEDIA_QUALITY must be between 0 and 100, got {}",
                quality
            )));
        }

        let max_dimension: u32 = parse_or(&lookup, "MEDIA_MAX_DIMENSION", 1200)?;
        if max_dimension == 0 {
            return Err(crate::Error::Config(
                "MEDIA_MAX_DIMENSION must be greater than 0".to_string(),
            ));
        }

        let target_format = match lookup("MEDIA_TARGET_FORMAT") {
            Some(value) => value.parse()?,
            None => TargetFormat::WebP,
        };

        let dry_run = lookup("DRY_RUN")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        // Credentials only matter when we actually talk to the FTP host.
        let credential = |key: &str| {
            if dry_run {
                Ok(lookup(key).unwrap_or_default())
            } else {
                required(key)
            }
        };

        Ok(Self {
            ftp: FtpConfig {
                host: credential("FTP_HOST")?,
                port: parse_or(&lookup, "FTP_PORT", 21)?,
                username: credential("FTP_USERNAME")?,
                password: credential("FTP_PASSWORD")?,
                upload_dir: lookup("FTP_UPLOAD_DIR").unwrap_or_else(|| "/".to_string()),
                connect_timeout: Duration::from_secs(parse_or(
                    &lookup,
                    "FTP_CONNECT_TIMEOUT_SECS",
                    10,
                )?),
                io_timeout: Duration::from_secs(parse_or(&lookup, "FTP_IO_TIMEOUT_SECS", 30)?),
            },
            public_base_url: required("PUBLIC_BASE_URL")?,
            media: MediaPolicy {
                max_dimension,
                quality,
                target_format,
            },
            upload_timeout: Duration::from_secs(parse_or(&lookup, "UPLOAD_TIMEOUT_SECS", 60)?),
            max_upload_bytes: parse_or(&lookup, "UPLOAD_MAX_BYTES", 20 * 1024 * 1024)?,
            dry_run,
        })
    }
}

/// A missing `.env` is fine; one that exists but cannot be read or parsed is not.
fn load_dotenv(loaded: Result<std::path::PathBuf, dotenvy::Error>) -> crate::Result<()> {
    match loaded {
        Ok(path) => {
            tracing::debug!("Loaded environment from {}", path.display());
            Ok(())
        }
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> crate::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| crate::Error::Config(format!("Invalid {} '{}': {}", key, raw, e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![
            ("FTP_HOST", "ftp.example.com"),
            ("FTP_USERNAME", "uploader"),
            ("FTP_PASSWORD", "hunter2"),
            ("PUBLIC_BASE_URL", "https://img.example.com/"),
        ]
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_lookup(lookup_from(&minimal())).unwrap();

        assert_eq!(config.ftp.port, 21);
        assert_eq!(config.ftp.upload_dir, "/");
        assert_eq!(config.media, MediaPolicy::default());
        assert_eq!(config.upload_timeout, Duration::from_secs(60));
        assert!(!config.dry_run);
    }

    #[test]
    fn test_config_missing_credentials() {
        let err = Config::from_lookup(lookup_from(&[("PUBLIC_BASE_URL", "https://x/")]))
            .unwrap_err();
        assert!(err.to_string().contains("FTP_HOST not set"));
    }

    #[test]
    fn test_config_dry_run_skips_credentials() {
        let config = Config::from_lookup(lookup_from(&[
            ("PUBLIC_BASE_URL", "https://x/"),
            ("DRY_RUN", "true"),
        ]))
        .unwrap();
        assert!(config.dry_run);
        assert!(config.ftp.host.is_empty());
    }

    #[test]
    fn test_config_rejects_bad_quality() {
        let mut pairs = minimal();
        pairs.push(("MEDIA_QUALITY", "150"));
        assert!(Config::from_lookup(lookup_from(&pairs)).is_err());
    }

    #[test]
    fn test_config_overrides() {
        let mut pairs = minimal();
        pairs.extend([
            ("FTP_PORT", "2121"),
            ("FTP_UPLOAD_DIR", "/public_html/uploads"),
            ("MEDIA_MAX_DIMENSION", "800"),
            ("MEDIA_TARGET_FORMAT", "jpeg"),
        ]);
        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();

        assert_eq!(config.ftp.port, 2121);
        assert_eq!(config.ftp.upload_dir, "/public_html/uploads");
        assert_eq!(config.media.max_dimension, 800);
        assert_eq!(config.media.target_format, TargetFormat::Jpeg);
    }

    #[test]
    fn test_ftp_config_debug_redacts_password() {
        let config = Config::from_lookup(lookup_from(&minimal())).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_missing_dotenv_is_ignored() {
        let path = std::env::temp_dir().join(format!("absent-{}.env", uuid::Uuid::new_v4()));
        assert!(load_dotenv(dotenvy::from_filename(&path)).is_ok());
    }

    #[test]
    fn test_malformed_dotenv_is_reported() {
        let path = std::env::temp_dir().join(format!("broken-{}.env", uuid::Uuid::new_v4()));
        std::fs::write(&path, "FTP_HOST='unterminated\n").unwrap();

        let result = load_dotenv(dotenvy::from_filename(&path));
        std::fs::remove_file(&path).ok();

        let err = result.unwrap_err();
        assert!(matches!(err, crate::Error::EnvVar(_)));
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_upload_response_shape() {
        let response = UploadResponse {
            success: true,
            url: "https://img.example.com/img_1.webp".to_string(),
            filename: "img_1.webp".to_string(),
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": true,
                "url": "https://img.example.com/img_1.webp",
                "filename": "img_1.webp",
            })
        );
    }

    #[test]
    fn test_transform_result_accessors() {
        let result = TransformResult::Fallback {
            data: vec![1, 2, 3],
            extension: "png".to_string(),
        };
        assert!(result.is_fallback());
        assert_eq!(result.data(), &[1, 2, 3]);
        assert_eq!(result.extension(), "png");
    }
}
