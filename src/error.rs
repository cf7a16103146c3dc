//! Error handling and custom error types
//!
//! Provides unified error handling across the ingestion pipeline using thiserror.
//! Only [`Error::UnsupportedMediaType`] and [`Error::Transfer`] can come out of
//! [`crate::pipeline::Pipeline::ingest`]; transform failures are absorbed by the
//! fallback path and never reach this type.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Ingestion failed: {0}")]
    Transfer(#[from] TransferError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] dotenvy::Error),
}

impl Error {
    /// Stable, machine-readable name for the failure.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::UnsupportedMediaType(_) => "unsupported_media_type",
            Error::Transfer(_) => "ingestion_failed",
            Error::Config(_) | Error::EnvVar(_) => "config",
        }
    }

    /// Message safe to hand back to an uploader: no host, credentials or raw
    /// server replies.
    pub fn public_message(&self) -> String {
        match self {
            Error::UnsupportedMediaType(_) => "Only image files are accepted".to_string(),
            Error::Transfer(e) => format!("Upload failed: {}", e.public_summary()),
            Error::Config(_) | Error::EnvVar(_) => "Upload failed: internal error".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure to turn uploaded bytes into the normalized representation.
///
/// Internal to the pipeline: every variant triggers the fallback path.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("could not decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("image transform failed: {0}")]
    Failed(String),
}

impl From<image::ImageError> for TransformError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::Decoding(_) | image::ImageError::Unsupported(_) => {
                TransformError::Decode(e)
            }
            other => TransformError::Failed(other.to_string()),
        }
    }
}

/// Stage of the remote-store session in which a transfer broke down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStage {
    Connect,
    Login,
    Navigate,
    Transfer,
}

impl fmt::Display for TransferStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferStage::Connect => "connect",
            TransferStage::Login => "login",
            TransferStage::Navigate => "navigate",
            TransferStage::Transfer => "transfer",
        };
        f.write_str(name)
    }
}

/// Failure talking to the remote store. Nothing is stored when this is returned.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("remote store {stage} failed: {cause}")]
    Stage { stage: TransferStage, cause: String },

    #[error("remote store upload timed out after {0:?}")]
    Timeout(Duration),

    #[error("remote store upload cancelled")]
    Cancelled,
}

impl TransferError {
    pub fn stage(stage: TransferStage, cause: impl fmt::Display) -> Self {
        TransferError::Stage {
            stage,
            cause: cause.to_string(),
        }
    }

    fn public_summary(&self) -> String {
        match self {
            TransferError::Stage { stage, .. } => format!("remote storage {} step failed", stage),
            TransferError::Timeout(_) => "remote storage timed out".to_string(),
            TransferError::Cancelled => "upload cancelled".to_string(),
        }
    }
}
