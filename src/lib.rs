//! Media ingestion backend for the shop admin panel - accepts uploaded images
//!
//! Uploaded images are normalized (orientation, size, web format) and pushed to
//! the FTP image host, which serves them back under a public base URL. Images
//! that cannot be normalized are stored as uploaded.

pub mod api;
pub mod error;
pub mod image;
pub mod models;
pub mod naming;
pub mod pipeline;
pub mod storage;

pub use error::{Error, Result};
