//! Remote storage for ingested media
//!
//! Places finished uploads on the image host. Every call owns its own
//! session; nothing is pooled or shared between uploads.

pub mod ftp;
pub mod mock;

pub use ftp::FtpStore;
pub use mock::MockRemoteStore;

use crate::error::TransferError;
use crate::naming::StorageKey;
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Place `data` at `key`. On error nothing is left behind at the key.
    ///
    /// `deadline` bounds the session up to the point the object is accepted.
    /// Reaching it first yields [`TransferError::Timeout`]; once the object is
    /// accepted the call succeeds even if closing the session runs late.
    /// Dropping the returned future aborts the session on a best-effort basis.
    async fn store(
        &self,
        key: &StorageKey,
        data: &[u8],
        deadline: Duration,
    ) -> Result<(), TransferError>;
}
