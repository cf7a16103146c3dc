use super::RemoteStore;
use crate::error::{TransferError, TransferStage};
use crate::naming::StorageKey;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// In-memory remote store. Also backs `DRY_RUN` mode.
#[derive(Clone)]
pub struct MockRemoteStore {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    order: Arc<Mutex<VecDeque<String>>>,
    store_count: Arc<Mutex<usize>>,
    fail_at: Option<TransferStage>,
    delay: Option<Duration>,
    retain: Option<usize>,
}

impl MockRemoteStore {
    pub fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(HashMap::new())),
            order: Arc::new(Mutex::new(VecDeque::new())),
            store_count: Arc::new(Mutex::new(0)),
            fail_at: None,
            delay: None,
            retain: None,
        }
    }

    /// Fail every session at `stage`, leaving nothing stored.
    pub fn with_failure_at(mut self, stage: TransferStage) -> Self {
        self.fail_at = Some(stage);
        self
    }

    /// Hold every session open for `delay` before the object lands.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Keep at most `limit` objects, evicting the oldest first.
    pub fn with_retention(mut self, limit: usize) -> Self {
        self.retain = Some(limit);
        self
    }

    pub fn get_store_count(&self) -> usize {
        *self.store_count.lock().unwrap()
    }

    pub fn get_files(&self) -> HashMap<String, Vec<u8>> {
        self.files.lock().unwrap().clone()
    }

    fn insert(&self, key: &StorageKey, data: &[u8]) {
        let mut files = self.files.lock().unwrap();
        let mut order = self.order.lock().unwrap();

        files.insert(key.as_str().to_string(), data.to_vec());
        order.push_back(key.as_str().to_string());

        if let Some(limit) = self.retain {
            while order.len() > limit {
                if let Some(oldest) = order.pop_front() {
                    debug!("Evicting {} from in-memory store", oldest);
                    files.remove(&oldest);
                }
            }
        }
    }
}

impl Default for MockRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MockRemoteStore {
    async fn store(
        &self,
        key: &StorageKey,
        data: &[u8],
        deadline: Duration,
    ) -> Result<(), TransferError> {
        *self.store_count.lock().unwrap() += 1;

        if let Some(stage) = self.fail_at {
            return Err(TransferError::stage(stage, "mock failure"));
        }

        if let Some(delay) = self.delay {
            if tokio::time::timeout(deadline, tokio::time::sleep(delay))
                .await
                .is_err()
            {
                return Err(TransferError::Timeout(deadline));
            }
        }

        self.insert(key, data);
        Ok(())
    }
}
