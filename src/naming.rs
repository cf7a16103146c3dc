//! Storage key allocation for accepted uploads.

use std::fmt;
use uuid::Uuid;

const KEY_PREFIX: &str = "img_";

/// Name under which one upload is placed on the remote store.
///
/// Built from a random v4 UUID, so it carries nothing about upload order,
/// time or content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn allocate(extension: &str) -> Self {
        Self(format!("{}{}.{}", KEY_PREFIX, Uuid::new_v4(), extension))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
