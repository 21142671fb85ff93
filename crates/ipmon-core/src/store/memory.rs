// # Memory Remote Store
//
// In-memory implementation of RemoteStore.
//
// ## Purpose
//
// Provides a store with the exact conditional-write semantics of the real
// backends, without any I/O. Useful for testing and for dry runs where no
// remote document should be touched.
//
// ## Crash Behavior
//
// - All documents are lost on restart
// - First run after restart starts from empty state (first address is "new")

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::remote_store::{RemoteDocument, RemoteStore, VersionToken};

/// A stored document with its revision number
#[derive(Debug, Clone)]
struct StoredDocument {
    content: String,
    revision: u64,
    message: String,
}

/// In-memory remote store implementation
///
/// Documents are kept in a HashMap protected by a RwLock. Version tokens
/// are revision numbers that increase with every write. Clones share the
/// same documents and counters.
///
/// # Example
///
/// ```rust,no_run
/// use ipmon_core::store::MemoryRemoteStore;
/// use ipmon_core::traits::RemoteStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryRemoteStore::new();
///
///     // Create (no version token)
///     let v1 = store.write("data.json", "{}", "create", None).await?;
///
///     // Overwrite (token of the version we read)
///     store.write("data.json", "{\"localIP\":null}", "update", Some(&v1)).await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryRemoteStore {
    inner: Arc<RwLock<HashMap<String, StoredDocument>>>,
    fetch_count: Arc<AtomicUsize>,
    write_count: Arc<AtomicUsize>,
}

impl MemoryRemoteStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a document unconditionally, as another writer would
    ///
    /// Bumps the revision, so tokens read earlier become stale. Not counted
    /// as a write.
    pub async fn put(&self, path: &str, content: impl Into<String>) -> VersionToken {
        let mut guard = self.inner.write().await;
        let revision = guard.get(path).map_or(1, |doc| doc.revision + 1);
        guard.insert(
            path.to_string(),
            StoredDocument {
                content: content.into(),
                revision,
                message: String::from("external write"),
            },
        );
        Self::token(revision)
    }

    /// Current content of a document
    pub async fn content(&self, path: &str) -> Option<String> {
        self.inner.read().await.get(path).map(|doc| doc.content.clone())
    }

    /// Message of the last write to a document
    pub async fn last_message(&self, path: &str) -> Option<String> {
        self.inner.read().await.get(path).map(|doc| doc.message.clone())
    }

    /// Number of fetch() calls
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    /// Number of successful write() calls
    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }

    fn token(revision: u64) -> VersionToken {
        VersionToken::new(format!("rev-{}", revision))
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn fetch(&self, path: &str) -> Result<Option<RemoteDocument>, Error> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        let guard = self.inner.read().await;
        Ok(guard.get(path).map(|doc| RemoteDocument {
            content: doc.content.clone(),
            version: Self::token(doc.revision),
        }))
    }

    async fn write(
        &self,
        path: &str,
        content: &str,
        message: &str,
        version: Option<&VersionToken>,
    ) -> Result<VersionToken, Error> {
        let mut guard = self.inner.write().await;
        let current = guard.get(path).map(|doc| doc.revision);

        let revision = match (current, version) {
            (None, None) => 1,
            (Some(revision), Some(token)) if Self::token(revision) == *token => revision + 1,
            (Some(revision), Some(token)) => {
                return Err(Error::conflict(format!(
                    "{} is at {}, write was based on {}",
                    path,
                    Self::token(revision),
                    token
                )));
            }
            (Some(_), None) => {
                return Err(Error::conflict(format!(
                    "{} already exists and no version was given",
                    path
                )));
            }
            (None, Some(token)) => {
                return Err(Error::conflict(format!(
                    "{} does not exist, write was based on {}",
                    path, token
                )));
            }
        };

        guard.insert(
            path.to_string(),
            StoredDocument {
                content: content.to_string(),
                revision,
                message: message.to_string(),
            },
        );
        self.write_count.fetch_add(1, Ordering::SeqCst);

        tracing::debug!("Stored {} at revision {}: {}", path, revision, message);
        Ok(Self::token(revision))
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}
