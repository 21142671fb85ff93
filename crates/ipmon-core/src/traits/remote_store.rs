// # Remote Store Trait
//
// Defines the interface for reading and conditionally writing the single
// remote JSON document that holds the monitor state.
//
// ## Implementations
//
// - GitHub contents API: `ipmon-store-github` crate
// - Local directory: [`crate::store::FileRemoteStore`]
// - In-memory: [`crate::store::MemoryRemoteStore`]
//
// ## Optimistic concurrency
//
// Every read returns a [`VersionToken`]. A write must present the token of
// the version it was based on:
//
// - token given, matches current version → write succeeds
// - token given, remote moved on         → `Error::RemoteConflict`
// - no token, document absent            → document created
// - no token, document exists            → `Error::RemoteConflict`

use async_trait::async_trait;
use std::fmt;

/// Opaque content version identifier returned by a read
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionToken(String);

impl VersionToken {
    /// Wrap a store-specific version string
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fetched document together with its version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDocument {
    /// Decoded document content
    pub content: String,
    /// Version token required to overwrite this content
    pub version: VersionToken,
}

/// Trait for remote document stores
///
/// # Trust Level: Untrusted
///
/// Stores perform one request per call. They do not retry, cache, or decide
/// whether a write is needed; all of that is owned by the `Reconciler`.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch a document
    ///
    /// # Returns
    ///
    /// - `Ok(Some(RemoteDocument))`: The document and its version
    /// - `Ok(None)`: The document does not exist
    /// - `Err(Error::RemoteRead)`: Transport or decoding failure
    async fn fetch(&self, path: &str) -> Result<Option<RemoteDocument>, crate::Error>;

    /// Conditionally write a document
    ///
    /// # Parameters
    ///
    /// - `path`: Document path
    /// - `content`: Full new content
    /// - `message`: Human-readable change description (commit message)
    /// - `version`: Version the write is based on, `None` to create
    ///
    /// # Returns
    ///
    /// - `Ok(VersionToken)`: Version of the newly written content
    /// - `Err(Error::RemoteConflict)`: Precondition failed
    /// - `Err(Error::RemoteWrite)`: Any other failure
    async fn write(
        &self,
        path: &str,
        content: &str,
        message: &str,
        version: Option<&VersionToken>,
    ) -> Result<VersionToken, crate::Error>;

    /// Get the store name (for logging)
    fn store_name(&self) -> &'static str;
}
