// # File Remote Store
//
// Directory-backed implementation of RemoteStore.
//
// ## Purpose
//
// Publishes the monitor document to a local directory, e.g. one served by a
// web server or synced by another tool. Each document path maps to a file
// under the root directory.
//
// ## Versioning
//
// - Version token: SHA-256 of the file content (hex)
// - Conditional writes compare the token with the hash of the current file
// - Atomic writes: new content goes to a temporary file, then is renamed
//
// Commit messages have nowhere to live on disk; they are logged.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::Error;
use crate::traits::remote_store::{RemoteDocument, RemoteStore, VersionToken};

/// Directory-backed document store
///
/// # Example
///
/// ```rust,no_run
/// use ipmon_core::store::FileRemoteStore;
/// use ipmon_core::traits::RemoteStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileRemoteStore::new("/var/www/ip").await?;
///
///     let version = store.write("data.json", "{}", "create", None).await?;
///     let doc = store.fetch("data.json").await?.expect("just written");
///     assert_eq!(doc.version, version);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileRemoteStore {
    root: PathBuf,
}

impl FileRemoteStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub async fn new<P: AsRef<Path>>(root: P) -> Result<Self, Error> {
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            fs::create_dir_all(&root).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create store directory {}: {}",
                    root.display(),
                    e
                ))
            })?;
        }

        Ok(Self { root })
    }

    /// Content hash used as version token
    pub fn version_of(content: &str) -> VersionToken {
        VersionToken::new(hex::encode(Sha256::digest(content.as_bytes())))
    }

    /// Resolve a document path below the root
    ///
    /// Only plain relative paths are accepted; `..`, absolute paths and
    /// prefixes would escape the root.
    fn resolve(&self, path: &str) -> Result<PathBuf, Error> {
        let relative = Path::new(path);
        let is_plain = relative.components().count() > 0
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));

        if !is_plain {
            return Err(Error::config(format!("Invalid document path: '{}'", path)));
        }

        Ok(self.root.join(relative))
    }

    /// Read the current content, `None` if the file does not exist
    async fn read_current(file: &Path) -> std::io::Result<Option<String>> {
        match fs::read_to_string(file).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Path of the temporary file used for atomic writes
    fn temp_path(file: &Path) -> PathBuf {
        let mut temp = file.as_os_str().to_owned();
        temp.push(".tmp");
        PathBuf::from(temp)
    }

    async fn write_atomic(file: &Path, content: &str) -> std::io::Result<()> {
        if let Some(parent) = file.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = Self::temp_path(file);
        {
            let mut temp = fs::File::create(&temp_path).await?;
            temp.write_all(content.as_bytes()).await?;
            temp.flush().await?;
            temp.sync_all().await?;
        }

        fs::rename(&temp_path, file).await
    }
}

#[async_trait]
impl RemoteStore for FileRemoteStore {
    async fn fetch(&self, path: &str) -> Result<Option<RemoteDocument>, Error> {
        let file = self.resolve(path)?;

        let content = Self::read_current(&file).await.map_err(|e| {
            Error::remote_read(format!("Failed to read {}: {}", file.display(), e))
        })?;

        Ok(content.map(|content| RemoteDocument {
            version: Self::version_of(&content),
            content,
        }))
    }

    async fn write(
        &self,
        path: &str,
        content: &str,
        message: &str,
        version: Option<&VersionToken>,
    ) -> Result<VersionToken, Error> {
        let file = self.resolve(path)?;

        let current = Self::read_current(&file).await.map_err(|e| {
            Error::remote_write(format!("Failed to read {}: {}", file.display(), e))
        })?;

        match (current.as_deref().map(Self::version_of), version) {
            (None, None) => {}
            (Some(current), Some(expected)) if current == *expected => {}
            (Some(current), Some(expected)) => {
                return Err(Error::conflict(format!(
                    "{} has version {}, write was based on {}",
                    path, current, expected
                )));
            }
            (Some(_), None) => {
                return Err(Error::conflict(format!(
                    "{} already exists and no version was given",
                    path
                )));
            }
            (None, Some(expected)) => {
                return Err(Error::conflict(format!(
                    "{} does not exist, write was based on {}",
                    path, expected
                )));
            }
        }

        Self::write_atomic(&file, content).await.map_err(|e| {
            Error::remote_write(format!("Failed to write {}: {}", file.display(), e))
        })?;

        tracing::info!("Wrote {}: {}", file.display(), message);
        Ok(Self::version_of(content))
    }

    fn store_name(&self) -> &'static str {
        "file"
    }
}
