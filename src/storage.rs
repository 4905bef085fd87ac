//! Proof-file storage.
//!
//! Handlers never touch the filesystem directly: uploads go through the
//! [`BlobStore`] capability, which persists a blob and returns a retrievable
//! URL. The local-disk implementation writes into the configured uploads
//! directory, which is also served read-only under `/uploads`.

use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use url::Url;
use uuid::Uuid;

pub type SharedBlobStore = Arc<dyn BlobStore>;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persists a blob and returns the URL under which it can be retrieved.
    ///
    /// `kind` labels the upload field the blob came from; `original_name` is
    /// only consulted for its file extension.
    async fn store(&self, kind: &str, original_name: &str, bytes: Vec<u8>)
    -> anyhow::Result<String>;
}

pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: Url,
}

impl LocalBlobStore {
    pub fn new(root: PathBuf, public_base_url: Url) -> Self {
        LocalBlobStore {
            root,
            public_base_url,
        }
    }

    fn unique_filename(kind: &str, original_name: &str) -> String {
        match Path::new(original_name).extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}-{}.{}", kind, Uuid::new_v4(), ext),
            None => format!("{}-{}", kind, Uuid::new_v4()),
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn store(
        &self,
        kind: &str,
        original_name: &str,
        bytes: Vec<u8>,
    ) -> anyhow::Result<String> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create uploads dir {}", self.root.display()))?;

        let filename = Self::unique_filename(kind, original_name);
        let path = self.root.join(&filename);

        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write uploaded file {}", path.display()))?;
        debug!("Stored uploaded blob at {}", path.display());

        let url = self
            .public_base_url
            .join(&format!("uploads/{}", filename))
            .context("Failed to build public URL for uploaded file")?;
        Ok(url.to_string())
    }
}
