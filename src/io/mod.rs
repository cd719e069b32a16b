//! Loading archives and writing extracted entries.
//!
//! The core never touches storage; these collaborators feed it a buffer and
//! receive its output. Retries for flaky transports live here too.

mod http;
mod local;

pub use http::HttpSource;
pub use local::{LocalFile, LocalStorage};

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

/// A source that can produce the whole archive as one buffer.
#[async_trait]
pub trait ReadAll: Send + Sync {
    async fn read_all(&self) -> Result<Vec<u8>>;
}

/// Destination for extracted entries.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Create `path` and any missing parents.
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Create or truncate `path` and write `bytes` to it.
    async fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<()>;
}

pub fn is_http_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Load an archive from a local path or an HTTP(S) URL.
pub async fn load(location: &str) -> Result<Vec<u8>> {
    if is_http_url(location) {
        HttpSource::new(location.to_string()).await?.read_all().await
    } else {
        LocalFile::new(location).read_all().await
    }
}
