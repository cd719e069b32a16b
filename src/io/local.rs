use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{ReadAll, Storage};

/// Archive stored on the local filesystem.
pub struct LocalFile {
    path: PathBuf,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ReadAll for LocalFile {
    async fn read_all(&self) -> Result<Vec<u8>> {
        fs::read(&self.path)
            .await
            .with_context(|| format!("failed to read {}", self.path.display()))
    }
}

/// Writes extracted entries to the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorage;

#[async_trait]
impl Storage for LocalStorage {
    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)
            .await
            .with_context(|| format!("failed to create directory {}", path.display()))
    }

    async fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let mut file = fs::File::create(path)
            .await
            .with_context(|| format!("failed to create {}", path.display()))?;
        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(())
    }
}
