use anyhow::{Context, bail};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::config::ArchiveConfig;
use crate::error::{Error, Result};
use crate::io::{ReadAll, Storage};

use super::materialize::{MaterializationResult, materialize};
use super::parser::ZipParser;
use super::structures::{EndOfDirectoryRecord, EntryDescriptor};

/// What an extraction run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub files: usize,
    pub directories: usize,
    /// Names of files written despite a CRC mismatch.
    pub crc_mismatches: Vec<String>,
}

/// ZIP archive held in memory with its directory already resolved.
///
/// The buffer and config are shared through `Arc`, so clones are cheap and
/// may be moved to other tasks to extract entries in parallel.
#[derive(Clone)]
pub struct ZipExtractor {
    data: Arc<[u8]>,
    config: Arc<ArchiveConfig>,
    eocd: EndOfDirectoryRecord,
    entries: Arc<[EntryDescriptor]>,
}

impl ZipExtractor {
    /// Resolve the directory of `data` with the default configuration.
    pub fn new(data: impl Into<Arc<[u8]>>) -> Result<Self> {
        Self::with_config(data, Arc::new(ArchiveConfig::default()))
    }

    pub fn with_config(data: impl Into<Arc<[u8]>>, config: Arc<ArchiveConfig>) -> Result<Self> {
        let data = data.into();
        let parser = ZipParser::new(&data, &config);
        let eocd = parser.find_eocd()?;
        let entries = parser.read_directory(&eocd)?;
        drop(parser);
        Ok(Self {
            data,
            config,
            eocd,
            entries: entries.into(),
        })
    }

    /// Load an archive from `source` and resolve it.
    pub async fn open<S: ReadAll + ?Sized>(
        source: &S,
        config: Arc<ArchiveConfig>,
    ) -> anyhow::Result<Self> {
        let data = source.read_all().await?;
        Ok(Self::with_config(data, config)?)
    }

    pub fn parser(&self) -> ZipParser<'_> {
        ZipParser::new(&self.data, &self.config)
    }

    /// Entries in central directory order.
    pub fn list_files(&self) -> &[EntryDescriptor] {
        &self.entries
    }

    pub fn end_of_directory(&self) -> &EndOfDirectoryRecord {
        &self.eocd
    }

    pub fn comment(&self) -> &[u8] {
        &self.eocd.comment
    }

    /// First entry named `name`.
    pub fn entry(&self, name: &str) -> Result<&EntryDescriptor> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .ok_or_else(|| Error::EntryNotFound(name.to_string()))
    }

    /// Decompress and validate one entry.
    pub fn read_entry(&self, entry: &EntryDescriptor) -> Result<MaterializationResult> {
        materialize(&self.parser(), entry)
    }

    pub fn read_by_name(&self, name: &str) -> Result<MaterializationResult> {
        self.read_entry(self.entry(name)?)
    }

    /// Materialize every file entry and report those whose CRC disagrees.
    ///
    /// Stops at the first fatal error.
    pub fn test(&self) -> Result<Vec<String>> {
        let parser = self.parser();
        let mut mismatches = Vec::new();
        for entry in self.entries.iter().filter(|e| !e.is_directory()) {
            if materialize(&parser, entry)?.crc_mismatch {
                mismatches.push(entry.name.clone());
            }
        }
        Ok(mismatches)
    }

    /// Extract every entry below `dest`.
    pub async fn extract_all<S: Storage + ?Sized>(
        &self,
        dest: &Path,
        storage: &S,
    ) -> anyhow::Result<ExtractSummary> {
        extract_entries(&self.parser(), &self.entries, dest, storage).await
    }
}

/// Write `entries` below `dest`.
///
/// Directory entries are created as directories. Files get their parent
/// directory created first, since directory entries may come after the files
/// inside them or be missing entirely. CRC mismatches are logged and
/// collected; any other failure aborts.
pub async fn extract_entries<S: Storage + ?Sized>(
    parser: &ZipParser<'_>,
    entries: &[EntryDescriptor],
    dest: &Path,
    storage: &S,
) -> anyhow::Result<ExtractSummary> {
    let mut summary = ExtractSummary::default();

    for entry in entries {
        let output_path = safe_join(dest, &entry.name)?;

        if entry.is_directory() {
            storage.create_dir_all(&output_path).await?;
            summary.directories += 1;
            continue;
        }

        // Create parent directories if needed
        if let Some(parent) = output_path.parent() {
            storage.create_dir_all(parent).await?;
        }

        let result = materialize(parser, entry)
            .with_context(|| format!("failed to extract {}", entry.name))?;
        if result.crc_mismatch {
            log::warn!("CRC mismatch in {}", entry.name);
            summary.crc_mismatches.push(entry.name.clone());
        }

        storage.write_file(&output_path, &result.bytes).await?;
        summary.files += 1;
    }

    Ok(summary)
}

/// Join an entry name onto `dest`, refusing names that would leave it.
pub fn safe_join(dest: &Path, name: &str) -> anyhow::Result<PathBuf> {
    let mut path = dest.to_path_buf();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                bail!("refusing to extract {name:?} outside of {}", dest.display())
            }
        }
    }
    Ok(path)
}
