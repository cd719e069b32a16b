//! # unpackr
//!
//! Locate, decode and validate the directory structures of ZIP containers,
//! and decode 7z coder records, so individual entries can be extracted
//! without trusting the file as one opaque blob.
//!
//! Parsing is synchronous and works on a borrowed, immutable buffer. Each
//! operation uses its own cursor, so one buffer can be resolved or
//! extracted from concurrently without locking.
//!
//! ## Features
//!
//! - Backward scan for the end of central directory record, tolerating
//!   trailing comments and garbage
//! - ZIP64 end records and extra fields
//! - Data descriptors with or without their optional signature
//! - STORED, DEFLATE, BZIP2 and LZMA through pluggable [`Decompressor`]s
//! - Size and CRC32 validation; CRC mismatches are reported, not fatal
//! - Custom extra field decoders through [`ArchiveConfig`]
//! - 7z coder descriptor decoding ([`sevenz::CoderDescriptor`])
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let data = unpackr::io::load("archive.zip").await?;
//!
//!     for entry in unpackr::list_entries(&data)? {
//!         let result = unpackr::read_entry(&data, &entry)?;
//!         println!("{} ({} bytes, crc ok: {})", entry.name, result.bytes.len(), !result.crc_mismatch);
//!     }
//!
//!     unpackr::extract_all(&data, Path::new("out")).await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod codec;
pub mod config;
pub mod cursor;
pub mod error;
pub mod io;
pub mod sevenz;
pub mod zip;

pub use cli::Cli;
pub use codec::{CodecRegistry, Decompressor};
pub use config::ArchiveConfig;
pub use cursor::ByteCursor;
pub use error::{Error, ErrorKind, Result};
pub use io::{HttpSource, LocalFile, LocalStorage, ReadAll, Storage};
pub use zip::{
    CompressionMethod, EndOfDirectoryRecord, EntryDescriptor, EntryType, ExtractSummary,
    MaterializationResult, ZipExtractor, ZipParser,
};

use std::path::Path;

/// List the entries of a ZIP buffer in central directory order.
pub fn list_entries(buffer: &[u8]) -> Result<Vec<EntryDescriptor>> {
    list_entries_with(buffer, &ArchiveConfig::default())
}

pub fn list_entries_with(buffer: &[u8], config: &ArchiveConfig) -> Result<Vec<EntryDescriptor>> {
    ZipParser::new(buffer, config).list_entries()
}

/// Decompress and validate one entry previously listed from `buffer`.
pub fn read_entry(buffer: &[u8], entry: &EntryDescriptor) -> Result<MaterializationResult> {
    read_entry_with(buffer, entry, &ArchiveConfig::default())
}

pub fn read_entry_with(
    buffer: &[u8],
    entry: &EntryDescriptor,
    config: &ArchiveConfig,
) -> Result<MaterializationResult> {
    zip::materialize(&ZipParser::new(buffer, config), entry)
}

/// Extract every entry of `buffer` below `destination` on the local filesystem.
pub async fn extract_all(buffer: &[u8], destination: &Path) -> anyhow::Result<ExtractSummary> {
    let config = ArchiveConfig::default();
    let parser = ZipParser::new(buffer, &config);
    let entries = parser.list_entries()?;
    zip::extract_entries(&parser, &entries, destination, &LocalStorage).await
}
