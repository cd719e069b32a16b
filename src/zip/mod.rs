//! ZIP archive parsing and extraction.
//!
//! This module resolves the directory of an in-memory ZIP archive and turns
//! individual entries into validated bytes.
//!
//! ## Architecture
//!
//! - [`structures`]: fixed records, constants and the entry descriptor
//! - [`extra`]: extra field sub-records and the decoder registry
//! - [`parser`]: end of central directory discovery, entry decoding and
//!   local header walking
//! - [`materialize`]: decompression dispatch, data descriptor reconciliation
//!   and size/CRC validation
//! - [`extractor`]: high-level API over an owned buffer
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file, each optionally
//!    followed by a data descriptor
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end, optionally followed
//!    by a comment
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No archive creation

pub mod extra;
pub mod extractor;
pub mod materialize;
pub mod parser;
pub mod structures;

pub use extra::{ExtraField, ExtraFieldDecoder, ExtraFieldRegistry};
pub use extractor::{ExtractSummary, ZipExtractor, extract_entries};
pub use materialize::{MaterializationResult, materialize, read_data_descriptor};
pub use parser::ZipParser;
pub use structures::*;
