//! Decompressors for entry payloads.
//!
//! A [`Decompressor`] consumes exactly one entry's compressed bytes from a
//! [`ByteCursor`] and leaves the cursor immediately after them, so the
//! caller can measure how much was consumed and read whatever follows
//! (typically a data descriptor).

mod bzip2;
mod deflate;
mod lzma;
mod store;

pub use self::bzip2::Bzip2;
pub use self::deflate::Deflate;
pub use self::lzma::Lzma;
pub use self::store::Store;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::zip::CompressionMethod;

/// Upper bound on output preallocated from a declared size.
const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

/// Growth step when the declared size is unknown or too small.
const OUTPUT_CHUNK: usize = 32 * 1024;

/// Decompression capability for one compression method.
pub trait Decompressor: Send + Sync {
    /// Decompress the payload starting at the cursor's position.
    ///
    /// `expected_size` is the declared uncompressed size, or `None` when the
    /// stream must be self-terminating.
    fn decompress(&self, cursor: &mut ByteCursor<'_>, expected_size: Option<u64>)
    -> Result<Vec<u8>>;
}

/// Decompressors by compression method.
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: HashMap<CompressionMethod, Arc<dyn Decompressor>>,
}

impl CodecRegistry {
    /// Registry with no codecs at all, not even `Stored`.
    pub fn empty() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    pub fn register(&mut self, method: CompressionMethod, decompressor: Arc<dyn Decompressor>) {
        self.codecs.insert(method, decompressor);
    }

    pub fn remove(&mut self, method: CompressionMethod) {
        self.codecs.remove(&method);
    }

    pub fn get(&self, method: CompressionMethod) -> Result<&dyn Decompressor> {
        self.codecs
            .get(&method)
            .map(|codec| codec.as_ref())
            .ok_or(Error::UnsupportedCompressionMethod(method))
    }

    pub fn supports(&self, method: CompressionMethod) -> bool {
        self.codecs.contains_key(&method)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(CompressionMethod::Stored, Arc::new(Store));
        registry.register(CompressionMethod::Deflate, Arc::new(Deflate));
        registry.register(CompressionMethod::Bzip2, Arc::new(Bzip2));
        registry.register(CompressionMethod::Lzma, Arc::new(Lzma));
        registry
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<_> = self.codecs.keys().map(|m| m.as_u16()).collect();
        methods.sort_unstable();
        f.debug_struct("CodecRegistry")
            .field("methods", &methods)
            .finish()
    }
}

fn initial_capacity(expected_size: Option<u64>) -> usize {
    expected_size.map_or(OUTPUT_CHUNK, |size| size.min(MAX_PREALLOCATION) as usize)
}

fn ensure_spare_capacity(output: &mut Vec<u8>) {
    if output.len() == output.capacity() {
        output.reserve(OUTPUT_CHUNK.max(output.len()));
    }
}
