//! Resolution configuration.
//!
//! An [`ArchiveConfig`] is assembled up front and borrowed immutably while
//! entries are listed or materialized. Share one across threads behind an
//! `Arc` if needed; there is no process-wide registry to mutate.

use std::sync::Arc;

use crate::codec::{CodecRegistry, Decompressor};
use crate::zip::{CompressionMethod, ExtraFieldDecoder, ExtraFieldRegistry};

#[derive(Debug, Clone, Default)]
pub struct ArchiveConfig {
    pub extra_fields: ExtraFieldRegistry,
    pub codecs: CodecRegistry,
}

impl ArchiveConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode extra field `id` with `decoder` in addition to keeping its raw bytes.
    pub fn with_extra_field(mut self, id: u16, decoder: Arc<dyn ExtraFieldDecoder>) -> Self {
        self.extra_fields.register(id, decoder);
        self
    }

    pub fn with_codec(mut self, method: CompressionMethod, decompressor: Arc<dyn Decompressor>) -> Self {
        self.codecs.register(method, decompressor);
        self
    }

    pub fn without_codec(mut self, method: CompressionMethod) -> Self {
        self.codecs.remove(method);
        self
    }
}
