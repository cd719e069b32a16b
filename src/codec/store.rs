use crate::cursor::ByteCursor;
use crate::error::{Error, Result};

use super::Decompressor;

/// Stored entries: the payload is the data.
#[derive(Debug, Clone, Copy, Default)]
pub struct Store;

impl Decompressor for Store {
    fn decompress(&self, cursor: &mut ByteCursor<'_>, expected_size: Option<u64>) -> Result<Vec<u8>> {
        let size = expected_size.ok_or(Error::UnsupportedFeature(
            "stored entry without a declared size",
        ))?;
        let size = usize::try_from(size).map_err(|_| Error::OutOfBounds {
            offset: cursor.offset(),
            requested: usize::MAX,
            len: cursor.len(),
        })?;
        Ok(cursor.read_bytes(size)?.to_vec())
    }
}
