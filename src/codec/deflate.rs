use flate2::{Decompress, FlushDecompress, Status};

use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::zip::CompressionMethod;

use super::{Decompressor, ensure_spare_capacity, initial_capacity};

/// Raw deflate streams (no zlib header).
#[derive(Debug, Clone, Copy, Default)]
pub struct Deflate;

impl Decompressor for Deflate {
    fn decompress(&self, cursor: &mut ByteCursor<'_>, expected_size: Option<u64>) -> Result<Vec<u8>> {
        let input = cursor.rest();
        let mut inflater = Decompress::new(false);
        let mut output = Vec::with_capacity(initial_capacity(expected_size));

        loop {
            ensure_spare_capacity(&mut output);
            let before = (inflater.total_in(), inflater.total_out());
            let consumed = before.0 as usize;
            let status = inflater
                .decompress_vec(&input[consumed..], &mut output, FlushDecompress::None)
                .map_err(|e| Error::corrupt(CompressionMethod::Deflate, e))?;

            if matches!(status, Status::StreamEnd) {
                break;
            }
            let stalled = (inflater.total_in(), inflater.total_out()) == before;
            if stalled && output.len() < output.capacity() {
                return Err(Error::corrupt(
                    CompressionMethod::Deflate,
                    "stream ends before its final block",
                ));
            }
        }

        cursor.skip(inflater.total_in() as usize)?;
        Ok(output)
    }
}
