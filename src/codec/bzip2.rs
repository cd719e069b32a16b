use bzip2::{Decompress, Status};

use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::zip::CompressionMethod;

use super::{Decompressor, ensure_spare_capacity, initial_capacity};

/// Single bzip2 stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bzip2;

impl Decompressor for Bzip2 {
    fn decompress(&self, cursor: &mut ByteCursor<'_>, expected_size: Option<u64>) -> Result<Vec<u8>> {
        let input = cursor.rest();
        let mut decoder = Decompress::new(false);
        let mut output = Vec::with_capacity(initial_capacity(expected_size));

        loop {
            ensure_spare_capacity(&mut output);
            let before = (decoder.total_in(), decoder.total_out());
            let consumed = before.0 as usize;
            let status = decoder
                .decompress_vec(&input[consumed..], &mut output)
                .map_err(|e| Error::corrupt(CompressionMethod::Bzip2, e))?;

            if matches!(status, Status::StreamEnd) {
                break;
            }
            let stalled = (decoder.total_in(), decoder.total_out()) == before;
            if stalled && output.len() < output.capacity() {
                return Err(Error::corrupt(
                    CompressionMethod::Bzip2,
                    "stream ends before its end-of-stream marker",
                ));
            }
        }

        cursor.skip(decoder.total_in() as usize)?;
        Ok(output)
    }
}
