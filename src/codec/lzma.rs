use byteorder::{ByteOrder, LittleEndian};
use std::io::Read;

use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::zip::CompressionMethod;

use super::{Decompressor, initial_capacity};

/// LZMA properties: one lc/lp/pb byte plus a 4-byte dictionary size.
const PROPERTIES_SIZE: usize = 5;

/// Largest decoder state accepted, in KiB.
const MEMORY_LIMIT_KIB: u32 = 256 * 1024;

/// LZMA as stored in ZIP entries.
///
/// The payload starts with the LZMA SDK version (2 bytes) and the size of
/// the properties block (2 bytes), then the properties, then the raw stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lzma;

impl Decompressor for Lzma {
    fn decompress(&self, cursor: &mut ByteCursor<'_>, expected_size: Option<u64>) -> Result<Vec<u8>> {
        let header_offset = cursor.offset();
        let _sdk_version = cursor.read_u16::<LittleEndian>()?;
        let properties_size = cursor.read_u16::<LittleEndian>()? as usize;
        if properties_size != PROPERTIES_SIZE {
            return Err(Error::malformed(
                header_offset,
                format!("LZMA properties block of {properties_size} bytes (expected 5)"),
            ));
        }
        let properties = cursor.read_bytes(PROPERTIES_SIZE)?;
        let props = properties[0];
        let declared_dict_size = LittleEndian::read_u32(&properties[1..]);

        // The window never needs to exceed the output.
        let dict_size = match expected_size {
            Some(size) => declared_dict_size.min(size.min(u32::MAX as u64) as u32),
            None => declared_dict_size,
        };
        let memory_kib = lzma_rust2::lzma_get_memory_usage_by_props(dict_size, props)
            .map_err(|e| Error::corrupt(CompressionMethod::Lzma, e))?;
        if memory_kib > MEMORY_LIMIT_KIB {
            log::debug!("LZMA stream needs {memory_kib} KiB (dictionary {declared_dict_size})");
            return Err(Error::UnsupportedFeature(
                "LZMA dictionary above the decoder memory limit",
            ));
        }

        let mut input = cursor.rest();
        let available = input.len();
        let mut output = Vec::with_capacity(initial_capacity(expected_size));
        {
            let mut reader = lzma_rust2::LzmaReader::new_with_props(
                &mut input,
                expected_size.unwrap_or(u64::MAX),
                props,
                dict_size,
                None,
            )
            .map_err(|e| Error::corrupt(CompressionMethod::Lzma, e))?;
            reader
                .read_to_end(&mut output)
                .map_err(|e| Error::corrupt(CompressionMethod::Lzma, e))?;
        }

        cursor.skip(available - input.len())?;
        Ok(output)
    }
}
