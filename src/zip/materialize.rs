//! Turning one directory entry into validated bytes.
//!
//! The local header is walked to find where the payload starts, the
//! registered decompressor consumes the payload, an optional trailing data
//! descriptor replaces the provisional sizes and CRC, and the result is
//! checked against those authoritative values.

use byteorder::LittleEndian;

use crate::cursor::ByteCursor;
use crate::error::{Error, Result};

use super::parser::ZipParser;
use super::structures::{
    CompressionMethod, DATA_DESCRIPTOR_SIGNATURE, DataDescriptor, EntryDescriptor, flags,
};

/// Bytes of one entry plus the outcome of its CRC check.
#[derive(Debug, Clone)]
pub struct MaterializationResult {
    pub bytes: Vec<u8>,
    /// The CRC32 of `bytes` differs from the authoritative CRC.
    pub crc_mismatch: bool,
    /// The entry with sizes and CRC reconciled against its data descriptor.
    pub entry: EntryDescriptor,
}

/// Decompress and validate `entry`.
///
/// # Errors
///
/// - [`Error::UnsupportedCompressionMethod`] if no decompressor is
///   registered for the entry's method; nothing is read in that case.
/// - [`Error::SizeMismatch`] if the consumed or produced byte counts differ
///   from the authoritative sizes.
///
/// A CRC mismatch is not an error; see [`MaterializationResult::crc_mismatch`].
pub fn materialize(parser: &ZipParser<'_>, entry: &EntryDescriptor) -> Result<MaterializationResult> {
    if entry.is_directory() {
        return Ok(MaterializationResult {
            bytes: Vec::new(),
            crc_mismatch: false,
            entry: entry.clone(),
        });
    }
    if entry.is_encrypted() {
        return Err(Error::UnsupportedFeature("encrypted entries"));
    }

    let decompressor = parser.config().codecs.get(entry.compression_method)?;
    let data_offset = parser.data_offset(entry)?;
    let mut cursor = ByteCursor::at(parser.data(), data_offset)?;

    let bytes = decompressor.decompress(&mut cursor, expected_size(entry))?;
    let consumed = (cursor.offset() - data_offset) as u64;

    let authoritative = if entry.has_trailing_descriptor {
        let descriptor = read_data_descriptor(&mut cursor, entry.zip64_present)?;
        entry.reconciled(&descriptor)
    } else {
        entry.clone()
    };

    if consumed != authoritative.compressed_size
        || bytes.len() as u64 != authoritative.uncompressed_size
    {
        return Err(Error::SizeMismatch {
            expected_compressed: authoritative.compressed_size,
            actual_compressed: consumed,
            expected_uncompressed: authoritative.uncompressed_size,
            actual_uncompressed: bytes.len() as u64,
        });
    }

    let crc_mismatch = crc32fast::hash(&bytes) != authoritative.crc32;
    if crc_mismatch {
        log::debug!("CRC mismatch for {:?}", entry.name);
    }

    Ok(MaterializationResult {
        bytes,
        crc_mismatch,
        entry: authoritative,
    })
}

/// Uncompressed size to hand to the decompressor.
///
/// LZMA streams flagged with an end-of-stream marker are decoded until the
/// marker instead of up to a declared size.
fn expected_size(entry: &EntryDescriptor) -> Option<u64> {
    match entry.compression_method {
        CompressionMethod::Lzma if entry.flags & flags::LZMA_EOS_MARKER != 0 => None,
        _ => Some(entry.uncompressed_size),
    }
}

/// Read the data descriptor that follows a payload.
///
/// The leading signature is optional. Its value is checked first and, if it
/// does not match, those four bytes are re-read as the CRC. A CRC that
/// happens to equal the signature is misread; that is inherent to the format
/// and the later CRC check exposes it.
pub fn read_data_descriptor(cursor: &mut ByteCursor<'_>, zip64: bool) -> Result<DataDescriptor> {
    let had_signature = cursor.read_u32::<LittleEndian>()? == DATA_DESCRIPTOR_SIGNATURE;
    if !had_signature {
        cursor.rewind(4)?;
    }
    log::debug!(
        "data descriptor at {:#x} (signature {})",
        cursor.offset(),
        if had_signature { "present" } else { "absent" }
    );

    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let (compressed_size, uncompressed_size) = if zip64 {
        (
            cursor.read_u64::<LittleEndian>()?,
            cursor.read_u64::<LittleEndian>()?,
        )
    } else {
        (
            cursor.read_u32::<LittleEndian>()? as u64,
            cursor.read_u32::<LittleEndian>()? as u64,
        )
    };

    Ok(DataDescriptor {
        crc32,
        compressed_size,
        uncompressed_size,
        had_signature,
    })
}
