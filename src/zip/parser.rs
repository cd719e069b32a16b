//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures from an
//! in-memory buffer.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) by scanning backwards
//! 2. If ZIP64, read the ZIP64 EOCD for large file support
//! 3. Read the Central Directory to get metadata for all files
//! 4. For extraction, walk each file's Local File Header to find its data
//!
//! The central directory is the source of truth for listing. Local headers
//! are only used to find where an entry's data starts.

use byteorder::LittleEndian;

use crate::config::ArchiveConfig;
use crate::cursor::ByteCursor;
use crate::error::{Error, Result};

use super::extra::{WideFields, parse_extra_fields};
use super::structures::*;

/// Low-level ZIP parser over a borrowed buffer.
///
/// Holds no mutable state; any number of parsers may read the same buffer
/// at once.
///
/// ## Usage
///
/// Typically used through [`ZipExtractor`](super::ZipExtractor)
/// rather than directly.
///
/// ## Example
///
/// ```ignore
/// let parser = ZipParser::new(&data, &config);
/// for entry in parser.list_entries()? {
///     let offset = parser.data_offset(&entry)?;
///     // Decompress from offset...
/// }
/// ```
pub struct ZipParser<'a> {
    data: &'a [u8],
    config: &'a ArchiveConfig,
}

impl<'a> ZipParser<'a> {
    pub fn new(data: &'a [u8], config: &'a ArchiveConfig) -> Self {
        Self { data, config }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn config(&self) -> &'a ArchiveConfig {
        self.config
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// Archive writers may append a comment of any length after the record,
    /// so the signature is searched for backwards, one byte at a time,
    /// starting where a comment-less record would begin. The first match
    /// from the end wins.
    ///
    /// # Errors
    ///
    /// [`Error::TooSmall`] if the buffer cannot hold a record at all, and
    /// [`Error::DirectoryEndNotFound`] if the scan reaches offset 0 without a
    /// match.
    pub fn find_eocd(&self) -> Result<EndOfDirectoryRecord> {
        if self.data.len() < EndOfCentralDirectory::SIZE {
            return Err(Error::TooSmall {
                len: self.data.len(),
                min: EndOfCentralDirectory::SIZE,
            });
        }

        let mut cursor = ByteCursor::new(self.data);
        let mut position = self.data.len() - EndOfCentralDirectory::SIZE;
        loop {
            cursor.seek(position)?;
            if cursor.read_u32::<LittleEndian>()? == EndOfCentralDirectory::SIGNATURE {
                break;
            }
            if position == 0 {
                return Err(Error::DirectoryEndNotFound);
            }
            position -= 1;
        }
        log::debug!("end of central directory at {position:#x}");

        let eocd = EndOfCentralDirectory::decode(&mut cursor)?;
        let comment_len = (eocd.comment_len as usize).min(cursor.remaining());
        let comment = cursor.read_bytes(comment_len)?.to_vec();

        // Get Central Directory info, using ZIP64 if needed
        let zip64 = if eocd.is_zip64() {
            self.read_zip64_eocd(position)?
        } else {
            None
        };

        let record = match zip64 {
            Some(eocd64) => EndOfDirectoryRecord {
                entry_count: eocd64.total_entries,
                directory_offset: eocd64.cd_offset,
                directory_size: eocd64.cd_size,
                disk_number: eocd64.disk_number,
                record_offset: position as u64,
                zip64: true,
                comment,
            },
            None => EndOfDirectoryRecord {
                entry_count: eocd.total_entries as u64,
                directory_offset: eocd.cd_offset as u64,
                directory_size: eocd.cd_size as u64,
                disk_number: eocd.disk_number as u32,
                record_offset: position as u64,
                zip64: false,
                comment,
            },
        };

        Ok(record)
    }

    /// Read the ZIP64 End of Central Directory record.
    ///
    /// Called when the regular EOCD holds sentinel values. Returns `None`
    /// when no ZIP64 locator precedes the EOCD, in which case the sentinel
    /// values are genuine.
    pub fn read_zip64_eocd(&self, eocd_offset: usize) -> Result<Option<Zip64EOCD>> {
        // The ZIP64 EOCD Locator is located immediately before the regular EOCD
        let Some(locator_offset) = eocd_offset.checked_sub(Zip64EOCDLocator::SIZE) else {
            return Ok(None);
        };
        let mut cursor = ByteCursor::at(self.data, locator_offset)?;
        if cursor.read_u32::<LittleEndian>()? != Zip64EOCDLocator::SIGNATURE {
            log::debug!("EOCD has zip64 sentinels but no zip64 locator; using them as-is");
            return Ok(None);
        }
        let locator = Zip64EOCDLocator::decode(&mut cursor)?;

        // Read the actual ZIP64 EOCD from the offset specified in the locator
        let offset = self.offset_in_buffer(locator.eocd64_offset)?;
        let mut cursor = ByteCursor::at(self.data, offset)?;
        let found = cursor.read_u32::<LittleEndian>()?;
        if found != Zip64EOCD::SIGNATURE {
            return Err(Error::BadSignature {
                record: "zip64 end of central directory",
                offset: offset as u64,
                found,
            });
        }
        let eocd64 = Zip64EOCD::decode(&mut cursor)?;
        log::debug!(
            "zip64 end of central directory at {offset:#x}: {} entries",
            eocd64.total_entries
        );
        Ok(Some(eocd64))
    }

    /// List all entries in directory order.
    ///
    /// Any malformed entry aborts the whole listing: a wrong offset would
    /// corrupt every entry after it.
    pub fn list_entries(&self) -> Result<Vec<EntryDescriptor>> {
        let eocd = self.find_eocd()?;
        self.read_directory(&eocd)
    }

    /// Decode `eocd.entry_count` central directory headers.
    pub fn read_directory(&self, eocd: &EndOfDirectoryRecord) -> Result<Vec<EntryDescriptor>> {
        let start = self.offset_in_buffer(eocd.directory_offset)?;
        let mut cursor = ByteCursor::at(self.data, start)?;

        // Skip the "archive extra data record" if present.
        if cursor.remaining() >= 4 {
            if cursor.read_u32::<LittleEndian>()? == ARCHIVE_EXTRA_DATA_SIGNATURE {
                let len = cursor.read_u32::<LittleEndian>()? as usize;
                cursor.skip(len)?;
                log::debug!("skipped {len} byte archive extra data record");
            } else {
                cursor.rewind(4)?;
            }
        }

        // Every header takes at least 46 bytes, which bounds a bogus count.
        let capacity = eocd
            .entry_count
            .min((cursor.remaining() / CDFH_MIN_SIZE) as u64) as usize;
        let mut entries = Vec::with_capacity(capacity);

        for _ in 0..eocd.entry_count {
            let (entry, next) = self.parse_cdfh(&mut cursor, eocd.disk_number)?;
            entries.push(entry);
            // Move to the next Central Directory entry.
            cursor.seek(next)?;
        }

        Ok(entries)
    }

    /// Parse a Central Directory File Header at the cursor.
    ///
    /// Returns the entry and the offset of the following header, computed
    /// from the fixed size plus the name, extra and comment lengths.
    pub fn parse_cdfh(
        &self,
        cursor: &mut ByteCursor<'a>,
        current_disk: u32,
    ) -> Result<(EntryDescriptor, usize)> {
        let start = cursor.offset();

        // Read and verify the signature (PK\x01\x02)
        let found = cursor.read_u32::<LittleEndian>()?;
        if found != CDFH_SIGNATURE {
            return Err(Error::BadSignature {
                record: "central directory header",
                offset: start as u64,
                found,
            });
        }

        // Read fixed-size header fields
        let version_made_by = cursor.read_u16::<LittleEndian>()?;
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let compression_method = cursor.read_u16::<LittleEndian>()?;
        let last_mod_time = cursor.read_u16::<LittleEndian>()?;
        let last_mod_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let file_name_length = cursor.read_u16::<LittleEndian>()? as usize;
        let extra_field_length = cursor.read_u16::<LittleEndian>()? as usize;
        let file_comment_length = cursor.read_u16::<LittleEndian>()? as usize;
        let disk_number_start = cursor.read_u16::<LittleEndian>()? as u32;
        let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
        let external_attributes = cursor.read_u32::<LittleEndian>()?;
        let lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

        let next = start + CDFH_MIN_SIZE + file_name_length + extra_field_length + file_comment_length;

        if file_name_length == 0 {
            return Err(Error::malformed(start, "entry has an empty name"));
        }
        let name = decode_text(cursor.read_bytes(file_name_length)?, flags);

        let mut wide = WideFields {
            uncompressed_size,
            compressed_size,
            local_header_offset: lfh_offset,
            disk_number: disk_number_start,
        };
        let extra = parse_extra_fields(cursor, extra_field_length, &mut wide, &self.config.extra_fields)?;

        let comment = decode_text(cursor.read_bytes(file_comment_length)?, flags);

        if wide.disk_number != current_disk {
            return Err(Error::UnsupportedFeature("multi-volume archives"));
        }

        let entry = EntryDescriptor {
            entry_type: entry_type(&name, version_made_by, external_attributes),
            name,
            compression_method: CompressionMethod::from_u16(compression_method),
            compressed_size: wide.compressed_size,
            uncompressed_size: wide.uncompressed_size,
            crc32,
            local_header_offset: wide.local_header_offset,
            disk_number: wide.disk_number,
            zip64_present: extra.zip64_present,
            has_trailing_descriptor: flags & flags::DATA_DESCRIPTOR != 0,
            flags,
            version_made_by,
            external_attributes,
            last_mod_time,
            last_mod_date,
            mtime: extra.mtime,
            comment,
            custom_fields: extra.custom,
            extensions: extra.extensions,
        };
        log::trace!(
            "entry {:?}: {} {}/{} bytes at {:#x}",
            entry.name,
            entry.compression_method,
            entry.compressed_size,
            entry.uncompressed_size,
            entry.local_header_offset
        );

        Ok((entry, next))
    }

    /// Get the actual data offset for an entry.
    ///
    /// The Local File Header (LFH) has variable-length fields (filename,
    /// extra field) that may differ from the Central Directory entry, so
    /// they are walked rather than assumed.
    pub fn data_offset(&self, entry: &EntryDescriptor) -> Result<usize> {
        let lfh_offset = self.offset_in_buffer(entry.local_header_offset)?;
        let mut cursor = ByteCursor::at(self.data, lfh_offset)?;

        // Verify LFH signature (PK\x03\x04)
        let found = cursor.read_u32::<LittleEndian>()?;
        if found != LFH_SIGNATURE {
            return Err(Error::BadSignature {
                record: "local file header",
                offset: lfh_offset as u64,
                found,
            });
        }

        // Read the variable field lengths from fixed positions in LFH
        cursor.seek(lfh_offset + 26)?;
        let file_name_length = cursor.read_u16::<LittleEndian>()? as usize;
        let extra_field_length = cursor.read_u16::<LittleEndian>()? as usize;

        // Data starts after: LFH (30 bytes) + filename + extra field
        let data_offset = lfh_offset + LFH_SIZE + file_name_length + extra_field_length;
        cursor.seek(data_offset)?;
        Ok(data_offset)
    }

    fn offset_in_buffer(&self, offset: u64) -> Result<usize> {
        usize::try_from(offset)
            .ok()
            .filter(|offset| *offset <= self.data.len())
            .ok_or(Error::OutOfBounds {
                offset: usize::try_from(offset).unwrap_or(usize::MAX),
                requested: 0,
                len: self.data.len(),
            })
    }
}

/// Names and comments are UTF-8 when flagged (or when they happen to be
/// valid UTF-8), CP437 otherwise.
fn decode_text(bytes: &[u8], general_flags: u16) -> String {
    if general_flags & flags::UTF8_NAMES != 0 {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_owned(),
        Err(_) => bytes
            .iter()
            .map(|&b| if b < 0x80 { b as char } else { CP437_HIGH[(b - 0x80) as usize] })
            .collect(),
    }
}

#[rustfmt::skip]
const CP437_HIGH: [char; 128] = [
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å',
    'É', 'æ', 'Æ', 'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ',
    'á', 'í', 'ó', 'ú', 'ñ', 'Ñ', 'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»',
    '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕', '╣', '║', '╗', '╝', '╜', '╛', '┐',
    '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦', '╠', '═', '╬', '╧',
    '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐', '▀',
    'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩',
    '≡', '±', '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{a0}',
];
