use byteorder::LittleEndian;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::cursor::ByteCursor;
use crate::error::Result;

use super::extra::ExtraField;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Bzip2,
    Lzma,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            12 => CompressionMethod::Bzip2,
            14 => CompressionMethod::Lzma,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Bzip2 => 12,
            CompressionMethod::Lzma => 14,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionMethod::Stored => f.write_str("stored"),
            CompressionMethod::Deflate => f.write_str("deflate"),
            CompressionMethod::Bzip2 => f.write_str("bzip2"),
            CompressionMethod::Lzma => f.write_str("lzma"),
            CompressionMethod::Unknown(v) => write!(f, "method {v}"),
        }
    }
}

/// General purpose flag bits.
pub mod flags {
    pub const ENCRYPTED: u16 = 0x0001;
    /// For LZMA: the stream ends with an end-of-stream marker.
    pub const LZMA_EOS_MARKER: u16 = 0x0002;
    pub const DATA_DESCRIPTOR: u16 = 0x0008;
    pub const UTF8_NAMES: u16 = 0x0800;
}

/// Value stored in 32-bit fields whose real value lives in the zip64 extra field.
pub const ZIP64_SENTINEL_U32: u32 = 0xFFFF_FFFF;
pub const ZIP64_SENTINEL_U16: u16 = 0xFFFF;

/// End of Central Directory (EOCD) - 22 bytes minimum
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: u32 = 0x0605_4b50;
    pub const SIZE: usize = 22;

    /// Decode the fields that follow an already matched signature.
    pub fn decode(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == ZIP64_SENTINEL_U16
            || self.total_entries == ZIP64_SENTINEL_U16
            || self.cd_size == ZIP64_SENTINEL_U32
            || self.cd_offset == ZIP64_SENTINEL_U32
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
pub struct Zip64EOCDLocator {
    pub disk_with_eocd64: u32,
    pub eocd64_offset: u64,
    pub total_disks: u32,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: u32 = 0x0706_4b50;
    pub const SIZE: usize = 20;

    pub fn decode(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        Ok(Self {
            disk_with_eocd64: cursor.read_u32::<LittleEndian>()?,
            eocd64_offset: cursor.read_u64::<LittleEndian>()?,
            total_disks: cursor.read_u32::<LittleEndian>()?,
        })
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
pub struct Zip64EOCD {
    pub eocd64_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_with_cd: u32,
    pub disk_entries: u64,
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: u32 = 0x0606_4b50;
    pub const MIN_SIZE: usize = 56;

    pub fn decode(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        Ok(Self {
            eocd64_size: cursor.read_u64::<LittleEndian>()?,
            version_made_by: cursor.read_u16::<LittleEndian>()?,
            version_needed: cursor.read_u16::<LittleEndian>()?,
            disk_number: cursor.read_u32::<LittleEndian>()?,
            disk_with_cd: cursor.read_u32::<LittleEndian>()?,
            disk_entries: cursor.read_u64::<LittleEndian>()?,
            total_entries: cursor.read_u64::<LittleEndian>()?,
            cd_size: cursor.read_u64::<LittleEndian>()?,
            cd_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// Where the central directory is and how many entries it holds.
///
/// Built once per resolution pass from either the classic or the zip64 end
/// record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfDirectoryRecord {
    pub entry_count: u64,
    pub directory_offset: u64,
    pub directory_size: u64,
    pub disk_number: u32,
    /// Offset of the classic EOCD signature.
    pub record_offset: u64,
    pub zip64: bool,
    /// Archive comment, clamped to the bytes actually present.
    pub comment: Vec<u8>,
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: u32 = 0x0201_4b50;
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: u32 = 0x0403_4b50;
pub const LFH_SIZE: usize = 30;

/// Optional record between the central directory offset and the first header.
pub const ARCHIVE_EXTRA_DATA_SIGNATURE: u32 = 0x0806_4b50;

/// Optional leading signature of a data descriptor.
pub const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x0807_4b50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    File,
    Directory,
}

/// Sizes and CRC carried by a data descriptor after the compressed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataDescriptor {
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub had_signature: bool,
}

/// Parsed central directory entry.
///
/// When `has_trailing_descriptor` is set, sizes and CRC here are provisional;
/// [`EntryDescriptor::reconciled`] derives the authoritative copy.
#[derive(Debug, Clone)]
pub struct EntryDescriptor {
    pub name: String,
    pub entry_type: EntryType,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub local_header_offset: u64,
    pub disk_number: u32,
    pub zip64_present: bool,
    pub has_trailing_descriptor: bool,
    pub flags: u16,
    pub version_made_by: u16,
    pub external_attributes: u32,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    /// Modification time from the extended timestamp field, Unix seconds.
    pub mtime: Option<u32>,
    pub comment: String,
    /// Extra fields without built-in support, by id, verbatim.
    pub custom_fields: BTreeMap<u16, Vec<u8>>,
    /// Typed values produced by registered extra field decoders.
    pub extensions: Vec<Arc<dyn ExtraField>>,
}

impl EntryDescriptor {
    pub fn is_directory(&self) -> bool {
        self.entry_type == EntryType::Directory
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & flags::ENCRYPTED != 0
    }

    /// Copy of this entry with sizes and CRC taken from `descriptor`.
    pub fn reconciled(&self, descriptor: &DataDescriptor) -> Self {
        Self {
            crc32: descriptor.crc32,
            compressed_size: descriptor.compressed_size,
            uncompressed_size: descriptor.uncompressed_size,
            ..self.clone()
        }
    }

    /// First registered extension of type `T`.
    pub fn extension<T: ExtraField + 'static>(&self) -> Option<&T> {
        self.extensions
            .iter()
            .find_map(|field| field.as_any().downcast_ref::<T>())
    }

    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}

const HOST_MSDOS: u8 = 0;
const HOST_UNIX: u8 = 3;
const MSDOS_DIRECTORY: u32 = 0x10;
const UNIX_FILE_TYPE_MASK: u32 = 0o170000;
const UNIX_DIRECTORY: u32 = 0o040000;

/// Classify an entry from its name and host-specific attributes.
pub(crate) fn entry_type(name: &str, version_made_by: u16, external_attributes: u32) -> EntryType {
    if name.ends_with('/') {
        return EntryType::Directory;
    }
    let is_dir = match (version_made_by >> 8) as u8 {
        HOST_MSDOS => external_attributes & MSDOS_DIRECTORY != 0,
        HOST_UNIX => (external_attributes >> 16) & UNIX_FILE_TYPE_MASK == UNIX_DIRECTORY,
        _ => false,
    };
    if is_dir {
        EntryType::Directory
    } else {
        EntryType::File
    }
}
