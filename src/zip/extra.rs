//! Extra field sub-records of central directory entries.
//!
//! The extra block is a run of `(id: u16, size: u16, payload)` records. The
//! zip64 (0x0001) and extended timestamp (0x5455) records are understood
//! directly. Anything else is kept verbatim and, if an
//! [`ExtraFieldDecoder`] is registered for its id, also decoded into a typed
//! value.

use byteorder::LittleEndian;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::cursor::ByteCursor;
use crate::error::{Error, Result};

use super::structures::{ZIP64_SENTINEL_U16, ZIP64_SENTINEL_U32};

pub const ZIP64_EXTRA_ID: u16 = 0x0001;
pub const EXTENDED_TIMESTAMP_ID: u16 = 0x5455;

/// A typed extra field value produced by a registered decoder.
pub trait ExtraField: fmt::Debug + Send + Sync {
    fn id(&self) -> u16;

    fn as_any(&self) -> &dyn Any;
}

/// Turns the raw payload of one extra field id into a typed value.
///
/// Returning `None` leaves only the raw bytes on the entry.
pub trait ExtraFieldDecoder: Send + Sync {
    fn decode(&self, payload: &[u8]) -> Option<Arc<dyn ExtraField>>;
}

impl<F> ExtraFieldDecoder for F
where
    F: Fn(&[u8]) -> Option<Arc<dyn ExtraField>> + Send + Sync,
{
    fn decode(&self, payload: &[u8]) -> Option<Arc<dyn ExtraField>> {
        self(payload)
    }
}

/// Decoders for extra field ids without built-in support.
#[derive(Clone, Default)]
pub struct ExtraFieldRegistry {
    decoders: HashMap<u16, Arc<dyn ExtraFieldDecoder>>,
}

impl ExtraFieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `decoder` for `id`, replacing any previous one.
    ///
    /// Built-in ids (zip64, extended timestamp) never reach the registry.
    pub fn register(&mut self, id: u16, decoder: Arc<dyn ExtraFieldDecoder>) {
        self.decoders.insert(id, decoder);
    }

    pub fn get(&self, id: u16) -> Option<&Arc<dyn ExtraFieldDecoder>> {
        self.decoders.get(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

impl fmt::Debug for ExtraFieldRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.decoders.keys().collect();
        ids.sort();
        f.debug_struct("ExtraFieldRegistry")
            .field("ids", &ids)
            .finish()
    }
}

/// Fixed header fields that the zip64 record may override.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WideFields {
    pub uncompressed_size: u64,
    pub compressed_size: u64,
    pub local_header_offset: u64,
    pub disk_number: u32,
}

/// Everything the extra block contributed to an entry.
#[derive(Debug, Default)]
pub(crate) struct ExtraFields {
    pub zip64_present: bool,
    pub mtime: Option<u32>,
    pub custom: BTreeMap<u16, Vec<u8>>,
    pub extensions: Vec<Arc<dyn ExtraField>>,
}

/// Parse an extra block of `len` bytes starting at the cursor.
///
/// Leaves the cursor at the end of the block.
pub(crate) fn parse_extra_fields(
    cursor: &mut ByteCursor<'_>,
    len: usize,
    wide: &mut WideFields,
    registry: &ExtraFieldRegistry,
) -> Result<ExtraFields> {
    let block_start = cursor.offset();
    let block = cursor.read_bytes(len)?;
    let mut fields = ExtraFields::default();
    let mut records = ByteCursor::new(block);

    // Some writers pad the block with fewer than four bytes; ignore those.
    while records.remaining() >= 4 {
        let record_offset = block_start + records.offset();
        let id = records.read_u16::<LittleEndian>()?;
        let size = records.read_u16::<LittleEndian>()? as usize;
        let payload = records.read_bytes(size).map_err(|_| {
            Error::malformed(
                record_offset,
                format!("extra field {id:#06x} of {size} bytes overruns its block"),
            )
        })?;

        match id {
            ZIP64_EXTRA_ID => {
                apply_zip64(payload, wide).map_err(|_| {
                    Error::malformed(record_offset, "zip64 extra field is too short")
                })?;
                fields.zip64_present = true;
            }
            EXTENDED_TIMESTAMP_ID => {
                fields.mtime = parse_extended_timestamp(payload);
            }
            _ => {
                if let Some(decoder) = registry.get(id) {
                    match decoder.decode(payload) {
                        Some(value) => fields.extensions.push(value),
                        None => log::debug!("extra field decoder for {id:#06x} declined payload"),
                    }
                }
                fields.custom.insert(id, payload.to_vec());
            }
        }
    }

    Ok(fields)
}

/// Replace sentinel header values with their 64-bit counterparts.
///
/// Values appear only for fields that hold the sentinel, always in the order
/// uncompressed size, compressed size, local header offset, disk number.
fn apply_zip64(payload: &[u8], wide: &mut WideFields) -> Result<()> {
    let mut field = ByteCursor::new(payload);
    if wide.uncompressed_size == ZIP64_SENTINEL_U32 as u64 {
        wide.uncompressed_size = field.read_u64::<LittleEndian>()?;
    }
    if wide.compressed_size == ZIP64_SENTINEL_U32 as u64 {
        wide.compressed_size = field.read_u64::<LittleEndian>()?;
    }
    if wide.local_header_offset == ZIP64_SENTINEL_U32 as u64 {
        wide.local_header_offset = field.read_u64::<LittleEndian>()?;
    }
    if wide.disk_number == ZIP64_SENTINEL_U16 as u32 {
        wide.disk_number = field.read_u32::<LittleEndian>()?;
    }
    Ok(())
}

fn parse_extended_timestamp(payload: &[u8]) -> Option<u32> {
    let mut field = ByteCursor::new(payload);
    let flags = field.read_u8().ok()?;
    if flags & 0x01 == 0 {
        return None;
    }
    field.read_u32::<LittleEndian>().ok()
}
