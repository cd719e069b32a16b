use crate::cursor::ByteCursor;
use crate::error::{Error, Result};

/// Well-known coder method ids.
pub mod method {
    pub const COPY: &[u8] = &[0x00];
    pub const LZMA2: &[u8] = &[0x21];
    pub const LZMA: &[u8] = &[0x03, 0x01, 0x01];
    pub const DEFLATE: &[u8] = &[0x04, 0x01, 0x08];
    pub const BZIP2: &[u8] = &[0x04, 0x02, 0x02];
}

const ID_SIZE_MASK: u8 = 0x0F;
const COMPLEX: u8 = 0x10;
const HAS_ATTRIBUTES: u8 = 0x20;
const RESERVED: u8 = 0xC0;
const ALTERNATIVE_METHODS: u8 = 0x80;

/// Reads a 7z variable-length number.
///
/// The leading set bits of the first byte count the extra bytes that follow.
/// Extra bytes are little-endian; the first byte's remaining low bits supply
/// the most significant part.
///
/// - `0xxxxxxx`: value 0-127
/// - `10xxxxxx` + 1 byte
/// - `110xxxxx` + 2 bytes
/// - `11111111` + 8 bytes: full u64
pub fn read_number(cursor: &mut ByteCursor<'_>) -> Result<u64> {
    let first = cursor.read_u8()? as u64;
    let mut mask = 0x80u64;
    let mut value = 0u64;

    for i in 0..8 {
        if first & mask == 0 {
            return Ok(value | ((first & (mask - 1)) << (8 * i)));
        }
        value |= (cursor.read_u8()? as u64) << (8 * i);
        mask >>= 1;
    }

    Ok(value)
}

/// Named view of a coder method id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoderMethod {
    Copy,
    Lzma,
    Lzma2,
    Deflate,
    Bzip2,
}

/// One compression or filter stage of a 7z folder.
///
/// Equality is structural. `properties` is `None` when the record carried no
/// attributes, which is distinct from an empty properties blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoderDescriptor {
    pub method_id: Vec<u8>,
    pub input_streams: u64,
    pub output_streams: u64,
    pub properties: Option<Vec<u8>>,
}

impl CoderDescriptor {
    /// Decode a descriptor starting at the cursor's position.
    ///
    /// The flag byte is interpreted once; every later field is read or
    /// skipped based on the booleans derived from it. The reserved-bits check
    /// runs before the alternative-methods check, so a set bit 7 reports
    /// [`Error::ReservedFlagsSet`].
    pub fn decode(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let flags = cursor.read_u8()?;
        if flags & RESERVED != 0 {
            return Err(Error::ReservedFlagsSet { flags });
        }
        if flags & ALTERNATIVE_METHODS != 0 {
            return Err(Error::UnsupportedAlternativeMethods);
        }

        let id_size = (flags & ID_SIZE_MASK) as usize;
        let is_complex = flags & COMPLEX != 0;
        let has_attributes = flags & HAS_ATTRIBUTES != 0;

        let method_id = cursor.read_bytes(id_size)?.to_vec();

        let (input_streams, output_streams) = if is_complex {
            (read_number(cursor)?, read_number(cursor)?)
        } else {
            (1, 1)
        };

        let properties = if has_attributes {
            let size = read_number(cursor)?;
            let size = usize::try_from(size)
                .map_err(|_| Error::malformed(cursor.offset(), "coder properties too large"))?;
            Some(cursor.read_bytes(size)?.to_vec())
        } else {
            None
        };

        Ok(Self {
            method_id,
            input_streams,
            output_streams,
            properties,
        })
    }

    pub fn is_simple(&self) -> bool {
        self.input_streams == 1 && self.output_streams == 1
    }

    pub fn method(&self) -> Option<CoderMethod> {
        match self.method_id.as_slice() {
            method::COPY => Some(CoderMethod::Copy),
            method::LZMA => Some(CoderMethod::Lzma),
            method::LZMA2 => Some(CoderMethod::Lzma2),
            method::DEFLATE => Some(CoderMethod::Deflate),
            method::BZIP2 => Some(CoderMethod::Bzip2),
            _ => None,
        }
    }
}
