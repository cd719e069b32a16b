//! Shared helpers for integration tests.
//!
//! Archives are assembled byte by byte so tests can control every field,
//! including ones a well-behaved writer would never produce.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::io::Write;

pub const METHOD_STORED: u16 = 0;
pub const METHOD_DEFLATE: u16 = 8;
pub const METHOD_BZIP2: u16 = 12;
pub const METHOD_LZMA: u16 = 14;

/// General purpose flag bit 1 for LZMA: the stream ends with an end marker.
pub const FLAG_LZMA_EOS: u16 = 0x0002;

/// 2024-03-15
pub const DOS_DATE: u16 = ((2024 - 1980) << 9) | (3 << 5) | 15;
/// 10:30:00
pub const DOS_TIME: u16 = (10 << 11) | (30 << 5);

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder =
        flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn bzip2(data: &[u8]) -> Vec<u8> {
    let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// LZMA payload as stored in ZIP: SDK version, properties size, the five
/// property bytes, then the raw stream.
pub fn lzma(data: &[u8], end_marker: bool) -> Vec<u8> {
    let options = lzma_rust2::LzmaOptions::with_preset(6);
    let mut payload = vec![0x09, 0x14, 0x05, 0x00, options.get_props()];
    payload.extend_from_slice(&options.dict_size.to_le_bytes());
    let mut writer = lzma_rust2::LzmaWriter::new_no_header(payload, &options, end_marker).unwrap();
    writer.write_all(data).unwrap();
    writer.finish().unwrap()
}

/// Trailing data descriptor written after an entry's payload.
#[derive(Debug, Clone)]
pub struct TestDescriptor {
    pub signature: bool,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
}

/// One entry as it will be written, local header and central header alike.
#[derive(Debug, Clone)]
pub struct TestEntry {
    pub name: Vec<u8>,
    pub method: u16,
    pub flags: u16,
    pub payload: Vec<u8>,
    /// Values written to the central directory.
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub central_extra: Vec<u8>,
    pub external_attributes: u32,
    pub descriptor: Option<TestDescriptor>,
}

impl TestEntry {
    fn new(name: &str, method: u16, data: &[u8], payload: Vec<u8>) -> Self {
        Self {
            name: name.as_bytes().to_vec(),
            method,
            flags: 0,
            crc32: crc32fast::hash(data),
            compressed_size: payload.len() as u32,
            uncompressed_size: data.len() as u32,
            payload,
            central_extra: Vec::new(),
            external_attributes: 0,
            descriptor: None,
        }
    }

    pub fn stored(name: &str, data: &[u8]) -> Self {
        Self::new(name, METHOD_STORED, data, data.to_vec())
    }

    pub fn deflated(name: &str, data: &[u8]) -> Self {
        Self::new(name, METHOD_DEFLATE, data, deflate(data))
    }

    pub fn bzipped(name: &str, data: &[u8]) -> Self {
        Self::new(name, METHOD_BZIP2, data, bzip2(data))
    }

    /// LZMA entry, flagged as end-marker terminated when `end_marker` is set.
    pub fn lzma(name: &str, data: &[u8], end_marker: bool) -> Self {
        let entry = Self::new(name, METHOD_LZMA, data, lzma(data, end_marker));
        if end_marker {
            entry.with_flags(FLAG_LZMA_EOS)
        } else {
            entry
        }
    }

    pub fn directory(name: &str) -> Self {
        Self::stored(name, b"")
    }

    /// Raw payload under an arbitrary method id.
    pub fn raw(name: &str, method: u16, payload: &[u8]) -> Self {
        Self::new(name, method, payload, payload.to_vec())
    }

    /// Move the real sizes and CRC into a trailing descriptor and put
    /// `provisional` (compressed, uncompressed) into the central directory.
    pub fn with_descriptor(mut self, signature: bool, provisional: (u32, u32)) -> Self {
        self.flags |= 0x0008;
        self.descriptor = Some(TestDescriptor {
            signature,
            crc32: self.crc32,
            compressed_size: self.compressed_size,
            uncompressed_size: self.uncompressed_size,
        });
        self.crc32 = 0;
        self.compressed_size = provisional.0;
        self.uncompressed_size = provisional.1;
        self
    }

    pub fn with_crc(mut self, crc32: u32) -> Self {
        self.crc32 = crc32;
        self
    }

    pub fn with_sizes(mut self, compressed: u32, uncompressed: u32) -> Self {
        self.compressed_size = compressed;
        self.uncompressed_size = uncompressed;
        self
    }

    pub fn with_flags(mut self, flags: u16) -> Self {
        self.flags |= flags;
        self
    }

    /// Append one `(id, payload)` record to the central extra block.
    pub fn with_extra(mut self, id: u16, payload: &[u8]) -> Self {
        self.central_extra.extend_from_slice(&id.to_le_bytes());
        self.central_extra
            .extend_from_slice(&(payload.len() as u16).to_le_bytes());
        self.central_extra.extend_from_slice(payload);
        self
    }

    /// Declare the uncompressed size through a zip64 extra field.
    pub fn with_zip64_uncompressed(self, size: u64) -> Self {
        let compressed = self.compressed_size;
        self.with_sizes(compressed, u32::MAX)
            .with_extra(0x0001, &size.to_le_bytes())
    }
}

/// Builds a single-disk archive from [`TestEntry`] values.
#[derive(Debug, Default)]
pub struct ZipBuilder {
    entries: Vec<TestEntry>,
    comment: Vec<u8>,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(mut self, entry: TestEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut central = Vec::new();

        for entry in &self.entries {
            let local_offset = out.len() as u32;

            put_u32(&mut out, 0x0403_4b50);
            put_u16(&mut out, 20);
            put_u16(&mut out, entry.flags);
            put_u16(&mut out, entry.method);
            put_u16(&mut out, DOS_TIME);
            put_u16(&mut out, DOS_DATE);
            put_u32(&mut out, entry.crc32);
            put_u32(&mut out, entry.compressed_size);
            put_u32(&mut out, entry.uncompressed_size);
            put_u16(&mut out, entry.name.len() as u16);
            put_u16(&mut out, 0);
            out.extend_from_slice(&entry.name);
            out.extend_from_slice(&entry.payload);

            if let Some(descriptor) = &entry.descriptor {
                if descriptor.signature {
                    put_u32(&mut out, 0x0807_4b50);
                }
                put_u32(&mut out, descriptor.crc32);
                put_u32(&mut out, descriptor.compressed_size);
                put_u32(&mut out, descriptor.uncompressed_size);
            }

            put_u32(&mut central, 0x0201_4b50);
            put_u16(&mut central, 0x0314);
            put_u16(&mut central, 20);
            put_u16(&mut central, entry.flags);
            put_u16(&mut central, entry.method);
            put_u16(&mut central, DOS_TIME);
            put_u16(&mut central, DOS_DATE);
            put_u32(&mut central, entry.crc32);
            put_u32(&mut central, entry.compressed_size);
            put_u32(&mut central, entry.uncompressed_size);
            put_u16(&mut central, entry.name.len() as u16);
            put_u16(&mut central, entry.central_extra.len() as u16);
            put_u16(&mut central, 0);
            put_u16(&mut central, 0);
            put_u16(&mut central, 0);
            put_u32(&mut central, entry.external_attributes);
            put_u32(&mut central, local_offset);
            central.extend_from_slice(&entry.name);
            central.extend_from_slice(&entry.central_extra);
        }

        let directory_offset = out.len() as u32;
        out.extend_from_slice(&central);

        put_u32(&mut out, 0x0605_4b50);
        put_u16(&mut out, 0);
        put_u16(&mut out, 0);
        put_u16(&mut out, self.entries.len() as u16);
        put_u16(&mut out, self.entries.len() as u16);
        put_u32(&mut out, central.len() as u32);
        put_u32(&mut out, directory_offset);
        put_u16(&mut out, self.comment.len() as u16);
        out.extend_from_slice(&self.comment);
        out
    }
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}
