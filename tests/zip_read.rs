mod common;

use std::any::Any;
use std::sync::Arc;

use common::{TestEntry, ZipBuilder};
use proptest::prelude::*;
use unpackr::zip::ExtraField;
use unpackr::{
    ArchiveConfig, CompressionMethod, EntryType, Error, ErrorKind, ZipExtractor, list_entries,
    list_entries_with, read_entry, read_entry_with,
};

const TEXT: &[u8] = b"Lorem ipsum dolor sit amet, consectetur adipiscing elit. ";

fn text(repeat: usize) -> Vec<u8> {
    TEXT.repeat(repeat)
}

#[test]
fn stored_entry_round_trips() {
    let data = ZipBuilder::new()
        .entry(TestEntry::stored("hello.txt", b"Hello, World!\n"))
        .build();

    let entries = list_entries(&data).unwrap();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.name, "hello.txt");
    assert_eq!(entry.compression_method, CompressionMethod::Stored);
    assert_eq!(entry.entry_type, EntryType::File);
    assert_eq!(entry.mod_date(), (2024, 3, 15));
    assert_eq!(entry.mod_time(), (10, 30, 0));

    let result = read_entry(&data, entry).unwrap();
    assert_eq!(result.bytes, b"Hello, World!\n");
    assert!(!result.crc_mismatch);
}

#[test]
fn deflate_and_bzip2_entries_decompress() {
    let body = text(200);
    let data = ZipBuilder::new()
        .entry(TestEntry::deflated("a.txt", &body))
        .entry(TestEntry::bzipped("b.txt", &body))
        .build();

    let extractor = ZipExtractor::new(data).unwrap();
    for name in ["a.txt", "b.txt"] {
        let result = extractor.read_by_name(name).unwrap();
        assert_eq!(result.bytes, body, "{name}");
        assert!(!result.crc_mismatch, "{name}");
    }
    assert!(extractor.test().unwrap().is_empty());
}

#[test]
fn lzma_entry_with_declared_size() {
    let body = text(80);
    let data = ZipBuilder::new()
        .entry(TestEntry::lzma("sized.txt", &body, false))
        .entry(TestEntry::stored("after.txt", b"next"))
        .build();

    let entries = list_entries(&data).unwrap();
    assert_eq!(entries[0].compression_method, CompressionMethod::Lzma);

    let result = read_entry(&data, &entries[0]).unwrap();
    assert_eq!(result.bytes, body);
    assert!(!result.crc_mismatch);
    assert_eq!(read_entry(&data, &entries[1]).unwrap().bytes, b"next");
}

#[test]
fn lzma_end_marker_with_data_descriptor() {
    let body = text(80);
    let entry = TestEntry::lzma("streamed.txt", &body, true).with_descriptor(true, (0, 0));
    let compressed_len = entry.payload.len() as u64;
    let data = ZipBuilder::new()
        .entry(entry)
        .entry(TestEntry::deflated("after.txt", &text(3)))
        .build();

    let extractor = ZipExtractor::new(data).unwrap();
    let streamed = extractor.read_by_name("streamed.txt").unwrap();
    assert_eq!(streamed.bytes, body);
    assert!(!streamed.crc_mismatch);
    assert_eq!(streamed.entry.compressed_size, compressed_len);
    assert_eq!(streamed.entry.uncompressed_size, body.len() as u64);

    assert_eq!(extractor.read_by_name("after.txt").unwrap().bytes, text(3));
}

#[test]
fn crc_mismatch_is_reported_not_fatal() {
    let data = ZipBuilder::new()
        .entry(TestEntry::stored("bad.bin", b"payload").with_crc(0xDEAD_BEEF))
        .build();

    let extractor = ZipExtractor::new(data).unwrap();
    let result = extractor.read_by_name("bad.bin").unwrap();
    assert_eq!(result.bytes, b"payload");
    assert!(result.crc_mismatch);
    assert_eq!(extractor.test().unwrap(), vec!["bad.bin".to_string()]);
}

#[test]
fn unknown_method_is_unsupported() {
    let data = ZipBuilder::new()
        .entry(TestEntry::raw("weird.bin", 99, b"????"))
        .build();

    let entries = list_entries(&data).unwrap();
    assert_eq!(entries[0].compression_method, CompressionMethod::Unknown(99));

    let err = read_entry(&data, &entries[0]).unwrap_err();
    assert!(matches!(
        err,
        Error::UnsupportedCompressionMethod(CompressionMethod::Unknown(99))
    ));
    assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);
}

#[test]
fn removed_codec_is_unsupported() {
    let data = ZipBuilder::new()
        .entry(TestEntry::bzipped("b.txt", &text(10)))
        .build();
    let config = ArchiveConfig::new().without_codec(CompressionMethod::Bzip2);

    let entries = list_entries_with(&data, &config).unwrap();
    let err = read_entry_with(&data, &entries[0], &config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);
}

#[test]
fn encrypted_entry_is_unsupported() {
    let data = ZipBuilder::new()
        .entry(TestEntry::stored("secret", b"xxxx").with_flags(0x0001))
        .build();

    let entries = list_entries(&data).unwrap();
    assert!(entries[0].is_encrypted());
    let err = read_entry(&data, &entries[0]).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFeature(_)));
}

#[test]
fn data_descriptor_takes_precedence() {
    let body = text(40);
    for signature in [true, false] {
        let data = ZipBuilder::new()
            .entry(TestEntry::deflated("streamed.txt", &body).with_descriptor(signature, (100, 50)))
            .entry(TestEntry::stored("after.txt", b"next"))
            .build();

        let entries = list_entries(&data).unwrap();
        let entry = &entries[0];
        assert!(entry.has_trailing_descriptor);
        assert_eq!(entry.compressed_size, 100);
        assert_eq!(entry.uncompressed_size, 50);

        let result = read_entry(&data, entry).unwrap();
        assert_eq!(result.bytes, body);
        assert!(!result.crc_mismatch);
        assert_eq!(result.entry.uncompressed_size, body.len() as u64);
        assert_eq!(result.entry.crc32, crc32fast::hash(&body));

        assert_eq!(read_entry(&data, &entries[1]).unwrap().bytes, b"next");
    }
}

#[test]
fn wrong_descriptor_size_is_a_mismatch() {
    let body = text(40);
    let mut entry = TestEntry::deflated("streamed.txt", &body).with_descriptor(true, (0, 0));
    if let Some(descriptor) = entry.descriptor.as_mut() {
        descriptor.compressed_size += 1;
    }
    let data = ZipBuilder::new().entry(entry).build();

    let entries = list_entries(&data).unwrap();
    let err = read_entry(&data, &entries[0]).unwrap_err();
    assert!(matches!(err, Error::SizeMismatch { .. }));
    assert_eq!(err.kind(), ErrorKind::SizeMismatch);
}

#[test]
fn stored_size_disagreement_is_a_mismatch() {
    let data = ZipBuilder::new()
        .entry(TestEntry::stored("odd.bin", b"0123456789").with_sizes(11, 10))
        .build();

    let entries = list_entries(&data).unwrap();
    let err = read_entry(&data, &entries[0]).unwrap_err();
    match err {
        Error::SizeMismatch {
            expected_compressed,
            actual_compressed,
            ..
        } => {
            assert_eq!(expected_compressed, 11);
            assert_eq!(actual_compressed, 10);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn zip64_extra_replaces_sentinel() {
    let body = b"not actually four gigabytes";
    let data = ZipBuilder::new()
        .entry(TestEntry::stored("big.bin", body).with_zip64_uncompressed(body.len() as u64))
        .build();

    let entries = list_entries(&data).unwrap();
    let entry = &entries[0];
    assert!(entry.zip64_present);
    assert_eq!(entry.uncompressed_size, body.len() as u64);
    assert_eq!(entry.compressed_size, body.len() as u64);
    assert!(entry.custom_fields.is_empty());

    assert_eq!(read_entry(&data, entry).unwrap().bytes, body);
}

#[test]
fn directory_order_is_preserved() {
    let data = ZipBuilder::new()
        .entry(TestEntry::stored("zeta.txt", b"z"))
        .entry(TestEntry::directory("alpha/"))
        .entry(TestEntry::stored("alpha/inner.txt", b"a"))
        .entry(TestEntry::stored("beta.txt", b"b"))
        .build();

    let extractor = ZipExtractor::new(data).unwrap();
    let names: Vec<_> = extractor
        .list_files()
        .iter()
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(names, ["zeta.txt", "alpha/", "alpha/inner.txt", "beta.txt"]);
    assert!(extractor.list_files()[1].is_directory());
    assert_eq!(extractor.end_of_directory().entry_count, 4);

    let dir = extractor.read_by_name("alpha/").unwrap();
    assert!(dir.bytes.is_empty());
}

#[test]
fn missing_name_is_not_found() {
    let data = ZipBuilder::new()
        .entry(TestEntry::stored("present.txt", b"1"))
        .build();

    let extractor = ZipExtractor::new(data).unwrap();
    let err = extractor.read_by_name("absent.txt").unwrap_err();
    assert!(matches!(err, Error::EntryNotFound(ref name) if name == "absent.txt"));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn not_a_zip() {
    let err = list_entries(&[0u8; 100]).unwrap_err();
    assert!(matches!(err, Error::DirectoryEndNotFound));

    let err = list_entries(b"PK").unwrap_err();
    assert!(matches!(err, Error::TooSmall { .. }));
}

#[derive(Debug, PartialEq)]
struct Marker {
    payload: Vec<u8>,
}

impl ExtraField for Marker {
    fn id(&self) -> u16 {
        0xCAFE
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn registered_extra_field_is_decoded() {
    let data = ZipBuilder::new()
        .entry(
            TestEntry::stored("tagged.txt", b"x")
                .with_extra(0xCAFE, b"tag")
                .with_extra(0xBEEF, b"raw"),
        )
        .build();

    let config = ArchiveConfig::new().with_extra_field(
        0xCAFE,
        Arc::new(|payload: &[u8]| -> Option<Arc<dyn ExtraField>> {
            Some(Arc::new(Marker {
                payload: payload.to_vec(),
            }))
        }),
    );

    let entries = list_entries_with(&data, &config).unwrap();
    let entry = &entries[0];
    assert_eq!(
        entry.extension::<Marker>(),
        Some(&Marker {
            payload: b"tag".to_vec()
        })
    );
    assert_eq!(entry.custom_fields.get(&0xCAFE).map(Vec::as_slice), Some(&b"tag"[..]));
    assert_eq!(entry.custom_fields.get(&0xBEEF).map(Vec::as_slice), Some(&b"raw"[..]));

    // Without the decoder the raw bytes are still kept.
    let plain = list_entries(&data).unwrap();
    assert!(plain[0].extension::<Marker>().is_none());
    assert_eq!(plain[0].custom_fields.len(), 2);
}

#[test]
fn extended_timestamp_sets_mtime() {
    let mut payload = vec![0x01];
    payload.extend_from_slice(&1_700_000_000u32.to_le_bytes());
    let data = ZipBuilder::new()
        .entry(TestEntry::stored("t.txt", b"t").with_extra(0x5455, &payload))
        .build();

    let entries = list_entries(&data).unwrap();
    assert_eq!(entries[0].mtime, Some(1_700_000_000));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    // Comment bytes stay below b'P' so no end record signature can appear in them.
    #[test]
    fn trailing_comment_does_not_move_the_directory(
        comment in prop::collection::vec(0u8..0x50, 0..=65535)
    ) {
        let builder = ZipBuilder::new()
            .entry(TestEntry::stored("a.txt", b"alpha"))
            .entry(TestEntry::deflated("b.txt", &text(5)));
        let plain = ZipExtractor::new(builder.build()).unwrap();

        let commented = ZipBuilder::new()
            .entry(TestEntry::stored("a.txt", b"alpha"))
            .entry(TestEntry::deflated("b.txt", &text(5)))
            .comment(&comment)
            .build();
        let commented = ZipExtractor::new(commented).unwrap();

        let (a, b) = (plain.end_of_directory(), commented.end_of_directory());
        prop_assert_eq!(a.entry_count, b.entry_count);
        prop_assert_eq!(a.directory_offset, b.directory_offset);
        prop_assert_eq!(a.directory_size, b.directory_size);
        prop_assert_eq!(commented.comment(), &comment[..]);
        prop_assert_eq!(commented.read_by_name("b.txt").unwrap().bytes, text(5));
    }
}

proptest! {
    #[test]
    fn arbitrary_bytes_never_panic(data in prop::collection::vec(any::<u8>(), 0..512)) {
        if let Ok(entries) = list_entries(&data) {
            for entry in &entries {
                let _ = read_entry(&data, entry);
            }
        }
    }
}
