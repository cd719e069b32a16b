//! Main entry point for the unpackr CLI application.
//!
//! Loads an archive from the local filesystem or an HTTP URL, then lists,
//! tests or extracts its entries.

use anyhow::{Result, bail};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use unpackr::io::{self, HttpSource, LocalFile};
use unpackr::{ArchiveConfig, Cli, EntryDescriptor, LocalStorage, ZipExtractor};

/// Application entry point.
///
/// Parses command-line arguments, loads the archive and dispatches to the
/// requested mode.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let config = Arc::new(ArchiveConfig::default());

    let extractor = if io::is_http_url(&cli.file) {
        let source = HttpSource::new(cli.file.clone()).await?;
        let extractor = ZipExtractor::open(&source, config).await?;

        // Display network transfer statistics for HTTP sources
        if !cli.is_quiet() {
            eprintln!(
                "Total bytes transferred: {}",
                format_size(source.transferred_bytes())
            );
        }
        extractor
    } else {
        ZipExtractor::open(&LocalFile::new(&cli.file), config).await?
    };

    process_zip(&extractor, &cli).await
}

/// Process a ZIP archive based on CLI options.
///
/// - List mode (`-l` or `-v`): Display archive contents
/// - Test mode (`-t`): Decompress everything and check sizes and CRCs
/// - Extract mode: Extract files matching the specified filters
async fn process_zip(extractor: &ZipExtractor, cli: &Cli) -> Result<()> {
    if cli.list || cli.verbose {
        list_files(extractor, cli.verbose);
        return Ok(());
    }

    let selected: Vec<EntryDescriptor> = extractor
        .list_files()
        .iter()
        .filter(|e| is_selected(e, cli))
        .cloned()
        .collect();

    if cli.test {
        return test_files(extractor, &selected, cli);
    }

    if cli.pipe {
        return pipe_files(extractor, &selected).await;
    }

    let dest = cli
        .extract_dir
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    if !cli.is_quiet() {
        for entry in selected.iter().filter(|e| !e.is_directory()) {
            println!("  extracting: {}", entry.name);
        }
    }

    let summary =
        unpackr::zip::extract_entries(&extractor.parser(), &selected, &dest, &LocalStorage).await?;

    if !summary.crc_mismatches.is_empty() {
        bail!(
            "{} file(s) failed the CRC check: {}",
            summary.crc_mismatches.len(),
            summary.crc_mismatches.join(", ")
        );
    }

    Ok(())
}

/// Apply the positional filters and `-x` exclusions.
///
/// Directory entries are kept only when no positional filter is given, so
/// that empty directories still get created on a full extraction.
fn is_selected(e: &EntryDescriptor, cli: &Cli) -> bool {
    if !cli.files.is_empty() {
        if e.is_directory() {
            return false;
        }
        let matches = cli.files.iter().any(|f| {
            if has_glob_chars(f) {
                // Pattern contains wildcards: use glob matching
                glob_match(f, &e.name)
            } else {
                // No wildcards: exact match on filename or full path
                let basename = Path::new(&e.name)
                    .file_name()
                    .map(|s| s.to_string_lossy())
                    .unwrap_or_default();
                e.name == *f || basename == *f
            }
        });
        if !matches {
            return false;
        }
    }

    !cli
        .exclude
        .iter()
        .any(|x| e.name.contains(x) || glob_match(x, &e.name))
}

/// List files in the ZIP archive.
///
/// Supports two output formats:
/// - Simple format (`-l`): Just file names, one per line
/// - Verbose format (`-v`): Detailed table with size, method, ratio, timestamps and CRC
fn list_files(extractor: &ZipExtractor, verbose: bool) {
    let entries = extractor.list_files();

    if verbose {
        println!(
            "{:>10}  {:>7}  {:>10}  {:>5}  {:>10}  {:>5}  {:>8}  Name",
            "Length", "Method", "Size", "Cmpr", "Date", "Time", "CRC-32"
        );
        println!("{}", "-".repeat(86));
    }

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in entries {
        if !verbose {
            println!("{}", entry.name);
            continue;
        }

        let (year, month, day) = entry.mod_date();
        let (hour, minute, _second) = entry.mod_time();

        println!(
            "{:>10}  {:>7}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {:08x}  {}",
            entry.uncompressed_size,
            entry.compression_method.to_string(),
            entry.compressed_size,
            ratio(entry.compressed_size, entry.uncompressed_size),
            year,
            month,
            day,
            hour,
            minute,
            entry.crc32,
            entry.name
        );

        if !entry.is_directory() {
            total_uncompressed += entry.uncompressed_size;
            total_compressed += entry.compressed_size;
            file_count += 1;
        }
    }

    if verbose {
        println!("{}", "-".repeat(86));
        println!(
            "{:>10}  {:>7}  {:>10}  {}  {:>30}  {} files",
            total_uncompressed,
            "",
            total_compressed,
            ratio(total_compressed, total_uncompressed),
            "",
            file_count
        );
        let comment = extractor.comment();
        if !comment.is_empty() {
            println!("{}", String::from_utf8_lossy(comment));
        }
    }
}

/// Compression ratio as percentage saved.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 && compressed <= uncompressed {
        format!("{:>4}%", 100 - (compressed * 100 / uncompressed))
    } else {
        "  0%".to_string()
    }
}

/// Decompress every selected file and report its status.
fn test_files(extractor: &ZipExtractor, entries: &[EntryDescriptor], cli: &Cli) -> Result<()> {
    let mut failures = 0usize;
    for entry in entries.iter().filter(|e| !e.is_directory()) {
        let status = match extractor.read_entry(entry) {
            Ok(result) if result.crc_mismatch => "bad CRC".to_string(),
            Ok(_) => "OK".to_string(),
            Err(e) => e.to_string(),
        };
        if status != "OK" {
            failures += 1;
        }
        if !cli.is_very_quiet() && (status != "OK" || !cli.is_quiet()) {
            println!("    testing: {:<40} {}", entry.name, status);
        }
    }

    if failures > 0 {
        bail!("{} file(s) failed the integrity test", failures);
    }
    if !cli.is_very_quiet() {
        println!("No errors detected in {}", cli.file);
    }
    Ok(())
}

/// Write selected files to stdout, with a marker line per file when several match.
async fn pipe_files(extractor: &ZipExtractor, entries: &[EntryDescriptor]) -> Result<()> {
    use tokio::io::AsyncWriteExt;

    let files: Vec<_> = entries.iter().filter(|e| !e.is_directory()).collect();
    let mut stdout = tokio::io::stdout();
    for entry in &files {
        if files.len() > 1 {
            stdout
                .write_all(format!("--- {} ---\n", entry.name).as_bytes())
                .await?;
        }
        let result = extractor.read_entry(entry)?;
        if result.crc_mismatch {
            log::warn!("CRC mismatch in {}", entry.name);
        }
        stdout.write_all(&result.bytes).await?;
    }
    stdout.flush().await?;
    Ok(())
}

/// Check if a pattern contains glob wildcard characters.
fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Simple glob pattern matching supporting `*` and `?` wildcards.
///
/// - `*` matches zero or more characters
/// - `?` matches exactly one character
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();

    fn do_match(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            (Some('*'), _) => {
                do_match(&pattern[1..], text) || (!text.is_empty() && do_match(pattern, &text[1..]))
            }
            (Some('?'), Some(_)) => do_match(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) if *p == *t => do_match(&pattern[1..], &text[1..]),
            _ => false,
        }
    }

    do_match(&pattern_chars, &text_chars)
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}

/// Minimal stderr backend for the `log` facade.
struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(level: log::LevelFilter) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}
