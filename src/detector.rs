//! Automatic detection of the parsing dialect of a delimited text file.
//!
//! Every detection step is a heuristic over a leading sample of the file and
//! recovers locally by defaulting; only an unresolvable input path surfaces
//! an error. Wrong guesses are corrected downstream by the read-path
//! fallback cascade, not here.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use log::{debug, info, warn};

use crate::dialect::{Compression, DialectConfig, LineTerminator, DELIMITER_CANDIDATES};
use crate::encoding::{self, TextEncoding};
use crate::error::{ConvertError, Result};

/// Leading bytes sampled for encoding detection.
const ENCODING_SAMPLE_BYTES: usize = 10_000;
/// Leading lines sampled for delimiter counting on plain input.
const DELIMITER_SAMPLE_LINES: usize = 5;
/// Raw bytes read to cover the delimiter sample lines.
const DELIMITER_SAMPLE_BYTES: usize = 64 * 1024;
/// Decompressed bytes sampled for delimiter counting on wrapped input.
const WRAPPED_SAMPLE_BYTES: usize = 1000;
/// Raw bytes inspected for the line-terminator check.
const TERMINATOR_SAMPLE_BYTES: usize = 1000;

/// Dialect detector.
///
/// # Example
///
/// ```no_run
/// use csv_forge::DialectDetector;
///
/// let detector = DialectDetector::new();
/// let dialect = detector.detect("data.csv".as_ref()).unwrap();
/// println!("delimiter: {}", dialect.delimiter as char);
/// println!("encoding: {}", dialect.encoding.label());
/// ```
#[derive(Debug, Clone, Default)]
pub struct DialectDetector {
    forced_delimiter: Option<u8>,
    forced_encoding: Option<TextEncoding>,
}

impl DialectDetector {
    /// Create a new detector with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a specific delimiter (skip delimiter detection).
    pub fn delimiter(&mut self, delimiter: u8) -> &mut Self {
        self.forced_delimiter = Some(delimiter);
        self
    }

    /// Force a specific encoding (skip encoding detection).
    pub fn encoding(&mut self, encoding: TextEncoding) -> &mut Self {
        self.forced_encoding = Some(encoding);
        self
    }

    /// Detect the full dialect of the file at `path`.
    ///
    /// Fails with [`ConvertError::NotFound`] if the path does not resolve to
    /// a readable file; every other failure defaults locally.
    pub fn detect(&self, path: &Path) -> Result<DialectConfig> {
        if !path.is_file() {
            return Err(ConvertError::NotFound(path.to_path_buf()));
        }

        info!("detecting dialect of {}", path.display());

        let compression = Compression::from_path(path);

        let encoding = match self.forced_encoding {
            Some(enc) => enc,
            None => detect_encoding(path),
        };

        let delimiter = match self.forced_delimiter {
            Some(d) => d,
            None => match compression {
                Compression::None => detect_delimiter_plain(path, encoding),
                Compression::Gz => detect_delimiter_gz(path, encoding),
                Compression::Zip => detect_delimiter_zip(path, encoding),
            },
        };

        let (quote_char, escape_char, doublequote) = detect_quoting(path, encoding);
        let line_terminator = detect_line_terminator(path);

        let config = DialectConfig {
            encoding,
            delimiter,
            quote_char,
            escape_char,
            doublequote,
            line_terminator,
            compression,
        };

        info!(
            "detected dialect for {}: encoding={} delimiter={:?} quote={:?} doublequote={} terminator={} compression={}",
            path.display(),
            config.encoding.label(),
            config.delimiter as char,
            config.quote_char.map(|q| q as char),
            config.doublequote,
            config.line_terminator,
            config.compression,
        );

        Ok(config)
    }
}

/// Detect the encoding from a leading byte sample. Defaults to UTF-8 on any
/// unexpected failure.
fn detect_encoding(path: &Path) -> TextEncoding {
    match read_leading_bytes(path, ENCODING_SAMPLE_BYTES) {
        Ok(sample) => {
            let detected = encoding::classify(&sample);
            debug!("detected encoding: {}", detected.label());
            detected
        }
        Err(err) => {
            warn!("encoding detection failed, defaulting to UTF-8: {err}");
            TextEncoding::Utf8
        }
    }
}

/// Count candidate delimiters over the first lines of a plain file and pick
/// the most frequent. Zero occurrences of everything defaults to comma.
///
/// This counts delimiters inside quoted text like real separators; that
/// trade-off is corrected downstream by the single-column retry.
fn detect_delimiter_plain(path: &Path, encoding: TextEncoding) -> u8 {
    let sample = match read_leading_bytes(path, DELIMITER_SAMPLE_BYTES) {
        Ok(sample) => sample,
        Err(err) => {
            warn!("delimiter detection failed, defaulting to comma: {err}");
            return b',';
        }
    };

    let text = encoding.decode_lossy(&sample);
    let lines: Vec<&str> = text.lines().take(DELIMITER_SAMPLE_LINES).collect();
    pick_delimiter(&lines)
}

/// Delimiter counting over the first decompressed bytes of a gzip stream.
fn detect_delimiter_gz(path: &Path, encoding: TextEncoding) -> u8 {
    let sample = File::open(path)
        .map(GzDecoder::new)
        .and_then(|mut reader| read_leading(&mut reader, WRAPPED_SAMPLE_BYTES));

    match sample {
        Ok(sample) => {
            let text = encoding.decode_lossy(&sample);
            pick_delimiter(&[text.as_ref()])
        }
        Err(err) => {
            warn!("delimiter detection on gzip input failed, defaulting to comma: {err}");
            b','
        }
    }
}

/// Delimiter counting over the first bytes of the first zip entry.
fn detect_delimiter_zip(path: &Path, encoding: TextEncoding) -> u8 {
    let sample = File::open(path)
        .map_err(|e| e.to_string())
        .and_then(|file| zip::ZipArchive::new(file).map_err(|e| e.to_string()))
        .and_then(|mut archive| {
            if archive.is_empty() {
                return Err("empty archive".to_string());
            }
            let mut entry = archive.by_index(0).map_err(|e| e.to_string())?;
            read_leading(&mut entry, WRAPPED_SAMPLE_BYTES).map_err(|e| e.to_string())
        });

    match sample {
        Ok(sample) => {
            let text = encoding.decode_lossy(&sample);
            pick_delimiter(&[text.as_ref()])
        }
        Err(err) => {
            warn!("delimiter detection on zip input failed, defaulting to comma: {err}");
            b','
        }
    }
}

fn pick_delimiter(lines: &[&str]) -> u8 {
    let mut counts = [0usize; DELIMITER_CANDIDATES.len()];
    for line in lines {
        for (i, &delim) in DELIMITER_CANDIDATES.iter().enumerate() {
            counts[i] += line.bytes().filter(|&b| b == delim).count();
        }
    }

    // Ties keep the earliest candidate.
    let mut best = 0usize;
    for (i, &count) in counts.iter().enumerate().skip(1) {
        if count > counts[best] {
            best = i;
        }
    }

    let detected = if counts[best] == 0 {
        b','
    } else {
        DELIMITER_CANDIDATES[best]
    };
    debug!("detected delimiter: {:?}", detected as char);
    detected
}

/// Detect the quoting convention from the first two lines.
///
/// Any double quote selects double-quote with the doubling convention,
/// unconditionally; an escape character is never inferred from content. Any
/// failure yields "no quoting".
fn detect_quoting(path: &Path, encoding: TextEncoding) -> (Option<u8>, Option<u8>, bool) {
    let sample = match read_leading_bytes(path, DELIMITER_SAMPLE_BYTES) {
        Ok(sample) => sample,
        Err(_) => return (None, None, false),
    };

    let text = encoding.decode_lossy(&sample);
    let mut lines = text.lines();
    let first = lines.next().unwrap_or("");
    let second = lines.next().unwrap_or("");

    let double_quotes = first.matches('"').count() + second.matches('"').count();
    let single_quotes = first.matches('\'').count();

    if double_quotes > 0 {
        (Some(b'"'), None, true)
    } else if single_quotes > 0 {
        (Some(b'\''), None, false)
    } else {
        (None, None, false)
    }
}

/// CRLF anywhere in the first raw bytes selects CRLF; everything else,
/// including failure, yields LF.
fn detect_line_terminator(path: &Path) -> LineTerminator {
    match read_leading_bytes(path, TERMINATOR_SAMPLE_BYTES) {
        Ok(sample) => {
            if sample.windows(2).any(|w| w == b"\r\n") {
                LineTerminator::CrLf
            } else {
                LineTerminator::Lf
            }
        }
        Err(_) => LineTerminator::Lf,
    }
}

fn read_leading_bytes(path: &Path, limit: usize) -> std::io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    read_leading(&mut file, limit)
}

fn read_leading<R: Read>(reader: &mut R, limit: usize) -> std::io::Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(limit);
    reader.take(limit as u64).read_to_end(&mut buffer)?;
    Ok(buffer)
}
