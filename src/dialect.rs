use std::fmt;
use std::path::Path;

use crate::encoding::TextEncoding;

/// Delimiters considered by detection and by the single-column fallback.
pub const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];

/// The full parsing dialect of a delimited text file.
///
/// Produced once per input file by the detector and immutable thereafter. A
/// failed read may supersede it wholesale with a fallback config; individual
/// fields are never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialectConfig {
    /// Character encoding of the file content.
    pub encoding: TextEncoding,
    /// Field delimiter, one of [`DELIMITER_CANDIDATES`].
    pub delimiter: u8,
    /// Quote character, if any quoting convention was detected.
    pub quote_char: Option<u8>,
    /// Escape character. Mutually exclusive with `doublequote`.
    pub escape_char: Option<u8>,
    /// Whether quotes inside quoted fields are escaped by doubling.
    pub doublequote: bool,
    /// Line ending style.
    pub line_terminator: LineTerminator,
    /// Compression wrapper around the file.
    pub compression: Compression,
}

impl Default for DialectConfig {
    fn default() -> Self {
        Self {
            encoding: TextEncoding::Utf8,
            delimiter: b',',
            quote_char: None,
            escape_char: None,
            doublequote: false,
            line_terminator: LineTerminator::Lf,
            compression: Compression::None,
        }
    }
}

impl DialectConfig {
    /// Copy of this config with a different delimiter. Used by the
    /// single-column fallback, which supersedes the config wholesale.
    pub fn with_delimiter(&self, delimiter: u8) -> Self {
        Self {
            delimiter,
            ..self.clone()
        }
    }

    /// Copy of this config with a different encoding.
    pub fn with_encoding(&self, encoding: TextEncoding) -> Self {
        Self {
            encoding,
            ..self.clone()
        }
    }
}

/// Line ending style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineTerminator {
    /// Unix-style line ending (`\n`).
    #[default]
    Lf,
    /// Windows-style line ending (`\r\n`).
    CrLf,
}

impl fmt::Display for LineTerminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineTerminator::Lf => write!(f, "\\n"),
            LineTerminator::CrLf => write!(f, "\\r\\n"),
        }
    }
}

/// Compression wrapper around the input file, determined by extension only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Plain file.
    #[default]
    None,
    /// gzip-wrapped.
    Gz,
    /// zip archive; only the first entry is read.
    Zip,
}

impl Compression {
    /// Detect the wrapper from the path extension. No content sniffing.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("gz") => Compression::Gz,
            Some("zip") => Compression::Zip,
            _ => Compression::None,
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Gz => write!(f, "gz"),
            Compression::Zip => write!(f, "zip"),
        }
    }
}
