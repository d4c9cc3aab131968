//! The closed set of supported output formats.
//!
//! Each variant carries its write discipline as static data, so an
//! exhaustive match guarantees every format has both a writer and a chunk
//! handling entry.

use std::fmt;
use std::str::FromStr;

use crate::error::ConvertError;

/// A supported output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// Columnar, snappy-compressed (Parquet).
    Parquet,
    /// Columnar, uncompressed (Arrow IPC file).
    Feather,
    /// Appendable table store (Arrow IPC stream).
    TableStore,
    /// Line-delimited JSON records.
    JsonLines,
    /// Native binary serialization of the row model.
    Native,
}

impl OutputFormat {
    /// All supported formats.
    pub const ALL: [OutputFormat; 5] = [
        OutputFormat::Parquet,
        OutputFormat::Feather,
        OutputFormat::TableStore,
        OutputFormat::JsonLines,
        OutputFormat::Native,
    ];

    /// Output file extension.
    pub const fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Parquet => "parquet",
            OutputFormat::Feather => "feather",
            OutputFormat::TableStore => "arrows",
            OutputFormat::JsonLines => "jsonl",
            OutputFormat::Native => "bin",
        }
    }

    /// Whether the on-disk structure permits incrementally adding rows to an
    /// already-started file.
    pub const fn append_capable(&self) -> bool {
        matches!(self, OutputFormat::TableStore | OutputFormat::JsonLines)
    }

    /// Whether the format participates in low-memory chunked conversion.
    /// Non-chunkable formats are always written whole-file.
    pub const fn chunk_capable(&self) -> bool {
        matches!(
            self,
            OutputFormat::Parquet | OutputFormat::TableStore | OutputFormat::JsonLines
        )
    }

    /// Canonical format key, as accepted by [`FromStr`].
    pub const fn key(&self) -> &'static str {
        match self {
            OutputFormat::Parquet => "parquet",
            OutputFormat::Feather => "feather",
            OutputFormat::TableStore => "table-store",
            OutputFormat::JsonLines => "jsonl",
            OutputFormat::Native => "native",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for OutputFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "parquet" => Ok(OutputFormat::Parquet),
            "feather" => Ok(OutputFormat::Feather),
            "table-store" | "arrows" => Ok(OutputFormat::TableStore),
            "jsonl" | "json-lines" | "json" => Ok(OutputFormat::JsonLines),
            "native" | "bin" => Ok(OutputFormat::Native),
            other => Err(ConvertError::UnsupportedFormat(other.to_string())),
        }
    }
}
