//! Dialect-driven CSV reading through the detected compression wrapper.
//!
//! Fields are decoded strictly under the dialect's encoding; a decode
//! failure is reported as [`ReadError::Decode`] so the orchestrator can run
//! the encoding fallback cascade. UTF-16 input is transcoded wholesale up
//! front, since its byte stream cannot be split into fields first.

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

use csv::{ByteRecord, ReaderBuilder, Terminator};
use flate2::read::GzDecoder;
use log::debug;
use thiserror::Error;

use crate::dialect::{Compression, DialectConfig, LineTerminator};
use crate::encoding::TextEncoding;
use crate::error::ConvertError;
use crate::table::{Cell, RowBatch};

/// Error type for the read path.
#[derive(Error, Debug)]
pub enum ReadError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error.
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// Zip archive error.
    #[error("zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The input is not valid under the dialect's encoding. Triggers the
    /// encoding fallback cascade.
    #[error("input is not valid {0}")]
    Decode(&'static str),
}

impl ReadError {
    /// Convert into the public error type, attaching the input path where
    /// the variant needs it.
    pub(crate) fn into_convert(self, path: &Path) -> ConvertError {
        match self {
            ReadError::Io(e) => ConvertError::Io(e),
            ReadError::Csv(e) => ConvertError::Csv(e),
            ReadError::Zip(e) => ConvertError::Zip(e),
            ReadError::Decode(_) => ConvertError::UnreadableEncoding(path.to_path_buf()),
        }
    }
}

/// Open the raw byte stream behind the compression wrapper.
///
/// For zip archives only the first entry is read; additional entries are
/// ignored by design.
pub fn open_input(path: &Path, compression: Compression) -> Result<Box<dyn Read>, ReadError> {
    match compression {
        Compression::None => Ok(Box::new(File::open(path)?)),
        Compression::Gz => Ok(Box::new(GzDecoder::new(File::open(path)?))),
        Compression::Zip => {
            let mut archive = zip::ZipArchive::new(File::open(path)?)?;
            if archive.is_empty() {
                return Ok(Box::new(Cursor::new(Vec::new())));
            }
            let mut entry = archive.by_index(0)?;
            debug!("reading first zip entry: {}", entry.name());
            let mut content = Vec::new();
            entry.read_to_end(&mut content)?;
            Ok(Box::new(Cursor::new(content)))
        }
    }
}

/// Sequential reader of fixed-size row batches under a dialect.
pub struct RowBatchIter {
    reader: csv::Reader<Box<dyn Read>>,
    headers: Vec<String>,
    encoding: TextEncoding,
    chunk_size: usize,
    done: bool,
}

impl RowBatchIter {
    /// Build a batch iterator over an open input stream.
    ///
    /// The header row is consumed eagerly; an input with no rows at all
    /// yields an empty header and no batches.
    pub fn new(
        input: Box<dyn Read>,
        dialect: &DialectConfig,
        chunk_size: usize,
    ) -> Result<Self, ReadError> {
        let (input, encoding) = if dialect.encoding.requires_full_decode() {
            let mut raw = Vec::new();
            let mut input = input;
            input.read_to_end(&mut raw)?;
            let text = dialect
                .encoding
                .decode_all(&raw)
                .ok_or(ReadError::Decode(dialect.encoding.label()))?;
            let cursor: Box<dyn Read> = Box::new(Cursor::new(text.into_bytes()));
            (cursor, TextEncoding::Utf8)
        } else {
            (input, dialect.encoding)
        };

        let mut builder = ReaderBuilder::new();
        builder
            .delimiter(dialect.delimiter)
            .has_headers(false)
            .double_quote(dialect.doublequote)
            .escape(dialect.escape_char)
            .terminator(match dialect.line_terminator {
                LineTerminator::CrLf => Terminator::CRLF,
                LineTerminator::Lf => Terminator::Any(b'\n'),
            });
        match dialect.quote_char {
            Some(q) => {
                builder.quote(q);
            }
            None => {
                builder.quoting(false);
            }
        }

        let mut reader = builder.from_reader(input);

        let mut header_record = ByteRecord::new();
        let headers = if reader.read_byte_record(&mut header_record)? {
            decode_fields(&header_record, encoding)?
        } else {
            Vec::new()
        };

        Ok(Self {
            reader,
            headers,
            encoding,
            chunk_size,
            done: false,
        })
    }

    /// Column names from the header row.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Read the next batch of up to `chunk_size` rows. Returns `None` when
    /// the input is exhausted.
    pub fn next_batch(&mut self) -> Result<Option<RowBatch>, ReadError> {
        if self.done {
            return Ok(None);
        }

        let mut rows = Vec::new();
        let mut record = ByteRecord::new();
        while rows.len() < self.chunk_size {
            if !self.reader.read_byte_record(&mut record)? {
                self.done = true;
                break;
            }
            let fields = decode_fields(&record, self.encoding)?;
            rows.push(fields.iter().map(|f| Cell::parse(f)).collect());
        }

        if rows.is_empty() {
            self.done = true;
            return Ok(None);
        }

        Ok(Some(RowBatch {
            columns: self.headers.clone(),
            rows,
        }))
    }
}

fn decode_fields(record: &ByteRecord, encoding: TextEncoding) -> Result<Vec<String>, ReadError> {
    record
        .iter()
        .map(|field| {
            encoding
                .decode_field(field)
                .map(|s| s.into_owned())
                .ok_or(ReadError::Decode(encoding.label()))
        })
        .collect()
}

/// Parse the whole input in one pass.
pub fn read_all(path: &Path, dialect: &DialectConfig) -> Result<RowBatch, ReadError> {
    let input = open_input(path, dialect.compression)?;
    let mut iter = RowBatchIter::new(input, dialect, usize::MAX)?;
    let headers = iter.headers().to_vec();
    match iter.next_batch()? {
        Some(batch) => Ok(batch),
        None => Ok(RowBatch::new(headers)),
    }
}
