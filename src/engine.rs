//! Memory-bounded chunked conversion.
//!
//! Reads the input in fixed-size row batches and hands each one to the
//! writer for the requested format before reading the next. One batch of
//! lookahead is kept so the final (and single-chunk) cases are known without
//! materializing the whole batch sequence.

use std::io::Read;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::dialect::DialectConfig;
use crate::error::{ConvertError, Result};
use crate::format::OutputFormat;
use crate::reader::RowBatchIter;
use crate::resource::CHUNK_SIZE;
use crate::table::RowBatch;
use crate::writers::{self, TableStoreWriter, WriteError};

/// Identity of one chunk within a conversion.
///
/// Created when the chunk is read, consumed by the matching writer, and
/// discarded with its batch before the next chunk is read. Chunks are never
/// buffered en masse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkDescriptor {
    /// 1-based position of the chunk in the input.
    pub sequence_number: usize,
    /// Whether this is the last chunk of the input.
    pub is_final: bool,
}

impl ChunkDescriptor {
    /// Whether the whole input fits in this single chunk.
    pub fn is_only_chunk(&self) -> bool {
        self.sequence_number == 1 && self.is_final
    }
}

/// Sequential chunk extraction and dispatch.
#[derive(Debug, Clone)]
pub struct ChunkedEngine {
    chunk_size: usize,
}

impl Default for ChunkedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkedEngine {
    /// Engine with the standard chunk size.
    pub fn new() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
        }
    }

    /// Engine with a custom chunk size. The boundary is purely row-count
    /// based, independent of byte size.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self { chunk_size }
    }

    /// Convert the stream read from `source` under `dialect` into `output`,
    /// one batch at a time.
    ///
    /// `reclaim` is invoked after every flushed batch so peak resident
    /// memory stays bounded regardless of allocator behavior. Returns the
    /// primary output path, or `None` when the input held no rows. A failed
    /// batch aborts the conversion; batches already flushed are not rolled
    /// back.
    pub fn run<F>(
        &self,
        source: &Path,
        input: Box<dyn Read>,
        dialect: &DialectConfig,
        output: &Path,
        format: OutputFormat,
        mut reclaim: F,
    ) -> Result<Option<PathBuf>>
    where
        F: FnMut(),
    {
        if !format.chunk_capable() {
            return Err(ConvertError::UnsupportedFormat(format!(
                "{format} does not support chunked conversion"
            )));
        }

        let mut iter = RowBatchIter::new(input, dialect, self.chunk_size)
            .map_err(|e| e.into_convert(source))?;

        let mut pending = iter.next_batch().map_err(|e| e.into_convert(source))?;
        if pending.is_none() {
            warn!("{} produced no rows, skipping", source.display());
            return Ok(None);
        }

        let mut store = match format {
            OutputFormat::TableStore => Some(TableStoreWriter::new(output)),
            _ => None,
        };

        let mut sequence = 0usize;
        while let Some(batch) = pending.take() {
            pending = iter.next_batch().map_err(|e| e.into_convert(source))?;
            sequence += 1;
            let chunk = ChunkDescriptor {
                sequence_number: sequence,
                is_final: pending.is_none(),
            };

            debug!(
                "writing chunk {} ({} rows, final={}) as {format}",
                chunk.sequence_number,
                batch.num_rows(),
                chunk.is_final
            );

            self.write_chunk(&batch, chunk, output, format, store.as_mut())
                .map_err(|source| ConvertError::WriteFailure {
                    format,
                    path: output.to_path_buf(),
                    source,
                })?;

            // Release the batch before the next one is read.
            drop(batch);
            reclaim();
        }

        if let Some(store) = store {
            store.finish().map_err(|source| ConvertError::WriteFailure {
                format,
                path: output.to_path_buf(),
                source,
            })?;
        }

        info!("chunked conversion finished: {} chunks -> {}", sequence, output.display());
        Ok(Some(output.to_path_buf()))
    }

    fn write_chunk(
        &self,
        batch: &RowBatch,
        chunk: ChunkDescriptor,
        output: &Path,
        format: OutputFormat,
        store: Option<&mut TableStoreWriter>,
    ) -> std::result::Result<(), WriteError> {
        match format {
            // No append semantics: each chunk becomes a sibling file unless
            // the input fits in one chunk.
            OutputFormat::Parquet => {
                let target = if chunk.is_only_chunk() {
                    output.to_path_buf()
                } else {
                    sibling_chunk_path(output, chunk.sequence_number)
                };
                writers::write_parquet(batch, &target)
            }
            OutputFormat::TableStore => match store {
                Some(store) => store.append(batch),
                None => unreachable!("table store writer is created before the chunk loop"),
            },
            OutputFormat::JsonLines => writers::append_json_lines(batch, output),
            OutputFormat::Feather | OutputFormat::Native => {
                unreachable!("non-chunkable formats are rejected before the chunk loop")
            }
        }
    }
}

/// Sibling output path for one chunk of a format without append semantics.
pub(crate) fn sibling_chunk_path(output: &Path, sequence_number: usize) -> PathBuf {
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let name = match output.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}_chunk{sequence_number}.{ext}"),
        None => format!("{stem}_chunk{sequence_number}"),
    };
    output.with_file_name(name)
}
