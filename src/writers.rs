//! Format writers.
//!
//! Columnar formats go through Arrow: a [`RowBatch`] is unified into typed
//! columns (Int64/Float64/Boolean/Utf8, nulls for empty cells) and written
//! with the `parquet` / `arrow` IPC writers. Record-oriented formats
//! serialize rows directly.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::ipc::writer::{FileWriter, StreamWriter};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression as ParquetCompression;
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use thiserror::Error;

use crate::format::OutputFormat;
use crate::table::{Cell, RowBatch};

/// Errors that can occur while writing output.
#[derive(Error, Debug)]
pub enum WriteError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow conversion or IPC error.
    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Parquet encoding error.
    #[error("parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Native serialization error.
    #[error("native serialization error: {0}")]
    Native(#[from] bincode::Error),
}

/// Unified type of one column, derived from its cell kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Int,
    Float,
    Bool,
    Text,
}

fn column_kind(batch: &RowBatch, col: usize) -> ColumnKind {
    let mut seen_int = false;
    let mut seen_float = false;
    let mut seen_bool = false;

    for row in &batch.rows {
        match &row[col] {
            Cell::Null => {}
            Cell::Int(_) => seen_int = true,
            Cell::Float(_) => seen_float = true,
            Cell::Bool(_) => seen_bool = true,
            Cell::Text(_) => return ColumnKind::Text,
        }
    }

    match (seen_bool, seen_int, seen_float) {
        (true, false, false) => ColumnKind::Bool,
        (false, true, false) => ColumnKind::Int,
        (false, _, true) => ColumnKind::Float,
        _ => ColumnKind::Text,
    }
}

/// Convert a row batch into an Arrow record batch with unified column types.
pub(crate) fn to_record_batch(batch: &RowBatch) -> Result<RecordBatch, ArrowError> {
    let mut fields = Vec::with_capacity(batch.num_columns());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(batch.num_columns());

    for (col, name) in batch.columns.iter().enumerate() {
        let kind = column_kind(batch, col);
        let (data_type, array): (DataType, ArrayRef) = match kind {
            ColumnKind::Int => {
                let mut builder = Int64Builder::with_capacity(batch.num_rows());
                for row in &batch.rows {
                    match &row[col] {
                        Cell::Int(i) => builder.append_value(*i),
                        _ => builder.append_null(),
                    }
                }
                (DataType::Int64, Arc::new(builder.finish()))
            }
            ColumnKind::Float => {
                let mut builder = Float64Builder::with_capacity(batch.num_rows());
                for row in &batch.rows {
                    match &row[col] {
                        Cell::Int(i) => builder.append_value(*i as f64),
                        Cell::Float(f) => builder.append_value(*f),
                        _ => builder.append_null(),
                    }
                }
                (DataType::Float64, Arc::new(builder.finish()))
            }
            ColumnKind::Bool => {
                let mut builder = BooleanBuilder::with_capacity(batch.num_rows());
                for row in &batch.rows {
                    match &row[col] {
                        Cell::Bool(b) => builder.append_value(*b),
                        _ => builder.append_null(),
                    }
                }
                (DataType::Boolean, Arc::new(builder.finish()))
            }
            ColumnKind::Text => {
                let mut builder = StringBuilder::new();
                for row in &batch.rows {
                    match &row[col] {
                        Cell::Null => builder.append_null(),
                        cell => builder.append_value(cell.to_string()),
                    }
                }
                (DataType::Utf8, Arc::new(builder.finish()))
            }
        };
        fields.push(Field::new(name, data_type, true));
        arrays.push(array);
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
}

fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Write a batch as a snappy-compressed Parquet file, replacing any existing
/// file at `path`.
pub fn write_parquet(batch: &RowBatch, path: &Path) -> Result<(), WriteError> {
    ensure_parent_dir(path)?;
    let record_batch = to_record_batch(batch)?;
    let file = File::create(path)?;
    let props = WriterProperties::builder()
        .set_compression(ParquetCompression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, record_batch.schema(), Some(props))?;
    writer.write(&record_batch)?;
    writer.close()?;
    Ok(())
}

/// Write a batch in the Arrow IPC file format (Feather v2), whole-file only.
pub fn write_feather(batch: &RowBatch, path: &Path) -> Result<(), WriteError> {
    ensure_parent_dir(path)?;
    let record_batch = to_record_batch(batch)?;
    let file = File::create(path)?;
    let mut writer = FileWriter::try_new(BufWriter::new(file), &record_batch.schema())?;
    writer.write(&record_batch)?;
    writer.finish()?;
    Ok(())
}

/// Append-capable table store backed by the Arrow IPC stream format.
///
/// The stream is opened lazily on the first batch (its schema fixes the
/// stream schema) and stays open for the lifetime of the conversion; each
/// subsequent batch is appended to the same file.
pub struct TableStoreWriter {
    writer: Option<StreamWriter<BufWriter<File>>>,
    path: std::path::PathBuf,
}

impl TableStoreWriter {
    /// Create a table store targeting `path`. Nothing is written until the
    /// first batch arrives.
    pub fn new(path: &Path) -> Self {
        Self {
            writer: None,
            path: path.to_path_buf(),
        }
    }

    /// Append one batch of rows.
    pub fn append(&mut self, batch: &RowBatch) -> Result<(), WriteError> {
        let record_batch = to_record_batch(batch)?;
        if self.writer.is_none() {
            ensure_parent_dir(&self.path)?;
            let file = File::create(&self.path)?;
            self.writer = Some(StreamWriter::try_new(
                BufWriter::new(file),
                &record_batch.schema(),
            )?);
        }
        // Present by construction.
        if let Some(writer) = self.writer.as_mut() {
            writer.write(&record_batch)?;
        }
        Ok(())
    }

    /// Finish the stream. A store that never received a batch writes nothing.
    pub fn finish(mut self) -> Result<(), WriteError> {
        if let Some(mut writer) = self.writer.take() {
            writer.finish()?;
        }
        Ok(())
    }
}

/// Append a batch as JSON Lines, one object per row, creating the file if
/// needed.
pub fn append_json_lines(batch: &RowBatch, path: &Path) -> Result<(), WriteError> {
    ensure_parent_dir(path)?;
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    write_json_rows(batch, BufWriter::new(file))
}

/// Write a batch as JSON Lines, replacing any existing file.
pub fn write_json_lines(batch: &RowBatch, path: &Path) -> Result<(), WriteError> {
    ensure_parent_dir(path)?;
    let file = File::create(path)?;
    write_json_rows(batch, BufWriter::new(file))
}

fn write_json_rows<W: Write>(batch: &RowBatch, mut out: W) -> Result<(), WriteError> {
    for row in &batch.rows {
        let object: serde_json::Map<String, serde_json::Value> = batch
            .columns
            .iter()
            .zip(row.iter())
            .map(|(name, cell)| (name.clone(), cell.to_json()))
            .collect();
        serde_json::to_writer(&mut out, &object)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

/// Serialize the whole row model in the crate's native binary form.
pub fn write_native(batch: &RowBatch, path: &Path) -> Result<(), WriteError> {
    ensure_parent_dir(path)?;
    let file = File::create(path)?;
    bincode::serialize_into(BufWriter::new(file), batch)?;
    Ok(())
}

/// Whole-file write dispatch. Every format has an entry; the match is
/// exhaustive by construction.
pub fn write_full(batch: &RowBatch, path: &Path, format: OutputFormat) -> Result<(), WriteError> {
    match format {
        OutputFormat::Parquet => write_parquet(batch, path),
        OutputFormat::Feather => write_feather(batch, path),
        OutputFormat::TableStore => {
            let mut store = TableStoreWriter::new(path);
            store.append(batch)?;
            store.finish()
        }
        OutputFormat::JsonLines => write_json_lines(batch, path),
        OutputFormat::Native => write_native(batch, path),
    }
}
