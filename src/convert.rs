//! Top-level conversion orchestration.
//!
//! Runs the detector once per file, reads under the detected dialect with a
//! two-stage fallback (delimiter retry on a single-column result, encoding
//! cascade on a decode failure), then dispatches to the chunked engine or a
//! whole-file writer depending on the resource verdict.

use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};

use crate::detector::DialectDetector;
use crate::dialect::{DialectConfig, DELIMITER_CANDIDATES};
use crate::encoding::ENCODING_CANDIDATES;
use crate::engine::ChunkedEngine;
use crate::error::{ConvertError, Result};
use crate::format::OutputFormat;
use crate::reader::{self, ReadError, RowBatchIter};
use crate::resource::ResourceVerdict;
use crate::table::RowBatch;
use crate::writers;

/// Rows sampled when validating a dialect ahead of chunked conversion.
const VALIDATION_SAMPLE_ROWS: usize = 128;

/// Outcome of converting one input file to one output format.
#[derive(Debug)]
pub struct ConversionOutcome {
    /// Whether the conversion completed without a fatal error. An empty
    /// input counts as success with no output.
    pub succeeded: bool,
    /// Path of the primary output file, when one was written.
    pub output_path: Option<PathBuf>,
    /// The fatal error, when the conversion failed.
    pub error: Option<ConvertError>,
}

impl ConversionOutcome {
    fn written(path: PathBuf) -> Self {
        Self {
            succeeded: true,
            output_path: Some(path),
            error: None,
        }
    }

    fn empty() -> Self {
        Self {
            succeeded: true,
            output_path: None,
            error: None,
        }
    }

    fn failed(error: ConvertError) -> Self {
        Self {
            succeeded: false,
            output_path: None,
            error: Some(error),
        }
    }
}

/// Sequential per-file conversion driver.
///
/// One file is fully converted, including any fallback retries, before the
/// next is started. The resource verdict is computed once by the caller and
/// held read-only for the lifetime of the converter.
#[derive(Debug)]
pub struct Converter {
    output_dir: PathBuf,
    verdict: ResourceVerdict,
    detector: DialectDetector,
    engine: ChunkedEngine,
}

impl Converter {
    /// Create a converter writing into `output_dir` (created if missing).
    pub fn new(output_dir: impl Into<PathBuf>, verdict: ResourceVerdict) -> Result<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;
        if verdict.low_memory_mode {
            warn!("low-memory mode active: chunk-capable formats will be converted in batches");
        }
        Ok(Self {
            output_dir,
            verdict,
            detector: DialectDetector::new(),
            engine: ChunkedEngine::new(),
        })
    }

    /// Replace the default engine, e.g. to tune the chunk size.
    pub fn with_engine(mut self, engine: ChunkedEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Replace the default detector, e.g. to force a delimiter or encoding.
    pub fn with_detector(mut self, detector: DialectDetector) -> Self {
        self.detector = detector;
        self
    }

    /// The resource verdict this converter operates under.
    pub fn verdict(&self) -> &ResourceVerdict {
        &self.verdict
    }

    /// Refuse early when the verdict carries a refusal reason.
    pub fn check_admission(&self) -> Result<()> {
        match &self.verdict.reason {
            Some(reason) => Err(ConvertError::ResourceLimitExceeded(reason.clone())),
            None => Ok(()),
        }
    }

    /// Output path for an input stem under the requested format.
    pub fn output_path(&self, input: &Path, format: OutputFormat) -> PathBuf {
        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output");
        // Strip the inner .csv stem of .csv.gz / .csv.zip inputs.
        let stem = stem.strip_suffix(".csv").unwrap_or(stem);
        self.output_dir
            .join(format!("{stem}.{}", format.extension()))
    }

    /// Convert one file to one format.
    pub fn convert(&self, input: &Path, format: OutputFormat) -> ConversionOutcome {
        info!("converting {} to {format}", input.display());
        match self.convert_inner(input, format) {
            Ok(Some(path)) => {
                info!("converted {} -> {}", input.display(), path.display());
                ConversionOutcome::written(path)
            }
            Ok(None) => {
                warn!("{} produced no rows, no output written", input.display());
                ConversionOutcome::empty()
            }
            Err(err) => {
                error!("failed to convert {} to {format}: {err}", input.display());
                ConversionOutcome::failed(err)
            }
        }
    }

    fn convert_inner(&self, input: &Path, format: OutputFormat) -> Result<Option<PathBuf>> {
        let dialect = self.detector.detect(input)?;
        let output = self.output_path(input, format);

        if self.verdict.low_memory_mode && format.chunk_capable() {
            let dialect = self.validate_dialect(input, dialect)?;
            let stream = reader::open_input(input, dialect.compression)
                .map_err(|e| e.into_convert(input))?;
            return self.engine.run(input, stream, &dialect, &output, format, || {});
        }

        let batch = self.read_with_fallback(input, &dialect)?;
        if batch.is_empty() {
            return Ok(None);
        }

        writers::write_full(&batch, &output, format).map_err(|source| {
            ConvertError::WriteFailure {
                format,
                path: output.clone(),
                source,
            }
        })?;
        Ok(Some(output))
    }

    /// Run the fallback protocol on a bounded leading sample, so the chunked
    /// path starts from a dialect the whole stream can be read under. The
    /// retry rules match [`Converter::read_with_fallback`].
    fn validate_dialect(&self, input: &Path, dialect: DialectConfig) -> Result<DialectConfig> {
        match sample_columns(input, &dialect) {
            Ok(Some(1)) => {
                warn!("sample parse yielded a single column, trying alternate delimiters");
                for &alt in &DELIMITER_CANDIDATES {
                    if alt == dialect.delimiter {
                        continue;
                    }
                    let candidate = dialect.with_delimiter(alt);
                    if let Ok(Some(columns)) = sample_columns(input, &candidate) {
                        if columns > 1 {
                            info!("alternate delimiter {:?} succeeded", alt as char);
                            return Ok(candidate);
                        }
                    }
                }
                Ok(dialect)
            }
            Ok(_) => Ok(dialect),
            Err(ReadError::Decode(label)) => {
                warn!("decode failure under {label}, trying alternate encodings");
                for &alt in &ENCODING_CANDIDATES {
                    if alt == dialect.encoding {
                        continue;
                    }
                    let candidate = dialect.with_encoding(alt);
                    match sample_columns(input, &candidate) {
                        Ok(Some(_)) => {
                            info!("alternate encoding {} succeeded", alt.label());
                            return Ok(candidate);
                        }
                        Ok(None) => {}
                        Err(err) => {
                            debug!("alternate encoding {} failed: {err}", alt.label());
                        }
                    }
                }
                Err(ConvertError::UnreadableEncoding(input.to_path_buf()))
            }
            Err(err) => Err(err.into_convert(input)),
        }
    }

    /// Full parse under `dialect` with the two-stage fallback protocol.
    ///
    /// A successful parse with exactly one column retries the remaining
    /// delimiter candidates and adopts the first that yields more than one
    /// column. A decode failure retries the remaining encoding candidates
    /// and adopts the first successful non-empty parse; exhausting them
    /// fails with [`ConvertError::UnreadableEncoding`].
    pub fn read_with_fallback(&self, input: &Path, dialect: &DialectConfig) -> Result<RowBatch> {
        match reader::read_all(input, dialect) {
            Ok(batch) => Ok(self.retry_single_column(input, dialect, batch)),
            Err(ReadError::Decode(label)) => {
                warn!("decode failure under {label}, trying alternate encodings");
                self.retry_encodings(input, dialect)
            }
            Err(err) => Err(err.into_convert(input)),
        }
    }

    fn retry_single_column(
        &self,
        input: &Path,
        dialect: &DialectConfig,
        batch: RowBatch,
    ) -> RowBatch {
        if batch.num_columns() != 1 {
            return batch;
        }

        warn!("parse yielded a single column, trying alternate delimiters");
        for &alt in &DELIMITER_CANDIDATES {
            if alt == dialect.delimiter {
                continue;
            }
            match reader::read_all(input, &dialect.with_delimiter(alt)) {
                Ok(alt_batch) if alt_batch.num_columns() > 1 => {
                    info!("alternate delimiter {:?} succeeded", alt as char);
                    return alt_batch;
                }
                Ok(_) => {}
                Err(err) => {
                    debug!("alternate delimiter {:?} failed: {err}", alt as char);
                }
            }
        }
        batch
    }

    fn retry_encodings(&self, input: &Path, dialect: &DialectConfig) -> Result<RowBatch> {
        for &alt in &ENCODING_CANDIDATES {
            if alt == dialect.encoding {
                continue;
            }
            match reader::read_all(input, &dialect.with_encoding(alt)) {
                Ok(batch) if !batch.is_empty() => {
                    info!("alternate encoding {} succeeded", alt.label());
                    return Ok(batch);
                }
                Ok(_) => {}
                Err(err) => {
                    debug!("alternate encoding {} failed: {err}", alt.label());
                }
            }
        }
        Err(ConvertError::UnreadableEncoding(input.to_path_buf()))
    }
}

/// Column count of a bounded leading sample, `None` for an input without
/// data rows.
fn sample_columns(input: &Path, dialect: &DialectConfig) -> std::result::Result<Option<usize>, ReadError> {
    let stream = reader::open_input(input, dialect.compression)?;
    let mut iter = RowBatchIter::new(stream, dialect, VALIDATION_SAMPLE_ROWS)?;
    Ok(iter.next_batch()?.map(|batch| batch.num_columns()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::TextEncoding;
    use crate::resource;
    use crate::table::Cell;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn temp_csv(content: &[u8]) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    fn ample_verdict() -> ResourceVerdict {
        resource::evaluate(1, 0, 8 * 1024 * 1024 * 1024)
    }

    fn scarce_verdict() -> ResourceVerdict {
        resource::evaluate(1, 0, 1024 * 1024 * 1024)
    }

    #[test]
    fn test_single_column_fallback_selects_semicolon() {
        let file = temp_csv(b"a;b;c\n1;2;3\n4;5;6\n");
        let dir = tempdir().unwrap();
        let converter = Converter::new(dir.path(), ample_verdict()).unwrap();

        // Force the wrong primary guess; the retry must adopt ';'.
        let dialect = DialectConfig::default().with_delimiter(b',');
        let batch = converter.read_with_fallback(file.path(), &dialect).unwrap();

        assert_eq!(batch.num_columns(), 3);
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.rows[0], vec![Cell::Int(1), Cell::Int(2), Cell::Int(3)]);
        assert_eq!(batch.rows[1], vec![Cell::Int(4), Cell::Int(5), Cell::Int(6)]);
    }

    #[test]
    fn test_true_single_column_kept() {
        let file = temp_csv(b"value\n1\n2\n");
        let dir = tempdir().unwrap();
        let converter = Converter::new(dir.path(), ample_verdict()).unwrap();

        let batch = converter
            .read_with_fallback(file.path(), &DialectConfig::default())
            .unwrap();
        assert_eq!(batch.num_columns(), 1);
        assert_eq!(batch.num_rows(), 2);
    }

    #[test]
    fn test_encoding_fallback_recovers_latin1() {
        let file = temp_csv(b"name,city\njo\xe3o,s\xe3o paulo\n");
        let dir = tempdir().unwrap();
        let converter = Converter::new(dir.path(), ample_verdict()).unwrap();

        // Force UTF-8 so the primary read hits a decode failure.
        let dialect = DialectConfig::default();
        let batch = converter.read_with_fallback(file.path(), &dialect).unwrap();
        assert_eq!(batch.rows[0][0], Cell::Text("joão".to_string()));
    }

    #[test]
    fn test_chunked_path_applies_encoding_fallback() {
        let file = temp_csv(b"nome,cidade\njo\xe3o,s\xe3o paulo\n");
        let dir = tempdir().unwrap();
        let mut detector = DialectDetector::new();
        detector.encoding(TextEncoding::Utf8);
        let converter = Converter::new(dir.path(), scarce_verdict())
            .unwrap()
            .with_detector(detector)
            .with_engine(ChunkedEngine::with_chunk_size(1));

        let outcome = converter.convert(file.path(), OutputFormat::JsonLines);
        assert!(outcome.succeeded, "error: {:?}", outcome.error);
        let content = std::fs::read_to_string(outcome.output_path.unwrap()).unwrap();
        assert!(content.contains("joão"));
    }

    #[test]
    fn test_chunked_path_applies_delimiter_fallback() {
        let file = temp_csv(b"a;b;c\n1;2;3\n4;5;6\n");
        let dir = tempdir().unwrap();
        let mut detector = DialectDetector::new();
        detector.delimiter(b',');
        let converter = Converter::new(dir.path(), scarce_verdict())
            .unwrap()
            .with_detector(detector)
            .with_engine(ChunkedEngine::with_chunk_size(2));

        let outcome = converter.convert(file.path(), OutputFormat::JsonLines);
        assert!(outcome.succeeded, "error: {:?}", outcome.error);
        let content = std::fs::read_to_string(outcome.output_path.unwrap()).unwrap();
        let first: serde_json::Value =
            serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(first["a"], serde_json::json!(1));
        assert_eq!(first["c"], serde_json::json!(3));
    }

    #[test]
    fn test_admission_refusal() {
        let dir = tempdir().unwrap();
        let verdict = resource::evaluate(101, 0, 8 * 1024 * 1024 * 1024);
        let converter = Converter::new(dir.path(), verdict).unwrap();
        let err = converter.check_admission().unwrap_err();
        assert!(matches!(err, ConvertError::ResourceLimitExceeded(_)));
    }

    #[test]
    fn test_convert_missing_file() {
        let dir = tempdir().unwrap();
        let converter = Converter::new(dir.path(), ample_verdict()).unwrap();
        let outcome = converter.convert(Path::new("/no/such.csv"), OutputFormat::JsonLines);
        assert!(!outcome.succeeded);
        assert!(matches!(outcome.error, Some(ConvertError::NotFound(_))));
    }

    #[test]
    fn test_empty_file_is_warning_not_error() {
        let file = temp_csv(b"");
        let dir = tempdir().unwrap();
        let converter = Converter::new(dir.path(), ample_verdict()).unwrap();
        let outcome = converter.convert(file.path(), OutputFormat::JsonLines);
        assert!(outcome.succeeded);
        assert!(outcome.output_path.is_none());
    }

    #[test]
    fn test_output_path_strips_wrapper_extensions() {
        let dir = tempdir().unwrap();
        let converter = Converter::new(dir.path(), ample_verdict()).unwrap();
        let path = converter.output_path(Path::new("/in/data.csv.gz"), OutputFormat::Parquet);
        assert_eq!(path, dir.path().join("data.parquet"));
    }
}
