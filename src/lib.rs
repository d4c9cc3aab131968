//! csv-forge: dialect-detecting CSV conversion
//!
//! Converts delimited text files into columnar and record-oriented formats
//! without requiring the caller to know the file's encoding, delimiter,
//! quoting convention, or compression wrapper in advance, and without
//! exceeding available memory on large inputs.
//!
//! # Quick Start
//!
//! ```no_run
//! use csv_forge::{resource, Converter, DialectDetector, OutputFormat};
//!
//! // Inspect a file's dialect without converting it
//! let detector = DialectDetector::new();
//! let dialect = detector.detect("data.csv".as_ref()).unwrap();
//! println!("delimiter: {}", dialect.delimiter as char);
//! println!("encoding: {}", dialect.encoding.label());
//!
//! // Convert it, honoring the admission check and memory mode
//! let verdict = resource::evaluate_paths(&["data.csv"], 8 * 1024 * 1024 * 1024);
//! let converter = Converter::new("converted", verdict).unwrap();
//! converter.check_admission().unwrap();
//! let outcome = converter.convert("data.csv".as_ref(), OutputFormat::Parquet);
//! assert!(outcome.succeeded);
//! ```
//!
//! # Detection and recovery
//!
//! Detection is a set of heuristics over a leading sample: statistical
//! encoding classification (with a Latin-accent correction for
//! under-confident guesses), frequency-based delimiter counting, and
//! pattern-based quote inference. A wrong guess is detected from downstream
//! symptoms — a single-column parse or a decode failure — and corrected by
//! re-reading under alternate delimiters or encodings, superseding the
//! detected dialect wholesale.
//!
//! # Memory model
//!
//! When available memory is below a fixed threshold, chunk-capable formats
//! are converted in fixed-size row batches, each written and released before
//! the next is read. Formats without append semantics produce sibling
//! per-chunk files instead.

pub mod convert;
pub mod detector;
pub mod dialect;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod format;
pub mod reader;
pub mod resource;
pub mod table;
pub mod writers;

// Re-export the public API surface.
pub use convert::{ConversionOutcome, Converter};
pub use detector::DialectDetector;
pub use dialect::{Compression, DialectConfig, LineTerminator, DELIMITER_CANDIDATES};
pub use encoding::{TextEncoding, ENCODING_CANDIDATES};
pub use engine::{ChunkDescriptor, ChunkedEngine};
pub use error::{ConvertError, Result};
pub use format::OutputFormat;
pub use resource::{ResourceVerdict, CHUNK_SIZE, LOW_MEMORY_THRESHOLD, MAX_FILE_COUNT, MAX_READ_RETRIES, MAX_TOTAL_BYTES};
pub use table::{Cell, RowBatch};
