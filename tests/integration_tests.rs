//! Integration tests for csv-forge

use std::fs::File;
use std::io::{Cursor, Write};
use std::path::Path;

use csv_forge::{
    resource, Cell, ChunkedEngine, Compression, Converter, DialectConfig, DialectDetector,
    OutputFormat, TextEncoding,
};
use tempfile::{tempdir, NamedTempFile, TempDir};

const AMPLE_MEMORY: u64 = 8 * 1024 * 1024 * 1024;
const SCARCE_MEMORY: u64 = 1024 * 1024 * 1024;

fn temp_csv(content: &[u8]) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(content).unwrap();
    file.flush().unwrap();
    file
}

fn converter_in(dir: &TempDir, available_memory: u64) -> Converter {
    let verdict = resource::evaluate(1, 0, available_memory);
    Converter::new(dir.path().join("out"), verdict).unwrap()
}

fn read_jsonl(path: &Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[test]
fn test_detect_all_delimiters_end_to_end() {
    for delim in [',', ';', '\t', '|'] {
        let content = format!("name{delim}age\nAlice{delim}30\nBob{delim}25\n");
        let file = temp_csv(content.as_bytes());
        let config = DialectDetector::new().detect(file.path()).unwrap();
        assert_eq!(config.delimiter, delim as u8, "failed for {delim:?}");
    }
}

#[test]
fn test_detect_gz_wrapper_and_delimiter() {
    use flate2::write::GzEncoder;

    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(b"name;age\nAlice;30\nBob;25\n").unwrap();
    let payload = encoder.finish().unwrap();

    let mut file = tempfile::Builder::new().suffix(".csv.gz").tempfile().unwrap();
    file.write_all(&payload).unwrap();
    file.flush().unwrap();

    let config = DialectDetector::new().detect(file.path()).unwrap();
    assert_eq!(config.compression, Compression::Gz);
    assert_eq!(config.delimiter, b';');
}

#[test]
fn test_detect_zip_wrapper_and_delimiter() {
    use zip::write::SimpleFileOptions;

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        writer
            .start_file("inner.csv", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"a|b\n1|2\n").unwrap();
        writer.finish().unwrap();
    }

    let mut file = tempfile::Builder::new().suffix(".csv.zip").tempfile().unwrap();
    file.write_all(&cursor.into_inner()).unwrap();
    file.flush().unwrap();

    let config = DialectDetector::new().detect(file.path()).unwrap();
    assert_eq!(config.compression, Compression::Zip);
    assert_eq!(config.delimiter, b'|');
}

#[test]
fn test_detection_is_idempotent() {
    let file = temp_csv(b"\"name\";\"city\"\r\n\"Alice\";\"Porto\"\r\n");
    let detector = DialectDetector::new();
    let first = detector.detect(file.path()).unwrap();
    let second = detector.detect(file.path()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_utf8_sample_not_misdetected() {
    let file = temp_csv("id,note\n1,plain ascii text with no accents\n".as_bytes());
    let config = DialectDetector::new().detect(file.path()).unwrap();
    assert_eq!(config.encoding, TextEncoding::Utf8);
}

#[test]
fn test_forced_comma_on_semicolon_file_recovers() {
    // PrimaryRead under ',' yields one column; the single-column check must
    // retry and select ';'.
    let file = temp_csv(b"a;b;c\n1;2;3\n4;5;6\n");
    let dir = tempdir().unwrap();
    let converter = converter_in(&dir, AMPLE_MEMORY);

    let forced = DialectConfig::default().with_delimiter(b',');
    let batch = converter.read_with_fallback(file.path(), &forced).unwrap();

    assert_eq!(batch.num_columns(), 3);
    assert_eq!(batch.num_rows(), 2);
    assert_eq!(batch.rows[0], vec![Cell::Int(1), Cell::Int(2), Cell::Int(3)]);
    assert_eq!(batch.rows[1], vec![Cell::Int(4), Cell::Int(5), Cell::Int(6)]);
}

#[test]
fn test_resource_gate_refuses_before_any_read() {
    let files: Vec<String> = (0..101).map(|i| format!("/missing/{i}.csv")).collect();
    let verdict = resource::evaluate(files.len(), 0, AMPLE_MEMORY);
    assert!(!verdict.admitted());

    let dir = tempdir().unwrap();
    let converter = Converter::new(dir.path().join("out"), verdict).unwrap();
    assert!(converter.check_admission().is_err());
}

#[test]
fn test_convert_to_parquet_end_to_end() {
    let file = temp_csv(b"id,name\n1,Alice\n2,Bob\n");
    let dir = tempdir().unwrap();
    let converter = converter_in(&dir, AMPLE_MEMORY);

    let outcome = converter.convert(file.path(), OutputFormat::Parquet);
    assert!(outcome.succeeded);
    let path = outcome.output_path.unwrap();
    assert_eq!(path.extension().unwrap(), "parquet");

    let reader = parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder::try_new(
        File::open(&path).unwrap(),
    )
    .unwrap()
    .build()
    .unwrap();
    let total: usize = reader.map(|b| b.unwrap().num_rows()).sum();
    assert_eq!(total, 2);
}

#[test]
fn test_convert_gz_to_jsonl() {
    use flate2::write::GzEncoder;

    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(b"name,city\nalice,porto\nbob,braga\n").unwrap();
    let payload = encoder.finish().unwrap();

    let mut file = tempfile::Builder::new().suffix(".csv.gz").tempfile().unwrap();
    file.write_all(&payload).unwrap();
    file.flush().unwrap();

    let dir = tempdir().unwrap();
    let converter = converter_in(&dir, AMPLE_MEMORY);
    let outcome = converter.convert(file.path(), OutputFormat::JsonLines);
    assert!(outcome.succeeded, "error: {:?}", outcome.error);

    let rows = read_jsonl(&outcome.output_path.unwrap());
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["name"], serde_json::json!("alice"));
    assert_eq!(rows[1]["city"], serde_json::json!("braga"));
}

#[test]
fn test_convert_latin1_file_preserves_accents() {
    // ISO-8859-1 content: 0xE3 is not valid UTF-8.
    let file = temp_csv(b"nome,cidade\njo\xe3o,s\xe3o paulo\n");
    let dir = tempdir().unwrap();
    let converter = converter_in(&dir, AMPLE_MEMORY);

    let outcome = converter.convert(file.path(), OutputFormat::JsonLines);
    assert!(outcome.succeeded, "error: {:?}", outcome.error);

    let rows = read_jsonl(&outcome.output_path.unwrap());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["nome"], serde_json::json!("joão"));
    assert_eq!(rows[0]["cidade"], serde_json::json!("são paulo"));
}

#[test]
fn test_chunked_and_single_pass_jsonl_match() {
    let content = b"n,label\n1,a\n2,b\n3,c\n4,d\n5,e\n";
    let file = temp_csv(content);

    // Single pass.
    let single_dir = tempdir().unwrap();
    let single = converter_in(&single_dir, AMPLE_MEMORY);
    let single_path = single
        .convert(file.path(), OutputFormat::JsonLines)
        .output_path
        .unwrap();

    // Chunked, with a chunk size far below the row count.
    let chunked_dir = tempdir().unwrap();
    let verdict = resource::evaluate(1, 0, SCARCE_MEMORY);
    assert!(verdict.low_memory_mode);
    let chunked = Converter::new(chunked_dir.path().join("out"), verdict)
        .unwrap()
        .with_engine(ChunkedEngine::with_chunk_size(2));
    let chunked_path = chunked
        .convert(file.path(), OutputFormat::JsonLines)
        .output_path
        .unwrap();

    // Identical row content and ordering.
    assert_eq!(read_jsonl(&single_path), read_jsonl(&chunked_path));
}

#[test]
fn test_low_memory_parquet_writes_sibling_chunks() {
    let file = temp_csv(b"n\n1\n2\n3\n4\n5\n");
    let dir = tempdir().unwrap();
    let verdict = resource::evaluate(1, 0, SCARCE_MEMORY);
    let converter = Converter::new(dir.path().join("out"), verdict)
        .unwrap()
        .with_engine(ChunkedEngine::with_chunk_size(2));

    let outcome = converter.convert(file.path(), OutputFormat::Parquet);
    assert!(outcome.succeeded);

    let out_dir = dir.path().join("out");
    let stem = file.path().file_stem().unwrap().to_str().unwrap();
    let stem = stem.strip_suffix(".csv").unwrap_or(stem);
    for n in 1..=3 {
        assert!(
            out_dir.join(format!("{stem}_chunk{n}.parquet")).exists(),
            "missing sibling chunk {n}"
        );
    }
}

#[test]
fn test_low_memory_leaves_whole_file_formats_alone() {
    // Feather has no chunked path; low-memory mode must still produce a
    // single whole-file output.
    let file = temp_csv(b"a,b\n1,2\n");
    let dir = tempdir().unwrap();
    let converter = converter_in(&dir, SCARCE_MEMORY);

    let outcome = converter.convert(file.path(), OutputFormat::Feather);
    assert!(outcome.succeeded, "error: {:?}", outcome.error);
    let path = outcome.output_path.unwrap();

    let reader = arrow::ipc::reader::FileReader::try_new(File::open(&path).unwrap(), None).unwrap();
    let total: usize = reader.map(|b| b.unwrap().num_rows()).sum();
    assert_eq!(total, 1);
}

#[test]
fn test_convert_to_table_store_and_native() {
    let file = temp_csv(b"id,ok\n1,true\n2,false\n");
    let dir = tempdir().unwrap();
    let converter = converter_in(&dir, AMPLE_MEMORY);

    let store = converter.convert(file.path(), OutputFormat::TableStore);
    assert!(store.succeeded);
    let reader = arrow::ipc::reader::StreamReader::try_new(
        File::open(store.output_path.unwrap()).unwrap(),
        None,
    )
    .unwrap();
    let total: usize = reader.map(|b| b.unwrap().num_rows()).sum();
    assert_eq!(total, 2);

    let native = converter.convert(file.path(), OutputFormat::Native);
    assert!(native.succeeded);
    let restored: csv_forge::RowBatch =
        bincode::deserialize_from(File::open(native.output_path.unwrap()).unwrap()).unwrap();
    assert_eq!(restored.columns, vec!["id", "ok"]);
    assert_eq!(restored.rows[0][1], Cell::Bool(true));
}

#[test]
fn test_empty_file_yields_no_output() {
    let file = temp_csv(b"");
    let dir = tempdir().unwrap();
    let converter = converter_in(&dir, AMPLE_MEMORY);

    let outcome = converter.convert(file.path(), OutputFormat::Parquet);
    assert!(outcome.succeeded);
    assert!(outcome.output_path.is_none());
}

#[test]
fn test_unknown_format_key() {
    let err = "orc2".parse::<OutputFormat>().unwrap_err();
    assert!(matches!(err, csv_forge::ConvertError::UnsupportedFormat(_)));
}

#[test]
fn test_quoted_semicolon_file_with_crlf() {
    let file = temp_csv(b"\"name\";\"note\"\r\n\"Alice\";\"semi;inside\"\r\n");
    let dir = tempdir().unwrap();
    let converter = converter_in(&dir, AMPLE_MEMORY);

    let dialect = DialectDetector::new().detect(file.path()).unwrap();
    assert_eq!(dialect.delimiter, b';');
    assert_eq!(dialect.quote_char, Some(b'"'));
    assert!(dialect.doublequote);

    let batch = converter.read_with_fallback(file.path(), &dialect).unwrap();
    assert_eq!(batch.rows[0][1], Cell::Text("semi;inside".to_string()));
}
