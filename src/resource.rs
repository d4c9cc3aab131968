//! Admission limits and the low-memory-mode decision.
//!
//! [`evaluate`] is a pure function of system state and input metadata. The
//! verdict is computed once at orchestrator startup and treated as read-only
//! for the remainder of the run.

use std::path::Path;

/// Maximum number of input files admitted per run.
pub const MAX_FILE_COUNT: usize = 100;
/// Maximum total input size admitted per run.
pub const MAX_TOTAL_BYTES: u64 = 2 * 1024 * 1024 * 1024;
/// Available-memory threshold below which chunked conversion is forced.
pub const LOW_MEMORY_THRESHOLD: u64 = 3 * 1024 * 1024 * 1024;
/// Rows per batch in chunked conversion.
pub const CHUNK_SIZE: usize = 100_000;
/// Read attempts granted to callers that retry whole conversions.
pub const MAX_READ_RETRIES: usize = 3;

/// Result of the admission check and memory-mode decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceVerdict {
    /// Whether conversions must run in bounded-memory chunked mode.
    pub low_memory_mode: bool,
    /// Human-readable refusal reason; `None` means the input set is admitted.
    pub reason: Option<String>,
}

impl ResourceVerdict {
    /// Whether the input set passed the admission check.
    pub fn admitted(&self) -> bool {
        self.reason.is_none()
    }
}

/// Evaluate the admission gate and the memory mode.
///
/// Fails closed with a reason when the file count or total byte caps are
/// exceeded. This is an arithmetic gate, not a heuristic.
pub fn evaluate(file_count: usize, total_bytes: u64, available_memory: u64) -> ResourceVerdict {
    let low_memory_mode = available_memory < LOW_MEMORY_THRESHOLD;

    let reason = if file_count > MAX_FILE_COUNT {
        Some(format!("limit of {MAX_FILE_COUNT} files exceeded"))
    } else if total_bytes > MAX_TOTAL_BYTES {
        Some(format!(
            "total input size exceeds {} bytes",
            MAX_TOTAL_BYTES
        ))
    } else {
        None
    };

    ResourceVerdict {
        low_memory_mode,
        reason,
    }
}

/// Evaluate a concrete path list, folding stat failures into a refusal
/// reason rather than an error.
pub fn evaluate_paths<P: AsRef<Path>>(paths: &[P], available_memory: u64) -> ResourceVerdict {
    if paths.len() > MAX_FILE_COUNT {
        return evaluate(paths.len(), 0, available_memory);
    }

    let mut total_bytes = 0u64;
    for path in paths {
        match std::fs::metadata(path.as_ref()) {
            Ok(meta) => total_bytes += meta.len(),
            Err(err) => {
                return ResourceVerdict {
                    low_memory_mode: available_memory < LOW_MEMORY_THRESHOLD,
                    reason: Some(format!(
                        "could not inspect {}: {err}",
                        path.as_ref().display()
                    )),
                };
            }
        }
    }

    evaluate(paths.len(), total_bytes, available_memory)
}
