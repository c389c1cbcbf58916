//! Structured error types for xcapture
//!
//! Using thiserror for automatic Display implementation and error chaining.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to load eBPF object from {path}: {error}")]
    EbpfLoadFailed { path: String, error: String },

    #[error("Program {0} not found in eBPF object")]
    ProgramNotFound(String),

    #[error("Map {0} not found in eBPF object")]
    MapNotFound(String),

    #[error("Failed to attach {probe}: {error}")]
    ProbeAttachFailed { probe: String, error: String },

    #[error("Monotonic clock unavailable")]
    ClockUnavailable,

    #[error("Unknown column name: {0}")]
    UnknownColumn(String),

    #[error("Failed to write {kind} output: {error}")]
    OutputWriteFailed { kind: String, error: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_error_display() {
        let err = CaptureError::ProbeAttachFailed {
            probe: "block_rq_insert".to_string(),
            error: "tracepoint not found".to_string(),
        };
        assert!(err.to_string().contains("block_rq_insert"));
        assert!(err.to_string().contains("tracepoint not found"));
    }

    #[test]
    fn test_map_error_display() {
        let err = CaptureError::MapNotFound("CONFIG".to_string());
        assert_eq!(err.to_string(), "Map CONFIG not found in eBPF object");
    }
}
