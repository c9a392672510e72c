//! Ошибки вычислительных движков

use std::collections::TryReserveError;
use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::sys::process::WorkerExit;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("matrix size must be positive, got {0}")]
    InvalidSize(usize),
    #[error("shape mismatch: expected {expected}x{expected}, got {got}x{got}")]
    ShapeMismatch { expected: usize, got: usize },
    #[error("buffer length mismatch: expected {expected} elements, got {got}")]
    BufferLength { expected: usize, got: usize },
    #[error("failed to allocate {elements} matrix elements")]
    Allocation {
        elements: usize,
        #[source]
        source: TryReserveError,
    },
    #[error("failed to create shared region of {bytes} bytes")]
    SharedRegion {
        bytes: usize,
        #[source]
        source: io::Error,
    },
    #[error("guard set setup failed: {0}")]
    GuardSetup(String),
    #[error("failed to spawn worker {worker}")]
    Spawn {
        worker: usize,
        #[source]
        source: io::Error,
    },
    #[error("worker pid {pid} (row {row:?}) terminated abnormally: {status}")]
    WorkerFailed {
        pid: i32,
        row: Option<usize>,
        status: WorkerExit,
    },
    #[error("{missing} rows were not completed (first missing row {first})")]
    IncompleteRows { missing: usize, first: usize },
    #[error("failed to build worker pool")]
    Pool(#[source] rayon::ThreadPoolBuildError),
    #[error("worker thread {worker} panicked")]
    ThreadPanicked { worker: usize },
    #[error("failed to wait for worker pid {pid}")]
    Wait {
        pid: i32,
        #[source]
        source: io::Error,
    },
    #[error("{pending} workers still running after {elapsed:?}")]
    Timeout { elapsed: Duration, pending: usize },
}

pub type Result<T> = std::result::Result<T, EngineError>;
