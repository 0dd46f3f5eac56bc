use std::time::Duration;

/// Cause carried by failures that originate outside the harness (loaders, backends).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(thiserror::Error, Debug)]
pub enum HarnessError {
    #[error("value of {bits} bits does not fit in {width} bits")]
    EncodingOverflow { bits: u64, width: u64 },
    #[error("unsupported encoding width: {0} bits")]
    InvalidWidth(u64),
    #[error("invalid input size: {0:?}")]
    InvalidInputSize(String),
    #[error("invalid test case identifier: {0:?}")]
    InvalidCaseId(String),
    #[error("vector length mismatch: {points} points, {scalars} scalars")]
    LengthMismatch { points: usize, scalars: usize },
    #[error("failed to load test case {case}: {source}")]
    TestCaseLoadFailed { case: String, source: BoxError },
    #[error("{implementation} failed: {cause}")]
    BackendComputeFailed {
        implementation: String,
        #[source]
        cause: BoxError,
    },
    #[error("benchmarks are disabled until a valid vector set is available")]
    BenchmarksDisabled,
    #[error("no backend registered as {0:?}")]
    UnknownBackend(String),
    #[error("result of {implementation} belongs to a superseded vector set")]
    RunSuperseded { implementation: String },
    #[error("invalid value {value:?} for {var}")]
    InvalidConfig { var: &'static str, value: String },
    #[error("background task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

pub type HarnessResult<T> = std::result::Result<T, HarnessError>;

impl HarnessError {
    pub fn backend(implementation: &str, cause: impl Into<BoxError>) -> Self {
        HarnessError::BackendComputeFailed {
            implementation: implementation.to_string(),
            cause: cause.into(),
        }
    }
}

/// A backend returned a point whose coordinates are not canonical field elements.
#[derive(thiserror::Error, Debug)]
#[error("malformed output: coordinate {coordinate} is out of range")]
pub struct MalformedOutput {
    pub coordinate: &'static str,
}

#[derive(thiserror::Error, Debug)]
#[error("run exceeded the {0:?} time limit")]
pub struct RunTimedOut(pub Duration);
