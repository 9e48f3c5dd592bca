use thiserror::Error;

use crate::remote::JobError;

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("Job failed: {0}")]
    Job(#[from] JobError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_errors_convert() {
        let err: ForecastError = JobError::Cancelled.into();
        assert_eq!(err.to_string(), "Job failed: job cancelled");
    }

    #[test]
    fn io_errors_convert() {
        let err: ForecastError = std::io::Error::other("disk full").into();
        assert_eq!(err.to_string(), "IO error: disk full");
    }
}
