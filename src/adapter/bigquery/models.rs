//! BigQuery job models
//!
//! Vendor-independent views of jobs that the service polls.

use crate::domain::entities::table_schema::FieldSchema;

/// Reference to a running job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub project_id: String,
    pub job_id: String,
    pub location: Option<String>,
}

/// Job state as reported by the jobs API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Done {
        /// Fatal error of the job, if any
        error_result: Option<String>,
        /// All errors encountered (may include non-fatal ones)
        errors: Vec<String>,
    },
}

impl JobStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, JobStatus::Done { .. })
    }

    /// Fatal error message once the job is done
    pub fn error(&self) -> Option<&str> {
        match self {
            JobStatus::Done { error_result, .. } => error_result.as_deref(),
            _ => None,
        }
    }

    pub fn done() -> Self {
        JobStatus::Done {
            error_result: None,
            errors: Vec::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        JobStatus::Done {
            error_result: Some(message.clone()),
            errors: vec![message],
        }
    }
}

/// Load job from a Cloud Storage object (newline-delimited JSON)
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub source_uri: String,
    pub dataset: String,
    pub table: String,
    pub schema: Vec<FieldSchema>,
    pub truncate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_done() {
        assert!(JobStatus::done().is_done());
        assert!(JobStatus::done().error().is_none());
        assert!(!JobStatus::Running.is_done());
        assert!(!JobStatus::Pending.is_done());
    }

    #[test]
    fn test_job_status_failed() {
        let status = JobStatus::failed("Syntax error");
        assert!(status.is_done());
        assert_eq!(status.error(), Some("Syntax error"));
    }
}
