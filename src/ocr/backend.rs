//! Interface to a remote OCR service that works in terms of jobs.
//!
//! A job is submitted once, and then polled until it reaches a terminal
//! status:
//!
//! ```text
//! submitted -> {pending, running}* -> {succeeded, failed}
//! ```
//!
//! Nothing ever leaves a terminal status.

use std::fmt;

use crate::prelude::*;

/// An opaque handle for a submitted OCR job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobHandle(pub String);

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The status of an OCR job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobStatus {
    /// Accepted, but not started yet.
    Pending,
    /// In progress.
    Running,
    /// Finished. Contains the recognized lines, in reading order.
    Succeeded(Vec<String>),
    /// The backend gave up on this job.
    Failed,
}

/// A remote OCR service.
#[async_trait]
pub trait OcrBackend: Send + Sync + 'static {
    /// Submit an image for OCR.
    async fn submit(&self, image: &[u8]) -> Result<JobHandle>;

    /// Check on a previously submitted job.
    async fn poll(&self, job: &JobHandle) -> Result<JobStatus>;
}

