//! Support utilities for [`keen_retry`]'s retry API.

use std::{error, fmt, iter};

use keen_retry::{ExponentialJitter, ResolvedResult, RetryResult};
use reqwest::StatusCode;

use crate::prelude::*;

/// A [`RetryResult`] for a single HTTP call to our OCR backend.
pub type HttpRetryResult<T> = RetryResult<(), (), T, anyhow::Error>;

/// On error, return a [`RetryResult::Fatal`] value.
macro_rules! try_fatal {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(error) => {
                return ::keen_retry::RetryResult::Fatal {
                    input: (),
                    error: From::from(error),
                };
            }
        }
    };
}

/// On error, return either a [`RetryResult::Transient`] or [`RetryResult::Fatal`]
/// value, depending on the return value of [`IsKnownTransient::is_known_transient`].
macro_rules! try_potentially_transient {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(error) if IsKnownTransient::is_known_transient(&error) => {
                debug!("Potentially transient error: {:?}", error);
                return ::keen_retry::RetryResult::Transient {
                    input: (),
                    error: From::from(error),
                };
            }
            Err(error) => {
                return ::keen_retry::RetryResult::Fatal {
                    input: (),
                    error: From::from(error),
                };
            }
        }
    };
}

pub(crate) use {try_fatal, try_potentially_transient};

/// Build an [`RetryResult::Ok`] value.
pub(crate) fn retry_result_ok<T, E>(output: T) -> RetryResult<(), (), T, E> {
    RetryResult::Ok {
        reported_input: (),
        output,
    }
}

/// Run `attempt`, retrying transient failures with exponential backoff.
///
/// `what` is a short description of the operation, used in log messages.
pub async fn retry_transient<T, F, Fut>(what: &str, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = HttpRetryResult<T>>,
{
    let jitter = ExponentialJitter::FromBackoffRange {
        backoff_range_millis: 1..=30_000,
        re_attempts: 5,
        jitter_ratio: 0.2,
    };

    let resolved = attempt()
        .await
        .retry_with_async(|_| attempt())
        .with_exponential_jitter(|| jitter)
        .await;

    match resolved {
        ResolvedResult::Ok { output, .. } => Ok(output),
        ResolvedResult::Recovered {
            output,
            retry_errors,
            ..
        } => {
            warn!(
                "{what} succeeded after retrying {} times (failed attempts: [{}])",
                retry_errors.len(),
                keen_retry::loggable_retry_errors(&retry_errors)
            );
            Ok(output)
        }
        ResolvedResult::Fatal { error, .. } => Err(error.context(format!("{what} failed"))),
        ResolvedResult::GivenUp {
            retry_errors,
            fatal_error,
            ..
        }
        | ResolvedResult::Unrecoverable {
            retry_errors,
            fatal_error,
            ..
        } => {
            let previous = retry_errors
                .iter()
                .map(|err| format!("{err:#}"))
                .chain(iter::once(format!("{fatal_error:#}")))
                .collect::<Vec<_>>()
                .join("; ");
            Err(fatal_error.context(format!(
                "{what} failed after {} attempts ({previous})",
                retry_errors.len() + 1
            )))
        }
    }
}

/// Is this error a known transient error?
///
/// By default, we assume errors are not transient, until they're been observed
/// in the wild, investigated and determined to be transient. This prevents us
/// from doing large numbers of retries with exponential backoff on errors that
/// will never resolve.
pub trait IsKnownTransient {
    /// Is this error likely to be transient?
    fn is_known_transient(&self) -> bool;
}

impl IsKnownTransient for reqwest::Error {
    fn is_known_transient(&self) -> bool {
        if let Some(status) = self.status() {
            status.is_known_transient()
        } else {
            // `reqwest` doesn't expose connection failures in enough detail to
            // tell them apart, so assume they're all transient.
            !self.is_builder() && !self.is_decode()
        }
    }
}

impl IsKnownTransient for StatusCode {
    fn is_known_transient(&self) -> bool {
        // Azure uses 429 when we exceed our transactions-per-second quota.
        let transient_failures = [
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::GATEWAY_TIMEOUT,
        ];
        transient_failures.contains(self)
    }
}

/// A non-success HTTP status, along with whatever body the server sent.
#[derive(Debug)]
pub struct HttpStatusError {
    /// The HTTP status.
    pub status: StatusCode,

    /// The response body, usually a JSON error object.
    pub body: String,
}

impl fmt::Display for HttpStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.body.is_empty() {
            write!(f, "HTTP status {}", self.status)
        } else {
            write!(f, "HTTP status {}: {}", self.status, self.body.trim())
        }
    }
}

impl error::Error for HttpStatusError {}

impl IsKnownTransient for HttpStatusError {
    fn is_known_transient(&self) -> bool {
        self.status.is_known_transient()
    }
}

/// Turn a non-success [`reqwest::Response`] into an [`HttpStatusError`].
pub async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, HttpStatusError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(HttpStatusError { status, body })
    }
}
