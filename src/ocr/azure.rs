//! OCR using the Azure Computer Vision "Read" API, version 3.2.
//!
//! The Read API is asynchronous. We `POST` an image to `read/analyze`, get back
//! an `Operation-Location` header, and then `GET` the results until the
//! operation finishes.

use reqwest::{
    Url,
    header::{CONTENT_TYPE, HeaderMap},
};

use crate::{
    config::VisionConfig,
    prelude::*,
    retry::{
        HttpRetryResult, IsKnownTransient, check_status, retry_result_ok,
        retry_transient, try_fatal, try_potentially_transient,
    },
};

use super::backend::{JobHandle, JobStatus, OcrBackend};

/// Header used to pass our subscription key.
const SUBSCRIPTION_KEY_HEADER: &str = "ocp-apim-subscription-key";

/// Header containing the URL of a newly created read operation.
const OPERATION_LOCATION_HEADER: &str = "operation-location";

/// Path of the "submit an image" endpoint, relative to our resource endpoint.
const ANALYZE_PATH: &str = "vision/v3.2/read/analyze";

/// Path of the "get read results" endpoint, relative to our resource endpoint.
const RESULTS_PATH: &str = "vision/v3.2/read/analyzeResults/";

/// OCR backend wrapping the Azure Read API.
pub struct AzureReadBackend {
    /// Our HTTP client.
    client: reqwest::Client,

    /// Endpoint and credentials.
    config: VisionConfig,
}

impl AzureReadBackend {
    /// Create a new Azure Read backend.
    pub fn new(config: VisionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self { client, config })
    }

    /// The URL we submit images to.
    fn analyze_url(&self) -> Result<Url> {
        self.config
            .endpoint
            .join(ANALYZE_PATH)
            .context("failed to build Azure Read analyze URL")
    }

    /// The URL holding the results for `job`.
    fn results_url(&self, job: &JobHandle) -> Result<Url> {
        self.config
            .endpoint
            .join(RESULTS_PATH)
            .and_then(|base| base.join(&job.0))
            .with_context(|| format!("failed to build Azure Read results URL for {job}"))
    }

    /// Make a single attempt to submit an image.
    async fn submit_once(&self, url: &Url, image: &[u8]) -> HttpRetryResult<JobHandle> {
        let response = try_potentially_transient!(
            self.client
                .post(url.clone())
                .header(SUBSCRIPTION_KEY_HEADER, &self.config.key)
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(image.to_vec())
                .send()
                .await
        );
        let response = try_potentially_transient!(check_status(response).await);
        let handle = try_fatal!(job_handle_from_headers(response.headers()));
        retry_result_ok(handle)
    }

    /// Make a single attempt to fetch the status of a job.
    async fn poll_once(&self, url: &Url) -> HttpRetryResult<JobStatus> {
        let response = try_potentially_transient!(
            self.client
                .get(url.clone())
                .header(SUBSCRIPTION_KEY_HEADER, &self.config.key)
                .send()
                .await
        );
        let response = try_potentially_transient!(check_status(response).await);
        let result = try_fatal!(response.json::<ReadOperationResult>().await);
        trace!(?result, "Azure Read result");
        retry_result_ok(result.into_job_status())
    }
}

#[async_trait]
impl OcrBackend for AzureReadBackend {
    #[instrument(level = "debug", skip_all, fields(bytes = image.len()))]
    async fn submit(&self, image: &[u8]) -> Result<JobHandle> {
        let url = self.analyze_url()?;
        let url = &url;
        let handle =
            retry_transient("Azure Read submit", move || self.submit_once(url, image))
                .await?;
        debug!(%handle, "Submitted OCR job");
        Ok(handle)
    }

    #[instrument(level = "trace", skip_all, fields(job = %job))]
    async fn poll(&self, job: &JobHandle) -> Result<JobStatus> {
        let url = self.results_url(job)?;
        let url = &url;
        retry_transient("Azure Read poll", move || self.poll_once(url)).await
    }
}

/// Extract the operation ID from an `Operation-Location` header.
fn job_handle_from_headers(headers: &HeaderMap) -> Result<JobHandle> {
    let location = headers
        .get(OPERATION_LOCATION_HEADER)
        .ok_or_else(|| anyhow!("Azure Read response has no {OPERATION_LOCATION_HEADER}"))?
        .to_str()
        .with_context(|| format!("{OPERATION_LOCATION_HEADER} is not valid text"))?;
    job_handle_from_location(location)
}

/// The operation ID is the last path segment of the operation URL.
fn job_handle_from_location(location: &str) -> Result<JobHandle> {
    let path = location.split(['?', '#']).next().unwrap_or_default();
    match path.trim_end_matches('/').rsplit('/').next() {
        Some(id) if !id.is_empty() && !id.contains(':') => Ok(JobHandle(id.to_owned())),
        _ => Err(anyhow!(
            "cannot find operation ID in {OPERATION_LOCATION_HEADER}: {location:?}"
        )),
    }
}

/// Status values returned by the Read API.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
enum ReadStatus {
    NotStarted,
    Running,
    Succeeded,
    Failed,
}

/// Response body of `analyzeResults`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadOperationResult {
    /// Where the operation is in its lifecycle.
    status: ReadStatus,

    /// Only present once the operation has succeeded.
    #[serde(default)]
    analyze_result: Option<AnalyzeResult>,
}

/// The text we found, one entry per page of the submitted image.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResult {
    #[serde(default)]
    read_results: Vec<ReadResult>,
}

#[derive(Debug, Deserialize)]
struct ReadResult {
    #[serde(default)]
    lines: Vec<ReadLine>,
}

#[derive(Debug, Deserialize)]
struct ReadLine {
    text: String,
}

impl ReadOperationResult {
    /// Convert to our backend-independent status.
    fn into_job_status(self) -> JobStatus {
        match self.status {
            ReadStatus::NotStarted => JobStatus::Pending,
            ReadStatus::Running => JobStatus::Running,
            ReadStatus::Failed => JobStatus::Failed,
            ReadStatus::Succeeded => JobStatus::Succeeded(
                self.analyze_result
                    .unwrap_or_default()
                    .read_results
                    .into_iter()
                    .flat_map(|result| result.lines)
                    .map(|line| line.text)
                    .collect(),
            ),
        }
    }
}
