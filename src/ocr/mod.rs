//! Driving OCR jobs to completion, for single images and whole documents.

use std::{sync::Arc, time::Duration};

use clap::Args;
use tokio::time::{Instant, sleep};

use crate::{
    prelude::*,
    ui::{ProgressConfig, Ui},
};

use self::{
    backend::{JobStatus, OcrBackend},
    file_type::FileType,
    raster::{RasterSource, normalize_image},
};

pub mod azure;
pub mod backend;
pub mod file_type;
pub mod raster;
#[cfg(test)]
pub mod testing;

/// Timing and rendering options for OCR.
#[derive(Args, Clone, Debug)]
pub struct OrchestratorOpts {
    /// How often to check on a submitted OCR job, in milliseconds.
    #[clap(long = "poll-interval-ms", default_value = "500")]
    pub poll_interval_ms: u64,

    /// Give up on an OCR job after this many seconds. Use 0 to wait until the
    /// service reports that the job has finished, however long that takes.
    #[clap(long = "poll-timeout", default_value = "60")]
    pub poll_timeout_secs: u64,

    /// How long to pause between the pages of a PDF, in milliseconds. This
    /// keeps us under the service's rate limits.
    #[clap(long = "page-delay-ms", default_value = "3000")]
    pub page_delay_ms: u64,

    /// The DPI to use when rasterizing PDF pages.
    #[clap(long, default_value = "300")]
    pub dpi: u32,
}

impl OrchestratorOpts {
    /// Time between status polls.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// How long to wait for a job, if we have a limit.
    pub fn poll_timeout(&self) -> Option<Duration> {
        match self.poll_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Pause between pages.
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

impl Default for OrchestratorOpts {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            poll_timeout_secs: 60,
            page_delay_ms: 3000,
            dpi: 300,
        }
    }
}

/// How a single OCR job ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    /// The job finished, and found these lines.
    Succeeded(Vec<String>),
    /// The backend reported that the job failed.
    Failed,
    /// We stopped waiting for the job.
    TimedOut,
}

/// The text of one page of a document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageResult {
    /// 1-based page number.
    pub page_number: usize,

    /// Recognized text. Never empty.
    pub text: String,
}

impl PageResult {
    /// Format this page for inclusion in a document's text.
    fn to_block(&self) -> String {
        format!("--- Page {} ---\n{}", self.page_number, self.text)
    }
}

/// Runs OCR jobs against an [`OcrBackend`], rasterizing documents with a
/// [`RasterSource`] as needed.
pub struct OcrOrchestrator {
    backend: Arc<dyn OcrBackend>,
    raster: Arc<dyn RasterSource>,
    opts: OrchestratorOpts,
    ui: Ui,
}

impl OcrOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        backend: Arc<dyn OcrBackend>,
        raster: Arc<dyn RasterSource>,
        opts: OrchestratorOpts,
        ui: Ui,
    ) -> Self {
        Self {
            backend,
            raster,
            opts,
            ui,
        }
    }

    /// Submit an image and wait for the job to finish or time out.
    ///
    /// Errors are reserved for failures talking to the backend.
    #[instrument(level = "debug", skip_all)]
    pub async fn run_job(&self, image: &[u8]) -> Result<JobOutcome> {
        let job = self.backend.submit(image).await?;
        let started = Instant::now();
        let poll_interval = self.opts.poll_interval();
        let poll_timeout = self.opts.poll_timeout();
        loop {
            match self.backend.poll(&job).await? {
                JobStatus::Succeeded(lines) => return Ok(JobOutcome::Succeeded(lines)),
                JobStatus::Failed => return Ok(JobOutcome::Failed),
                status @ (JobStatus::Pending | JobStatus::Running) => {
                    trace!(%job, ?status, "OCR job still in progress");
                }
            }
            if let Some(timeout) = poll_timeout
                && started.elapsed() >= timeout
            {
                return Ok(JobOutcome::TimedOut);
            }
            sleep(poll_interval).await;
        }
    }

    /// OCR a single image, returning its lines joined with newlines.
    ///
    /// A failed or abandoned job produces an empty string, not an error.
    #[instrument(level = "debug", skip_all, fields(bytes = image.len()))]
    pub async fn ocr_image(&self, image: Vec<u8>) -> Result<String> {
        let image = normalize_image(image).await?;
        match self.run_job(&image).await? {
            JobOutcome::Succeeded(lines) => Ok(lines.join("\n")),
            JobOutcome::Failed => {
                warn!("OCR job failed, no text available");
                Ok(String::new())
            }
            JobOutcome::TimedOut => {
                warn!(
                    timeout_secs = self.opts.poll_timeout_secs,
                    "OCR job did not finish in time, no text available"
                );
                Ok(String::new())
            }
        }
    }

    /// OCR every page of a PDF, returning the text of each page that has any,
    /// labeled with its page number and separated by blank lines.
    ///
    /// Pages that fail to render or OCR are logged and left out.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub async fn ocr_document(&self, path: &Path) -> Result<String> {
        let pages = self.ocr_pages(path).await?;
        Ok(pages
            .iter()
            .map(PageResult::to_block)
            .collect::<Vec<_>>()
            .join("\n\n"))
    }

    /// OCR every page of a PDF, in order.
    pub async fn ocr_pages(&self, path: &Path) -> Result<Vec<PageResult>> {
        let page_count = self
            .raster
            .page_count(path)
            .await
            .with_context(|| format!("failed to open PDF {:?}", path.display()))?;
        let pb = self.ui.new_progress_bar(
            &ProgressConfig {
                emoji: "📄",
                msg: "OCRing pages",
                done_msg: "OCRed pages",
            },
            page_count as u64,
        );

        let mut pages = Vec::with_capacity(page_count);
        for page_number in 1..=page_count {
            info!(page_number, page_count, "Processing page");
            match self.ocr_page(path, page_number).await {
                Ok(text) if text.is_empty() => {
                    debug!(page_number, "No text found on page");
                }
                Ok(text) => pages.push(PageResult { page_number, text }),
                Err(err) => {
                    warn!(page_number, "Skipping page: {err:#}");
                }
            }
            pb.inc(1);

            // Respect the backend's rate limits between pages.
            if page_number < page_count {
                sleep(self.opts.page_delay()).await;
            }
        }
        Ok(pages)
    }

    /// Render and OCR a single page.
    async fn ocr_page(&self, path: &Path, page_number: usize) -> Result<String> {
        let image = self
            .raster
            .render_page(path, page_number, self.opts.dpi)
            .await
            .with_context(|| format!("failed to render page {page_number}"))?;
        self.ocr_image(image)
            .await
            .with_context(|| format!("failed to OCR page {page_number}"))
    }

    /// OCR a file on disk, which must already have been classified.
    pub async fn ocr_file(&self, path: &Path, file_type: FileType) -> Result<String> {
        match file_type {
            FileType::Pdf => self.ocr_document(path).await,
            FileType::Image => {
                let image = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("failed to read {:?}", path.display()))?;
                self.ocr_image(image).await
            }
        }
    }

    /// OCR an in-memory file.
    ///
    /// PDFs are written to a temporary file for rendering, which is removed
    /// however OCR turns out.
    pub async fn ocr_buffer(&self, data: Vec<u8>, file_type: FileType) -> Result<String> {
        match file_type {
            FileType::Image => self.ocr_image(data).await,
            FileType::Pdf => {
                let tmp = tempfile::Builder::new()
                    .prefix("ocr-")
                    .suffix(".pdf")
                    .tempfile()
                    .context("failed to create temporary PDF")?;
                tokio::fs::write(tmp.path(), &data)
                    .await
                    .with_context(|| {
                        format!("failed to write temporary PDF {:?}", tmp.path().display())
                    })?;
                let result = self.ocr_document(tmp.path()).await;
                if let Err(err) = tmp.close() {
                    warn!("Failed to remove temporary PDF: {err}");
                }
                result
            }
        }
    }
}
