//! In-memory stand-ins for our OCR backend and PDF renderer.
//!
//! Each "page" is a short piece of text, and the fake backend "recognizes" an
//! image by splitting its bytes into lines. A few magic prefixes trigger
//! failures:
//!
//! - `fail`: the job ends with [`JobStatus::Failed`].
//! - `slow`: the job never finishes.
//! - `error`: submission returns an error.
//! - `unrenderable`: the raster source can't render this page.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use crate::{prelude::*, ui::Ui};

use super::{
    OcrOrchestrator, OrchestratorOpts,
    backend::{JobHandle, JobStatus, OcrBackend},
    raster::RasterSource,
};

/// Fake [`OcrBackend`].
#[derive(Default)]
pub struct FakeBackend {
    /// How many times each job reports [`JobStatus::Running`] before finishing.
    pub running_polls: usize,

    /// Every image submitted, in order.
    pub submissions: Mutex<Vec<Vec<u8>>>,

    /// Total number of polls.
    pub polls: AtomicUsize,

    /// Number of polls per job.
    polls_by_job: Mutex<Vec<usize>>,
}

impl FakeBackend {
    /// A backend whose jobs stay running for `running_polls` polls.
    pub fn with_running_polls(running_polls: usize) -> Self {
        Self {
            running_polls,
            ..Self::default()
        }
    }

    /// The submitted images, as text.
    pub fn submitted_text(&self) -> Vec<String> {
        self.submissions
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(|data| String::from_utf8_lossy(data).into_owned())
            .collect()
    }
}

#[async_trait]
impl OcrBackend for FakeBackend {
    async fn submit(&self, image: &[u8]) -> Result<JobHandle> {
        if image.starts_with(b"error") {
            return Err(anyhow!("connection reset by peer"));
        }
        let mut submissions = self.submissions.lock().expect("lock poisoned");
        submissions.push(image.to_vec());
        self.polls_by_job.lock().expect("lock poisoned").push(0);
        Ok(JobHandle((submissions.len() - 1).to_string()))
    }

    async fn poll(&self, job: &JobHandle) -> Result<JobStatus> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let idx = job.0.parse::<usize>()?;
        let image = self.submissions.lock().expect("lock poisoned")[idx].clone();
        let polls = {
            let mut polls_by_job = self.polls_by_job.lock().expect("lock poisoned");
            polls_by_job[idx] += 1;
            polls_by_job[idx]
        };
        if image.starts_with(b"slow") || polls <= self.running_polls {
            Ok(JobStatus::Running)
        } else if image.starts_with(b"fail") {
            Ok(JobStatus::Failed)
        } else {
            let text = String::from_utf8_lossy(&image).into_owned();
            Ok(JobStatus::Succeeded(
                text.lines().map(|line| line.to_owned()).collect(),
            ))
        }
    }
}

/// Fake [`RasterSource`] serving a fixed list of pages for any path.
pub struct FakeRaster {
    /// Page contents.
    pub pages: Vec<&'static str>,

    /// Pages rendered, in order, 1-based.
    pub rendered: Mutex<Vec<usize>>,

    /// Every path we were asked about, and whether it existed at the time.
    pub paths: Mutex<Vec<(PathBuf, bool)>>,
}

impl FakeRaster {
    /// Create a fake document with the given pages.
    pub fn new(pages: &[&'static str]) -> Self {
        Self {
            pages: pages.to_vec(),
            rendered: Mutex::new(vec![]),
            paths: Mutex::new(vec![]),
        }
    }
}

#[async_trait]
impl RasterSource for FakeRaster {
    async fn page_count(&self, path: &Path) -> Result<usize> {
        self.paths
            .lock()
            .expect("lock poisoned")
            .push((path.to_owned(), path.exists()));
        if self.pages.is_empty() {
            Err(anyhow!("not a PDF: {:?}", path.display()))
        } else {
            Ok(self.pages.len())
        }
    }

    async fn render_page(
        &self,
        _path: &Path,
        page_number: usize,
        _dpi: u32,
    ) -> Result<Vec<u8>> {
        self.rendered
            .lock()
            .expect("lock poisoned")
            .push(page_number);
        let page = self.pages[page_number - 1];
        if page.starts_with("unrenderable") {
            Err(anyhow!("pdftocairo failed on page {page_number}"))
        } else {
            Ok(page.as_bytes().to_vec())
        }
    }
}

/// Options with no waiting at all.
pub fn instant_opts() -> OrchestratorOpts {
    OrchestratorOpts {
        poll_interval_ms: 0,
        poll_timeout_secs: 60,
        page_delay_ms: 0,
        dpi: 300,
    }
}

/// Build an orchestrator around our fakes.
pub fn fake_orchestrator(
    backend: Arc<FakeBackend>,
    raster: Arc<FakeRaster>,
    opts: OrchestratorOpts,
) -> OcrOrchestrator {
    OcrOrchestrator::new(backend, raster, opts, Ui::init_for_tests())
}
