//! Command-line entry points.

use std::sync::Arc;

use crate::{
    config::VisionConfig,
    ocr::{
        OcrOrchestrator, OrchestratorOpts, azure::AzureReadBackend,
        raster::PopplerRasterSource,
    },
    prelude::*,
    ui::Ui,
};

pub mod ocr;
pub mod serve;

/// Build an orchestrator that talks to Azure and renders PDFs with poppler.
fn azure_orchestrator(
    ui: Ui,
    config: VisionConfig,
    opts: &OrchestratorOpts,
) -> Result<OcrOrchestrator> {
    debug!(?config, "Using Azure Computer Vision");
    let backend = AzureReadBackend::new(config)?;
    Ok(OcrOrchestrator::new(
        Arc::new(backend),
        Arc::new(PopplerRasterSource),
        opts.clone(),
        ui,
    ))
}
