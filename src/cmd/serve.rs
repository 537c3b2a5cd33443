//! The `serve` subcommand.

use std::sync::Arc;

use clap::Args;

use super::azure_orchestrator;
use crate::{
    config::{DEFAULT_SERVER_ENDPOINT, VisionConfig},
    mcp::{dispatch::RpcDispatcher, serve_stdio, tools::ocr_tools},
    ocr::OrchestratorOpts,
    prelude::*,
    ui::Ui,
};

/// Options for the `serve` subcommand.
#[derive(Debug, Args)]
pub struct ServeOpts {
    #[clap(flatten)]
    pub orchestrator_opts: OrchestratorOpts,
}

/// The `serve` subcommand. Runs an MCP server on stdio until the client
/// closes our input.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_serve(ui: Ui, opts: &ServeOpts) -> Result<()> {
    let config = VisionConfig::from_env(Some(DEFAULT_SERVER_ENDPOINT))?;
    let ocr = azure_orchestrator(ui, config, &opts.orchestrator_opts)?;
    let dispatcher = RpcDispatcher::new(ocr_tools(Arc::new(ocr))?);
    serve_stdio(&dispatcher).await
}
