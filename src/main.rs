use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing_subscriber::{
    EnvFilter, Layer as _, filter::Directive, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt as _,
};

use self::{prelude::*, ui::Ui};

mod async_utils;
mod cmd;
mod config;
mod data_url;
mod mcp;
mod ocr;
mod prelude;
mod retry;
mod ui;

/// OCR scanned PDFs and images using Azure Computer Vision.
#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    after_help = r#"
Environment Variables:
  - AZURE_VISION_KEY: The Azure Computer Vision key to use.
  - AZURE_VISION_ENDPOINT: The Azure Computer Vision endpoint. Required for
    `ocr`. `serve` defaults to https://westus.api.cognitive.microsoft.com/.
  - RUST_LOG (optional): Logging filter. Defaults to `info`.

  PDFs are rendered using `pdfinfo` and `pdftocairo` from poppler-utils.

  These variables may be set in a standard `.env` file.
"#
)]
struct Opts {
    #[clap(subcommand)]
    subcmd: Cmd,
}

/// The subcommands we support.
#[derive(Debug, Subcommand)]
enum Cmd {
    /// OCR a single PDF or image, printing the text to standard output.
    Ocr(cmd::ocr::OcrOpts),
    /// Run an MCP server on standard input and output.
    Serve(cmd::serve::ServeOpts),
}

impl Cmd {
    /// Is anybody watching our progress bars?
    fn shows_progress(&self) -> bool {
        match self {
            Cmd::Ocr(_) => true,
            Cmd::Serve(_) => false,
        }
    }
}

/// Our entry point, which can return an error. [`anyhow::Result`] will
/// automatically print a nice error message with optional backtrace.
#[tokio::main]
async fn main() -> Result<()> {
    let ui = Ui::init();

    // Initialize tracing.
    let directive =
        Directive::from_str("info").expect("built-in directive should be valid");
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_writer(ui.get_stderr_writer())
        .with_filter(env_filter);

    // We can stack multiple layers here if we need to.
    tracing_subscriber::registry().with(subscriber).init();

    // Call our real `main` function now that logging is set up.
    real_main(ui).await
}

/// Our real entry point.
#[instrument(level = "debug", name = "main", skip_all)]
async fn real_main(ui: Ui) -> Result<()> {
    // Load environment variables from a `.env` file, if it exists.
    dotenvy::dotenv().ok();

    // Parse command-line arguments.
    let opts = Opts::parse();
    debug!("Parsed options: {:?}", opts);

    // Hide the progress bars if nobody is looking at them.
    if !opts.subcmd.shows_progress() {
        ui.hide_progress_bars();
    }

    // Run the appropriate subcommand.
    match &opts.subcmd {
        Cmd::Ocr(opts) => {
            cmd::ocr::cmd_ocr(ui, opts).await?;
        }
        Cmd::Serve(opts) => {
            cmd::serve::cmd_serve(ui, opts).await?;
        }
    }
    Ok(())
}
