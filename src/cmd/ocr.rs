//! The `ocr` subcommand.

use clap::Args;

use super::azure_orchestrator;
use crate::{
    config::VisionConfig,
    data_url::decode_base64_payload,
    ocr::{
        OrchestratorOpts,
        file_type::{CLI_IMAGE_EXTENSIONS, FileType},
    },
    prelude::*,
    ui::Ui,
};

/// Options for the `ocr` subcommand.
#[derive(Debug, Args)]
pub struct OcrOpts {
    /// The PDF or image file to OCR.
    #[clap(required_unless_present = "base64", conflicts_with = "base64")]
    pub input_path: Option<PathBuf>,

    /// Base64-encoded file data to OCR instead of a file. May be a `data:`
    /// URL.
    #[clap(long, value_name = "DATA", requires = "file_type")]
    pub base64: Option<String>,

    /// The type of the `--base64` data.
    #[clap(long = "type", value_enum, requires = "base64")]
    pub file_type: Option<FileType>,

    #[clap(flatten)]
    pub orchestrator_opts: OrchestratorOpts,
}

/// The `ocr` subcommand. Prints the extracted text to standard output.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_ocr(ui: Ui, opts: &OcrOpts) -> Result<()> {
    let config = VisionConfig::from_env(None)?;
    let ocr = azure_orchestrator(ui, config, &opts.orchestrator_opts)?;

    let text = match (&opts.input_path, &opts.base64, opts.file_type) {
        (Some(path), _, _) => {
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                return Err(anyhow!("file not found: {}", path.display()));
            }
            let file_type = FileType::for_path(path, CLI_IMAGE_EXTENSIONS)?;
            info!(path = %path.display(), ?file_type, "OCRing file");
            ocr.ocr_file(path, file_type).await?
        }
        (None, Some(data), Some(file_type)) => {
            let data = decode_base64_payload(data)?;
            info!(bytes = data.len(), ?file_type, "OCRing base64 data");
            ocr.ocr_buffer(data, file_type).await?
        }
        _ => return Err(anyhow!("must specify a file, or --base64 and --type")),
    };

    println!("{text}");
    Ok(())
}
