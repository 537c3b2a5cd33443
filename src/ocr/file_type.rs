//! Deciding how to OCR an input.

use std::str::FromStr;

use clap::ValueEnum;

use crate::prelude::*;

/// Image extensions accepted everywhere.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "tiff", "tif"];

/// Extra image extensions accepted by the command line.
pub const CLI_IMAGE_EXTENSIONS: &[&str] = &["webp"];

/// The kind of input we've been given.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FileType {
    /// A PDF, which we OCR page by page.
    Pdf,
    /// A single image.
    Image,
}

impl FileType {
    /// Classify `path` by its extension. Images must have one of
    /// [`IMAGE_EXTENSIONS`] or `extra_image_extensions`.
    pub fn for_path(path: &Path, extra_image_extensions: &[&str]) -> Result<Self> {
        let ext = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if ext == "pdf" {
            Ok(FileType::Pdf)
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str())
            || extra_image_extensions.contains(&ext.as_str())
        {
            Ok(FileType::Image)
        } else if ext.is_empty() {
            Err(anyhow!("unsupported file type: no extension"))
        } else {
            Err(anyhow!("unsupported file type: .{ext}"))
        }
    }
}

impl FromStr for FileType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pdf" => Ok(FileType::Pdf),
            "image" => Ok(FileType::Image),
            _ => Err(anyhow!("unsupported file type: {s}")),
        }
    }
}
