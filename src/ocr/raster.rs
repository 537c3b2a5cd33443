//! Turning documents into images that our OCR backend accepts.

use std::{collections::BTreeMap, io::Cursor, sync::LazyLock};

use image::ImageFormat;
use regex::Regex;
use tokio::process::Command;

use crate::{
    async_utils::{check_for_command_failure, spawn_blocking_propagating_panics},
    prelude::*,
};

/// Something that can render the pages of a document as images.
#[async_trait]
pub trait RasterSource: Send + Sync + 'static {
    /// How many pages does the document at `path` have?
    async fn page_count(&self, path: &Path) -> Result<usize>;

    /// Render page `page_number` (1-based) at `dpi`, returning PNG data.
    async fn render_page(&self, path: &Path, page_number: usize, dpi: u32)
    -> Result<Vec<u8>>;
}

/// A default error regex for checking poppler output.
static ERROR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)error").expect("failed to compile regex"));

/// Poppler errors that don't actually stop it from rendering.
static DOWNGRADE_TO_WARNING_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)error: xref num").expect("failed to compile regex")
});

/// Does this line of poppler output contain an error?
fn is_error_line(line: &str) -> bool {
    ERROR_REGEX.is_match(line) && !DOWNGRADE_TO_WARNING_REGEX.is_match(line)
}

/// Renders PDFs using poppler's `pdfinfo` and `pdftocairo` CLI tools.
#[derive(Debug, Default)]
pub struct PopplerRasterSource;

#[async_trait]
impl RasterSource for PopplerRasterSource {
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    async fn page_count(&self, path: &Path) -> Result<usize> {
        let output = Command::new("pdfinfo")
            .arg(path)
            .output()
            .await
            .with_context(|| format!("failed to run pdfinfo on {:?}", path.display()))?;
        check_for_command_failure("pdfinfo", &output, None)?;
        let stdout = String::from_utf8(output.stdout)
            .context("pdfinfo output was not valid UTF-8")?;
        parse_pdfinfo_page_count(&stdout)
            .with_context(|| format!("failed to get page count for {:?}", path.display()))
    }

    #[instrument(level = "debug", skip_all, fields(path = %path.display(), page = page_number, dpi))]
    async fn render_page(
        &self,
        path: &Path,
        page_number: usize,
        dpi: u32,
    ) -> Result<Vec<u8>> {
        // `pdftocairo -singlefile` appends `.png` to the output prefix.
        let tmpdir = tempfile::TempDir::with_prefix("page")?;
        let out_prefix = tmpdir.path().join("page");
        let page_arg = page_number.to_string();
        let output = Command::new("pdftocairo")
            .arg("-png")
            .arg("-singlefile")
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-f")
            .arg(&page_arg)
            .arg("-l")
            .arg(&page_arg)
            .arg(path)
            .arg(&out_prefix)
            .output()
            .await
            .with_context(|| {
                format!("failed to run pdftocairo on {:?}", path.display())
            })?;
        check_for_command_failure(
            "pdftocairo",
            &output,
            Some(&is_error_line as &dyn Fn(&str) -> bool),
        )?;

        let png_path = out_prefix.with_extension("png");
        tokio::fs::read(&png_path).await.with_context(|| {
            format!("failed to read rendered page {:?}", png_path.display())
        })
    }
}

/// Extract the `Pages:` property from `pdfinfo` output.
fn parse_pdfinfo_page_count(output: &str) -> Result<usize> {
    let mut properties = BTreeMap::new();
    for line in output.lines() {
        let mut parts = line.splitn(2, ':');
        let key = parts.next().unwrap_or("").trim();
        let value = parts.next().unwrap_or("").trim();
        properties.insert(key, value);
    }
    let page_count = properties
        .get("Pages")
        .ok_or_else(|| anyhow!("failed to find page count in pdfinfo output"))?;
    page_count
        .parse::<usize>()
        .with_context(|| format!("invalid page count in pdfinfo output: {page_count:?}"))
}

/// Image formats the Read API can't handle, but that we can convert to PNG.
const CONVERT_TO_PNG: &[&str] = &["image/gif", "image/webp"];

/// Convert an image to a format our OCR backend accepts, if needed.
///
/// Anything we don't recognize is passed through unchanged, and the backend
/// gets to decide what to do with it.
pub async fn normalize_image(data: Vec<u8>) -> Result<Vec<u8>> {
    let mime_type = infer::get(&data).map(|kind| kind.mime_type());
    match mime_type {
        Some(mime_type) if CONVERT_TO_PNG.contains(&mime_type) => {
            debug!(%mime_type, "Converting image to PNG");
            spawn_blocking_propagating_panics(move || -> Result<Vec<u8>> {
                let image = image::load_from_memory(&data)
                    .with_context(|| format!("failed to decode {mime_type} image"))?;
                let mut png = Cursor::new(Vec::new());
                image
                    .write_to(&mut png, ImageFormat::Png)
                    .context("failed to encode PNG")?;
                Ok(png.into_inner())
            })
            .await
        }
        _ => Ok(data),
    }
}

#[cfg(test)]
mod tests {
    use image::{DynamicImage, RgbaImage};

    use super::*;

    fn encode(format: ImageFormat) -> Vec<u8> {
        let image = DynamicImage::ImageRgba8(RgbaImage::new(4, 4));
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    #[test]
    fn is_error_line_works() {
        assert!(is_error_line("error: something went wrong"));
        assert!(is_error_line("ERROR: something went wrong"));
        assert!(!is_error_line("Warning: something is odd"));
        assert!(!is_error_line(
            "Internal Error: xref num 1234 not found but needed, document has changes, reconstruct aborted"
        ));
    }

    #[test]
    fn parses_pdfinfo_output() {
        let output = "Title:          Scan\nProducer:       scanner\nPages:          7\nEncrypted:      no\n";
        assert_eq!(parse_pdfinfo_page_count(output).unwrap(), 7);
        assert!(parse_pdfinfo_page_count("Title: x\n").is_err());
        assert!(parse_pdfinfo_page_count("Pages: many\n").is_err());
    }

    #[tokio::test]
    async fn gif_is_converted_to_png() {
        let png = normalize_image(encode(ImageFormat::Gif)).await.unwrap();
        assert_eq!(infer::get(&png).unwrap().mime_type(), "image/png");
    }

    #[tokio::test]
    async fn supported_images_pass_through() {
        let original = encode(ImageFormat::Png);
        let normalized = normalize_image(original.clone()).await.unwrap();
        assert_eq!(normalized, original);

        let unknown = b"definitely not an image".to_vec();
        assert_eq!(normalize_image(unknown.clone()).await.unwrap(), unknown);
    }

    #[tokio::test]
    #[ignore = "Requires poppler-utils to be installed"]
    async fn poppler_renders_a_missing_file_as_an_error() {
        let source = PopplerRasterSource;
        assert!(source.page_count(Path::new("/no/such.pdf")).await.is_err());
    }
}
