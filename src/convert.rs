//! PDF to Markdown conversion.
//!
//! Structure recognition (headings, paragraphs, tables, pictures) is delegated
//! to a [`StructureRecognizer`]. Whatever engine is plugged in, the images it
//! reports are externalized the same way:
//!
//! ```text
//! pdf/report.pdf
//!   └─▶ markdown/report.md                        ![Image](../extracted_images/report/report_image_0001.png)
//!   └─▶ extracted_images/report/report_image_0001.png
//!   └─▶ extracted_images/report/report_image_0002.jpg
//! ```
//!
//! Image names depend only on the PDF's stem and the image's position, and the
//! Markdown links are relative, so the artifacts can be moved together.
//!
//! Recognizers sometimes classify boxed elements such as a table of contents as
//! pictures; those are externalized like any other image.

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::config::{ConvertConfig, Workspaces};
use super::error::{FilingKitError, Result};
use super::parsing::images::{image_extension, lift_data_uri_images, replace_placeholders};
use super::workspace::{WorkspaceKind, is_nonempty_file, relative_link, write_atomic};

pub use super::parsing::images::image_placeholder;

/// A picture found by structure recognition.
#[derive(Debug, Clone)]
pub struct RecognizedImage {
    pub data: Vec<u8>,
    pub media_type: String,
    /// 1-based page number, when the engine reports it
    pub page: Option<u32>,
    pub caption: Option<String>,
}

/// Output of structure recognition.
///
/// `markup` marks the spot of the `n`-th entry of `images` with
/// [`image_placeholder`]`(n)`.
#[derive(Debug, Clone, Default)]
pub struct RecognizedDocument {
    pub markup: String,
    pub images: Vec<RecognizedImage>,
}

/// Document-structure recognition over a paginated document.
#[async_trait]
pub trait StructureRecognizer: Send + Sync {
    async fn recognize(&self, pdf: &Path) -> Result<RecognizedDocument>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversionMode {
    /// `payload` is the Markdown itself
    Inline,
    /// `payload` is a file name in the markdown workspace
    FileHandle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionResult {
    pub mode: ConversionMode,
    pub payload: String,
    /// Externalized images in document order, relative to the image workspace
    pub image_refs: Vec<String>,
}

/// Converts `input` (pdf workspace) to Markdown.
///
/// The Markdown is always saved as `<markdown>/<stem>.md`. Results shorter than
/// `config.inline_threshold` characters are also returned inline; longer ones
/// return the file name for chunked reading. If the Markdown file already exists
/// it is reused without running recognition again.
///
/// # Errors
///
/// * `FilingKitError::PathEscape` - `input` leaves the pdf workspace
/// * `FilingKitError::SourceNotFound` - the PDF does not exist
/// * `FilingKitError::ConversionError` - recognition failed
pub async fn convert_to_text(
    workspaces: &Workspaces,
    recognizer: &dyn StructureRecognizer,
    config: &ConvertConfig,
    input: &str,
) -> Result<ConversionResult> {
    let pdf_path = workspaces.resolve_file(WorkspaceKind::Pdf, input)?;
    if !is_nonempty_file(&pdf_path).await {
        return Err(FilingKitError::SourceNotFound(pdf_path));
    }

    let stem = pdf_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| FilingKitError::SourceNotFound(pdf_path.clone()))?;
    let md_name = format!("{}.md", stem);
    let md_path = workspaces.markdown.join(&md_name);
    let image_dir = workspaces.images.join(&stem);

    let (markdown, image_refs) = if is_nonempty_file(&md_path).await {
        tracing::info!("Reusing existing Markdown {}", md_path.display());
        let markdown = tokio::fs::read_to_string(&md_path).await?;
        let refs = existing_image_refs(&image_dir, &stem).await?;
        (markdown, refs)
    } else {
        let document = recognizer.recognize(&pdf_path).await.map_err(|e| match e {
            FilingKitError::ConversionError(_) => e,
            other => FilingKitError::ConversionError(other.to_string()),
        })?;
        let (markdown, refs) =
            externalize_images(workspaces, &image_dir, &stem, document).await?;
        write_atomic(&md_path, markdown.clone().into_bytes()).await?;
        tracing::info!(
            "Converted {} to {} with {} images in {}",
            pdf_path.display(),
            md_path.display(),
            refs.len(),
            image_dir.display()
        );
        (markdown, refs)
    };

    Ok(dispatch(markdown, md_name, image_refs, config.inline_threshold))
}

/// Size policy: inline below `threshold` characters, file handle otherwise.
pub fn dispatch(
    markdown: String,
    md_name: String,
    image_refs: Vec<String>,
    threshold: usize,
) -> ConversionResult {
    if markdown.chars().count() < threshold {
        ConversionResult {
            mode: ConversionMode::Inline,
            payload: markdown,
            image_refs,
        }
    } else {
        ConversionResult {
            mode: ConversionMode::FileHandle,
            payload: md_name,
            image_refs,
        }
    }
}

/// Deterministic file name of the `ordinal`-th (1-based) image of `stem`.
pub fn image_file_name(stem: &str, ordinal: usize, extension: &str) -> String {
    format!("{}_image_{:04}.{}", stem, ordinal, extension)
}

async fn externalize_images(
    workspaces: &Workspaces,
    image_dir: &Path,
    stem: &str,
    document: RecognizedDocument,
) -> Result<(String, Vec<String>)> {
    let mut links = Vec::with_capacity(document.images.len());
    let mut refs = Vec::with_capacity(document.images.len());

    for (index, image) in document.images.into_iter().enumerate() {
        let extension = image_extension(&image.media_type, &image.data);
        let name = image_file_name(stem, index + 1, extension);
        let path = image_dir.join(&name);

        write_atomic(&path, image.data).await?;

        let link = relative_link(&workspaces.markdown, &path)?;
        let alt = image.caption.unwrap_or_else(|| "Image".to_string());
        links.push(format!("![{}]({})", alt.replace(['[', ']'], ""), link));
        refs.push(format!("{}/{}", stem, name));
        tracing::debug!("Externalized image {} (page {:?})", path.display(), image.page);
    }

    let markdown = replace_placeholders(&document.markup, |index| links.get(index).cloned());
    Ok((markdown, refs))
}

async fn existing_image_refs(image_dir: &Path, stem: &str) -> Result<Vec<String>> {
    let prefix = format!("{}_image_", stem);
    let mut names = Vec::new();

    let mut entries = match tokio::fs::read_dir(image_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(&prefix) {
            names.push(name);
        }
    }
    names.sort();

    Ok(names
        .into_iter()
        .map(|name| format!("{}/{}", stem, name))
        .collect())
}

/// Structure recognition by the Docling command-line converter.
///
/// Docling is asked to embed pictures as base64 data URIs; those are lifted
/// back out into [`RecognizedImage`]s so externalization stays under our control.
#[derive(Debug, Clone)]
pub struct DoclingEngine {
    executable: PathBuf,
}

impl DoclingEngine {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }
}

impl Default for DoclingEngine {
    fn default() -> Self {
        Self::new(ConvertConfig::default().docling)
    }
}

#[async_trait]
impl StructureRecognizer for DoclingEngine {
    async fn recognize(&self, pdf: &Path) -> Result<RecognizedDocument> {
        let scratch = tempfile::Builder::new()
            .prefix("filingkit-docling-")
            .tempdir()
            .map_err(|e| FilingKitError::ConversionError(format!("cannot create scratch dir: {}", e)))?;

        let output = Command::new(&self.executable)
            .arg(pdf)
            .args(["--from", "pdf", "--to", "md", "--image-export-mode", "embedded"])
            .arg("--output")
            .arg(scratch.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                FilingKitError::ConversionError(format!(
                    "failed to launch {}: {}",
                    self.executable.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FilingKitError::ConversionError(format!(
                "docling exited with {}: {}",
                output.status,
                stderr.lines().last().unwrap_or_default()
            )));
        }

        let stem = pdf.file_stem().unwrap_or_default().to_string_lossy();
        let produced = scratch.path().join(format!("{}.md", stem));
        let markdown = tokio::fs::read_to_string(&produced).await.map_err(|e| {
            FilingKitError::ConversionError(format!("docling produced no Markdown: {}", e))
        })?;

        let (markup, embedded) = lift_data_uri_images(&markdown);
        Ok(RecognizedDocument {
            markup,
            images: embedded
                .into_iter()
                .map(|image| RecognizedImage {
                    data: image.data,
                    media_type: image.media_type,
                    page: None,
                    caption: Some(image.alt).filter(|alt| !alt.is_empty()),
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_threshold() {
        let small = dispatch("# Hi".into(), "a.md".into(), vec![], 10);
        assert_eq!(small.mode, ConversionMode::Inline);
        assert_eq!(small.payload, "# Hi");

        let exact = dispatch("0123456789".into(), "a.md".into(), vec![], 10);
        assert_eq!(exact.mode, ConversionMode::FileHandle);
        assert_eq!(exact.payload, "a.md");
    }

    #[test]
    fn test_dispatch_counts_characters() {
        // 5 characters, 15 bytes
        let result = dispatch("한국어문서".into(), "k.md".into(), vec![], 6);
        assert_eq!(result.mode, ConversionMode::Inline);
    }

    #[test]
    fn test_image_file_name() {
        assert_eq!(image_file_name("amzn_8k", 3, "png"), "amzn_8k_image_0003.png");
    }

    #[test]
    fn test_mode_serialization() {
        let json = serde_json::to_value(ConversionMode::FileHandle).unwrap();
        assert_eq!(json, "file-handle");
    }

    #[tokio::test]
    async fn test_missing_docling_is_conversion_error() {
        let engine = DoclingEngine::new("/nonexistent/filingkit-test-docling");
        let err = engine.recognize(Path::new("x.pdf")).await.unwrap_err();
        assert!(matches!(err, FilingKitError::ConversionError(_)));
    }
}
