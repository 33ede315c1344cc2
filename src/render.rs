//! HTML to PDF rendering.
//!
//! [`render_to_paginated`] owns validation and persistence; the actual layout
//! work is delegated to a [`RenderEngine`]. The default engine,
//! [`ChromiumEngine`], drives a headless Chromium in a throwaway profile: each
//! call launches its own browser and tears it down on every exit path, so no
//! cookies, cache or half-loaded pages carry over between documents.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tempfile::TempDir;
use tokio::process::Command;
use url::Url;

use super::config::{RenderConfig, Workspaces};
use super::error::{FilingKitError, Result};
use super::workspace::{WorkspaceKind, is_nonempty_file, write_atomic};

/// Output of one engine run.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    /// The PDF bytes
    pub pdf: Vec<u8>,
    /// False when resource loading was cut off by the settle timeout
    pub settled: bool,
}

/// A headless layout engine turning a markup file into a paginated document.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    async fn render(&self, source: &Path) -> Result<RenderedDocument>;
}

/// Renders `source` (html workspace) to `output` (pdf workspace).
///
/// An existing non-empty output is kept and returned as is. The PDF is written
/// only after the engine succeeded, so a failed render leaves nothing behind.
///
/// # Errors
///
/// * `FilingKitError::PathEscape` - either path leaves its workspace
/// * `FilingKitError::SourceNotFound` - the source file does not exist
/// * `FilingKitError::RenderError` - the engine failed or produced no PDF
pub async fn render_to_paginated(
    workspaces: &Workspaces,
    engine: &dyn RenderEngine,
    source: &str,
    output: &str,
) -> Result<PathBuf> {
    let source_path = workspaces.resolve_file(WorkspaceKind::Html, source)?;
    let output_path = workspaces.resolve_file(WorkspaceKind::Pdf, output)?;

    let is_file = tokio::fs::metadata(&source_path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(FilingKitError::SourceNotFound(source_path));
    }

    if is_nonempty_file(&output_path).await {
        tracing::info!("PDF already exists at {}", output_path.display());
        return Ok(output_path);
    }

    let rendered = engine.render(&source_path).await?;
    if !rendered.settled {
        tracing::warn!(
            "Resources of {} did not settle in time, PDF may be missing images or styles",
            source_path.display()
        );
    }
    if !rendered.pdf.starts_with(b"%PDF") {
        return Err(FilingKitError::RenderError(format!(
            "engine returned no PDF for {}",
            source_path.display()
        )));
    }

    let size = rendered.pdf.len();
    write_atomic(&output_path, rendered.pdf).await?;
    tracing::info!(
        "Rendered {} to {} ({} bytes)",
        source_path.display(),
        output_path.display(),
        size
    );

    Ok(output_path)
}

/// Headless Chromium/Chrome driven through its `--print-to-pdf` mode.
#[derive(Debug, Clone)]
pub struct ChromiumEngine {
    config: RenderConfig,
}

impl ChromiumEngine {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }
}

impl Default for ChromiumEngine {
    fn default() -> Self {
        Self::new(RenderConfig::default())
    }
}

/// One disposable browser instance with its own profile directory.
///
/// The browser process is killed if the session is dropped before it exits and
/// the profile (including the intermediate PDF) is deleted with the session.
struct BrowserSession {
    profile: TempDir,
}

impl BrowserSession {
    fn open() -> Result<Self> {
        let profile = tempfile::Builder::new()
            .prefix("filingkit-browser-")
            .tempdir()
            .map_err(|e| FilingKitError::RenderError(format!("cannot create profile: {}", e)))?;
        Ok(Self { profile })
    }

    fn pdf_path(&self) -> PathBuf {
        self.profile.path().join("page.pdf")
    }

    fn command(&self, config: &RenderConfig, page: &Url) -> Command {
        let settle_ms = config.settle_timeout.as_millis().to_string();
        let mut command = Command::new(&config.browser);
        command
            .arg("--headless")
            .arg("--disable-gpu")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--hide-scrollbars")
            .arg("--run-all-compositor-stages-before-draw")
            .arg(format!("--user-data-dir={}", self.profile.path().display()))
            .arg(format!("--virtual-time-budget={}", settle_ms))
            .arg(format!("--timeout={}", settle_ms))
            .arg("--no-pdf-header-footer")
            .arg(format!("--print-to-pdf={}", self.pdf_path().display()))
            .args(&config.extra_args)
            .arg(page.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    async fn print(self, config: &RenderConfig, source: &Path) -> Result<RenderedDocument> {
        let absolute = std::path::absolute(source)?;
        let page = Url::from_file_path(&absolute).map_err(|_| {
            FilingKitError::RenderError(format!("cannot address {} as a URL", absolute.display()))
        })?;

        let child = self.command(config, &page).spawn().map_err(|e| {
            FilingKitError::RenderError(format!(
                "failed to launch {}: {}",
                config.browser.display(),
                e
            ))
        })?;

        let started = Instant::now();
        let deadline = config.settle_timeout + config.export_timeout;
        let output = tokio::time::timeout(deadline, child.wait_with_output())
            .await
            .map_err(|_| {
                FilingKitError::RenderError(format!("export did not finish within {:?}", deadline))
            })?
            .map_err(|e| FilingKitError::RenderError(format!("browser crashed: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FilingKitError::RenderError(format!(
                "browser exited with {}: {}",
                output.status,
                stderr.lines().last().unwrap_or_default()
            )));
        }

        let pdf = tokio::fs::read(self.pdf_path())
            .await
            .map_err(|e| FilingKitError::RenderError(format!("no PDF produced: {}", e)))?;

        Ok(RenderedDocument {
            pdf,
            settled: started.elapsed() < config.settle_timeout,
        })
    }
}

#[async_trait]
impl RenderEngine for ChromiumEngine {
    async fn render(&self, source: &Path) -> Result<RenderedDocument> {
        tracing::debug!(
            "Launching {} for {}",
            self.config.browser.display(),
            source.display()
        );
        BrowserSession::open()?.print(&self.config, source).await
    }
}
