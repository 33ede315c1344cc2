use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use super::Registry;
use super::chunk::{self, Chunk};
use super::config::{ConvertConfig, PipelineConfig, Workspaces};
use super::convert::{self, ConversionResult, DoclingEngine, StructureRecognizer};
use super::error::Result;
use super::render::{self, ChromiumEngine, RenderEngine};
use super::request::{FilingCategory, FilingRequest};
use super::traits::{ChunkOperations, ConversionOperations, FilingOperations, RenderOperations};
use super::workspace::WorkspaceKind;

/// The filing retrieval and conversion pipeline.
///
/// A `Pipeline` holds no per-call state. Its only shared mutable state is the
/// registry rate limiter, and cloning a pipeline shares that limiter, so clones
/// can serve concurrent tool calls.
///
/// # Examples
///
/// ```ignore
/// use filingkit::{FilingCategory, FilingOperations, Pipeline, PipelineConfig, RegistryConfig};
///
/// let config = PipelineConfig {
///     registry: RegistryConfig::new("ResearchBot research@example.com"),
///     ..PipelineConfig::default()
/// };
/// let pipeline = Pipeline::new(config)?;
/// let html = pipeline
///     .download_filing("1018724", 2024, FilingCategory::CurrentReport, "amzn_2024_8_k")
///     .await?;
/// ```
#[derive(Clone)]
pub struct Pipeline {
    registry: Registry,
    workspaces: Workspaces,
    renderer: Arc<dyn RenderEngine>,
    recognizer: Arc<dyn StructureRecognizer>,
    convert: ConvertConfig,
    year_window: (i32, i32),
}

impl Pipeline {
    /// Builds a pipeline with the headless Chromium renderer and the Docling recognizer.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let registry = Registry::with_config(&config.registry)?;
        Ok(Self {
            registry,
            workspaces: config.workspaces,
            renderer: Arc::new(ChromiumEngine::new(config.render)),
            recognizer: Arc::new(DoclingEngine::new(config.convert.docling.clone())),
            convert: config.convert,
            year_window: (config.registry.min_year, config.registry.max_year),
        })
    }

    /// Replaces the rendering engine.
    pub fn with_render_engine(mut self, engine: Arc<dyn RenderEngine>) -> Self {
        self.renderer = engine;
        self
    }

    /// Replaces the structure-recognition engine.
    pub fn with_recognizer(mut self, recognizer: Arc<dyn StructureRecognizer>) -> Self {
        self.recognizer = recognizer;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn workspaces(&self) -> &Workspaces {
        &self.workspaces
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("registry", &self.registry)
            .field("workspaces", &self.workspaces)
            .field("convert", &self.convert)
            .field("year_window", &self.year_window)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl FilingOperations for Pipeline {
    async fn download_filing(
        &self,
        entity_id: &str,
        fiscal_year: i32,
        filing_category: FilingCategory,
        destination_subpath: &str,
    ) -> Result<PathBuf> {
        let request = FilingRequest::new(
            entity_id,
            fiscal_year,
            filing_category,
            destination_subpath,
            self.year_window,
        )?;
        self.workspaces
            .resolve(WorkspaceKind::Html, &request.destination_subpath)?;

        tracing::info!(
            "Downloading {} for CIK {} ({}) into {}",
            request.filing_category,
            request.entity_id,
            request.fiscal_year,
            request.destination_subpath
        );
        self.registry
            .download_filing(&self.workspaces, &request)
            .await
    }
}

#[async_trait]
impl RenderOperations for Pipeline {
    async fn render_to_paginated(&self, source_path: &str, output_path: &str) -> Result<PathBuf> {
        render::render_to_paginated(
            &self.workspaces,
            self.renderer.as_ref(),
            source_path,
            output_path,
        )
        .await
    }
}

#[async_trait]
impl ConversionOperations for Pipeline {
    async fn convert_to_text(&self, input_file_path: &str) -> Result<ConversionResult> {
        convert::convert_to_text(
            &self.workspaces,
            self.recognizer.as_ref(),
            &self.convert,
            input_file_path,
        )
        .await
    }
}

#[async_trait]
impl ChunkOperations for Pipeline {
    async fn read_chunk(
        &self,
        markdown_filename: &str,
        start_offset: i64,
        length: i64,
    ) -> Result<Chunk> {
        chunk::read_chunk(&self.workspaces, markdown_filename, start_offset, length).await
    }
}
