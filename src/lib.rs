//! # FilingKit - SEC filings to PDF and Markdown for LLM agents
//!
//! FilingKit implements the tools an automated agent needs to read regulatory
//! filings from SEC EDGAR:
//!
//! - **`download_filing`** - resolve a company (CIK), fiscal year and form type to
//!   a filing, and download its primary document with the images, stylesheets and
//!   inline XBRL companions it links to
//! - **`render_to_paginated`** - print the HTML/iXBRL document to PDF in a headless browser
//! - **`convert_to_text`** - recognize the PDF's structure into Markdown, externalizing
//!   pictures as image files, and return the text inline or as a file handle
//! - **`read_chunk`** - page through a large Markdown result
//!
//! Artifacts live in four workspace directories (`html/`, `pdf/`, `markdown/`,
//! `extracted_images/`); every path argument is checked against its workspace
//! root before anything touches disk or network.
//!
//! ## Rate limiting
//!
//! SEC.gov allows at most 10 requests per second per client. All registry traffic
//! goes through one sliding-window limiter shared by every clone of the client, and
//! every request carries the client-identification `User-Agent` SEC requires.
//!
//! ## Basic Usage
//!
//! ```ignore
//! use filingkit::{
//!     ChunkOperations, ConversionMode, ConversionOperations, FilingCategory,
//!     FilingOperations, Pipeline, PipelineConfig, RegistryConfig, RenderOperations,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = Pipeline::new(PipelineConfig {
//!         registry: RegistryConfig::new("YourAppName contact@example.com"),
//!         ..PipelineConfig::default()
//!     })?;
//!
//!     pipeline
//!         .download_filing("1018724", 2024, FilingCategory::CurrentReport, "amzn_2024_8_k")
//!         .await?;
//!     pipeline
//!         .render_to_paginated("amzn_2024_8_k/amzn-20241031.htm", "amzn_2024_8_k.pdf")
//!         .await?;
//!
//!     let result = pipeline.convert_to_text("amzn_2024_8_k.pdf").await?;
//!     if result.mode == ConversionMode::FileHandle {
//!         let chunk = pipeline.read_chunk(&result.payload, 0, 50_000).await?;
//!         println!("{}", chunk.describe());
//!     }
//!     Ok(())
//! }
//! ```

mod chunk;
mod config;
mod convert;
mod core;
mod error;
mod filings;
pub mod parsing;
mod pipeline;
mod rate_limit;
mod render;
mod request;
mod traits;
mod workspace;

pub use chunk::{Chunk, DEFAULT_CHUNK_LENGTH, read_chunk};
pub use config::{
    ConvertConfig, FIRST_EDGAR_YEAR, PipelineConfig, RegistryConfig, RegistryUrls, RenderConfig,
    Workspaces,
};
pub use convert::{
    ConversionMode, ConversionResult, DoclingEngine, RecognizedDocument, RecognizedImage,
    StructureRecognizer, convert_to_text, dispatch, image_file_name, image_placeholder,
};
pub use self::core::Registry;
pub use error::{FilingKitError, Result, Stage};
pub use filings::{
    Directory, DirectoryItem, DirectoryResponse, DownloadManifest, FilingFile, FilingIndexEntry,
    FilingsData, MANIFEST_FILE, RecentFilings, Submission, select_filing,
};
pub use pipeline::Pipeline;
pub use rate_limit::SlidingWindowLimiter;
pub use render::{ChromiumEngine, RenderEngine, RenderedDocument, render_to_paginated};
pub use request::{FilingCategory, FilingRequest, normalize_entity_id};
pub use traits::{ChunkOperations, ConversionOperations, FilingOperations, RenderOperations};
pub use workspace::{WorkspaceKind, write_atomic};

/// Current crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
