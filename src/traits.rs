//! One trait per remotely callable tool.
//!
//! The [`Pipeline`](crate::Pipeline) implements all four; a transport layer (an
//! RPC server, the bundled CLI) only needs these signatures. Input validation
//! errors (`InvalidIdentifier`, `InvalidYear`, `PathEscape`, `InvalidRange`) are
//! raised before any file or network I/O.

use async_trait::async_trait;
use std::path::PathBuf;

use super::chunk::Chunk;
use super::convert::ConversionResult;
use super::error::Result;
use super::request::FilingCategory;

/// Locating and downloading filings from the registry.
#[async_trait]
pub trait FilingOperations {
    /// Downloads the latest `filing_category` filing of `entity_id` filed in
    /// `fiscal_year` into `destination_subpath` of the html workspace and
    /// returns the path of its primary document.
    async fn download_filing(
        &self,
        entity_id: &str,
        fiscal_year: i32,
        filing_category: FilingCategory,
        destination_subpath: &str,
    ) -> Result<PathBuf>;
}

/// Markup to paginated document.
#[async_trait]
pub trait RenderOperations {
    /// Renders an html-workspace document to a pdf-workspace PDF.
    async fn render_to_paginated(&self, source_path: &str, output_path: &str) -> Result<PathBuf>;
}

/// Paginated document to Markdown.
#[async_trait]
pub trait ConversionOperations {
    /// Converts a pdf-workspace PDF, returning the Markdown inline or by file name.
    async fn convert_to_text(&self, input_file_path: &str) -> Result<ConversionResult>;
}

/// Incremental access to large Markdown results.
#[async_trait]
pub trait ChunkOperations {
    /// Reads a character range of a markdown-workspace file.
    async fn read_chunk(
        &self,
        markdown_filename: &str,
        start_offset: i64,
        length: i64,
    ) -> Result<Chunk>;
}
