use serde::Serialize;
use std::fmt::Write as _;

use super::config::Workspaces;
use super::error::{FilingKitError, Result};
use super::workspace::WorkspaceKind;

/// Default number of characters returned per chunk.
pub const DEFAULT_CHUNK_LENGTH: i64 = 50_000;

/// A window into a Markdown artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub file: String,
    pub content: String,
    /// Start of `content`, in characters
    pub start_offset: usize,
    /// Length of the whole file, in characters
    pub total_length: usize,
    /// Offset to request next, `None` once the end is reached
    pub next_offset: Option<usize>,
}

impl Chunk {
    /// Human-readable rendering with a position header and an end marker.
    pub fn describe(&self) -> String {
        let end = self.start_offset + self.content.chars().count();
        let mut out = String::with_capacity(self.content.len() + 128);
        let _ = writeln!(out, "File: {}", self.file);
        let _ = writeln!(out, "Total size: {} characters", self.total_length);
        let _ = writeln!(out, "Reading: chars {} - {}", self.start_offset, end);
        out.push('\n');
        out.push_str(&self.content);
        out.push_str("\n\n");
        out.push_str(match self.next_offset {
            Some(_) => "...[More content available]",
            None => "...[End of file]",
        });
        out
    }
}

/// Reads up to `length` characters of `<markdown>/<file>` starting at `start_offset`.
///
/// Pure read; callers page through a file by feeding each `next_offset` back in.
///
/// # Errors
///
/// * `FilingKitError::InvalidRange` - negative start or non-positive length
/// * `FilingKitError::PathEscape` - `file` leaves the markdown workspace
/// * `FilingKitError::SourceNotFound` - the file does not exist
pub async fn read_chunk(
    workspaces: &Workspaces,
    file: &str,
    start_offset: i64,
    length: i64,
) -> Result<Chunk> {
    if start_offset < 0 || length <= 0 {
        return Err(FilingKitError::InvalidRange {
            start: start_offset,
            length,
        });
    }
    let path = workspaces.resolve_file(WorkspaceKind::Markdown, file)?;

    let text = match tokio::fs::read(&path).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) if matches!(
            e.kind(),
            std::io::ErrorKind::NotFound | std::io::ErrorKind::IsADirectory
        ) =>
        {
            return Err(FilingKitError::SourceNotFound(path));
        }
        Err(e) => return Err(e.into()),
    };

    let start = usize::try_from(start_offset).unwrap_or(usize::MAX);
    let length = usize::try_from(length).unwrap_or(usize::MAX);
    let total_length = text.chars().count();

    let content: String = text.chars().skip(start).take(length).collect();
    let end = start.saturating_add(length);
    let next_offset = (end < total_length).then_some(end);

    Ok(Chunk {
        file: file.to_string(),
        content,
        start_offset: start.min(total_length),
        total_length,
        next_offset,
    })
}
