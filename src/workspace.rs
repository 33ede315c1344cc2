//! Workspace roots and path containment.
//!
//! Every path argument a tool receives is relative to one of four workspace
//! roots. Resolution is lexical and happens before any I/O: absolute paths and
//! `..` segments are rejected outright, so a request that would escape its root
//! fails with [`FilingKitError::PathEscape`] without touching disk or network.

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use super::config::Workspaces;
use super::error::{FilingKitError, Result};

/// The artifact category a path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceKind {
    Html,
    Pdf,
    Markdown,
    Images,
}

impl WorkspaceKind {
    pub fn name(&self) -> &'static str {
        match self {
            WorkspaceKind::Html => "html",
            WorkspaceKind::Pdf => "pdf",
            WorkspaceKind::Markdown => "markdown",
            WorkspaceKind::Images => "extracted_images",
        }
    }
}

impl Workspaces {
    pub fn root(&self, kind: WorkspaceKind) -> &Path {
        match kind {
            WorkspaceKind::Html => &self.html,
            WorkspaceKind::Pdf => &self.pdf,
            WorkspaceKind::Markdown => &self.markdown,
            WorkspaceKind::Images => &self.images,
        }
    }

    /// Resolves `relative` strictly inside the `kind` workspace.
    ///
    /// A leading component naming the workspace itself (`html/t1`) is dropped
    /// when more components follow, so paths returned by one tool can be fed to
    /// the next unchanged.
    pub fn resolve(&self, kind: WorkspaceKind, relative: &str) -> Result<PathBuf> {
        let root = self.root(kind);
        let escape = || FilingKitError::PathEscape {
            path: relative.to_string(),
            workspace: kind.name(),
        };

        let mut parts = Vec::new();
        for component in Path::new(relative.trim()).components() {
            match component {
                Component::Normal(part) => parts.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(escape());
                }
            }
        }

        // `html/t1` names `t1`, but a lone `html` is a directory of that name.
        let root_name = root.file_name();
        if parts.len() > 1 && (Some(parts[0]) == root_name || parts[0] == kind.name()) {
            parts.remove(0);
        }
        let mut resolved = root.to_path_buf();
        resolved.extend(parts);

        // Symlinks inside the workspace could still point outside of it.
        if let (Ok(canonical_root), Ok(canonical)) = (root.canonicalize(), resolved.canonicalize())
        {
            if !canonical.starts_with(&canonical_root) {
                return Err(escape());
            }
        }

        Ok(resolved)
    }

    /// Like [`Workspaces::resolve`] but rejects paths that name the root itself.
    pub fn resolve_file(&self, kind: WorkspaceKind, relative: &str) -> Result<PathBuf> {
        let resolved = self.resolve(kind, relative)?;
        if resolved == self.root(kind) {
            return Err(FilingKitError::PathEscape {
                path: relative.to_string(),
                workspace: kind.name(),
            });
        }
        Ok(resolved)
    }
}

/// Joins a registry-relative reference (`images/logo.gif`) onto `base`,
/// returning `None` if the reference is absolute or climbs out of `base`.
pub fn contained_join(base: &Path, relative: &str) -> Option<PathBuf> {
    let mut joined = base.to_path_buf();
    let mut pushed = false;
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => {
                joined.push(part);
                pushed = true;
            }
            Component::CurDir => {}
            _ => return None,
        }
    }
    pushed.then_some(joined)
}

/// Lexical relative path from directory `from` to `to` (`../extracted_images/x`),
/// using `/` separators so it can be embedded in Markdown.
pub fn relative_link(from: &Path, to: &Path) -> Result<String> {
    let from = std::path::absolute(from)?;
    let to = std::path::absolute(to)?;
    let from: Vec<_> = from.components().filter(|c| *c != Component::CurDir).collect();
    let to: Vec<_> = to.components().filter(|c| *c != Component::CurDir).collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = vec!["..".to_string(); from.len() - common];
    parts.extend(
        to[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    Ok(parts.join("/"))
}

/// Writes `contents` to `path` via a temporary sibling file and a rename, so a
/// reader never observes a half-written artifact. Parent directories are created.
pub async fn write_atomic(path: &Path, contents: Vec<u8>) -> Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&parent)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
        tmp.write_all(&contents)?;
        tmp.flush()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| FilingKitError::FileError(std::io::Error::other(e)))?
}

/// True if `path` is an existing regular file with at least one byte.
pub async fn is_nonempty_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}
