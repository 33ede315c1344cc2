use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use super::Registry;
use super::config::Workspaces;
use super::error::{FilingKitError, Result};
use super::parsing::assets::{XBRL_COMPANION_SUFFIXES, extract_asset_refs, is_renderable_markup};
use super::request::{FilingCategory, FilingRequest, archive_cik};
use super::workspace::{WorkspaceKind, contained_join, is_nonempty_file, write_atomic};

/// Name of the manifest written next to a completed download.
pub const MANIFEST_FILE: &str = ".filingkit.json";

#[derive(Debug, Clone, Deserialize)]
pub struct Submission {
    pub cik: String,
    #[serde(default)]
    pub name: String,
    pub filings: FilingsData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilingsData {
    pub recent: RecentFilings,
    /// Older pages of the history, each served as a bare [`RecentFilings`]
    #[serde(default)]
    pub files: Vec<FilingFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilingFile {
    pub name: String,
    #[serde(rename = "filingCount", default)]
    pub filing_count: u64,
    #[serde(rename = "filingFrom")]
    pub filing_from: String,
    #[serde(rename = "filingTo")]
    pub filing_to: String,
}

impl FilingFile {
    /// Whether the page's filing-date range touches `year`. An unreadable bound
    /// is treated as open.
    pub fn covers_year(&self, year: i32) -> bool {
        let bound = |date: &str| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .ok()
                .map(|d| d.year())
        };
        let from = bound(&self.filing_from).unwrap_or(i32::MIN);
        let to = bound(&self.filing_to).unwrap_or(i32::MAX);
        (from..=to).contains(&year)
    }
}

/// Column-oriented list of recent filings, as served by the submissions endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RecentFilings {
    #[serde(rename = "accessionNumber")]
    pub accession_number: Vec<String>,
    #[serde(rename = "filingDate")]
    pub filing_date: Vec<String>,
    #[serde(rename = "reportDate")]
    pub report_date: Option<Vec<String>>,
    pub form: Vec<String>,
    #[serde(rename = "primaryDocument")]
    pub primary_document: Option<Vec<String>>,
}

/// One filed submission: where it lives and what its main document is called.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingIndexEntry {
    pub accession_number: String,
    pub primary_document_name: String,
    pub filing_date: NaiveDate,
    pub form: String,
    pub report_date: Option<String>,
}

impl RecentFilings {
    fn get_vec_item_at(vec_opt: &Option<Vec<String>>, idx: usize) -> Option<String> {
        vec_opt
            .as_ref()
            .and_then(|v| v.get(idx).cloned())
            .filter(|s| !s.is_empty())
    }

    /// Turns the parallel columns into entries, skipping rows that lack a
    /// primary document or carry an unparseable filing date.
    pub fn entries(&self) -> Vec<FilingIndexEntry> {
        let mut entries = Vec::with_capacity(self.accession_number.len());

        for (idx, accession) in self.accession_number.iter().enumerate() {
            let (Some(form), Some(date)) = (self.form.get(idx), self.filing_date.get(idx)) else {
                continue;
            };
            let Some(primary) = Self::get_vec_item_at(&self.primary_document, idx) else {
                continue;
            };
            let Ok(filing_date) = NaiveDate::parse_from_str(date, "%Y-%m-%d") else {
                tracing::debug!("Skipping {} with bad filing date {:?}", accession, date);
                continue;
            };

            entries.push(FilingIndexEntry {
                accession_number: accession.clone(),
                primary_document_name: primary,
                filing_date,
                form: form.clone(),
                report_date: Self::get_vec_item_at(&self.report_date, idx),
            });
        }

        entries
    }
}

/// Picks the most recently filed entry of `category` filed during `fiscal_year`.
/// Ties on filing date go to the greater accession number.
pub fn select_filing(
    entries: &[FilingIndexEntry],
    category: FilingCategory,
    fiscal_year: i32,
) -> Option<&FilingIndexEntry> {
    entries
        .iter()
        .filter(|e| category.matches_form(&e.form) && e.filing_date.year() == fiscal_year)
        .max_by(|a, b| {
            a.filing_date
                .cmp(&b.filing_date)
                .then_with(|| a.accession_number.cmp(&b.accession_number))
        })
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryResponse {
    pub directory: Directory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Directory {
    pub item: Vec<DirectoryItem>,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryItem {
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default)]
    pub size: String,
}

/// Record of a completed download, used to short-circuit repeat requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadManifest {
    pub request: FilingRequest,
    pub entry: FilingIndexEntry,
    /// Assets fetched alongside the primary document, relative to the destination
    pub assets: Vec<String>,
}

impl DownloadManifest {
    fn describes(&self, request: &FilingRequest) -> bool {
        self.request.entity_id == request.entity_id
            && self.request.fiscal_year == request.fiscal_year
            && self.request.filing_category == request.filing_category
    }
}

#[derive(Debug)]
enum UrlType {
    Submission,
    SubmissionPage,
    FilingDirectory,
    FilingContent,
}

impl Registry {
    fn build_url(&self, url_type: UrlType, params: &[&str]) -> String {
        match url_type {
            UrlType::Submission => {
                format!("{}/submissions/CIK{}.json", self.data_url, params[0])
            }
            UrlType::SubmissionPage => {
                format!("{}/submissions/{}", self.data_url, params[0])
            }
            UrlType::FilingDirectory => {
                let (cik, acc_no) = (params[0], params[1]);
                format!(
                    "{}/data/{}/{}/index.json",
                    self.archives_url,
                    archive_cik(cik),
                    acc_no.replace('-', "")
                )
            }
            UrlType::FilingContent => {
                let (cik, acc_no, filename) = (params[0], params[1], params[2]);
                format!(
                    "{}/data/{}/{}/{}",
                    self.archives_url,
                    archive_cik(cik),
                    acc_no.replace('-', ""),
                    filename
                )
            }
        }
    }

    /// Retrieves the submission index for a normalized CIK.
    pub async fn submissions(&self, cik: &str) -> Result<Submission> {
        let url = self.build_url(UrlType::Submission, &[cik]);
        self.get_json(&url).await
    }

    /// Retrieves an older page of a submission history by the name listed in
    /// [`FilingsData::files`].
    pub async fn submission_page(&self, name: &str) -> Result<RecentFilings> {
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(FilingKitError::RegistryUnavailable {
                url: name.to_string(),
                reason: "unexpected submission page name".to_string(),
            });
        }
        let url = self.build_url(UrlType::SubmissionPage, &[name]);
        self.get_json(&url).await
    }

    /// Finds the filing `request` asks for, looking at the recent filings first
    /// and then at every older page whose date range covers the fiscal year.
    async fn find_filing(
        &self,
        submission: &Submission,
        request: &FilingRequest,
    ) -> Result<Option<FilingIndexEntry>> {
        let recent = submission.filings.recent.entries();
        if let Some(entry) = select_filing(&recent, request.filing_category, request.fiscal_year)
        {
            return Ok(Some(entry.clone()));
        }

        let mut older = Vec::new();
        for page in submission
            .filings
            .files
            .iter()
            .filter(|page| page.covers_year(request.fiscal_year))
        {
            tracing::debug!(
                "Searching {} ({} filings, {} to {})",
                page.name,
                page.filing_count,
                page.filing_from,
                page.filing_to
            );
            older.extend(self.submission_page(&page.name).await?.entries());
        }

        Ok(select_filing(&older, request.filing_category, request.fiscal_year).cloned())
    }

    /// Retrieves the file listing of one filing.
    pub async fn filing_directory(
        &self,
        cik: &str,
        accession_number: &str,
    ) -> Result<DirectoryResponse> {
        let url = self.build_url(UrlType::FilingDirectory, &[cik, accession_number]);
        self.get_json(&url).await
    }

    /// URL of a file inside a filing's archive folder.
    pub fn filing_url(&self, cik: &str, accession_number: &str, filename: &str) -> String {
        self.build_url(UrlType::FilingContent, &[cik, accession_number, filename])
    }

    /// Downloads the filing described by `request` into the html workspace.
    ///
    /// The primary document lands at `<html>/<destination>/<primary document>`, and
    /// its relatively linked assets plus inline XBRL companions are stored beside it
    /// with the registry's relative layout, so the document renders offline.
    ///
    /// Repeat requests are cheap: if the destination holds a manifest for the same
    /// entity, year and category and the primary document is present, no request is
    /// made at all. An existing primary document is never overwritten.
    ///
    /// # Errors
    ///
    /// * `FilingKitError::PathEscape` - destination leaves the html workspace
    /// * `FilingKitError::RegistryUnavailable` - index or primary document fetch failed
    /// * `FilingKitError::FilingNotFound` - no matching filing, or its primary document
    ///   is not HTML
    ///
    /// Failing asset fetches are logged and skipped.
    pub async fn download_filing(
        &self,
        workspaces: &Workspaces,
        request: &FilingRequest,
    ) -> Result<PathBuf> {
        let destination = workspaces.resolve(WorkspaceKind::Html, &request.destination_subpath)?;

        if let Some(path) = Self::completed_download(&destination, request).await {
            tracing::info!("Filing already downloaded at {}", path.display());
            return Ok(path);
        }

        let not_found = || FilingKitError::FilingNotFound {
            entity_id: request.entity_id.clone(),
            fiscal_year: request.fiscal_year,
            category: request.filing_category.to_string(),
        };

        let submission = self.submissions(&request.entity_id).await?;
        let entry = self
            .find_filing(&submission, request)
            .await?
            .ok_or_else(not_found)?;

        if !is_renderable_markup(&entry.primary_document_name) {
            tracing::warn!(
                "Primary document {} of {} is not HTML",
                entry.primary_document_name,
                entry.accession_number
            );
            return Err(not_found());
        }

        let primary_path =
            contained_join(&destination, &entry.primary_document_name).ok_or_else(|| {
                FilingKitError::PathEscape {
                    path: entry.primary_document_name.clone(),
                    workspace: WorkspaceKind::Html.name(),
                }
            })?;
        let primary_url = self.filing_url(
            &request.entity_id,
            &entry.accession_number,
            &entry.primary_document_name,
        );

        let primary_bytes = if is_nonempty_file(&primary_path).await {
            tracing::info!(
                "Keeping existing primary document {}",
                primary_path.display()
            );
            tokio::fs::read(&primary_path).await?
        } else {
            let bytes = self.get_bytes(&primary_url).await?;
            write_atomic(&primary_path, bytes.clone()).await?;
            tracing::info!(
                "Downloaded {} ({} bytes) to {}",
                entry.primary_document_name,
                bytes.len(),
                primary_path.display()
            );
            bytes
        };

        let mut assets = extract_asset_refs(&String::from_utf8_lossy(&primary_bytes));
        for companion in self.companion_files(&request.entity_id, &entry).await {
            if !assets.contains(&companion) {
                assets.push(companion);
            }
        }

        let saved = self
            .download_assets(&primary_url, &primary_path, &destination, &assets)
            .await;

        let manifest = DownloadManifest {
            request: request.clone(),
            entry,
            assets: saved,
        };
        write_atomic(
            &destination.join(MANIFEST_FILE),
            serde_json::to_vec_pretty(&manifest)?,
        )
        .await?;

        Ok(primary_path)
    }

    async fn completed_download(destination: &Path, request: &FilingRequest) -> Option<PathBuf> {
        let raw = tokio::fs::read(destination.join(MANIFEST_FILE)).await.ok()?;
        let manifest: DownloadManifest = serde_json::from_slice(&raw).ok()?;
        if !manifest.describes(request) {
            return None;
        }
        let primary = contained_join(destination, &manifest.entry.primary_document_name)?;
        is_nonempty_file(&primary).await.then_some(primary)
    }

    /// Inline XBRL companions listed in the filing folder that share the primary
    /// document's stem. A missing listing yields no companions.
    async fn companion_files(&self, cik: &str, entry: &FilingIndexEntry) -> Vec<String> {
        let name = &entry.primary_document_name;
        let stem = name.rsplit_once('.').map_or(name.as_str(), |(stem, _)| stem);

        match self.filing_directory(cik, &entry.accession_number).await {
            Ok(listing) => listing
                .directory
                .item
                .into_iter()
                .map(|item| item.name)
                .filter(|item| {
                    XBRL_COMPANION_SUFFIXES
                        .iter()
                        .any(|suffix| item.strip_prefix(stem) == Some(*suffix))
                })
                .collect(),
            Err(err) => {
                tracing::warn!(
                    "Could not list filing folder for {}: {}",
                    entry.accession_number,
                    err
                );
                Vec::new()
            }
        }
    }

    /// Fetches each asset relative to the primary document. Returns the assets
    /// present on disk afterwards, relative to `destination`.
    async fn download_assets(
        &self,
        primary_url: &str,
        primary_path: &Path,
        destination: &Path,
        assets: &[String],
    ) -> Vec<String> {
        let mut saved = Vec::new();
        let Ok(base) = Url::parse(primary_url) else {
            tracing::warn!("Primary URL {} is not a valid URL", primary_url);
            return saved;
        };
        let local_dir = primary_path.parent().unwrap_or(destination);

        for asset in assets {
            let target = contained_join(local_dir, asset).filter(|p| p.starts_with(destination));
            let (Some(target), Ok(url)) = (target, base.join(asset)) else {
                tracing::warn!("Skipping asset with unsafe path {:?}", asset);
                continue;
            };

            if !is_nonempty_file(&target).await {
                let written = match self.get_bytes(url.as_str()).await {
                    Ok(bytes) => write_atomic(&target, bytes).await,
                    Err(err) => Err(err),
                };
                if let Err(err) = written {
                    tracing::warn!("Skipping asset {}: {}", asset, err);
                    continue;
                }
                tracing::debug!("Saved asset {}", target.display());
            }

            if let Ok(relative) = target.strip_prefix(destination) {
                saved.push(relative.to_string_lossy().into_owned());
            }
        }

        saved
    }
}
