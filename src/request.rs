use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::{FilingKitError, Result};

/// Registry classification of a disclosure document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilingCategory {
    /// Form 10-K
    #[serde(rename = "10-K")]
    PeriodicAnnual,
    /// Form 10-Q
    #[serde(rename = "10-Q")]
    PeriodicQuarterly,
    /// Form 8-K
    #[serde(rename = "8-K")]
    CurrentReport,
    /// Schedule 14A
    #[serde(rename = "DEF 14A")]
    ProxyStatement,
}

impl FilingCategory {
    pub const VARIANTS: &'static [(&'static str, FilingCategory)] = &[
        ("10-K", FilingCategory::PeriodicAnnual),
        ("10-Q", FilingCategory::PeriodicQuarterly),
        ("8-K", FilingCategory::CurrentReport),
        ("DEF 14A", FilingCategory::ProxyStatement),
    ];

    /// The registry's form name for this category.
    pub fn form(&self) -> &'static str {
        match self {
            FilingCategory::PeriodicAnnual => "10-K",
            FilingCategory::PeriodicQuarterly => "10-Q",
            FilingCategory::CurrentReport => "8-K",
            FilingCategory::ProxyStatement => "DEF 14A",
        }
    }

    /// Compares a registry form name against this category, ignoring case and spaces.
    pub fn matches_form(&self, form: &str) -> bool {
        squash(form) == squash(self.form())
    }
}

fn squash(form: &str) -> String {
    form.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

impl fmt::Display for FilingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.form())
    }
}

/// Accepts form names (`10-K`, `def14a`) and descriptive names (`periodic-annual`).
impl FromStr for FilingCategory {
    type Err = FilingKitError;

    fn from_str(s: &str) -> Result<Self> {
        let key = squash(s).replace('_', "-");
        if let Some((_, category)) = Self::VARIANTS
            .iter()
            .find(|(form, _)| squash(form) == key)
        {
            return Ok(*category);
        }
        match key.as_str() {
            "PERIODIC-ANNUAL" | "ANNUAL" => Ok(FilingCategory::PeriodicAnnual),
            "PERIODIC-QUARTERLY" | "QUARTERLY" => Ok(FilingCategory::PeriodicQuarterly),
            "CURRENT-REPORT" | "CURRENT" => Ok(FilingCategory::CurrentReport),
            "PROXY-STATEMENT" | "PROXY" => Ok(FilingCategory::ProxyStatement),
            _ => Err(FilingKitError::InvalidFilingCategory(s.to_string())),
        }
    }
}

/// Normalizes an entity identifier (CIK) to its 10-digit zero-padded form.
///
/// Surrounding whitespace, leading zeros and leading dashes are ignored; what
/// remains must be 1 to 10 ASCII digits. Normalization is idempotent.
///
/// ```rust
/// use filingkit::normalize_entity_id;
/// assert_eq!(normalize_entity_id(" 1018724 ").unwrap(), "0001018724");
/// assert_eq!(normalize_entity_id("0001018724").unwrap(), "0001018724");
/// assert!(normalize_entity_id("10187x4").is_err());
/// ```
pub fn normalize_entity_id(raw: &str) -> Result<String> {
    let significant = raw.trim().trim_start_matches(['0', '-']);

    if significant.is_empty()
        || significant.len() > 10
        || !significant.chars().all(|c| c.is_ascii_digit())
    {
        return Err(FilingKitError::InvalidIdentifier(raw.to_string()));
    }

    Ok(format!("{:0>10}", significant))
}

/// The unpadded form used in archive paths (`/data/1018724/...`).
pub(crate) fn archive_cik(normalized: &str) -> &str {
    let trimmed = normalized.trim_start_matches('0');
    if trimmed.is_empty() { "0" } else { trimmed }
}

/// A validated request to download one filing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingRequest {
    /// 10-digit zero-padded CIK
    pub entity_id: String,
    pub fiscal_year: i32,
    pub filing_category: FilingCategory,
    /// Directory under the html workspace receiving the filing
    pub destination_subpath: String,
}

impl FilingRequest {
    /// Builds a request, normalizing the identifier and checking the year window.
    pub fn new(
        entity_id: &str,
        fiscal_year: i32,
        filing_category: FilingCategory,
        destination_subpath: impl Into<String>,
        year_window: (i32, i32),
    ) -> Result<Self> {
        let entity_id = normalize_entity_id(entity_id)?;
        let (min, max) = year_window;
        if !(min..=max).contains(&fiscal_year) {
            return Err(FilingKitError::InvalidYear {
                year: fiscal_year,
                min,
                max,
            });
        }
        Ok(Self {
            entity_id,
            fiscal_year,
            filing_category,
            destination_subpath: destination_subpath.into(),
        })
    }
}
