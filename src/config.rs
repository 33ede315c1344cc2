use chrono::Datelike;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// First year with electronic filings on EDGAR.
pub const FIRST_EDGAR_YEAR: i32 = 1994;

/// Configuration for the registry client
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Client identification sent as `User-Agent` ("AppName contact@example.com")
    pub user_agent: String,
    /// Maximum request starts per `rate_window`
    pub rate_limit: u32,
    /// Length of the rolling rate-limit window
    pub rate_window: Duration,
    /// HTTP request timeout
    pub timeout: Duration,
    /// Retries for transient (429/5xx/network) failures
    pub max_retries: u32,
    /// Backoff before the first retry; doubles on each subsequent retry
    pub initial_backoff: Duration,
    /// Base URLs for the registry services
    pub base_urls: RegistryUrls,
    /// Oldest fiscal year accepted
    pub min_year: i32,
    /// Newest fiscal year accepted
    pub max_year: i32,
}

/// Base URLs for the registry services
#[derive(Debug, Clone)]
pub struct RegistryUrls {
    /// Base URL for filing archives (`/data/{cik}/{accession}/...`)
    pub archives: String,
    /// Base URL for the data API (`/submissions/CIK##########.json`)
    pub data: String,
}

impl Default for RegistryUrls {
    fn default() -> Self {
        Self {
            archives: "https://www.sec.gov/Archives/edgar".to_string(),
            data: "https://data.sec.gov".to_string(),
        }
    }
}

impl RegistryUrls {
    /// Points both services at one host, e.g. a local stub server.
    pub fn single_host(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            archives: format!("{}/Archives/edgar", base),
            data: base.to_string(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("filingkit/{} admin@example.com", env!("CARGO_PKG_VERSION")),
            rate_limit: 10,
            rate_window: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            base_urls: RegistryUrls::default(),
            min_year: FIRST_EDGAR_YEAR,
            max_year: chrono::Utc::now().year(),
        }
    }
}

impl RegistryConfig {
    /// Creates a config with the given client identification and defaults elsewhere.
    ///
    /// ```rust
    /// use filingkit::RegistryConfig;
    /// let config = RegistryConfig::new("ResearchBot research@example.com");
    /// assert_eq!(config.rate_limit, 10);
    /// ```
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            ..Self::default()
        }
    }

    pub fn with_base_urls(mut self, base_urls: RegistryUrls) -> Self {
        self.base_urls = base_urls;
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn with_year_range(mut self, min_year: i32, max_year: i32) -> Self {
        self.min_year = min_year;
        self.max_year = max_year;
        self
    }
}

/// The four artifact roots. Nothing is ever written outside of them.
#[derive(Debug, Clone)]
pub struct Workspaces {
    pub html: PathBuf,
    pub pdf: PathBuf,
    pub markdown: PathBuf,
    pub images: PathBuf,
}

impl Default for Workspaces {
    fn default() -> Self {
        Self::under(".")
    }
}

impl Workspaces {
    /// Lays out `html/`, `pdf/`, `markdown/` and `extracted_images/` under `root`.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            html: root.join("html"),
            pdf: root.join("pdf"),
            markdown: root.join("markdown"),
            images: root.join("extracted_images"),
        }
    }
}

/// Headless browser settings for the HTML to PDF step
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Chromium/Chrome executable
    pub browser: PathBuf,
    /// How long to let network-dependent resources settle before printing
    pub settle_timeout: Duration,
    /// Extra time allowed for the export itself; past it the browser is killed
    pub export_timeout: Duration,
    /// Additional command-line switches passed to the browser
    pub extra_args: Vec<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            browser: PathBuf::from("chromium"),
            settle_timeout: Duration::from_secs(30),
            export_timeout: Duration::from_secs(120),
            extra_args: Vec::new(),
        }
    }
}

/// Structure recognition and dispatch settings for the PDF to Markdown step
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    /// Docling executable
    pub docling: PathBuf,
    /// Results shorter than this many characters are returned inline
    pub inline_threshold: usize,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            docling: PathBuf::from("docling"),
            inline_threshold: 50_000,
        }
    }
}

/// Everything a [`crate::Pipeline`] needs.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub registry: RegistryConfig,
    pub workspaces: Workspaces,
    pub render: RenderConfig,
    pub convert: ConvertConfig,
}
