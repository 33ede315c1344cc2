//! Command-line runner for the filing tools.
//!
//! Each subcommand runs one tool and prints its result as JSON on stdout; logs
//! go to stderr. On failure the JSON names the failing stage and the exit code is 1.
//!
//! ```text
//! filingkit download 1018724 2024 8-K amzn_2024_8_k
//! filingkit render amzn_2024_8_k/amzn-20241031.htm amzn_2024_8_k.pdf
//! filingkit convert amzn_2024_8_k.pdf
//! filingkit read amzn_2024_8_k.md --start 50000
//! ```

use clap::{Parser, Subcommand};
use filingkit::{
    ChunkOperations, ConversionOperations, ConvertConfig, DEFAULT_CHUNK_LENGTH, FilingCategory,
    FilingKitError, FilingOperations, Pipeline, PipelineConfig, RegistryConfig, RenderConfig,
    RenderOperations, Workspaces,
};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "filingkit")]
#[command(version)]
#[command(about = "Download SEC filings and convert them to PDF and Markdown")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding the html/, pdf/, markdown/ and extracted_images/ workspaces
    #[arg(long, global = true, env = "FILINGKIT_ROOT", default_value = ".")]
    root: PathBuf,

    /// Client identification sent to SEC.gov ("AppName contact@example.com")
    #[arg(long, global = true, env = "FILINGKIT_USER_AGENT")]
    user_agent: Option<String>,

    /// Chromium or Chrome executable used for rendering
    #[arg(long, global = true, env = "FILINGKIT_BROWSER", default_value = "chromium")]
    browser: PathBuf,

    /// Pass --no-sandbox to the browser (needed when running as root in containers)
    #[arg(long, global = true, env = "FILINGKIT_NO_SANDBOX")]
    no_sandbox: bool,

    /// Seconds to wait for page resources before printing anyway
    #[arg(long, global = true, env = "FILINGKIT_SETTLE_SECS", default_value_t = 30)]
    settle_secs: u64,

    /// Docling executable used for structure recognition
    #[arg(long, global = true, env = "FILINGKIT_DOCLING", default_value = "docling")]
    docling: PathBuf,

    /// Markdown shorter than this many characters is returned inline
    #[arg(long, global = true, env = "FILINGKIT_INLINE_THRESHOLD", default_value_t = 50_000)]
    inline_threshold: usize,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download a filing's primary document and assets into html/<DESTINATION>
    Download {
        entity_id: String,
        fiscal_year: i32,
        /// 10-K, 10-Q, 8-K or "DEF 14A"
        filing_category: FilingCategory,
        destination: String,
    },
    /// Render html/<SOURCE> to pdf/<OUTPUT>
    Render { source: String, output: String },
    /// Convert pdf/<INPUT> to Markdown
    Convert { input: String },
    /// Read a range of markdown/<FILE>
    Read {
        file: String,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        start: i64,
        #[arg(long, default_value_t = DEFAULT_CHUNK_LENGTH, allow_negative_numbers = true)]
        length: i64,
        /// Print the chunk as annotated text instead of JSON
        #[arg(long)]
        text: bool,
    },
}

impl Cli {
    fn pipeline_config(&self) -> PipelineConfig {
        let registry = match &self.user_agent {
            Some(agent) => RegistryConfig::new(agent.clone()),
            None => {
                tracing::warn!("No --user-agent given; SEC.gov may reject the default identification");
                RegistryConfig::default()
            }
        };

        let mut extra_args = Vec::new();
        if self.no_sandbox {
            extra_args.push("--no-sandbox".to_string());
        }

        PipelineConfig {
            registry,
            workspaces: Workspaces::under(&self.root),
            render: RenderConfig {
                browser: self.browser.clone(),
                settle_timeout: Duration::from_secs(self.settle_secs),
                extra_args,
                ..RenderConfig::default()
            },
            convert: ConvertConfig {
                docling: self.docling.clone(),
                inline_threshold: self.inline_threshold,
            },
        }
    }
}

async fn run(cli: Cli) -> Result<String, FilingKitError> {
    let pipeline = Pipeline::new(cli.pipeline_config())?;

    let output = match cli.command {
        Command::Download {
            entity_id,
            fiscal_year,
            filing_category,
            destination,
        } => {
            let path = pipeline
                .download_filing(&entity_id, fiscal_year, filing_category, &destination)
                .await?;
            json!({ "path": path }).to_string()
        }
        Command::Render { source, output } => {
            let path = pipeline.render_to_paginated(&source, &output).await?;
            json!({ "path": path }).to_string()
        }
        Command::Convert { input } => {
            serde_json::to_string_pretty(&pipeline.convert_to_text(&input).await?)?
        }
        Command::Read {
            file,
            start,
            length,
            text,
        } => {
            let chunk = pipeline.read_chunk(&file, start, length).await?;
            if text {
                chunk.describe()
            } else {
                serde_json::to_string_pretty(&chunk)?
            }
        }
    };

    Ok(output)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!("{}", err);
            println!(
                "{}",
                json!({ "stage": err.stage(), "error": err.to_string() })
            );
            ExitCode::FAILURE
        }
    }
}
