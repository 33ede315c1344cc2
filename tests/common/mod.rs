#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode, Uri, header::USER_AGENT},
};
use filingkit::{
    FilingKitError, Pipeline, PipelineConfig, RecognizedDocument, RegistryConfig, RegistryUrls,
    RenderEngine, RenderedDocument, StructureRecognizer, Workspaces,
};
use std::{
    collections::{HashMap, VecDeque},
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

pub const TEST_AGENT: &str = "filingkit-tests test@example.com";

pub const AMZN_CIK: &str = "0001018724";
pub const AMZN_FOLDER: &str = "/Archives/edgar/data/1018724/000101872424000161";
pub const AMZN_HISTORY_PAGE: &str = "/submissions/CIK0001018724-submissions-001.json";
pub const AMZN_2015_FOLDER: &str = "/Archives/edgar/data/1018724/000101872415000050";

pub fn fixture_path(relative: impl AsRef<Path>) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(relative)
}

pub fn read_fixture(relative: impl AsRef<Path>) -> String {
    fs::read_to_string(fixture_path(relative)).expect("fixture file should be readable")
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub user_agent: Option<String>,
}

#[derive(Clone, Default)]
struct StubState {
    routes: Arc<Mutex<HashMap<String, VecDeque<(u16, Vec<u8>)>>>>,
    log: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// An in-process stand-in for the SEC hosts, serving both the data and the
/// archive paths from one address.
pub struct StubRegistry {
    url: String,
    state: StubState,
}

async fn serve(State(state): State<StubState>, uri: Uri, headers: HeaderMap) -> (StatusCode, Vec<u8>) {
    let path = uri.path().to_string();
    state.log.lock().unwrap().push(RecordedRequest {
        path: path.clone(),
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });

    let mut routes = state.routes.lock().unwrap();
    let Some(queue) = routes.get_mut(&path) else {
        return (StatusCode::NOT_FOUND, b"Not Found".to_vec());
    };
    // The last response of a sequence repeats.
    let (status, body) = if queue.len() > 1 {
        queue.pop_front().unwrap()
    } else {
        queue.front().cloned().unwrap()
    };
    (StatusCode::from_u16(status).unwrap(), body)
}

impl StubRegistry {
    pub async fn start() -> Self {
        let state = StubState::default();
        let app = Router::new().fallback(serve).with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}", addr),
            state,
        }
    }

    /// A stub serving the fixture 8-K filing of Amazon for 2024 and one older
    /// history page reaching back to 2010.
    pub async fn with_amazon_filing() -> Self {
        let stub = Self::start().await;
        stub.serve(
            "/submissions/CIK0001018724.json",
            200,
            read_fixture("submissions/CIK0001018724.json"),
        );
        stub.serve(
            &format!("{}/index.json", AMZN_FOLDER),
            200,
            read_fixture("filing/index.json"),
        );
        stub.serve(
            &format!("{}/amzn-20241031.htm", AMZN_FOLDER),
            200,
            read_fixture("filing/amzn-20241031.htm"),
        );
        stub.serve(
            &format!("{}/amzn-20241031_g1.jpg", AMZN_FOLDER),
            200,
            vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'],
        );
        stub.serve(
            &format!("{}/amzn-20241031.xsd", AMZN_FOLDER),
            200,
            "<xs:schema/>",
        );
        stub.serve(
            &format!("{}/amzn-20241031_lab.xml", AMZN_FOLDER),
            200,
            "<link:linkbase/>",
        );
        stub.serve(
            AMZN_HISTORY_PAGE,
            200,
            read_fixture("submissions/CIK0001018724-submissions-001.json"),
        );
        stub.serve(
            &format!("{}/d36415d8k.htm", AMZN_2015_FOLDER),
            200,
            "<html><body><p>FORM 8-K</p><p>October 22, 2015</p></body></html>",
        );
        stub
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn serve(&self, path: &str, status: u16, body: impl Into<Vec<u8>>) {
        self.serve_sequence(path, vec![(status, body.into())]);
    }

    /// Answers consecutive requests to `path` with `responses` in order.
    pub fn serve_sequence(&self, path: &str, responses: Vec<(u16, Vec<u8>)>) {
        self.state
            .routes
            .lock()
            .unwrap()
            .insert(path.to_string(), responses.into());
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.log.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.log.lock().unwrap().len()
    }

    pub fn hits(&self, path: &str) -> usize {
        self.state
            .log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .count()
    }
}

pub fn pipeline_config(registry_url: &str, root: &Path) -> PipelineConfig {
    let mut config = PipelineConfig {
        registry: RegistryConfig::new(TEST_AGENT)
            .with_base_urls(RegistryUrls::single_host(registry_url))
            .with_initial_backoff(Duration::from_millis(10))
            .with_year_range(2001, 2025),
        workspaces: Workspaces::under(root),
        ..PipelineConfig::default()
    };
    config.convert.inline_threshold = 50_000;
    config
}

/// A pipeline against `registry_url` with workspaces under `root` and fake engines.
pub fn pipeline(registry_url: &str, root: &Path) -> Pipeline {
    Pipeline::new(pipeline_config(registry_url, root))
        .unwrap()
        .with_render_engine(Arc::new(FakeRenderer::default()))
        .with_recognizer(Arc::new(FakeRecognizer::new(RecognizedDocument::default())))
}

/// Produces a minimal PDF naming the source document.
#[derive(Default)]
pub struct FakeRenderer {
    pub calls: AtomicUsize,
    pub unsettled: bool,
}

#[async_trait]
impl RenderEngine for FakeRenderer {
    async fn render(&self, source: &Path) -> filingkit::Result<RenderedDocument> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let html = tokio::fs::read_to_string(source).await?;
        let pdf = format!("%PDF-1.7\n% rendered from {} bytes of markup\n%%EOF\n", html.len());
        Ok(RenderedDocument {
            pdf: pdf.into_bytes(),
            settled: !self.unsettled,
        })
    }
}

/// Returns a fixed document for any input.
pub struct FakeRecognizer {
    pub calls: AtomicUsize,
    document: RecognizedDocument,
}

impl FakeRecognizer {
    pub fn new(document: RecognizedDocument) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            document,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StructureRecognizer for FakeRecognizer {
    async fn recognize(&self, _pdf: &Path) -> filingkit::Result<RecognizedDocument> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.document.clone())
    }
}

pub struct FailingRecognizer;

#[async_trait]
impl StructureRecognizer for FailingRecognizer {
    async fn recognize(&self, _pdf: &Path) -> filingkit::Result<RecognizedDocument> {
        Err(FilingKitError::ConversionError(
            "layout model crashed on page 3".to_string(),
        ))
    }
}
