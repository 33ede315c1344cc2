mod common;

use common::{
    AMZN_2015_FOLDER, AMZN_FOLDER, AMZN_HISTORY_PAGE, StubRegistry, TEST_AGENT, pipeline,
    read_fixture,
};
use filingkit::{
    DownloadManifest, FilingCategory, FilingKitError, FilingOperations, MANIFEST_FILE, Stage,
};

#[tokio::test]
async fn download_places_primary_document_and_assets() {
    let stub = StubRegistry::with_amazon_filing().await;
    let root = tempfile::tempdir().unwrap();
    let pipeline = pipeline(stub.url(), root.path());

    let path = pipeline
        .download_filing("1018724", 2024, FilingCategory::CurrentReport, "amzn_2024_8_k")
        .await
        .unwrap();

    let destination = root.path().join("html").join("amzn_2024_8_k");
    assert_eq!(path, destination.join("amzn-20241031.htm"));
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        read_fixture("filing/amzn-20241031.htm")
    );
    assert!(destination.join("amzn-20241031_g1.jpg").is_file());
    assert!(destination.join("amzn-20241031.xsd").is_file());
    assert!(destination.join("amzn-20241031_lab.xml").is_file());
    // report.css is a 404 on the registry and is skipped
    assert!(!destination.join("report.css").exists());
    assert_eq!(stub.hits(&format!("{}/report.css", AMZN_FOLDER)), 1);

    let manifest: DownloadManifest =
        serde_json::from_slice(&std::fs::read(destination.join(MANIFEST_FILE)).unwrap()).unwrap();
    assert_eq!(manifest.entry.accession_number, "0001018724-24-000161");
    assert_eq!(manifest.request.entity_id, "0001018724");
    assert_eq!(
        manifest.assets,
        vec![
            "amzn-20241031_g1.jpg",
            "amzn-20241031.xsd",
            "amzn-20241031_lab.xml"
        ]
    );

    for request in stub.requests() {
        assert_eq!(request.user_agent.as_deref(), Some(TEST_AGENT));
    }
}

#[tokio::test]
async fn repeated_download_makes_no_requests() {
    let stub = StubRegistry::with_amazon_filing().await;
    let root = tempfile::tempdir().unwrap();
    let pipeline = pipeline(stub.url(), root.path());

    let first = pipeline
        .download_filing("1018724", 2024, FilingCategory::CurrentReport, "amzn_2024_8_k")
        .await
        .unwrap();
    let after_first = stub.request_count();

    let second = pipeline
        .download_filing("0001018724", 2024, FilingCategory::CurrentReport, "amzn_2024_8_k")
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(stub.request_count(), after_first);
}

#[tokio::test]
async fn workspace_prefix_in_destination_is_tolerated() {
    let stub = StubRegistry::with_amazon_filing().await;
    let root = tempfile::tempdir().unwrap();
    let pipeline = pipeline(stub.url(), root.path());

    let path = pipeline
        .download_filing("1018724", 2024, FilingCategory::CurrentReport, "html/amzn")
        .await
        .unwrap();

    assert_eq!(
        path,
        root.path().join("html").join("amzn").join("amzn-20241031.htm")
    );
}

#[tokio::test]
async fn invalid_inputs_make_no_requests() {
    let stub = StubRegistry::with_amazon_filing().await;
    let root = tempfile::tempdir().unwrap();
    let pipeline = pipeline(stub.url(), root.path());

    let escape = pipeline
        .download_filing("1018724", 2024, FilingCategory::CurrentReport, "../outside")
        .await
        .unwrap_err();
    assert!(matches!(escape, FilingKitError::PathEscape { .. }));
    assert_eq!(escape.stage(), Stage::Validation);

    let bad_id = pipeline
        .download_filing("AMZN", 2024, FilingCategory::CurrentReport, "amzn")
        .await
        .unwrap_err();
    assert!(matches!(bad_id, FilingKitError::InvalidIdentifier(_)));

    let bad_year = pipeline
        .download_filing("1018724", 1990, FilingCategory::CurrentReport, "amzn")
        .await
        .unwrap_err();
    assert!(matches!(bad_year, FilingKitError::InvalidYear { year: 1990, .. }));

    assert_eq!(stub.request_count(), 0);
    assert!(!root.path().join("outside").exists());
}

#[tokio::test]
async fn no_matching_filing() {
    let stub = StubRegistry::with_amazon_filing().await;
    let root = tempfile::tempdir().unwrap();
    let pipeline = pipeline(stub.url(), root.path());

    let err = pipeline
        .download_filing("1018724", 2022, FilingCategory::PeriodicAnnual, "amzn_2022")
        .await
        .unwrap_err();

    match err {
        FilingKitError::FilingNotFound {
            entity_id,
            fiscal_year,
            category,
        } => {
            assert_eq!(entity_id, "0001018724");
            assert_eq!(fiscal_year, 2022);
            assert_eq!(category, "10-K");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(stub.request_count(), 1);
    assert!(!root.path().join("html").join("amzn_2022").join(MANIFEST_FILE).exists());
}

#[tokio::test]
async fn non_html_primary_document_is_not_found() {
    let stub = StubRegistry::with_amazon_filing().await;
    let root = tempfile::tempdir().unwrap();
    let pipeline = pipeline(stub.url(), root.path());

    let err = pipeline
        .download_filing("1018724", 2024, FilingCategory::ProxyStatement, "amzn_proxy")
        .await
        .unwrap_err();

    assert!(matches!(err, FilingKitError::FilingNotFound { .. }));
    assert_eq!(
        stub.hits("/Archives/edgar/data/1018724/000101872424000050/proxy2024.pdf"),
        0
    );
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let stub = StubRegistry::with_amazon_filing().await;
    stub.serve_sequence(
        "/submissions/CIK0001018724.json",
        vec![
            (503, b"Service Unavailable".to_vec()),
            (429, b"Slow down".to_vec()),
            (200, read_fixture("submissions/CIK0001018724.json").into_bytes()),
        ],
    );
    let root = tempfile::tempdir().unwrap();
    let pipeline = pipeline(stub.url(), root.path());

    let path = pipeline
        .download_filing("1018724", 2024, FilingCategory::CurrentReport, "amzn")
        .await
        .unwrap();

    assert!(path.is_file());
    assert_eq!(stub.hits("/submissions/CIK0001018724.json"), 3);
}

#[tokio::test]
async fn retries_are_bounded() {
    let stub = StubRegistry::start().await;
    stub.serve("/submissions/CIK0001018724.json", 500, "Internal Server Error");
    let root = tempfile::tempdir().unwrap();
    let pipeline = pipeline(stub.url(), root.path());

    let err = pipeline
        .download_filing("1018724", 2024, FilingCategory::CurrentReport, "amzn")
        .await
        .unwrap_err();

    assert!(matches!(err, FilingKitError::RegistryUnavailable { .. }));
    assert_eq!(err.stage(), Stage::Registry);
    // one attempt plus three retries
    assert_eq!(stub.hits("/submissions/CIK0001018724.json"), 4);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let stub = StubRegistry::start().await;
    stub.serve("/submissions/CIK0001018724.json", 403, "Forbidden");
    let root = tempfile::tempdir().unwrap();
    let pipeline = pipeline(stub.url(), root.path());

    let err = pipeline
        .download_filing("1018724", 2024, FilingCategory::CurrentReport, "amzn")
        .await
        .unwrap_err();

    assert!(matches!(err, FilingKitError::RegistryUnavailable { .. }));
    assert_eq!(stub.request_count(), 1);
}

#[tokio::test]
async fn missing_primary_document_fails_download() {
    let stub = StubRegistry::with_amazon_filing().await;
    stub.serve(&format!("{}/amzn-20241031.htm", AMZN_FOLDER), 404, "Not Found");
    let root = tempfile::tempdir().unwrap();
    let pipeline = pipeline(stub.url(), root.path());

    let err = pipeline
        .download_filing("1018724", 2024, FilingCategory::CurrentReport, "amzn")
        .await
        .unwrap_err();

    assert!(matches!(err, FilingKitError::RegistryUnavailable { .. }));
    let destination = root.path().join("html").join("amzn");
    assert!(!destination.join("amzn-20241031.htm").exists());
    assert!(!destination.join(MANIFEST_FILE).exists());
}

#[tokio::test]
async fn existing_primary_document_is_never_overwritten() {
    let stub = StubRegistry::with_amazon_filing().await;
    let root = tempfile::tempdir().unwrap();
    let destination = root.path().join("html").join("t1");
    std::fs::create_dir_all(&destination).unwrap();
    std::fs::write(destination.join("amzn-20241031.htm"), "LOCAL").unwrap();
    let pipeline = pipeline(stub.url(), root.path());

    let path = pipeline
        .download_filing("1018724", 2024, FilingCategory::CurrentReport, "t1")
        .await
        .unwrap();

    assert_eq!(path, destination.join("amzn-20241031.htm"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "LOCAL");
    assert_eq!(stub.hits(&format!("{}/amzn-20241031.htm", AMZN_FOLDER)), 0);
    assert!(destination.join(MANIFEST_FILE).is_file());
}

#[tokio::test]
async fn lone_workspace_name_is_a_destination_directory() {
    let stub = StubRegistry::with_amazon_filing().await;
    let root = tempfile::tempdir().unwrap();
    let pipeline = pipeline(stub.url(), root.path());

    let path = pipeline
        .download_filing("1018724", 2024, FilingCategory::CurrentReport, "html")
        .await
        .unwrap();

    assert_eq!(
        path,
        root.path().join("html").join("html").join("amzn-20241031.htm")
    );
    assert!(!root.path().join("html").join("amzn-20241031.htm").exists());
}

#[tokio::test]
async fn older_filings_come_from_history_pages() {
    let stub = StubRegistry::with_amazon_filing().await;
    let root = tempfile::tempdir().unwrap();
    let pipeline = pipeline(stub.url(), root.path());

    let path = pipeline
        .download_filing("1018724", 2015, FilingCategory::CurrentReport, "amzn_2015")
        .await
        .unwrap();

    assert_eq!(
        path,
        root.path().join("html").join("amzn_2015").join("d36415d8k.htm")
    );
    assert_eq!(stub.hits(AMZN_HISTORY_PAGE), 1);
    assert_eq!(stub.hits(&format!("{}/d36415d8k.htm", AMZN_2015_FOLDER)), 1);

    let manifest: DownloadManifest = serde_json::from_slice(
        &std::fs::read(root.path().join("html").join("amzn_2015").join(MANIFEST_FILE)).unwrap(),
    )
    .unwrap();
    assert_eq!(manifest.entry.accession_number, "0001018724-15-000050");
}

#[tokio::test]
async fn history_pages_are_fetched_only_for_covered_years() {
    let stub = StubRegistry::with_amazon_filing().await;
    let root = tempfile::tempdir().unwrap();
    let pipeline = pipeline(stub.url(), root.path());

    // 2024 is served by the recent filings.
    pipeline
        .download_filing("1018724", 2024, FilingCategory::CurrentReport, "amzn")
        .await
        .unwrap();
    assert_eq!(stub.hits(AMZN_HISTORY_PAGE), 0);

    // 2008 predates every page.
    let before = pipeline
        .download_filing("1018724", 2008, FilingCategory::CurrentReport, "amzn_2008")
        .await
        .unwrap_err();
    assert!(matches!(before, FilingKitError::FilingNotFound { .. }));
    assert_eq!(stub.hits(AMZN_HISTORY_PAGE), 0);

    // 2013 is covered by the page, which holds no 10-K filed that year.
    let covered = pipeline
        .download_filing("1018724", 2013, FilingCategory::PeriodicAnnual, "amzn_2013")
        .await
        .unwrap_err();
    assert!(matches!(covered, FilingKitError::FilingNotFound { fiscal_year: 2013, .. }));
    assert_eq!(stub.hits(AMZN_HISTORY_PAGE), 1);
}
