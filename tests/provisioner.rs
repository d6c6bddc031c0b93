//! End-to-end provisioning against a local stub asset host.

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use axum::{Router, http::StatusCode, routing::get};
use url::Url;

use anteprima::domain::assets::{
    AssetDescriptor, AssetManifest, ProvisionStatus, RenderStage,
};
use anteprima::infra::provisioner::AssetProvisioner;

const THEME_BODY: &str = "body { color: #111; }";

async fn start_stub_host(hits: Arc<AtomicUsize>) -> SocketAddr {
    let app = Router::new()
        .route(
            "/theme.css",
            get(move || {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    THEME_BODY
                }
            }),
        )
        .route("/katex.css", get(|| async { ".katex { display: block; }" }))
        .route("/missing.css", get(|| async { StatusCode::NOT_FOUND }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub host");
    let addr = listener.local_addr().expect("stub host address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve stub host");
    });
    addr
}

fn descriptor(name: &str, local_path: &str, addr: SocketAddr, route: &str) -> AssetDescriptor {
    let source = Url::parse(&format!("http://{addr}{route}")).expect("stub url");
    AssetDescriptor::new(name, local_path, source, Some(RenderStage::Math)).expect("descriptor")
}

#[tokio::test]
async fn fetches_once_then_trusts_local_presence() {
    let hits = Arc::new(AtomicUsize::new(0));
    let addr = start_stub_host(hits.clone()).await;
    let root = tempfile::tempdir().expect("tempdir");

    let manifest = AssetManifest::new(vec![descriptor(
        "theme",
        "css/theme.css",
        addr,
        "/theme.css",
    )])
    .expect("manifest");
    let provisioner = AssetProvisioner::with_http_client();

    let report = provisioner.provision(&manifest, root.path()).await;
    match &report.results()[0].status {
        ProvisionStatus::Fetched {
            size_bytes,
            checksum,
        } => {
            assert_eq!(*size_bytes, THEME_BODY.len() as u64);
            assert_eq!(checksum.len(), 64);
        }
        other => panic!("expected Fetched, got {other:?}"),
    }
    let written = std::fs::read(root.path().join("css/theme.css")).expect("asset file");
    assert_eq!(written, THEME_BODY.as_bytes());
    assert!(report.is_available("theme"));

    let second = provisioner.provision(&manifest, root.path()).await;
    assert!(matches!(
        second.results()[0].status,
        ProvisionStatus::AlreadyPresent
    ));
    assert_eq!(hits.load(Ordering::SeqCst), 1, "presence must skip the network");
}

#[tokio::test]
async fn unreachable_descriptor_never_aborts_the_pass() {
    let addr = start_stub_host(Arc::new(AtomicUsize::new(0))).await;
    let root = tempfile::tempdir().expect("tempdir");

    let manifest = AssetManifest::new(vec![
        descriptor("theme", "css/theme.css", addr, "/theme.css"),
        descriptor("gone", "css/gone.css", addr, "/missing.css"),
        descriptor("katex", "katex/katex.css", addr, "/katex.css"),
    ])
    .expect("manifest");

    let report = AssetProvisioner::with_http_client()
        .provision(&manifest, root.path())
        .await;

    let statuses: Vec<_> = report
        .results()
        .iter()
        .map(|result| (result.descriptor.name(), result.status.is_available()))
        .collect();
    assert_eq!(
        statuses,
        vec![("theme", true), ("gone", false), ("katex", true)]
    );

    assert!(root.path().join("css/theme.css").exists());
    assert!(root.path().join("katex/katex.css").exists());
    assert!(
        !root.path().join("css/gone.css").exists(),
        "a failed fetch must leave no file behind"
    );

    let availability = report.stage_availability();
    assert!(!availability.math);
    assert!(availability.highlighting);
}

#[tokio::test]
async fn write_failure_is_reported_per_descriptor() {
    let addr = start_stub_host(Arc::new(AtomicUsize::new(0))).await;

    // Using a plain file as the asset root makes directory creation fail.
    let blocker = tempfile::NamedTempFile::new().expect("blocking file");

    let manifest = AssetManifest::new(vec![descriptor(
        "theme",
        "css/theme.css",
        addr,
        "/theme.css",
    )])
    .expect("manifest");

    let report = AssetProvisioner::with_http_client()
        .provision(&manifest, blocker.path())
        .await;

    match &report.results()[0].status {
        ProvisionStatus::FetchFailed { reason } => {
            assert!(reason.contains("css"), "reason should name the path: {reason}");
        }
        other => panic!("expected FetchFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn report_round_trips_through_serde() {
    let addr = start_stub_host(Arc::new(AtomicUsize::new(0))).await;
    let root = tempfile::tempdir().expect("tempdir");

    let manifest = AssetManifest::new(vec![descriptor(
        "theme",
        "css/theme.css",
        addr,
        "/theme.css",
    )])
    .expect("manifest");

    let report = AssetProvisioner::with_http_client()
        .provision(&manifest, root.path())
        .await;

    let encoded = serde_json::to_string(&report).expect("encode report");
    let decoded: anteprima::domain::assets::ProvisioningReport =
        serde_json::from_str(&encoded).expect("decode report");
    assert_eq!(decoded, report);
}

#[tokio::test]
async fn inspect_reports_presence_without_fetching() {
    let hits = Arc::new(AtomicUsize::new(0));
    let addr = start_stub_host(hits.clone()).await;
    let root = tempfile::tempdir().expect("tempdir");

    let manifest = AssetManifest::new(vec![descriptor(
        "theme",
        "css/theme.css",
        addr,
        "/theme.css",
    )])
    .expect("manifest");
    let provisioner = AssetProvisioner::with_http_client();

    let absent = provisioner.inspect(&manifest, root.path()).await;
    assert!(matches!(
        absent.results()[0].status,
        ProvisionStatus::FetchFailed { .. }
    ));

    provisioner.provision(&manifest, root.path()).await;
    let present = provisioner.inspect(&manifest, root.path()).await;
    assert!(matches!(
        present.results()[0].status,
        ProvisionStatus::AlreadyPresent
    ));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
