use shipshape::config::Config;
use shipshape::error::CoreError;
use shipshape::scoring::MaturityLevel;
use shipshape::service::Service;
use shipshape::store::SecretScope;
use wiremock::matchers;
use wiremock::{Mock, MockServer, ResponseTemplate};

// ---------------------------------------------------------------------------
// End-to-end flow through the service facade: scan → score → persisted
// snapshot, and the secret lifecycle surface.
// ---------------------------------------------------------------------------

fn config(server: &MockServer) -> Config {
    Config {
        github_app_id: None,
        github_private_key_path: None,
        master_key: Some("ab".repeat(32)),
        github_api: server.uri(),
        http_timeout_secs: 5,
        dev_mode: false,
    }
}

#[tokio::test]
async fn scan_scores_and_persists() {
    let server = MockServer::start().await;

    // Dockerfile + README, no CI, no test script.
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/repos/acme/widgets/git/trees/main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "sha": "abc",
            "tree": [
                { "path": "Dockerfile", "type": "blob" },
                { "path": "README.md", "type": "blob" },
                { "path": "src/app.js", "type": "blob" },
            ],
            "truncated": false,
        })))
        .mount(&server)
        .await;
    Mock::given(matchers::method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let service = Service::new(config(&server)).unwrap();
    let (repo, gaps) = service
        .scan("https://github.com/acme/widgets", "main")
        .await
        .unwrap();
    assert_eq!(repo.owner, "acme");
    assert!(gaps.dockerfile && gaps.readme);
    assert!(!gaps.ci && !gaps.tests);

    let report = Service::score(gaps);
    assert_eq!(report.total_score, 40);
    assert_eq!(MaturityLevel::from_score(report.total_score), MaturityLevel::Critical);

    let persisted = service.store().repo_config("acme/widgets").await.unwrap();
    assert_eq!(persisted.last_scan.unwrap().gaps, gaps);
}

#[tokio::test]
async fn scan_rejects_non_github_url() {
    let server = MockServer::start().await;
    let service = Service::new(config(&server)).unwrap();
    let err = service
        .scan("https://gitlab.com/x/y", "main")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::BadRequest(_)));
}

#[tokio::test]
async fn secret_lifecycle_through_facade() {
    let server = MockServer::start().await;
    let service = Service::new(config(&server)).unwrap();
    let scope = SecretScope::Repository("acme/widgets".into());

    service.upsert_secret(&scope, "api-key", "v1").await.unwrap();
    service.upsert_secret(&scope, "API_KEY", "v2").await.unwrap();

    let listed = service.list_secrets(&scope).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].key, "API_KEY");
    assert_eq!(listed[0].value, "********");

    assert!(service.delete_secret(&scope, "API_KEY").await.unwrap());
    assert!(!service.delete_secret(&scope, "API_KEY").await.unwrap());
}

#[tokio::test]
async fn secret_ops_require_master_key() {
    let server = MockServer::start().await;
    let mut cfg = config(&server);
    cfg.master_key = None;

    let service = Service::new(cfg).unwrap();
    let scope = SecretScope::Repository("acme/widgets".into());
    let err = service.upsert_secret(&scope, "K", "v").await.unwrap_err();
    assert!(matches!(err, CoreError::Configuration(_)));
}

#[tokio::test]
async fn sync_requires_owner_slash_repo() {
    let server = MockServer::start().await;
    let service = Service::new(config(&server)).unwrap();
    let err = service.sync_secrets(42, "not-a-full-name").await.unwrap_err();
    assert!(matches!(err, CoreError::Configuration(_)));
}
