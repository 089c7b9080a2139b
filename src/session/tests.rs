//! Session layer tests
//!
//! Lifecycle and concurrency behavior of the registry, driven entirely
//! against the scripted mock backend.

use std::sync::Arc;

use crate::cdp::mock::{MockCdpClient, ScriptedEval};
use crate::config::{BrowserKind, Config};
use crate::session::mock::MockSessionBackend;
use crate::session::registry::SessionRegistry;
use crate::session::traits::SessionState;
use crate::Error;

fn registry_with_backend() -> (Arc<SessionRegistry>, Arc<MockSessionBackend>) {
    let backend = Arc::new(MockSessionBackend::new());
    let registry = Arc::new(SessionRegistry::new(
        backend.clone() as Arc<dyn crate::session::traits::SessionBackend>,
        Config::default(),
    ));
    (registry, backend)
}

#[tokio::test]
async fn test_acquire_creates_session_lazily() {
    let (registry, backend) = registry_with_backend();
    assert_eq!(registry.session_count(), 0);

    let session = registry.acquire("w1", BrowserKind::Chrome).await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.worker_id(), "w1");
    assert_eq!(registry.session_count(), 1);
    assert_eq!(backend.open_count(), 1);
}

#[tokio::test]
async fn test_acquire_twice_returns_same_session() {
    let (registry, backend) = registry_with_backend();

    let first = registry.acquire("w1", BrowserKind::Chrome).await.unwrap();
    let second = registry.acquire("w1", BrowserKind::Chrome).await.unwrap();

    assert_eq!(first.id(), second.id());
    assert_eq!(backend.open_count(), 1);
    assert_eq!(registry.session_count(), 1);
}

#[tokio::test]
async fn test_distinct_workers_get_distinct_sessions() {
    let (registry, _) = registry_with_backend();

    let mut handles = Vec::new();
    for i in 0..8 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            registry
                .acquire(&format!("w{}", i), BrowserKind::Chrome)
                .await
        }));
    }

    let mut ids = std::collections::HashSet::new();
    for handle in handles {
        let session = handle.await.unwrap().unwrap();
        ids.insert(session.id().to_string());
    }

    assert_eq!(ids.len(), 8);
    assert_eq!(registry.session_count(), 8);
}

#[tokio::test]
async fn test_concurrent_acquire_same_worker_creates_one_session() {
    let (registry, backend) = registry_with_backend();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(
            async move { registry.acquire("w1", BrowserKind::Chrome).await },
        ));
    }

    let mut ids = std::collections::HashSet::new();
    for handle in handles {
        let session = handle.await.unwrap().unwrap();
        ids.insert(session.id().to_string());
    }

    assert_eq!(ids.len(), 1);
    assert_eq!(backend.open_count(), 1);
}

#[tokio::test]
async fn test_failed_start_leaves_no_registration() {
    let (registry, backend) = registry_with_backend();
    backend.fail_next_open();

    let err = registry.acquire("w1", BrowserKind::Chrome).await.unwrap_err();
    assert!(matches!(err, Error::SessionStart(_)));
    assert_eq!(registry.session_count(), 0);
    assert!(registry.current("w1").is_err());

    // The worker can try again once the cause is gone
    let session = registry.acquire("w1", BrowserKind::Chrome).await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);
}

#[tokio::test]
async fn test_current_is_lookup_only() {
    let (registry, backend) = registry_with_backend();

    let err = registry.current("w1").unwrap_err();
    assert!(matches!(err, Error::SessionUnavailable(_)));
    assert_eq!(backend.open_count(), 0);

    let created = registry.acquire("w1", BrowserKind::Chrome).await.unwrap();
    let found = registry.current("w1").unwrap();
    assert_eq!(created.id(), found.id());
}

#[tokio::test]
async fn test_release_is_idempotent() {
    let (registry, _) = registry_with_backend();

    registry.acquire("w1", BrowserKind::Chrome).await.unwrap();
    registry.release("w1").await.unwrap();
    assert_eq!(registry.session_count(), 0);

    // Double release and release of an unknown worker are both no-ops
    registry.release("w1").await.unwrap();
    registry.release("never-seen").await.unwrap();
}

#[tokio::test]
async fn test_release_closes_session() {
    let (registry, _) = registry_with_backend();

    let session = registry.acquire("w1", BrowserKind::Chrome).await.unwrap();
    registry.release("w1").await.unwrap();

    assert_eq!(session.state(), SessionState::Closed);
    assert!(registry.current("w1").is_err());
}

#[tokio::test]
async fn test_acquire_after_release_creates_fresh_session() {
    let (registry, backend) = registry_with_backend();

    let first = registry.acquire("w1", BrowserKind::Chrome).await.unwrap();
    registry.release("w1").await.unwrap();

    let second = registry.acquire("w1", BrowserKind::Chrome).await.unwrap();
    assert_ne!(first.id(), second.id());
    assert_eq!(backend.open_count(), 2);
}

#[tokio::test]
async fn test_release_all_isolates_failures() {
    let (registry, backend) = registry_with_backend();

    for i in 0..5 {
        let worker = format!("w{}", i);
        registry.acquire(&worker, BrowserKind::Chrome).await.unwrap();
    }

    // Worker w2's native close throws; the other four must still go down.
    backend.client_for("w2").unwrap().fail_close();

    let report = registry.release_all().await;

    assert_eq!(report.released.len(), 4);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "w2");
    assert!(!report.is_clean());
    assert_eq!(registry.session_count(), 0);
}

#[tokio::test]
async fn test_release_all_on_empty_registry() {
    let (registry, _) = registry_with_backend();
    let report = registry.release_all().await;
    assert!(report.is_clean());
    assert!(report.released.is_empty());
}

#[tokio::test]
async fn test_scoped_releases_on_success() {
    let (registry, _) = registry_with_backend();

    let worker_id = registry
        .scoped("w1", BrowserKind::Chrome, |session| async move {
            assert!(session.is_ready());
            Ok(session.worker_id().to_string())
        })
        .await
        .unwrap();

    assert_eq!(worker_id, "w1");
    assert_eq!(registry.session_count(), 0);
}

#[tokio::test]
async fn test_scoped_releases_when_closure_fails() {
    let (registry, _) = registry_with_backend();

    let result: Result<(), _> = registry
        .scoped("w1", BrowserKind::Chrome, |_session| async move {
            Err(Error::verification("signup form never confirmed"))
        })
        .await;

    assert!(matches!(result.unwrap_err(), Error::Verification(_)));
    // Session released despite the failure
    assert_eq!(registry.session_count(), 0);
}

#[tokio::test]
async fn test_guard_explicit_release() {
    let (registry, _) = registry_with_backend();

    let guard = registry
        .acquire_guard("w1", BrowserKind::Chrome)
        .await
        .unwrap();
    assert!(guard.session().is_ready());

    guard.release().await.unwrap();
    assert_eq!(registry.session_count(), 0);
}

#[tokio::test]
async fn test_guard_drop_schedules_release() {
    let (registry, _) = registry_with_backend();

    {
        let _guard = registry
            .acquire_guard("w1", BrowserKind::Chrome)
            .await
            .unwrap();
        assert_eq!(registry.session_count(), 1);
    }

    // The drop path spawns the release; give it a tick to run.
    tokio::task::yield_now().await;
    tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
    assert_eq!(registry.session_count(), 0);
}

#[tokio::test]
async fn test_close_during_in_flight_probe_observes_unavailable() {
    let (registry, backend) = registry_with_backend();

    let client = Arc::new(MockCdpClient::new());
    backend.preload("w1", Arc::clone(&client));

    let session = registry.acquire("w1", BrowserKind::Chrome).await.unwrap();

    // Force-close from the teardown path while the worker is mid-poll.
    registry.release("w1").await.unwrap();

    let err = session.probe("document.readyState").await.unwrap_err();
    assert!(matches!(err, Error::SessionUnavailable(_)));
}

#[tokio::test]
async fn test_session_carries_browser_metadata() {
    let (registry, _) = registry_with_backend();

    let session = registry.acquire("w1", BrowserKind::Edge).await.unwrap();
    assert_eq!(session.kind(), BrowserKind::Edge);
    assert!(session.is_headless());
    assert!(session.created_at() <= chrono::Utc::now());
}

#[tokio::test]
async fn test_download_dir_capability_applied() {
    let backend = Arc::new(MockSessionBackend::new());
    let config = Config {
        download_dir: Some("/tmp/probe-downloads".to_string()),
        ..Default::default()
    };
    let registry = SessionRegistry::new(
        backend.clone() as Arc<dyn crate::session::traits::SessionBackend>,
        config,
    );

    registry.acquire("w1", BrowserKind::Chrome).await.unwrap();

    let methods = backend.client_for("w1").unwrap().called_methods().await;
    assert!(methods.iter().any(|m| m == "Browser.setDownloadBehavior"));
}

#[tokio::test]
async fn test_scripted_probe_through_session() {
    let (registry, backend) = registry_with_backend();

    let client = Arc::new(MockCdpClient::new());
    client
        .push_eval(ScriptedEval::Value(serde_json::json!("complete")))
        .await;
    backend.preload("w1", client);

    let session = registry.acquire("w1", BrowserKind::Chrome).await.unwrap();
    let result = session.probe("document.readyState").await.unwrap();
    assert!(
        matches!(result, crate::cdp::traits::EvaluationResult::String(ref s) if s == "complete")
    );
}
