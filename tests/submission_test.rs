use std::sync::{Arc, Mutex};

use pocketq::backend::http::HttpBackend;
use pocketq::orchestrator::submission::{InvalidInput, SubmissionService, SubmitOutcome};
use pocketq::store::memory::MemoryTaskStore;
use pocketq::store::{CollectionKey, PredictionId, TaskStore};
use pocketq::tasks::fingerprint::fingerprint;
use pocketq::tasks::record::{TaskKind, TaskStatus};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn prediction() -> PredictionId {
    PredictionId::new("v3", "2SRC")
}

struct Harness {
    server: MockServer,
    store: Arc<MemoryTaskStore>,
    service: SubmissionService,
    rejections: Arc<Mutex<Vec<InvalidInput>>>,
}

async fn harness() -> Harness {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTaskStore::new());
    let backend = Arc::new(HttpBackend::new(server.uri()));
    let rejections: Arc<Mutex<Vec<InvalidInput>>> = Arc::new(Mutex::new(Vec::new()));

    let sink_rejections = rejections.clone();
    let service = SubmissionService::new(store.clone(), backend).with_invalid_input_sink(
        Box::new(move |input| sink_rejections.lock().unwrap().push(input)),
    );

    Harness {
        server,
        store,
        service,
        rejections,
    }
}

#[tokio::test]
async fn test_valid_docking_submission_appends_queued_record() {
    let h = harness().await;
    let expected_hash = fingerprint(
        TaskKind::Docking,
        2,
        &["c1ccccc1".to_string(), "32".to_string()],
    );

    Mock::given(method("POST"))
        .and(path("/api/v2/docking/v3/2SRC/post"))
        .and(body_partial_json(json!({ "hash": expected_hash, "pocket": 2 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&h.server)
        .await;

    let outcome = h
        .service
        .submit(
            &prediction(),
            TaskKind::Docking,
            &["c1ccccc1".to_string(), "32".to_string()],
            "benzene",
            1, // 0-based index, stored rank is 2
        )
        .await
        .unwrap();
    assert_eq!(outcome, SubmitOutcome::Submitted);

    let records = h
        .store
        .load(&CollectionKey::server(&prediction()))
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    let record = records[0].as_server().unwrap();
    assert_eq!(record.status, TaskStatus::Queued);
    assert_eq!(record.pocket, 2);
    assert_eq!(record.name, "benzene");
    assert!(h.rejections.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_dispatch_marks_record_failed() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/api/v2/docking/v3/2SRC/post"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&h.server)
        .await;

    let outcome = h
        .service
        .submit(
            &prediction(),
            TaskKind::Docking,
            &["c1ccccc1".to_string(), "32".to_string()],
            "",
            0,
        )
        .await
        .unwrap();
    assert_eq!(outcome, SubmitOutcome::Submitted);

    let records = h
        .store
        .load(&CollectionKey::server(&prediction()))
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].as_server().unwrap().status, TaskStatus::Failed);
}

#[tokio::test]
async fn test_oversized_smiles_is_rejected_before_any_side_effect() {
    let h = harness().await;

    // No mock mounted: any request would 404, but none must be sent at all.
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    let smiles = "C".repeat(310);
    let outcome = h
        .service
        .submit(
            &prediction(),
            TaskKind::Docking,
            &[smiles, "32".to_string()],
            "",
            0,
        )
        .await
        .unwrap();
    assert_eq!(outcome, SubmitOutcome::Rejected);

    assert!(h
        .store
        .load(&CollectionKey::server(&prediction()))
        .await
        .unwrap()
        .is_empty());

    let rejections = h.rejections.lock().unwrap();
    assert_eq!(rejections.len(), 1);
    assert!(rejections[0].message.contains("300"));
    // The escape hatch: a locally runnable docking command.
    assert!(rejections[0].local_command.is_some());
}

#[tokio::test]
async fn test_exhaustiveness_range_boundaries() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/api/v2/docking/v3/2SRC/post"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&h.server)
        .await;

    // 0 is out of range, rejected with a range message
    let outcome = h
        .service
        .submit(
            &prediction(),
            TaskKind::Docking,
            &["c1ccccc1".to_string(), "0".to_string()],
            "",
            0,
        )
        .await
        .unwrap();
    assert_eq!(outcome, SubmitOutcome::Rejected);
    assert!(h.rejections.lock().unwrap()[0].message.contains("range"));

    // 64 is the inclusive upper bound, accepted
    let outcome = h
        .service
        .submit(
            &prediction(),
            TaskKind::Docking,
            &["c1ccccc1".to_string(), "64".to_string()],
            "",
            0,
        )
        .await
        .unwrap();
    assert_eq!(outcome, SubmitOutcome::Submitted);
}

#[tokio::test]
async fn test_tunnels_submission_has_no_parameters() {
    let h = harness().await;
    let expected_hash = fingerprint(TaskKind::Tunnels, 1, &[]);

    Mock::given(method("POST"))
        .and(path("/api/v2/tunnels/v3/2SRC/post"))
        .and(body_partial_json(json!({ "hash": expected_hash })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&h.server)
        .await;

    let outcome = h
        .service
        .submit(&prediction(), TaskKind::Tunnels, &[], "tunnels", 0)
        .await
        .unwrap();
    assert_eq!(outcome, SubmitOutcome::Submitted);
}

#[tokio::test]
async fn test_client_kind_cannot_be_submitted() {
    let h = harness().await;
    let result = h
        .service
        .submit(&prediction(), TaskKind::Volume, &[], "", 0)
        .await;
    assert!(result.is_err());
}
