use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokio::sync::watch;
use tower::ServiceExt;

use reschedular_common::{FixedClock, SequentialIds};
use reschedular_engine::testing::{now, participant, questionnaire, scheduled_attempt, TestHarness};
use reschedular_engine::{Deps, Event, EventQueue, Reschedular};
use reschedular_server::routes::{build_router, AppState};
use reschedular_store::{Filter, MemoryRecordStore, Record, RecordKind, RecordStore, StoreError};

fn seeded() -> MemoryRecordStore {
    MemoryRecordStore::new()
        .with(questionnaire("q-1", Some(3), Some(24)))
        .with(participant("p-1"))
}

fn app(engine: Reschedular) -> (Router, watch::Receiver<bool>) {
    let (tx, rx) = watch::channel(false);
    let router = build_router(AppState::new(engine, Duration::from_secs(5), tx));
    (router, rx)
}

async fn post_event(app: Router, body: Value) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri("/events")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
    let parsed = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, parsed)
}

fn pending_recurrence(participant_id: &str) -> Value {
    json!({
        "Name": "SCHEDULED_QUESTIONNAIRE",
        "Id": "s-0",
        "ParticipantId": participant_id,
        "QuestionnaireId": "q-1",
        "Status": "pending"
    })
}

#[tokio::test]
async fn scheduled_recurrence_returns_outcome_and_queues_follow_up() {
    let h = TestHarness::new(seeded());
    let (app, fatal) = app(h.engine.clone());

    let (status, body) = post_event(app, pending_recurrence("p-1")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "scheduled");
    assert_eq!(body["queued"], true);
    assert_eq!(body["attempt"]["id"], "s-0");
    assert_eq!(h.queue.len(), 1);
    assert!(!*fatal.borrow());
}

#[tokio::test]
async fn terminal_completion_returns_ok() {
    let h = TestHarness::new(seeded().with(scheduled_attempt("s-0", "q-1", "p-1")));
    let (app, _fatal) = app(h.engine.clone());

    let (status, body) = post_event(
        app,
        json!({
            "Name": "QUESTIONNAIRE_COMPLETED",
            "Id": "s-0",
            "UserId": "p-1",
            "QuestionnaireId": "q-1",
            "CompletedAt": "2022-07-18T09:30:00Z",
            "RemainingCompletions": 0
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "max_attempts_reached");
    assert_eq!(body["study_id"], "study-1");
    assert_eq!(h.queue.len(), 1);
}

#[tokio::test]
async fn unknown_participant_is_404() {
    let h = TestHarness::new(seeded());
    let (app, fatal) = app(h.engine.clone());

    let (status, body) = post_event(app, pending_recurrence("p-404")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("p-404"));
    assert!(h.queue.is_empty());
    assert!(!*fatal.borrow());
}

#[tokio::test]
async fn malformed_completion_time_is_400() {
    let h = TestHarness::new(seeded().with(scheduled_attempt("s-0", "q-1", "p-1")));
    let (app, _fatal) = app(h.engine.clone());

    let (status, _) = post_event(
        app,
        json!({
            "Name": "QUESTIONNAIRE_COMPLETED",
            "Id": "s-0",
            "ParticipantId": "p-1",
            "QuestionnaireId": "q-1",
            "CompletedAt": "last tuesday",
            "RemainingCompletions": 2
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(h.queue.is_empty());
}

#[tokio::test]
async fn failed_query_is_502() {
    let h = TestHarness::new(seeded());
    h.store.fail_list_queries(true);
    let (app, fatal) = app(h.engine.clone());

    let (status, _) = post_event(app, pending_recurrence("p-1")).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(!*fatal.borrow());
}

#[tokio::test]
async fn failed_write_is_500_and_raises_fatal_flag() {
    let h = TestHarness::new(seeded());
    h.store.fail_writes(true);
    let (app, fatal) = app(h.engine.clone());

    let (status, _) = post_event(app, pending_recurrence("p-1")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(*fatal.borrow());
    assert!(h.queue.is_empty());
}

#[tokio::test]
async fn unknown_event_name_is_a_client_error() {
    let h = TestHarness::new(seeded());
    let (app, _fatal) = app(h.engine.clone());

    let (status, _) = post_event(app, json!({"Name": "STUDY_ARCHIVED", "Id": "x"})).await;

    assert!(status.is_client_error());
    assert!(h.queue.is_empty());
}

#[tokio::test]
async fn health_reports_queue_depth() {
    let h = TestHarness::new(seeded());
    let (app, _fatal) = app(h.engine.clone());

    post_event(app.clone(), pending_recurrence("p-1")).await;

    let resp = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), 1024).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({"status": "ok", "queue_depth": 1}));
}

// ---------------------------------------------------------------------------
// Timeouts
// ---------------------------------------------------------------------------

/// Delegates to a memory store, sleeping before lookups and after writes.
/// A delayed write has already committed when the sleep starts.
struct SlowStore {
    inner: Arc<MemoryRecordStore>,
    lookup_delay: Duration,
    ack_delay: Duration,
}

#[async_trait]
impl RecordStore for SlowStore {
    async fn get_by_id(&self, kind: RecordKind, id: &str) -> Result<Record, StoreError> {
        tokio::time::sleep(self.lookup_delay).await;
        self.inner.get_by_id(kind, id).await
    }

    async fn get_list(
        &self,
        kind: RecordKind,
        filters: &[Filter],
    ) -> Result<Vec<Record>, StoreError> {
        self.inner.get_list(kind, filters).await
    }

    async fn create(&self, record: &Record) -> Result<(), StoreError> {
        self.inner.create(record).await?;
        tokio::time::sleep(self.ack_delay).await;
        Ok(())
    }
}

fn slow_app(store: SlowStore, timeout: Duration) -> (Router, EventQueue) {
    let queue = EventQueue::new();
    let engine = Reschedular::new(Deps::new(
        Arc::new(store),
        Arc::new(FixedClock::new(now())),
        Arc::new(SequentialIds::new("slot")),
        queue.clone(),
    ));
    let (tx, _rx) = watch::channel(false);
    (build_router(AppState::new(engine, timeout, tx)), queue)
}

async fn wait_until(condition: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[tokio::test]
async fn slow_handling_times_out_and_finishes_in_background() {
    let (app, queue) = slow_app(
        SlowStore {
            inner: Arc::new(seeded()),
            lookup_delay: Duration::from_millis(200),
            ack_delay: Duration::ZERO,
        },
        Duration::from_millis(20),
    );

    let (status, body) = post_event(app, pending_recurrence("p-1")).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"], "event handling timed out");
    assert!(queue.is_empty());
    assert!(wait_until(|| queue.len() == 1).await);
}

#[tokio::test]
async fn write_acknowledged_after_timeout_still_queues_follow_up() {
    let inner = Arc::new(seeded());
    let (app, queue) = slow_app(
        SlowStore {
            inner: inner.clone(),
            lookup_delay: Duration::ZERO,
            ack_delay: Duration::from_millis(300),
        },
        Duration::from_millis(50),
    );

    let (status, _) = post_event(app, pending_recurrence("p-1")).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert!(wait_until(|| inner.writes() == 1).await);
    assert!(wait_until(|| queue.len() == 1).await);

    let Some(Event::Recurrence(follow_up)) = queue.pop() else {
        panic!("expected a queued recurrence");
    };
    assert_eq!(follow_up.id, "s-0");
    assert_eq!(follow_up.scheduled_at, Some(now() + chrono::Duration::hours(24)));
    assert_eq!(inner.writes(), 1);
}
