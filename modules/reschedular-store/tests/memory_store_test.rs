//! MemoryRecordStore behaviour. No database required.

use chrono::{Duration, TimeZone, Utc};
use reschedular_common::{AttemptResult, AttemptStatus, Participant, Questionnaire, ScheduledAttempt};
use reschedular_store::{
    Filter, FilterOp, MemoryRecordStore, RecordKind, RecordStore, RecordStoreExt, StoreError,
};

fn questionnaire() -> Questionnaire {
    Questionnaire {
        id: "q-1".into(),
        study_id: "study-1".into(),
        name: "Sleep diary".into(),
        max_attempts: Some(3),
        hours_between_attempts: None,
    }
}

fn result(id: &str, schedule: Option<&str>) -> AttemptResult {
    AttemptResult {
        id: id.into(),
        questionnaire_id: "q-1".into(),
        participant_id: "p-1".into(),
        scheduled_attempt_id: schedule.map(String::from),
        completed_at: None,
    }
}

#[tokio::test]
async fn fetch_returns_typed_record() {
    let store = MemoryRecordStore::new().with(questionnaire());

    let q: Questionnaire = store.fetch("q-1").await.unwrap();
    assert_eq!(q, questionnaire());
}

#[tokio::test]
async fn fetch_missing_record_is_not_found() {
    let store = MemoryRecordStore::new().with(questionnaire());

    let err = store.fetch::<Participant>("q-1").await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::NotFound {
            kind: RecordKind::Participant,
            ..
        }
    ));
}

#[tokio::test]
async fn list_applies_every_filter() {
    let store = MemoryRecordStore::new()
        .with(result("r-1", Some("s-1")))
        .with(result("r-2", Some("s-1")))
        .with(result("r-3", Some("s-2")))
        .with(result("r-4", None));

    let matched: Vec<AttemptResult> = store
        .list(&[
            Filter::equals("questionnaire_id", "q-1"),
            Filter::equals("participant_id", "p-1"),
            Filter::equals("questionnaire_schedule_id", "s-1"),
        ])
        .await
        .unwrap();

    let ids: Vec<_> = matched.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["r-1", "r-2"]);

    let adhoc: Vec<AttemptResult> = store
        .list(&[Filter::is_null("questionnaire_schedule_id")])
        .await
        .unwrap();
    assert_eq!(adhoc.len(), 1);
    assert_eq!(adhoc[0].id, "r-4");
}

#[tokio::test]
async fn list_with_no_matches_is_empty() {
    let store = MemoryRecordStore::new().with(questionnaire());

    let slots: Vec<ScheduledAttempt> = store
        .list(&[Filter::equals("questionnaire_id", "q-1")])
        .await
        .unwrap();
    assert!(slots.is_empty());
    assert_eq!(store.list_queries(), 1);
}

#[tokio::test]
async fn list_rejects_unknown_fields() {
    let store = MemoryRecordStore::new();

    let err = store
        .get_list(RecordKind::Participant, &[Filter::equals("email", "x")])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownField { .. }));
}

#[tokio::test]
async fn list_compares_timestamps() {
    let base = Utc.with_ymd_and_hms(2022, 7, 18, 10, 0, 0).unwrap();
    let slot = |id: &str, hours: i64| ScheduledAttempt {
        id: id.into(),
        questionnaire_id: "q-1".into(),
        participant_id: "p-1".into(),
        scheduled_at: base + Duration::hours(hours),
        status: AttemptStatus::Pending,
    };
    let store = MemoryRecordStore::new()
        .with(slot("early", 1))
        .with(slot("late", 48));

    let due: Vec<ScheduledAttempt> = store
        .list(&[Filter::new(
            "scheduled_at",
            FilterOp::Le,
            base + Duration::hours(24),
        )])
        .await
        .unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, "early");
}

#[tokio::test]
async fn create_counts_writes_and_rejects_duplicates() {
    let store = MemoryRecordStore::new().with(result("seeded", None));
    assert_eq!(store.writes(), 0);

    store.insert(&result("r-1", None)).await.unwrap();
    assert_eq!(store.writes(), 1);

    let err = store.insert(&result("r-1", None)).await.unwrap_err();
    assert!(matches!(err, StoreError::Duplicate { .. }));
    assert_eq!(store.writes(), 1);
    assert_eq!(store.records::<AttemptResult>().len(), 2);
}

#[tokio::test]
async fn failure_switches_affect_lists_and_writes() {
    let store = MemoryRecordStore::new();
    store.fail_list_queries(true);
    store.fail_writes(true);

    let list_err = store
        .get_list(RecordKind::ScheduledAttempt, &[])
        .await
        .unwrap_err();
    assert!(matches!(list_err, StoreError::Unavailable(_)));

    let write_err = store.insert(&result("r-1", None)).await.unwrap_err();
    assert!(matches!(write_err, StoreError::Unavailable(_)));
    assert_eq!(store.writes(), 0);
}
