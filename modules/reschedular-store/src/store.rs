//! PgRecordStore: the persistence port backed by Postgres.
//!
//! SELECTs are assembled from the filter triples with bound parameters. Only
//! column names known to the record kind ever reach the SQL text.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::debug;

use reschedular_common::{AttemptResult, AttemptStatus, Participant, Questionnaire, ScheduledAttempt};

use crate::error::StoreError;
use crate::traits::RecordStore;
use crate::types::{Filter, FilterOp, FilterValue, Record, RecordKind};

// ---------------------------------------------------------------------------
// PgRecordStore
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn get_by_id(&self, kind: RecordKind, id: &str) -> Result<Record, StoreError> {
        let mut query = select_from(kind);
        query.push(" WHERE id = ").push_bind(id.to_string()).push(" LIMIT 1");

        let row = query
            .build()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                kind,
                id: id.to_string(),
            })?;

        decode_row(kind, &row)
    }

    async fn get_list(
        &self,
        kind: RecordKind,
        filters: &[Filter],
    ) -> Result<Vec<Record>, StoreError> {
        let mut query = select_from(kind);
        push_filters(&mut query, kind, filters)?;
        debug!(sql = query.sql(), "list query");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(|row| decode_row(kind, row)).collect()
    }

    async fn create(&self, record: &Record) -> Result<(), StoreError> {
        let kind = record.kind();
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "INSERT INTO {} ({}) VALUES (",
            kind.table(),
            kind.columns().join(", ")
        ));

        for (i, column) in kind.columns().iter().enumerate() {
            if i > 0 {
                query.push(", ");
            }
            let value = record.field(column).ok_or_else(|| StoreError::UnknownField {
                kind,
                field: column.to_string(),
            })?;
            push_value(&mut query, &value)?;
        }
        query.push(")");

        let result = query.build().execute(&self.pool).await;
        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::Duplicate {
                    kind,
                    id: record.id().to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Query assembly
// ---------------------------------------------------------------------------

fn select_from(kind: RecordKind) -> QueryBuilder<'static, Postgres> {
    QueryBuilder::new(format!(
        "SELECT {} FROM {}",
        kind.columns().join(", "),
        kind.table()
    ))
}

fn push_filters(
    query: &mut QueryBuilder<'static, Postgres>,
    kind: RecordKind,
    filters: &[Filter],
) -> Result<(), StoreError> {
    for (i, filter) in filters.iter().enumerate() {
        if !kind.has_column(&filter.field) {
            return Err(StoreError::UnknownField {
                kind,
                field: filter.field.clone(),
            });
        }

        query.push(if i == 0 { " WHERE " } else { " AND " });
        query.push(&filter.field);

        match (filter.op, &filter.value) {
            (FilterOp::IsNull, _) => {
                query.push(" IS NULL");
            }
            (FilterOp::In, FilterValue::List(options)) if !options.is_empty() => {
                query.push(" IN (");
                for (j, option) in options.iter().enumerate() {
                    if j > 0 {
                        query.push(", ");
                    }
                    push_value(query, option)?;
                }
                query.push(")");
            }
            (FilterOp::In, _) => {
                return Err(StoreError::UnsupportedFilter(format!(
                    "{filter}: IN needs a non-empty list"
                )))
            }
            (op, value) => {
                query.push(format!(" {} ", op.as_sql()));
                push_value(query, value)?;
            }
        }
    }
    Ok(())
}

fn push_value(
    query: &mut QueryBuilder<'static, Postgres>,
    value: &FilterValue,
) -> Result<(), StoreError> {
    match value {
        FilterValue::Text(v) => {
            query.push_bind(v.clone());
        }
        FilterValue::Int(v) => {
            query.push_bind(*v);
        }
        FilterValue::Timestamp(v) => {
            query.push_bind(*v);
        }
        FilterValue::Null => {
            query.push("NULL");
        }
        FilterValue::List(_) => {
            return Err(StoreError::UnsupportedFilter(
                "nested lists cannot be bound".to_string(),
            ))
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Row decoding
// ---------------------------------------------------------------------------

fn decode_row(kind: RecordKind, row: &PgRow) -> Result<Record, StoreError> {
    let record = match kind {
        RecordKind::Questionnaire => Record::Questionnaire(Questionnaire {
            id: row.try_get("id")?,
            study_id: row.try_get("study_id")?,
            name: row.try_get("name")?,
            max_attempts: row.try_get::<Option<i32>, _>("max_attempts")?.map(i64::from),
            hours_between_attempts: row
                .try_get::<Option<i32>, _>("hours_between_attempts")?
                .map(i64::from),
        }),
        RecordKind::Participant => Record::Participant(Participant {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
        }),
        RecordKind::AttemptResult => Record::AttemptResult(AttemptResult {
            id: row.try_get("id")?,
            questionnaire_id: row.try_get("questionnaire_id")?,
            participant_id: row.try_get("participant_id")?,
            scheduled_attempt_id: row.try_get("questionnaire_schedule_id")?,
            completed_at: row.try_get::<Option<DateTime<Utc>>, _>("completed_at")?,
        }),
        RecordKind::ScheduledAttempt => {
            let status: Option<String> = row.try_get("status")?;
            let status = match status.as_deref() {
                None => AttemptStatus::Pending,
                Some(s) => s
                    .parse::<AttemptStatus>()
                    .map_err(|reason| StoreError::Decode { kind, reason })?,
            };
            Record::ScheduledAttempt(ScheduledAttempt {
                id: row.try_get("id")?,
                questionnaire_id: row.try_get("questionnaire_id")?,
                participant_id: row.try_get("participant_id")?,
                scheduled_at: row.try_get("scheduled_at")?,
                status,
            })
        }
    };
    Ok(record)
}
