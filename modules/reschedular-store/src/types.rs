//! Record kinds, the filter model, and the typed `Table` bridge.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use reschedular_common::{AttemptResult, AttemptStatus, Participant, Questionnaire, ScheduledAttempt};

// ---------------------------------------------------------------------------
// RecordKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Questionnaire,
    Participant,
    AttemptResult,
    ScheduledAttempt,
}

impl RecordKind {
    pub fn table(&self) -> &'static str {
        match self {
            RecordKind::Questionnaire => "questionnaires",
            RecordKind::Participant => "participants",
            RecordKind::AttemptResult => "questionnaire_results",
            RecordKind::ScheduledAttempt => "scheduled_questionnaires",
        }
    }

    /// Column names, in SELECT/INSERT order.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            RecordKind::Questionnaire => &[
                "id",
                "study_id",
                "name",
                "max_attempts",
                "hours_between_attempts",
            ],
            RecordKind::Participant => &["id", "name"],
            RecordKind::AttemptResult => &[
                "id",
                "questionnaire_id",
                "participant_id",
                "questionnaire_schedule_id",
                "completed_at",
            ],
            RecordKind::ScheduledAttempt => &[
                "id",
                "questionnaire_id",
                "participant_id",
                "scheduled_at",
                "status",
            ],
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns().contains(&column)
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Questionnaire => write!(f, "questionnaire"),
            RecordKind::Participant => write!(f, "participant"),
            RecordKind::AttemptResult => write!(f, "attempt result"),
            RecordKind::ScheduledAttempt => write!(f, "scheduled attempt"),
        }
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Any row the port reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Questionnaire(Questionnaire),
    Participant(Participant),
    AttemptResult(AttemptResult),
    ScheduledAttempt(ScheduledAttempt),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Questionnaire(_) => RecordKind::Questionnaire,
            Record::Participant(_) => RecordKind::Participant,
            Record::AttemptResult(_) => RecordKind::AttemptResult,
            Record::ScheduledAttempt(_) => RecordKind::ScheduledAttempt,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Record::Questionnaire(q) => &q.id,
            Record::Participant(p) => &p.id,
            Record::AttemptResult(r) => &r.id,
            Record::ScheduledAttempt(s) => &s.id,
        }
    }

    /// Value of a column, or `None` if the kind has no such column.
    pub fn field(&self, column: &str) -> Option<FilterValue> {
        let value = match (self, column) {
            (_, "id") => self.id().into(),

            (Record::Questionnaire(q), "study_id") => q.study_id.as_str().into(),
            (Record::Questionnaire(q), "name") => q.name.as_str().into(),
            (Record::Questionnaire(q), "max_attempts") => q.max_attempts.into(),
            (Record::Questionnaire(q), "hours_between_attempts") => {
                q.hours_between_attempts.into()
            }

            (Record::Participant(p), "name") => p.name.as_str().into(),

            (Record::AttemptResult(r), "questionnaire_id") => r.questionnaire_id.as_str().into(),
            (Record::AttemptResult(r), "participant_id") => r.participant_id.as_str().into(),
            (Record::AttemptResult(r), "questionnaire_schedule_id") => {
                r.scheduled_attempt_id.clone().into()
            }
            (Record::AttemptResult(r), "completed_at") => r.completed_at.into(),

            (Record::ScheduledAttempt(s), "questionnaire_id") => s.questionnaire_id.as_str().into(),
            (Record::ScheduledAttempt(s), "participant_id") => s.participant_id.as_str().into(),
            (Record::ScheduledAttempt(s), "scheduled_at") => s.scheduled_at.into(),
            (Record::ScheduledAttempt(s), "status") => s.status.into(),

            _ => return None,
        };
        Some(value)
    }
}

// ---------------------------------------------------------------------------
// Table: typed access to Record variants
// ---------------------------------------------------------------------------

/// A model type that maps to exactly one `RecordKind`.
pub trait Table: Sized + Send + 'static {
    const KIND: RecordKind;

    fn from_record(record: Record) -> Option<Self>;
    fn into_record(self) -> Record;
}

macro_rules! impl_table {
    ($ty:ident) => {
        impl Table for $ty {
            const KIND: RecordKind = RecordKind::$ty;

            fn from_record(record: Record) -> Option<Self> {
                match record {
                    Record::$ty(inner) => Some(inner),
                    _ => None,
                }
            }

            fn into_record(self) -> Record {
                Record::$ty(self)
            }
        }
    };
}

impl_table!(Questionnaire);
impl_table!(Participant);
impl_table!(AttemptResult);
impl_table!(ScheduledAttempt);

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Text(String),
    Int(i64),
    Timestamp(DateTime<Utc>),
    List(Vec<FilterValue>),
    Null,
}

impl FilterValue {
    fn compare(&self, other: &FilterValue) -> Option<Ordering> {
        match (self, other) {
            (FilterValue::Text(a), FilterValue::Text(b)) => Some(a.cmp(b)),
            (FilterValue::Int(a), FilterValue::Int(b)) => Some(a.cmp(b)),
            (FilterValue::Timestamp(a), FilterValue::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        FilterValue::Text(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        FilterValue::Text(v)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        FilterValue::Int(v)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(v: DateTime<Utc>) -> Self {
        FilterValue::Timestamp(v)
    }
}

impl From<AttemptStatus> for FilterValue {
    fn from(v: AttemptStatus) -> Self {
        FilterValue::Text(v.as_str().to_string())
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FilterValue::Null, Into::into)
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(v: Vec<T>) -> Self {
        FilterValue::List(v.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    IsNull,
}

impl FilterOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::NotEq => "!=",
            FilterOp::Lt => "<",
            FilterOp::Le => "<=",
            FilterOp::Gt => ">",
            FilterOp::Ge => ">=",
            FilterOp::In => "IN",
            FilterOp::IsNull => "IS NULL",
        }
    }
}

impl std::fmt::Display for FilterOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One `(field, operator, value)` triple. A list query ANDs all of its filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: FilterValue,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<FilterValue>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn equals(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::new(field, FilterOp::IsNull, FilterValue::Null)
    }

    /// SQL semantics: comparisons against NULL never match.
    pub fn matches(&self, actual: &FilterValue) -> bool {
        match self.op {
            FilterOp::IsNull => *actual == FilterValue::Null,
            FilterOp::In => match &self.value {
                FilterValue::List(options) => {
                    *actual != FilterValue::Null && options.contains(actual)
                }
                _ => false,
            },
            FilterOp::Eq => *actual != FilterValue::Null && *actual == self.value,
            FilterOp::NotEq => {
                *actual != FilterValue::Null
                    && self.value != FilterValue::Null
                    && *actual != self.value
            }
            FilterOp::Lt => actual.compare(&self.value) == Some(Ordering::Less),
            FilterOp::Le => matches!(
                actual.compare(&self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOp::Gt => actual.compare(&self.value) == Some(Ordering::Greater),
            FilterOp::Ge => matches!(
                actual.compare(&self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
        }
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.op {
            FilterOp::IsNull => write!(f, "{} IS NULL", self.field),
            op => write!(f, "{} {} {:?}", self.field, op, self.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn slot() -> Record {
        Record::ScheduledAttempt(ScheduledAttempt {
            id: "s-1".into(),
            questionnaire_id: "q-1".into(),
            participant_id: "p-1".into(),
            scheduled_at: Utc.with_ymd_and_hms(2022, 7, 18, 10, 0, 0).unwrap(),
            status: AttemptStatus::Pending,
        })
    }

    #[test]
    fn record_exposes_columns_as_filter_values() {
        let record = slot();
        assert_eq!(record.field("id"), Some(FilterValue::Text("s-1".into())));
        assert_eq!(record.field("status"), Some(FilterValue::Text("pending".into())));
        assert_eq!(record.field("answers"), None);
    }

    #[test]
    fn every_declared_column_is_readable() {
        let record = slot();
        for column in record.kind().columns() {
            assert!(record.field(column).is_some(), "missing column {column}");
        }
    }

    #[test]
    fn eq_and_in_never_match_null() {
        assert!(!Filter::equals("questionnaire_schedule_id", "x").matches(&FilterValue::Null));
        let in_filter = Filter::new("status", FilterOp::In, vec!["pending", "completed"]);
        assert!(in_filter.matches(&FilterValue::Text("pending".into())));
        assert!(!in_filter.matches(&FilterValue::Null));
        assert!(Filter::is_null("completed_at").matches(&FilterValue::Null));
    }

    #[test]
    fn ordering_filters_compare_like_types_only() {
        let at = Utc.with_ymd_and_hms(2022, 7, 18, 10, 0, 0).unwrap();
        let before = Filter::new("scheduled_at", FilterOp::Lt, at);
        assert!(before.matches(&FilterValue::Timestamp(at - chrono::Duration::hours(1))));
        assert!(!before.matches(&FilterValue::Timestamp(at)));
        assert!(!before.matches(&FilterValue::Int(1)));
        assert!(Filter::new("max_attempts", FilterOp::Ge, 3i64).matches(&FilterValue::Int(3)));
    }

    #[test]
    fn table_round_trips_through_record() {
        let record = slot();
        let attempt = ScheduledAttempt::from_record(record.clone()).unwrap();
        assert_eq!(attempt.into_record(), record);
        assert!(Participant::from_record(slot()).is_none());
    }
}
