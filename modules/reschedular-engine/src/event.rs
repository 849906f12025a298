//! The two event variants and their wire representation.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use reschedular_common::{AttemptStatus, ScheduledAttempt};

use crate::traits::EventLike;

pub const QUESTIONNAIRE_COMPLETED: &str = "QUESTIONNAIRE_COMPLETED";
pub const SCHEDULED_QUESTIONNAIRE: &str = "SCHEDULED_QUESTIONNAIRE";

/// RFC 3339 with second precision and a `Z` suffix.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ---------------------------------------------------------------------------
// Wire attributes
// ---------------------------------------------------------------------------

/// A typed attribute value. Serializes in message-attribute shape:
/// `{"DataType": "Number", "StringValue": "0"}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireValue {
    String(String),
    Number(i64),
}

impl WireValue {
    pub fn data_type(&self) -> &'static str {
        match self {
            WireValue::String(_) => "String",
            WireValue::Number(_) => "Number",
        }
    }

    pub fn string_value(&self) -> String {
        match self {
            WireValue::String(s) => s.clone(),
            WireValue::Number(n) => n.to_string(),
        }
    }
}

impl Serialize for WireValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("WireValue", 2)?;
        state.serialize_field("DataType", self.data_type())?;
        state.serialize_field("StringValue", &self.string_value())?;
        state.end()
    }
}

impl From<&str> for WireValue {
    fn from(v: &str) -> Self {
        WireValue::String(v.to_string())
    }
}

impl From<i64> for WireValue {
    fn from(v: i64) -> Self {
        WireValue::Number(v)
    }
}

pub type WireAttributes = BTreeMap<String, WireValue>;

/// What the dispatcher hands to the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    #[serde(rename = "MessageBody")]
    pub body: String,
    #[serde(rename = "MessageAttributes")]
    pub attributes: WireAttributes,
}

// ---------------------------------------------------------------------------
// CompletionEvent
// ---------------------------------------------------------------------------

/// A participant finished a questionnaire attempt, or the cycle ended
/// (`remaining_completions == 0`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompletionEvent {
    /// The scheduled attempt this completion fulfils. Empty for ad hoc completions.
    #[serde(default)]
    pub id: String,
    #[serde(alias = "UserId")]
    pub participant_id: String,
    #[serde(default)]
    pub study_id: String,
    pub questionnaire_id: String,
    /// RFC 3339 text, as supplied upstream.
    pub completed_at: String,
    pub remaining_completions: u32,
}

impl CompletionEvent {
    /// The event that ends a recurrence cycle.
    pub fn terminal(
        participant_id: impl Into<String>,
        study_id: impl Into<String>,
        questionnaire_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: String::new(),
            participant_id: participant_id.into(),
            study_id: study_id.into(),
            questionnaire_id: questionnaire_id.into(),
            completed_at: format_timestamp(now),
            remaining_completions: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.remaining_completions == 0
    }

    pub fn parsed_completed_at(&self) -> Result<DateTime<Utc>, chrono::ParseError> {
        DateTime::parse_from_rfc3339(&self.completed_at).map(|at| at.with_timezone(&Utc))
    }
}

impl EventLike for CompletionEvent {
    fn name(&self) -> &'static str {
        QUESTIONNAIRE_COMPLETED
    }

    fn to_wire_attributes(&self) -> WireAttributes {
        BTreeMap::from([
            ("Id".to_string(), self.id.as_str().into()),
            ("ParticipantId".to_string(), self.participant_id.as_str().into()),
            ("StudyId".to_string(), self.study_id.as_str().into()),
            ("QuestionnaireId".to_string(), self.questionnaire_id.as_str().into()),
            ("CompletedAt".to_string(), self.completed_at.as_str().into()),
            (
                "RemainingCompletions".to_string(),
                i64::from(self.remaining_completions).into(),
            ),
        ])
    }
}

// ---------------------------------------------------------------------------
// RecurrenceEvent
// ---------------------------------------------------------------------------

/// A scheduled attempt's window is being processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecurrenceEvent {
    pub id: String,
    pub participant_id: String,
    pub questionnaire_id: String,
    pub status: AttemptStatus,
    /// Filled in once a new slot has been scheduled.
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl From<&ScheduledAttempt> for RecurrenceEvent {
    fn from(attempt: &ScheduledAttempt) -> Self {
        Self {
            id: attempt.id.clone(),
            participant_id: attempt.participant_id.clone(),
            questionnaire_id: attempt.questionnaire_id.clone(),
            status: attempt.status,
            scheduled_at: Some(attempt.scheduled_at),
        }
    }
}

impl EventLike for RecurrenceEvent {
    fn name(&self) -> &'static str {
        SCHEDULED_QUESTIONNAIRE
    }

    fn to_wire_attributes(&self) -> WireAttributes {
        let mut attributes: WireAttributes = BTreeMap::from([
            ("Id".to_string(), self.id.as_str().into()),
            ("ParticipantId".to_string(), self.participant_id.as_str().into()),
            ("QuestionnaireId".to_string(), self.questionnaire_id.as_str().into()),
            ("Status".to_string(), self.status.as_str().into()),
        ]);
        // Unscheduled events have no due time to report.
        if let Some(at) = self.scheduled_at {
            attributes.insert(
                "ScheduledAt".to_string(),
                WireValue::String(format_timestamp(at)),
            );
        }
        attributes
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// Every event the engine accepts or emits, tagged by `Name` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "Name")]
pub enum Event {
    #[serde(rename = "QUESTIONNAIRE_COMPLETED")]
    Completion(CompletionEvent),
    #[serde(rename = "SCHEDULED_QUESTIONNAIRE")]
    Recurrence(RecurrenceEvent),
}

impl Event {
    pub fn participant_id(&self) -> &str {
        match self {
            Event::Completion(e) => &e.participant_id,
            Event::Recurrence(e) => &e.participant_id,
        }
    }

    pub fn questionnaire_id(&self) -> &str {
        match self {
            Event::Completion(e) => &e.questionnaire_id,
            Event::Recurrence(e) => &e.questionnaire_id,
        }
    }
}

impl EventLike for Event {
    fn name(&self) -> &'static str {
        match self {
            Event::Completion(e) => e.name(),
            Event::Recurrence(e) => e.name(),
        }
    }

    fn to_wire_attributes(&self) -> WireAttributes {
        match self {
            Event::Completion(e) => e.to_wire_attributes(),
            Event::Recurrence(e) => e.to_wire_attributes(),
        }
    }
}

impl From<CompletionEvent> for Event {
    fn from(event: CompletionEvent) -> Self {
        Event::Completion(event)
    }
}

impl From<RecurrenceEvent> for Event {
    fn from(event: RecurrenceEvent) -> Self {
        Event::Recurrence(event)
    }
}
