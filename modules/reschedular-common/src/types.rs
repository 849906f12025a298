use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Recurrence interval used when a questionnaire leaves `hours_between_attempts` unset.
pub const DEFAULT_HOURS_BETWEEN_ATTEMPTS: i64 = 24;

// --- Questionnaire ---

/// Definition of a recurring questionnaire. Read-only to the recurrence engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Questionnaire {
    pub id: String,
    pub study_id: String,
    pub name: String,
    /// `None` means a participant may attempt it any number of times.
    pub max_attempts: Option<i64>,
    pub hours_between_attempts: Option<i64>,
}

impl Questionnaire {
    /// Whether another attempt may be scheduled given `attempts` already recorded.
    pub fn can_attempt(&self, attempts: usize) -> bool {
        match self.max_attempts {
            None => true,
            Some(max) => i64::try_from(attempts).is_ok_and(|n| n < max),
        }
    }

    /// Hours between the end of one attempt and the due time of the next.
    pub fn recurrence_interval(&self) -> Duration {
        Duration::hours(
            self.hours_between_attempts
                .unwrap_or(DEFAULT_HOURS_BETWEEN_ATTEMPTS),
        )
    }
}

// --- Participant ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
}

// --- Attempt results ---

/// One submitted response to a questionnaire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptResult {
    pub id: String,
    pub questionnaire_id: String,
    pub participant_id: String,
    /// Scheduled attempt this result fulfils. `None` for ad hoc submissions.
    pub scheduled_attempt_id: Option<String>,
    /// `None` while the attempt is still in progress.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Ordered collection of results for one questionnaire/participant pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptResults(Vec<AttemptResult>);

impl AttemptResults {
    pub fn new(results: Vec<AttemptResult>) -> Self {
        Self(results)
    }

    pub fn count(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttemptResult> {
        self.0.iter()
    }

    /// The result with the latest completion timestamp.
    ///
    /// Entries without a timestamp never win the comparison; ties keep the
    /// first one seen. When no entry has a timestamp the first entry is
    /// returned.
    pub fn most_recent(&self) -> Option<&AttemptResult> {
        let mut latest: Option<&AttemptResult> = None;
        for result in &self.0 {
            let Some(completed_at) = result.completed_at else {
                continue;
            };
            match latest.and_then(|l| l.completed_at) {
                Some(best) if best >= completed_at => {}
                _ => latest = Some(result),
            }
        }
        latest.or_else(|| self.0.first())
    }
}

impl From<Vec<AttemptResult>> for AttemptResults {
    fn from(results: Vec<AttemptResult>) -> Self {
        Self(results)
    }
}

impl IntoIterator for AttemptResults {
    type Item = AttemptResult;
    type IntoIter = std::vec::IntoIter<AttemptResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// --- Scheduled attempts ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Pending,
    Completed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Pending => "pending",
            AttemptStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AttemptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AttemptStatus::Pending),
            "completed" => Ok(AttemptStatus::Completed),
            other => Err(format!("unknown attempt status: {other}")),
        }
    }
}

/// A recurrence slot: when the participant's next attempt is due.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledAttempt {
    pub id: String,
    pub questionnaire_id: String,
    pub participant_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: AttemptStatus,
}

impl ScheduledAttempt {
    /// A pending slot due one recurrence interval after `origin`.
    pub fn pending(
        id: impl Into<String>,
        questionnaire: &Questionnaire,
        participant_id: impl Into<String>,
        origin: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            questionnaire_id: questionnaire.id.clone(),
            participant_id: participant_id.into(),
            scheduled_at: origin + questionnaire.recurrence_interval(),
            status: AttemptStatus::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn questionnaire(max_attempts: Option<i64>, hours: Option<i64>) -> Questionnaire {
        Questionnaire {
            id: "q-1".into(),
            study_id: "study-1".into(),
            name: "Mood check".into(),
            max_attempts,
            hours_between_attempts: hours,
        }
    }

    fn result(id: &str, completed_at: Option<DateTime<Utc>>) -> AttemptResult {
        AttemptResult {
            id: id.into(),
            questionnaire_id: "q-1".into(),
            participant_id: "p-1".into(),
            scheduled_attempt_id: None,
            completed_at,
        }
    }

    #[test]
    fn unlimited_questionnaire_always_allows_attempts() {
        let q = questionnaire(None, None);
        for n in [0, 1, 3, 1000, usize::MAX] {
            assert!(q.can_attempt(n), "attempt {n} should be allowed");
        }
    }

    #[test]
    fn limited_questionnaire_allows_attempts_below_max() {
        let q = questionnaire(Some(3), None);
        assert!(q.can_attempt(0));
        assert!(q.can_attempt(2));
        assert!(!q.can_attempt(3));
        assert!(!q.can_attempt(4));
    }

    #[test]
    fn zero_max_attempts_never_allows() {
        let q = questionnaire(Some(0), None);
        assert!(!q.can_attempt(0));
    }

    #[test]
    fn recurrence_interval_defaults_to_24_hours() {
        assert_eq!(questionnaire(None, None).recurrence_interval(), Duration::hours(24));
        assert_eq!(questionnaire(None, Some(4)).recurrence_interval(), Duration::hours(4));
    }

    #[test]
    fn pending_slot_is_due_one_interval_after_origin() {
        let origin = Utc.with_ymd_and_hms(2022, 7, 18, 10, 0, 0).unwrap();
        let slot = ScheduledAttempt::pending("s-1", &questionnaire(None, Some(6)), "p-1", origin);
        assert_eq!(slot.scheduled_at, origin + Duration::hours(6));
        assert_eq!(slot.status, AttemptStatus::Pending);
        assert_eq!(slot.questionnaire_id, "q-1");
    }

    #[test]
    fn most_recent_picks_latest_timestamp() {
        let now = Utc.with_ymd_and_hms(2022, 7, 18, 10, 0, 0).unwrap();
        let mut results = vec![
            result("ABC123", Some(now + Duration::hours(2))),
            result("ABC456", Some(now)),
            result("ABC789", Some(now + Duration::hours(3))),
            result("XYZ987", Some(now + Duration::hours(1))),
        ];

        let all = AttemptResults::new(results.clone());
        assert_eq!(all.most_recent().map(|r| r.id.as_str()), Some("ABC789"));

        results[2].completed_at = None;
        let with_incomplete = AttemptResults::new(results);
        assert_eq!(
            with_incomplete.most_recent().map(|r| r.id.as_str()),
            Some("ABC123")
        );
    }

    #[test]
    fn most_recent_falls_back_to_first_when_nothing_is_timestamped() {
        let results = AttemptResults::new(vec![result("first", None), result("second", None)]);
        assert_eq!(results.most_recent().map(|r| r.id.as_str()), Some("first"));
        assert!(AttemptResults::default().most_recent().is_none());
    }

    #[test]
    fn most_recent_keeps_first_seen_on_ties() {
        let at = Utc.with_ymd_and_hms(2022, 7, 18, 10, 0, 0).unwrap();
        let results = AttemptResults::new(vec![result("a", Some(at)), result("b", Some(at))]);
        assert_eq!(results.most_recent().map(|r| r.id.as_str()), Some("a"));
    }

    #[test]
    fn attempt_status_parses_and_displays() {
        assert_eq!("pending".parse::<AttemptStatus>(), Ok(AttemptStatus::Pending));
        assert_eq!("completed".parse::<AttemptStatus>(), Ok(AttemptStatus::Completed));
        assert!("archived".parse::<AttemptStatus>().is_err());
        assert_eq!(AttemptStatus::Completed.to_string(), "completed");
    }
}
