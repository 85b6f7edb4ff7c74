//! Domain types shared across the TutorDex pipeline.
//!
//! Declared as tagged records with closed enums rather than loosely-typed
//! JSON, so validation in `tutordex_enrich` is type-directed: a field either
//! parses into one of these shapes or it doesn't exist in the canonical
//! record at all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw id, assigned by the datastore on first insert.
pub type RawId = i64;
/// Extraction job id, assigned by the datastore on enqueue.
pub type JobId = i64;

/// Immutable, lossless record of a Telegram post as first observed.
///
/// Created by the collector; never mutated except to flip `is_deleted` when
/// the upstream marks the source message deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: RawId,
    pub channel_id: i64,
    pub message_id: i64,
    pub channel_username: Option<String>,
    pub channel_title: Option<String>,
    pub date: DateTime<Utc>,
    pub raw_text: String,
    pub is_forwarded: bool,
    pub is_deleted: bool,
    pub ingested_at: DateTime<Utc>,
}

/// Cached, lightweight view of a Telegram channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub channel_id: i64,
    pub username: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
}

/// Lifecycle state of an [`ExtractionJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Done,
    Failed,
    Skipped,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
            JobStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "done" => Ok(JobStatus::Done),
            "failed" => Ok(JobStatus::Failed),
            "skipped" => Ok(JobStatus::Skipped),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// Closed taxonomy of failure/skip reasons, so `last_error_kind` round-trips
/// through the `meta` JSON column without stringly-typed drift. Each kind
/// carries its own retry/recovery contract via `is_retryable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    FilteredForwarded,
    FilteredDeleted,
    FilteredShort,
    FilteredCompilation,
    FilteredNonAssignment,
    FilteredBlocklist,
    LlmNetworkTimeout,
    LlmRefused,
    Llm5xx,
    Llm4xx,
    LlmEmptyResponse,
    LlmInvalidJson,
    LlmSchemaShape,
    LlmCircuitOpen,
    ValidationFailed,
    DatastoreConflict,
    DatastoreUnreachable,
    Shutdown,
    BroadcastFailed,
    DmFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::FilteredForwarded => "filtered_forwarded",
            ErrorKind::FilteredDeleted => "filtered_deleted",
            ErrorKind::FilteredShort => "filtered_short",
            ErrorKind::FilteredCompilation => "filtered_compilation",
            ErrorKind::FilteredNonAssignment => "filtered_non_assignment",
            ErrorKind::FilteredBlocklist => "filtered_blocklist",
            ErrorKind::LlmNetworkTimeout => "llm_network_timeout",
            ErrorKind::LlmRefused => "llm_refused",
            ErrorKind::Llm5xx => "llm_5xx",
            ErrorKind::Llm4xx => "llm_4xx",
            ErrorKind::LlmEmptyResponse => "llm_empty_response",
            ErrorKind::LlmInvalidJson => "llm_invalid_json",
            ErrorKind::LlmSchemaShape => "llm_schema_shape",
            ErrorKind::LlmCircuitOpen => "llm_circuit_open",
            ErrorKind::ValidationFailed => "validation_failed",
            ErrorKind::DatastoreConflict => "datastore_conflict",
            ErrorKind::DatastoreUnreachable => "datastore_unreachable",
            ErrorKind::Shutdown => "shutdown",
            ErrorKind::BroadcastFailed => "broadcast_failed",
            ErrorKind::DmFailed => "dm_failed",
        }
    }

    /// Whether this kind is eligible for retry via stale requeue, as opposed
    /// to being a terminal failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::LlmNetworkTimeout
                | ErrorKind::LlmRefused
                | ErrorKind::Llm5xx
                | ErrorKind::LlmCircuitOpen
                | ErrorKind::DatastoreUnreachable
                | ErrorKind::Shutdown
        )
    }

    /// Whether this kind terminates the job as `skipped` rather than `failed`.
    pub fn is_filter_skip(&self) -> bool {
        matches!(
            self,
            ErrorKind::FilteredForwarded
                | ErrorKind::FilteredDeleted
                | ErrorKind::FilteredShort
                | ErrorKind::FilteredCompilation
                | ErrorKind::FilteredNonAssignment
                | ErrorKind::FilteredBlocklist
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "filtered_forwarded" => Ok(ErrorKind::FilteredForwarded),
            "filtered_deleted" => Ok(ErrorKind::FilteredDeleted),
            "filtered_short" => Ok(ErrorKind::FilteredShort),
            "filtered_compilation" => Ok(ErrorKind::FilteredCompilation),
            "filtered_non_assignment" => Ok(ErrorKind::FilteredNonAssignment),
            "filtered_blocklist" => Ok(ErrorKind::FilteredBlocklist),
            "llm_network_timeout" => Ok(ErrorKind::LlmNetworkTimeout),
            "llm_refused" => Ok(ErrorKind::LlmRefused),
            "llm_5xx" => Ok(ErrorKind::Llm5xx),
            "llm_4xx" => Ok(ErrorKind::Llm4xx),
            "llm_empty_response" => Ok(ErrorKind::LlmEmptyResponse),
            "llm_invalid_json" => Ok(ErrorKind::LlmInvalidJson),
            "llm_schema_shape" => Ok(ErrorKind::LlmSchemaShape),
            "llm_circuit_open" => Ok(ErrorKind::LlmCircuitOpen),
            "validation_failed" => Ok(ErrorKind::ValidationFailed),
            "datastore_conflict" => Ok(ErrorKind::DatastoreConflict),
            "datastore_unreachable" => Ok(ErrorKind::DatastoreUnreachable),
            "shutdown" => Ok(ErrorKind::Shutdown),
            "broadcast_failed" => Ok(ErrorKind::BroadcastFailed),
            "dm_failed" => Ok(ErrorKind::DmFailed),
            other => Err(format!("unknown error kind: {other}")),
        }
    }
}

/// A unit of extraction work, uniquely keyed by `(raw_id, pipeline_version)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionJob {
    pub id: JobId,
    pub raw_id: RawId,
    pub pipeline_version: String,
    pub status: JobStatus,
    pub claimed_at: Option<DateTime<Utc>>,
    pub claimed_by: Option<String>,
    pub attempts: i32,
    pub last_error_kind: Option<ErrorKind>,
    pub last_error_msg: Option<String>,
    pub meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// `learning_mode.mode` — closed enum, never a free-text string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LearningMode {
    FaceToFace,
    Online,
    Hybrid,
    #[default]
    Unknown,
}

impl std::str::FromStr for LearningMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "face_to_face" | "face-to-face" | "f2f" | "in_person" | "in-person" => {
                Ok(LearningMode::FaceToFace)
            }
            "online" | "remote" | "zoom" => Ok(LearningMode::Online),
            "hybrid" | "both" => Ok(LearningMode::Hybrid),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LearningModeField {
    pub mode: LearningMode,
    pub raw_text: Option<String>,
}

/// A single weekly availability slot, e.g. "Mon 17:00-19:00".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeSlot {
    pub day: Weekday,
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Weekday {
    pub const ORDER: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];

    pub fn from_prefix(s: &str) -> Option<Weekday> {
        let lower = s.trim().to_ascii_lowercase();
        let prefix: String = lower.chars().take(3).collect();
        match prefix.as_str() {
            "mon" => Some(Weekday::Mon),
            "tue" => Some(Weekday::Tue),
            "wed" => Some(Weekday::Wed),
            "thu" => Some(Weekday::Thu),
            "fri" => Some(Weekday::Fri),
            "sat" => Some(Weekday::Sat),
            "sun" => Some(Weekday::Sun),
            _ => None,
        }
    }
}

/// Result of the grammar-based schedule parser (C6 step 2). Overwrites
/// whatever `time_availability` the LLM returned.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TimeAvailability {
    pub explicit: Vec<TimeSlot>,
    pub estimated: Vec<TimeSlot>,
    pub note: Option<String>,
}

/// `rate.min`/`rate.max` — a numeric range record, not two loose floats.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RateRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub raw_text: Option<String>,
}

/// A single scheduled lesson slot in the assignment's proposed timetable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub day: Option<Weekday>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub note: Option<String>,
}

/// The validated canonical extraction — not persisted verbatim, but its JSON
/// form is echoed into `assignments.parsed_json` and `extraction_jobs.meta`
/// for replay (see SPEC_FULL.md §3 and testable property P4).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ParsedAssignment {
    pub assignment_code: Option<String>,
    pub academic_display_text: Option<String>,
    pub learning_mode: LearningModeField,
    pub address: Vec<String>,
    pub postal_code: Vec<String>,
    pub nearest_mrt: Vec<String>,
    pub lesson_schedule: Vec<ScheduleSlot>,
    pub start_date: Option<chrono::NaiveDate>,
    pub time_availability: TimeAvailability,
    pub rate: RateRange,
    pub additional_remarks: Option<String>,
}

/// Extraction-confidence tagged tutor-type hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TutorTypeHit {
    pub canonical: String,
    pub original: String,
    pub confidence: f64,
}

/// Derived rollups — pure functions of [`ParsedAssignment`] plus the
/// taxonomy version; see invariant I4.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Signals {
    pub subjects_canonical: Vec<String>,
    pub subjects_general: Vec<String>,
    pub levels: Vec<String>,
    pub specific_levels: Vec<String>,
    pub region: Option<String>,
    pub tutor_types: Vec<TutorTypeHit>,
    pub rate_min: Option<f64>,
    pub rate_max: Option<f64>,
    pub canonicalization_version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Open,
    Closed,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Open => "open",
            AssignmentStatus::Closed => "closed",
        }
    }
}

impl std::str::FromStr for AssignmentStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(AssignmentStatus::Open),
            "closed" => Ok(AssignmentStatus::Closed),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreshnessTier {
    Green,
    Amber,
    Red,
}

impl FreshnessTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            FreshnessTier::Green => "green",
            FreshnessTier::Amber => "amber",
            FreshnessTier::Red => "red",
        }
    }
}

impl std::str::FromStr for FreshnessTier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "green" => Ok(FreshnessTier::Green),
            "amber" => Ok(FreshnessTier::Amber),
            "red" => Ok(FreshnessTier::Red),
            _ => Err(()),
        }
    }
}

/// The canonical, queryable row published to downstream consumers.
/// Keyed by `(channel_id, message_id)` — invariant I1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub channel_id: i64,
    pub message_id: i64,
    pub parsed: ParsedAssignment,
    pub signals: Signals,
    pub postal_lat: Option<f64>,
    pub postal_lon: Option<f64>,
    pub status: AssignmentStatus,
    pub freshness_tier: FreshnessTier,
    pub published_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub duplicate_group_id: Option<String>,
    pub is_primary_in_group: bool,
    pub duplicate_confidence_score: Option<f64>,
}

/// Which best-effort side effect a [`DeliveryRecord`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryKind {
    Broadcast,
    Dm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub kind: DeliveryKind,
    pub channel_id: i64,
    pub message_id: i64,
    pub chat_id: Option<i64>,
    pub succeeded: bool,
    pub error: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_round_trips_through_str() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Done,
            JobStatus::Failed,
            JobStatus::Skipped,
        ] {
            let parsed: JobStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn error_kind_retry_classification_matches_spec_table() {
        assert!(ErrorKind::LlmNetworkTimeout.is_retryable());
        assert!(ErrorKind::DatastoreUnreachable.is_retryable());
        assert!(!ErrorKind::ValidationFailed.is_retryable());
        assert!(!ErrorKind::LlmInvalidJson.is_retryable());
    }

    #[test]
    fn learning_mode_parses_common_variants() {
        assert_eq!("Online".parse::<LearningMode>(), Ok(LearningMode::Online));
        assert_eq!(
            "face-to-face".parse::<LearningMode>(),
            Ok(LearningMode::FaceToFace)
        );
        assert!("gibberish".parse::<LearningMode>().is_err());
    }

    #[test]
    fn weekday_from_prefix_is_case_insensitive() {
        assert_eq!(Weekday::from_prefix("MONDAY"), Some(Weekday::Mon));
        assert_eq!(Weekday::from_prefix("wed"), Some(Weekday::Wed));
        assert_eq!(Weekday::from_prefix("whatever"), None);
    }
}
