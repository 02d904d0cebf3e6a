use chrono::{DateTime, Local};
use serde::Serialize;

/// Kind of attendance event.
///
/// Only check-ins are produced; telling a check-out apart would need the
/// subject's previous event, which is not tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventType {
    #[serde(rename = "Check-in")]
    CheckIn,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::CheckIn => f.write_str("Check-in"),
        }
    }
}

/// One attendance record, serialized as the recording endpoint's JSON body.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationEvent {
    #[serde(rename = "doctor_id")]
    pub subject_id: String,
    pub event_type: EventType,
    #[serde(rename = "camera_location")]
    pub location: String,
    #[serde(rename = "confidence_score")]
    pub confidence: Option<f32>,
    /// When the match was seen. Logged locally; the server stamps its own time.
    #[serde(skip)]
    pub timestamp: DateTime<Local>,
}

impl NotificationEvent {
    pub fn check_in(subject_id: &str, location: &str, confidence: Option<f32>) -> Self {
        Self {
            subject_id: subject_id.to_string(),
            event_type: EventType::CheckIn,
            location: location.to_string(),
            confidence,
            timestamp: Local::now(),
        }
    }
}
