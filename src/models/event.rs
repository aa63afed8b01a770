use serde::{Deserialize, Serialize};

/// How far probing got for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SubmissionState {
    /// No activity link was found on the calendar entry.
    #[default]
    Unknown,
    /// The entry links to an activity page, but no direct submission link was resolved.
    LinkFound,
    /// A direct "submit attendance" link was found; `url` points at it.
    DirectSubmitAvailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    pub title: String,
    /// `HH:MM`, empty when the entry had no parseable start time.
    pub start_time: String,
    /// `HH:MM`, empty when the entry had no parseable end time.
    pub end_time: String,
    pub url: String,
    pub submission_state: SubmissionState,
}

impl AttendanceEvent {
    /// Builds an event from extraction output. A non-empty url marks the
    /// activity link as found; an empty one keeps the state `Unknown`.
    pub fn new(title: String, start_time: String, end_time: String, url: String) -> Self {
        let submission_state = if url.is_empty() {
            SubmissionState::Unknown
        } else {
            SubmissionState::LinkFound
        };
        Self {
            title,
            start_time,
            end_time,
            url,
            submission_state,
        }
    }

    pub fn has_link(&self) -> bool {
        !self.url.is_empty()
    }

    pub fn to_payload(&self) -> NotificationPayload {
        NotificationPayload {
            title: self.title.clone(),
            start_time: self.start_time.clone(),
            end_time: self.end_time.clone(),
            url: self.url.clone(),
        }
    }
}

/// JSON body posted to the webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub start_time: String,
    pub end_time: String,
    pub url: String,
}
