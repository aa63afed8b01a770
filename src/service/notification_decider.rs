use chrono::{Duration, NaiveDateTime, NaiveTime};
use tracing::{debug, info};

use crate::error::AppError;
use crate::models::event::{AttendanceEvent, SubmissionState};

/// One day. A longer lead would reach into the previous day's calendar.
pub const MAX_LEAD_MINUTES: i64 = 24 * 60;

/// Which events are worth a notification. Exactly one is active per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EligibilityPolicy {
    /// A direct submission link was resolved, regardless of the time.
    SubmissionState,
    /// `start - lead <= now <= end`.
    ClassWindow { lead: Duration },
    /// `start - lead <= now <= start`.
    LeadTime { lead: Duration },
}

impl EligibilityPolicy {
    /// `state`, `window` or `lead`.
    pub fn parse(name: &str, lead_minutes: i64) -> Result<Self, AppError> {
        if !(0..=MAX_LEAD_MINUTES).contains(&lead_minutes) {
            return Err(AppError::config(format!(
                "LEAD_MINUTES must be between 0 and {}, got {}",
                MAX_LEAD_MINUTES, lead_minutes
            )));
        }
        let lead = Duration::try_minutes(lead_minutes)
            .ok_or_else(|| AppError::config(format!("LEAD_MINUTES out of range, got {}", lead_minutes)))?;
        match name.trim().to_ascii_lowercase().as_str() {
            "state" => Ok(Self::SubmissionState),
            "window" => Ok(Self::ClassWindow { lead }),
            "lead" => Ok(Self::LeadTime { lead }),
            other => Err(AppError::config(format!(
                "Unknown eligibility policy {} (expected state, window or lead)",
                other
            ))),
        }
    }

    /// `now` is wall-clock time in the calendar's timezone.
    pub fn is_eligible(&self, event: &AttendanceEvent, now: NaiveDateTime) -> bool {
        match self {
            Self::SubmissionState => {
                event.submission_state == SubmissionState::DirectSubmitAvailable && event.has_link()
            }
            Self::ClassWindow { lead } => {
                let (Some(start), Some(end)) = (
                    on_day(&event.start_time, now),
                    on_day(&event.end_time, now),
                ) else {
                    return false;
                };
                opens_at(start, *lead).is_some_and(|open| open <= now && now <= end)
            }
            Self::LeadTime { lead } => {
                let Some(start) = on_day(&event.start_time, now) else {
                    return false;
                };
                opens_at(start, *lead).is_some_and(|open| open <= now && now <= start)
            }
        }
    }
}

/// `None` when the lead reaches outside the representable date range.
fn opens_at(start: NaiveDateTime, lead: Duration) -> Option<NaiveDateTime> {
    start.checked_sub_signed(lead)
}

/// `HH:MM` on the same calendar day as `now`.
fn on_day(clock: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let time = NaiveTime::parse_from_str(clock, "%H:%M").ok()?;
    Some(now.date().and_time(time))
}

pub struct NotificationDecider {
    policy: EligibilityPolicy,
}

impl NotificationDecider {
    pub fn new(policy: EligibilityPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> EligibilityPolicy {
        self.policy
    }

    /// Eligible events in their original order.
    pub fn select_eligible(&self, events: &[AttendanceEvent], now: NaiveDateTime) -> Vec<AttendanceEvent> {
        events
            .iter()
            .filter(|event| {
                let eligible = self.policy.is_eligible(event, now);
                if eligible {
                    info!(title = %event.title, start = %event.start_time, "Eligible for notification");
                } else {
                    debug!(
                        title = %event.title,
                        start = %event.start_time,
                        end = %event.end_time,
                        state = ?event.submission_state,
                        "Not eligible"
                    );
                }
                eligible
            })
            .cloned()
            .collect()
    }
}
