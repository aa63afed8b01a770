use chrono::{NaiveDateTime, Utc};
use chrono_tz::Tz;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::clients::browser::Page;
use crate::clients::webhook::NotificationSink;
use crate::config::Settings;
use crate::error::{AppError, BrowserError};
use crate::models::event::{AttendanceEvent, SubmissionState};
use crate::models::session::SessionStore;
use crate::service::event_extractor::EventExtractor;
use crate::service::notification_decider::NotificationDecider;
use crate::service::session_manager::{AuthOutcome, SessionManager};
use crate::service::submission_probe::{ProbeOutcome, SubmissionProbe};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub extracted: usize,
    pub probed: usize,
    pub direct_links: usize,
    pub notified: usize,
    pub delivery_failures: usize,
}

/// Wall-clock time in the calendar's timezone.
pub fn local_now(timezone: Tz) -> NaiveDateTime {
    Utc::now().with_timezone(&timezone).naive_local()
}

/// One pass: authenticate, extract, probe each linked event, decide, notify.
///
/// Configuration and authentication problems abort the run. Probe and
/// delivery failures are logged against their event and the pass continues.
pub async fn run_once<P, S>(
    page: &P,
    sink: &S,
    settings: &Settings,
    now: NaiveDateTime,
) -> Result<RunSummary, AppError>
where
    P: Page + ?Sized,
    S: NotificationSink + ?Sized,
{
    let sessions = SessionManager::new(
        settings.credentials.clone(),
        SessionStore::new(settings.session_file.clone()),
        settings.login_url.clone(),
        settings.calendar_url.clone(),
    );
    let extractor = EventExtractor::new();
    let probe = SubmissionProbe::new(settings.calendar_url.clone(), settings.submit_attendance);
    let decider = NotificationDecider::new(settings.policy);

    match sessions.ensure_authenticated(page).await? {
        AuthOutcome::ReusedSession => info!("Authenticated with saved session"),
        AuthOutcome::FreshLogin => info!("Authenticated with fresh login"),
    }

    let mut events = extractor.list_events(page).await?;
    let mut summary = RunSummary {
        extracted: events.len(),
        ..Default::default()
    };
    info!(count = events.len(), "Extracted attendance events");

    for event in events.iter_mut().filter(|event| event.has_link()) {
        summary.probed += 1;
        match probe_with_limit(&probe, page, event, settings).await {
            Ok(ProbeOutcome::DirectLink { clicked, present_selected }) => {
                info!(title = %event.title, clicked, present_selected, "Probed event");
            }
            Ok(outcome) => info!(title = %event.title, outcome = ?outcome, "Probed event"),
            Err(e) => warn!(title = %event.title, error = %e, "Probe failed"),
        }
        if event.submission_state == SubmissionState::DirectSubmitAvailable {
            summary.direct_links += 1;
        }
    }

    for event in decider.select_eligible(&events, now) {
        match sink.deliver(&event.to_payload()).await {
            Ok(()) => summary.notified += 1,
            Err(e) => {
                summary.delivery_failures += 1;
                warn!(title = %event.title, error = %e, "Giving up on notification");
            }
        }
    }

    info!(
        extracted = summary.extracted,
        probed = summary.probed,
        direct_links = summary.direct_links,
        notified = summary.notified,
        delivery_failures = summary.delivery_failures,
        "Run finished"
    );
    Ok(summary)
}

async fn probe_with_limit<P: Page + ?Sized>(
    probe: &SubmissionProbe,
    page: &P,
    event: &mut AttendanceEvent,
    settings: &Settings,
) -> Result<ProbeOutcome, BrowserError> {
    let Some(limit) = settings.event_timeout else {
        return probe.resolve(page, event).await;
    };
    match timeout(limit, probe.resolve(page, event)).await {
        Ok(result) => result,
        Err(_) => {
            probe.return_to_calendar(page).await;
            Err(BrowserError::Timeout(limit.as_secs()))
        }
    }
}
