use tracing::{debug, info, warn};

use crate::clients::browser::{Locator, Page};
use crate::error::BrowserError;
use crate::models::event::{AttendanceEvent, SubmissionState};
use crate::service::lookup::{ATTENDANCE_ENTRY, LookupChain, StepFailure, present_status, submit_link};

/// What probing one event achieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The event had no link; nothing was navigated.
    Skipped,
    /// The activity page has no submit link.
    NoSubmitLink,
    /// A direct submission link was resolved into `event.url`.
    DirectLink {
        clicked: bool,
        present_selected: bool,
    },
    /// The submit link exists but exposes no `href`. `event.url` keeps the
    /// activity page; the link is still followed by clicking.
    LinkWithoutHref {
        clicked: bool,
        present_selected: bool,
    },
}

pub struct SubmissionProbe {
    calendar_url: String,
    submit_attendance: bool,
    submit_link: LookupChain,
    present_status: LookupChain,
    calendar_entry: Locator,
}

impl SubmissionProbe {
    pub fn new(calendar_url: String, submit_attendance: bool) -> Self {
        Self {
            calendar_url,
            submit_attendance,
            submit_link: submit_link(),
            present_status: present_status(),
            calendar_entry: Locator::css(ATTENDANCE_ENTRY),
        }
    }

    /// Visits the event's activity page, upgrades `event.url` to the direct
    /// submission link when one exists, and returns to the calendar.
    ///
    /// Only `url` and `submission_state` are touched. The calendar is
    /// reloaded even when the probe itself fails.
    pub async fn resolve<P: Page + ?Sized>(
        &self,
        page: &P,
        event: &mut AttendanceEvent,
    ) -> Result<ProbeOutcome, BrowserError> {
        if !event.has_link() {
            return Ok(ProbeOutcome::Skipped);
        }
        let outcome = self.inspect(page, event).await;
        self.return_to_calendar(page).await;
        outcome
    }

    async fn inspect<P: Page + ?Sized>(
        &self,
        page: &P,
        event: &mut AttendanceEvent,
    ) -> Result<ProbeOutcome, BrowserError> {
        page.goto(&event.url).await?;

        let link = match self.submit_link.first_match(page, None).await {
            Ok(link) => link,
            Err(failure) => {
                debug!(title = %event.title, reason = %failure, "No direct submission link");
                return Ok(ProbeOutcome::NoSubmitLink);
            }
        };

        let href = match page.attribute(&link, "href").await {
            Ok(href) => href.unwrap_or_default(),
            Err(e) => {
                warn!(title = %event.title, error = %e, "Unable to read submission link");
                String::new()
            }
        };
        let direct = !href.is_empty();
        if direct {
            event.url = href;
            event.submission_state = SubmissionState::DirectSubmitAvailable;
            info!(title = %event.title, url = %event.url, "Direct submission link found");
        } else {
            info!(title = %event.title, "Submission link has no href, keeping activity URL");
        }

        let (clicked, present_selected) = if self.submit_attendance {
            self.submit(page, &link, event).await
        } else {
            (false, false)
        };

        Ok(if direct {
            ProbeOutcome::DirectLink {
                clicked,
                present_selected,
            }
        } else {
            ProbeOutcome::LinkWithoutHref {
                clicked,
                present_selected,
            }
        })
    }

    /// Opens the attendance form and picks "present". Both steps are best effort.
    async fn submit<P: Page + ?Sized>(&self, page: &P, link: &P::Element, event: &AttendanceEvent) -> (bool, bool) {
        if let Err(e) = page.click(link).await {
            warn!(title = %event.title, error = %e, "Unable to open attendance form");
            return (false, false);
        }
        match self.select_present(page).await {
            Ok(()) => {
                info!(title = %event.title, "Selected present status");
                (true, true)
            }
            Err(failure) => {
                warn!(title = %event.title, reason = %failure, "Present status not selected");
                (true, false)
            }
        }
    }

    async fn select_present<P: Page + ?Sized>(&self, page: &P) -> Result<(), StepFailure> {
        let control = self.present_status.first_match(page, None).await?;
        page.click(&control).await?;
        Ok(())
    }

    /// Reloads the calendar view so the next event starts from the same page.
    pub async fn return_to_calendar<P: Page + ?Sized>(&self, page: &P) {
        if let Err(e) = page.goto(&self.calendar_url).await {
            warn!(error = %e, "Unable to return to calendar");
            return;
        }
        if let Err(e) = page.wait_for(&self.calendar_entry).await {
            debug!(error = %e, "Calendar entries did not reappear");
        }
    }
}
