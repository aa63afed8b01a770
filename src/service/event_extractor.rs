use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::clients::browser::{Locator, Page};
use crate::error::BrowserError;
use crate::models::event::AttendanceEvent;
use crate::service::lookup::{ATTENDANCE_ENTRY, LookupChain, activity_link};

const UNKNOWN_TITLE: &str = "Unknown";
const TIME_LINE: usize = 1;
const TITLE_LINE: usize = 3;

/// Fields recovered from the text of one calendar entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryText {
    pub title: String,
    pub start_time: String,
    pub end_time: String,
}

/// Splits an entry's rendered text into trimmed, non-empty lines and
/// parses them with [`parse_entry_lines`].
pub fn parse_entry_text(text: &str) -> EntryText {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    parse_entry_lines(&lines)
}

/// Positional parse: the second line carries the `HH:MM` start and end
/// times, the fourth the title. Missing pieces become empty strings (times)
/// or `"Unknown"` (title).
pub fn parse_entry_lines(lines: &[&str]) -> EntryText {
    let times = lines.get(TIME_LINE).map(|line| clock_times(line)).unwrap_or_default();
    EntryText {
        title: lines
            .get(TITLE_LINE)
            .map(|line| line.to_string())
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
        start_time: times.first().cloned().unwrap_or_default(),
        end_time: times.get(1).cloned().unwrap_or_default(),
    }
}

static CLOCK_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{2}:\d{2})").expect("clock time pattern is valid"));

/// Every `DD:DD` token in `line`, left to right.
fn clock_times(line: &str) -> Vec<String> {
    CLOCK_TIME
        .find_iter(line)
        .map(|m| m.as_str().to_string())
        .collect()
}

pub struct EventExtractor {
    entry: Locator,
    link: LookupChain,
}

impl Default for EventExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl EventExtractor {
    pub fn new() -> Self {
        Self {
            entry: Locator::css(ATTENDANCE_ENTRY),
            link: activity_link(),
        }
    }

    /// Snapshot of the attendance entries on the current calendar view, in
    /// page order. Only the initial query can fail; per-entry problems
    /// degrade the affected fields.
    pub async fn list_events<P: Page + ?Sized>(&self, page: &P) -> Result<Vec<AttendanceEvent>, BrowserError> {
        let entries = page.find_all(None, &self.entry).await?;
        debug!(count = entries.len(), "Found attendance entries");

        let mut events = Vec::with_capacity(entries.len());
        for entry in &entries {
            let text = match page.inner_text(entry).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Unable to read calendar entry text");
                    String::new()
                }
            };
            let parsed = parse_entry_text(&text);
            let url = self.link_href(page, entry).await;
            events.push(AttendanceEvent::new(parsed.title, parsed.start_time, parsed.end_time, url));
        }
        Ok(events)
    }

    async fn link_href<P: Page + ?Sized>(&self, page: &P, entry: &P::Element) -> String {
        let link = match self.link.first_match(page, Some(entry)).await {
            Ok(link) => link,
            Err(failure) => {
                debug!(reason = %failure, "Entry has no activity link");
                return String::new();
            }
        };
        match page.attribute(&link, "href").await {
            Ok(href) => href.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Unable to read activity link");
                String::new()
            }
        }
    }
}
