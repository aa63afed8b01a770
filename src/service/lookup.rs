use tracing::debug;

use crate::clients::browser::{Locator, Page, Role};
use crate::error::BrowserError;

/// Marker on calendar entries that represent attendance sessions.
pub const ATTENDANCE_ENTRY: &str = "[data-event-eventtype=\"attendance\"]";
pub const LOGIN_USERNAME: &str = "#username";
pub const LOGIN_PASSWORD: &str = "#password";
pub const LOGIN_SUBMIT: &str = "button[type=\"submit\"]";

const ACTIVITY_LINK_NAME: &str = "活動に移動する";
const ACTIVITY_LINK_CLASS: &str = "a.card-link";
const SUBMIT_LINK_NAME: &str = "出欠を送信する";
const STATUS_CELL: &str = ".statuscol.cell.c2";
const PRESENT_STATUS_NAME: &str = "出席";

/// Why a best-effort step produced nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepFailure {
    NotFound(&'static str),
    Failed(BrowserError),
}

impl From<BrowserError> for StepFailure {
    fn from(e: BrowserError) -> Self {
        Self::Failed(e)
    }
}

impl std::fmt::Display for StepFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(what) => write!(f, "{} not found", what),
            Self::Failed(e) => write!(f, "{}", e),
        }
    }
}

/// Ordered lookup strategies; the first one that matches wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupChain {
    name: &'static str,
    strategies: Vec<Locator>,
}

impl LookupChain {
    pub fn new(name: &'static str, strategies: Vec<Locator>) -> Self {
        Self { name, strategies }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn strategies(&self) -> &[Locator] {
        &self.strategies
    }

    /// First element matched by the first strategy that matches anything.
    /// A strategy whose query fails counts as a miss.
    pub async fn first_match<P: Page + ?Sized>(
        &self,
        page: &P,
        scope: Option<&P::Element>,
    ) -> Result<P::Element, StepFailure> {
        for (idx, locator) in self.strategies.iter().enumerate() {
            match page.find_all(scope, locator).await {
                Ok(found) => {
                    if let Some(element) = found.into_iter().next() {
                        debug!(chain = self.name, strategy = idx, "Lookup matched");
                        return Ok(element);
                    }
                }
                Err(e) => debug!(chain = self.name, strategy = idx, error = %e, "Lookup strategy failed"),
            }
        }
        Err(StepFailure::NotFound(self.name))
    }
}

/// Link from a calendar entry to its activity page.
pub fn activity_link() -> LookupChain {
    LookupChain::new(
        "activity link",
        vec![
            Locator::role(Role::Link, ACTIVITY_LINK_NAME),
            Locator::css(ACTIVITY_LINK_CLASS),
        ],
    )
}

/// The "submit attendance" link on an activity page.
pub fn submit_link() -> LookupChain {
    LookupChain::new(
        "submit attendance link",
        vec![
            Locator::role(Role::Link, SUBMIT_LINK_NAME),
            Locator::within(Locator::css(STATUS_CELL), Locator::role(Role::Link, SUBMIT_LINK_NAME)),
        ],
    )
}

/// The "present" choice on the attendance form.
pub fn present_status() -> LookupChain {
    LookupChain::new("present status control", vec![Locator::role(Role::Radio, PRESENT_STATUS_NAME)])
}
