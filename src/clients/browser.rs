use async_trait::async_trait;

use crate::error::BrowserError;
use crate::models::session::StorageState;

/// Accessible roles the bot looks elements up by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Link,
    Button,
    Radio,
}

/// How to find an element on the current page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// A structural CSS selector.
    Css(String),
    /// An element with the given role whose accessible name contains `name`.
    Role { role: Role, name: String },
    /// `inner` searched inside every match of `scope`.
    Within { scope: Box<Locator>, inner: Box<Locator> },
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn role(role: Role, name: impl Into<String>) -> Self {
        Self::Role {
            role,
            name: name.into(),
        }
    }

    pub fn within(scope: Locator, inner: Locator) -> Self {
        Self::Within {
            scope: Box::new(scope),
            inner: Box::new(inner),
        }
    }
}

/// The single page of the single browsing context the bot drives.
///
/// Implementations are assumed correct; callers decide which failures are
/// fatal and which only degrade an event.
#[async_trait]
pub trait Page: Send + Sync {
    type Element: Clone + Send + Sync;

    /// Navigates and blocks until the page has loaded.
    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    async fn current_url(&self) -> Result<String, BrowserError>;

    /// All matches in document order, searched under `scope` when given.
    async fn find_all(
        &self,
        scope: Option<&Self::Element>,
        locator: &Locator,
    ) -> Result<Vec<Self::Element>, BrowserError>;

    async fn attribute(&self, element: &Self::Element, name: &str) -> Result<Option<String>, BrowserError>;

    async fn inner_text(&self, element: &Self::Element) -> Result<String, BrowserError>;

    async fn click(&self, element: &Self::Element) -> Result<(), BrowserError>;

    async fn fill(&self, element: &Self::Element, value: &str) -> Result<(), BrowserError>;

    /// Waits until at least one element matches `locator`.
    async fn wait_for(&self, locator: &Locator) -> Result<(), BrowserError>;

    /// Waits for the document to finish loading after an action that navigates.
    async fn wait_for_load(&self) -> Result<(), BrowserError>;

    /// Captures cookies and local storage of the current context.
    async fn storage_state(&self) -> Result<StorageState, BrowserError>;

    /// Seeds the context with previously captured state.
    async fn restore_storage_state(&self, state: &StorageState) -> Result<(), BrowserError>;
}
