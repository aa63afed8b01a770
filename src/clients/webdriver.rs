use std::time::Duration;

use async_trait::async_trait;
use fantoccini::cookies::Cookie;
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::wd::TimeoutConfiguration;
use fantoccini::{Client, ClientBuilder};
use serde_json::{Value, json};
use tokio::time::{Instant, sleep};
use tracing::debug;

use super::browser::{Locator, Page, Role};
use crate::error::BrowserError;
use crate::models::session::{StorageState, StoredCookie};

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/122.0.0.0 Safari/537.36";
const DEFAULT_WAIT: Duration = Duration::from_secs(30);
const READY_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub webdriver_url: String,
    pub headless: bool,
    /// `None` leaves page loads unbounded.
    pub navigation_timeout: Option<Duration>,
}

/// `Page` backed by a WebDriver session (chromedriver or a Selenium grid).
pub struct WebDriverPage {
    client: Client,
    navigation_timeout: Option<Duration>,
}

fn command(e: CmdError) -> BrowserError {
    BrowserError::Command(e.to_string())
}

impl WebDriverPage {
    pub async fn connect(options: &BrowserOptions) -> Result<Self, BrowserError> {
        let mut args = vec![
            "--window-size=1280,800".to_string(),
            "--lang=ja-JP".to_string(),
            format!("--user-agent={}", USER_AGENT),
        ];
        if options.headless {
            args.push("--headless=new".to_string());
        }
        let mut capabilities = serde_json::Map::new();
        capabilities.insert(
            "goog:chromeOptions".to_string(),
            json!({
                "args": args,
                "prefs": { "intl.accept_languages": "ja-JP" },
            }),
        );

        let client = ClientBuilder::native()
            .capabilities(capabilities)
            .connect(&options.webdriver_url)
            .await
            .map_err(|e| BrowserError::Connect {
                url: options.webdriver_url.clone(),
                message: e.to_string(),
            })?;

        if let Some(page_load) = options.navigation_timeout {
            client
                .update_timeouts(TimeoutConfiguration::new(None, Some(page_load), None))
                .await
                .map_err(command)?;
        }

        Ok(Self {
            client,
            navigation_timeout: options.navigation_timeout,
        })
    }

    pub async fn close(self) -> Result<(), BrowserError> {
        self.client.close().await.map_err(command)
    }

    async fn find_in(
        &self,
        scope: Option<&Element>,
        locator: &Locator,
    ) -> Result<Vec<Element>, BrowserError> {
        let query = Query::from(locator);
        let found = match scope {
            Some(element) => element.find_all(query.as_locator()).await,
            None => self.client.find_all(query.as_locator()).await,
        };
        found.map_err(command)
    }
}

/// A locator lowered to what WebDriver understands. Role and scoped lookups
/// become XPath; plain CSS is passed through.
enum Query {
    Css(String),
    XPath(String),
}

impl Query {
    fn as_locator(&self) -> fantoccini::Locator<'_> {
        match self {
            Query::Css(selector) => fantoccini::Locator::Css(selector),
            Query::XPath(xpath) => fantoccini::Locator::XPath(xpath),
        }
    }
}

impl From<&Locator> for Query {
    fn from(locator: &Locator) -> Self {
        match locator {
            Locator::Css(selector) => Query::Css(selector.clone()),
            other => Query::XPath(to_xpath(other)),
        }
    }
}

#[async_trait]
impl Page for WebDriverPage {
    type Element = Element;

    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        debug!(url, "Navigating");
        self.client.goto(url).await.map_err(command)
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        let url = self.client.current_url().await.map_err(command)?;
        Ok(url.to_string())
    }

    async fn find_all(
        &self,
        scope: Option<&Element>,
        locator: &Locator,
    ) -> Result<Vec<Element>, BrowserError> {
        self.find_in(scope, locator).await
    }

    async fn attribute(&self, element: &Element, name: &str) -> Result<Option<String>, BrowserError> {
        element.attr(name).await.map_err(command)
    }

    async fn inner_text(&self, element: &Element) -> Result<String, BrowserError> {
        element.text().await.map_err(command)
    }

    async fn click(&self, element: &Element) -> Result<(), BrowserError> {
        element.click().await.map_err(command)
    }

    async fn fill(&self, element: &Element, value: &str) -> Result<(), BrowserError> {
        element.clear().await.map_err(command)?;
        element.send_keys(value).await.map_err(command)
    }

    async fn wait_for(&self, locator: &Locator) -> Result<(), BrowserError> {
        let limit = self.navigation_timeout.unwrap_or(DEFAULT_WAIT);
        let wait = self.client.wait().at_most(limit);
        let query = Query::from(locator);
        let found = wait.for_element(query.as_locator()).await;
        found.map(|_| ()).map_err(command)
    }

    async fn wait_for_load(&self) -> Result<(), BrowserError> {
        let started = Instant::now();
        loop {
            let state = self
                .client
                .execute("return document.readyState;", vec![])
                .await
                .map_err(command)?;
            if state.as_str() == Some("complete") {
                return Ok(());
            }
            if let Some(limit) = self.navigation_timeout {
                if started.elapsed() >= limit {
                    return Err(BrowserError::Timeout(limit.as_secs()));
                }
            }
            sleep(READY_POLL).await;
        }
    }

    async fn storage_state(&self) -> Result<StorageState, BrowserError> {
        let url = self.client.current_url().await.map_err(command)?;
        let cookies = self
            .client
            .get_all_cookies()
            .await
            .map_err(command)?
            .iter()
            .map(to_stored)
            .collect();
        let storage = self
            .client
            .execute("return Object.assign({}, window.localStorage);", vec![])
            .await
            .map_err(command)?;
        let local_storage = match storage {
            Value::Object(entries) => entries
                .into_iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k, v.to_string())))
                .collect(),
            _ => Default::default(),
        };
        Ok(StorageState {
            origin: url.origin().ascii_serialization(),
            cookies,
            local_storage,
        })
    }

    async fn restore_storage_state(&self, state: &StorageState) -> Result<(), BrowserError> {
        if !state.origin.is_empty() {
            self.goto(&state.origin).await?;
        }
        for stored in &state.cookies {
            self.client.add_cookie(to_cookie(stored)).await.map_err(command)?;
        }
        if !state.local_storage.is_empty() {
            self.client
                .execute(
                    "for (const [k, v] of Object.entries(arguments[0])) { window.localStorage.setItem(k, v); }",
                    vec![json!(state.local_storage)],
                )
                .await
                .map_err(command)?;
        }
        debug!(cookies = state.cookies.len(), "Restored saved browsing state");
        Ok(())
    }
}

fn to_stored(cookie: &Cookie<'_>) -> StoredCookie {
    StoredCookie {
        name: cookie.name().to_string(),
        value: cookie.value().to_string(),
        domain: cookie.domain().map(str::to_string),
        path: cookie.path().map(str::to_string),
        secure: cookie.secure().unwrap_or(false),
        http_only: cookie.http_only().unwrap_or(false),
    }
}

fn to_cookie(stored: &StoredCookie) -> Cookie<'static> {
    let mut cookie = Cookie::new(stored.name.clone(), stored.value.clone());
    if let Some(domain) = &stored.domain {
        cookie.set_domain(domain.clone());
    }
    if let Some(path) = &stored.path {
        cookie.set_path(path.clone());
    }
    cookie.set_secure(stored.secure);
    cookie.set_http_only(stored.http_only);
    cookie
}

fn xpath_literal(value: &str) -> String {
    if value.contains('\'') {
        format!("\"{}\"", value)
    } else {
        format!("'{}'", value)
    }
}

/// Relative XPath for an element of `role` whose accessible name contains `name`.
pub fn role_xpath(role: Role, name: &str) -> String {
    let name = xpath_literal(name);
    let named = format!(
        "contains(normalize-space(.), {n}) or contains(@aria-label, {n}) or contains(@title, {n})",
        n = name
    );
    match role {
        Role::Link => format!(".//a[@href][{named}] | .//*[@role='link'][{named}]"),
        Role::Button => format!(
            ".//button[{named}] | .//*[@role='button'][{named}] | .//input[@type='submit' or @type='button'][contains(@value, {name}) or contains(@aria-label, {name})]"
        ),
        Role::Radio => format!(
            ".//input[@type='radio'][contains(@aria-label, {name}) or @id = //label[contains(normalize-space(.), {name})]/@for] | .//label[contains(normalize-space(.), {name})]//input[@type='radio']"
        ),
    }
}

/// Single XPath expression for any locator; used where one expression is
/// required (explicit waits).
pub fn to_xpath(locator: &Locator) -> String {
    match locator {
        Locator::Css(selector) => css_to_xpath(selector),
        Locator::Role { role, name } => role_xpath(*role, name),
        Locator::Within { scope, inner } => {
            let scope = to_xpath(scope);
            let inner = to_xpath(inner);
            // Each inner branch becomes a step below every scope branch.
            let mut branches = Vec::new();
            for outer in scope.split(" | ") {
                for step in inner.split(" | ") {
                    branches.push(format!("{}/{}", outer, step.trim_start_matches("./")));
                }
            }
            branches.join(" | ")
        }
    }
}

/// Handles the simple selectors the bot uses: `tag`, `.class` chains,
/// `#id` and `[attr="value"]`.
fn css_to_xpath(selector: &str) -> String {
    let mut tag = "*".to_string();
    let mut predicates = Vec::new();
    let mut rest = selector.trim();

    let tag_len = rest
        .find(|c: char| c == '.' || c == '#' || c == '[')
        .unwrap_or(rest.len());
    if tag_len > 0 {
        tag = rest[..tag_len].to_string();
    }
    rest = &rest[tag_len..];

    while !rest.is_empty() {
        if let Some(stripped) = rest.strip_prefix('[') {
            let end = stripped.find(']').unwrap_or(stripped.len());
            let attr = &stripped[..end];
            match attr.split_once('=') {
                Some((key, value)) => {
                    let value = value.trim_matches(|c| c == '"' || c == '\'');
                    predicates.push(format!("@{}={}", key.trim(), xpath_literal(value)));
                }
                None => predicates.push(format!("@{}", attr.trim())),
            }
            rest = stripped.get(end + 1..).unwrap_or("");
        } else {
            let marker = rest.chars().next().unwrap_or('.');
            let body = &rest[1..];
            let end = body
                .find(|c: char| c == '.' || c == '#' || c == '[')
                .unwrap_or(body.len());
            let name = &body[..end];
            if marker == '#' {
                predicates.push(format!("@id={}", xpath_literal(name)));
            } else {
                predicates.push(format!(
                    "contains(concat(' ', normalize-space(@class), ' '), ' {} ')",
                    name
                ));
            }
            rest = &body[end..];
        }
    }

    let predicates: String = predicates.iter().map(|p| format!("[{}]", p)).collect();
    format!(".//{}{}", tag, predicates)
}
