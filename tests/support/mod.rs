#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::env;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use attendanceBot::clients::browser::{Locator, Page, Role};
use attendanceBot::clients::webhook::NotificationSink;
use attendanceBot::config::Settings;
use attendanceBot::error::{AppError, BrowserError};
use attendanceBot::models::event::NotificationPayload;
use attendanceBot::models::session::{StorageState, StoredCookie};
use uuid::Uuid;

pub const LOGIN_URL: &str = "https://lms.example/login/index.php";
pub const CALENDAR_URL: &str = "https://lms.example/calendar/view.php?view=day";
pub const DASHBOARD_URL: &str = "https://lms.example/my/";
pub const ENTRY: &str = "[data-event-eventtype=\"attendance\"]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeAction {
    Nothing,
    SubmitLogin,
    Navigate(String),
    FailClick,
}

#[derive(Debug, Clone)]
pub struct FakeNode {
    pub text: String,
    pub attrs: HashMap<String, String>,
    pub action: NodeAction,
}

impl FakeNode {
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            attrs: HashMap::new(),
            action: NodeAction::Nothing,
        }
    }

    pub fn link(href: &str) -> Self {
        let mut node = Self::text("");
        node.attrs.insert("href".to_string(), href.to_string());
        node
    }

    pub fn with_action(mut self, action: NodeAction) -> Self {
        self.action = action;
        self
    }
}

#[derive(Default)]
struct SiteState {
    current_url: String,
    logged_in: bool,
    accept_saved_session: bool,
    accept_login: bool,
    nodes: Vec<FakeNode>,
    index: HashMap<(String, Option<usize>, Locator), Vec<usize>>,
    hanging_urls: HashSet<String>,
    slow_urls: HashMap<String, Duration>,
    failing_gotos: HashSet<String>,
    failing_locators: HashSet<Locator>,
    unreadable_text: HashSet<usize>,
    unreadable_attributes: HashSet<usize>,
    fail_wait: bool,
    fail_restore: bool,
    gotos: Vec<String>,
    clicks: Vec<usize>,
    fills: Vec<(usize, String)>,
    credential_submissions: usize,
    restores: usize,
}

/// A scripted LMS: login form, calendar entries and activity pages keyed by URL.
pub struct FakeLms {
    state: Mutex<SiteState>,
}

impl FakeLms {
    pub fn new() -> Self {
        let lms = Self {
            state: Mutex::new(SiteState {
                accept_saved_session: true,
                accept_login: true,
                ..Default::default()
            }),
        };
        lms.add(LOGIN_URL, None, Locator::css("#username"), FakeNode::text(""));
        lms.add(LOGIN_URL, None, Locator::css("#password"), FakeNode::text(""));
        lms.add(
            LOGIN_URL,
            None,
            Locator::css("button[type=\"submit\"]"),
            FakeNode::text("ログイン").with_action(NodeAction::SubmitLogin),
        );
        lms
    }

    pub fn add(&self, url: &str, scope: Option<usize>, locator: Locator, node: FakeNode) -> usize {
        let mut state = self.state.lock().unwrap();
        let id = state.nodes.len();
        state.nodes.push(node);
        state
            .index
            .entry((url.to_string(), scope, locator))
            .or_default()
            .push(id);
        id
    }

    /// A calendar entry whose activity link is found by accessible name.
    pub fn add_entry(&self, text: &str, activity_url: Option<&str>) -> usize {
        let entry = self.add(CALENDAR_URL, None, Locator::css(ENTRY), FakeNode::text(text));
        if let Some(url) = activity_url {
            self.add(
                CALENDAR_URL,
                Some(entry),
                Locator::role(Role::Link, "活動に移動する"),
                FakeNode::link(url),
            );
        }
        entry
    }

    /// A calendar entry that only has the decorative `a.card-link`.
    pub fn add_entry_with_card_link(&self, text: &str, activity_url: &str) -> usize {
        let entry = self.add(CALENDAR_URL, None, Locator::css(ENTRY), FakeNode::text(text));
        self.add(CALENDAR_URL, Some(entry), Locator::css("a.card-link"), FakeNode::link(activity_url));
        entry
    }

    /// Page-wide "submit attendance" link on an activity page that opens `form_url`.
    pub fn add_submit_link(&self, activity_url: &str, href: &str, form_url: &str) -> usize {
        self.add(
            activity_url,
            None,
            Locator::role(Role::Link, "出欠を送信する"),
            FakeNode::link(href).with_action(NodeAction::Navigate(form_url.to_string())),
        )
    }

    /// The same link, only reachable inside the status column cell.
    pub fn add_status_cell_submit_link(&self, activity_url: &str, href: &str, form_url: &str) -> usize {
        self.add(
            activity_url,
            None,
            Locator::within(
                Locator::css(".statuscol.cell.c2"),
                Locator::role(Role::Link, "出欠を送信する"),
            ),
            FakeNode::link(href).with_action(NodeAction::Navigate(form_url.to_string())),
        )
    }

    pub fn add_present_control(&self, form_url: &str) -> usize {
        self.add(form_url, None, Locator::role(Role::Radio, "出席"), FakeNode::text("出席"))
    }

    pub fn set_logged_in(&self, logged_in: bool) {
        self.state.lock().unwrap().logged_in = logged_in;
    }

    pub fn set_accept_saved_session(&self, accept: bool) {
        self.state.lock().unwrap().accept_saved_session = accept;
    }

    pub fn set_accept_login(&self, accept: bool) {
        self.state.lock().unwrap().accept_login = accept;
    }

    pub fn hang_on(&self, url: &str) {
        self.state.lock().unwrap().hanging_urls.insert(url.to_string());
    }

    /// Navigation to `url` takes `delay` before it lands.
    pub fn slow_on(&self, url: &str, delay: Duration) {
        self.state.lock().unwrap().slow_urls.insert(url.to_string(), delay);
    }

    /// Navigation to `url` errors and leaves the current page unchanged.
    pub fn fail_goto(&self, url: &str) {
        self.state.lock().unwrap().failing_gotos.insert(url.to_string());
    }

    /// Every query with `locator` errors, on any page and in any scope.
    pub fn fail_lookup(&self, locator: Locator) {
        self.state.lock().unwrap().failing_locators.insert(locator);
    }

    pub fn fail_text(&self, node: usize) {
        self.state.lock().unwrap().unreadable_text.insert(node);
    }

    pub fn fail_attributes(&self, node: usize) {
        self.state.lock().unwrap().unreadable_attributes.insert(node);
    }

    pub fn fail_wait(&self) {
        self.state.lock().unwrap().fail_wait = true;
    }

    pub fn fail_restore(&self) {
        self.state.lock().unwrap().fail_restore = true;
    }

    pub fn gotos(&self) -> Vec<String> {
        self.state.lock().unwrap().gotos.clone()
    }

    pub fn clicks(&self) -> Vec<usize> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn fills(&self) -> Vec<(usize, String)> {
        self.state.lock().unwrap().fills.clone()
    }

    pub fn credential_submissions(&self) -> usize {
        self.state.lock().unwrap().credential_submissions
    }

    pub fn restores(&self) -> usize {
        self.state.lock().unwrap().restores
    }

    pub fn current(&self) -> String {
        self.state.lock().unwrap().current_url.clone()
    }
}

#[async_trait]
impl Page for FakeLms {
    type Element = usize;

    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        let (hangs, delay) = {
            let mut state = self.state.lock().unwrap();
            state.gotos.push(url.to_string());
            (state.hanging_urls.contains(url), state.slow_urls.get(url).copied())
        };
        if hangs {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        if state.failing_gotos.contains(url) {
            return Err(BrowserError::Command(format!("navigation to {} failed", url)));
        }
        state.current_url = if url == CALENDAR_URL && !state.logged_in {
            LOGIN_URL.to_string()
        } else {
            url.to_string()
        };
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.current())
    }

    async fn find_all(&self, scope: Option<&usize>, locator: &Locator) -> Result<Vec<usize>, BrowserError> {
        let state = self.state.lock().unwrap();
        if state.failing_locators.contains(locator) {
            return Err(BrowserError::Command("invalid selector".to_string()));
        }
        let key = (state.current_url.clone(), scope.copied(), locator.clone());
        Ok(state.index.get(&key).cloned().unwrap_or_default())
    }

    async fn attribute(&self, element: &usize, name: &str) -> Result<Option<String>, BrowserError> {
        let state = self.state.lock().unwrap();
        if state.unreadable_attributes.contains(element) {
            return Err(BrowserError::Command("stale element reference".to_string()));
        }
        Ok(state.nodes[*element].attrs.get(name).cloned())
    }

    async fn inner_text(&self, element: &usize) -> Result<String, BrowserError> {
        let state = self.state.lock().unwrap();
        if state.unreadable_text.contains(element) {
            return Err(BrowserError::Command("stale element reference".to_string()));
        }
        Ok(state.nodes[*element].text.clone())
    }

    async fn click(&self, element: &usize) -> Result<(), BrowserError> {
        let mut state = self.state.lock().unwrap();
        state.clicks.push(*element);
        match state.nodes[*element].action.clone() {
            NodeAction::Nothing => {}
            NodeAction::SubmitLogin => {
                state.credential_submissions += 1;
                state.logged_in = state.accept_login;
                state.current_url = if state.logged_in {
                    DASHBOARD_URL.to_string()
                } else {
                    LOGIN_URL.to_string()
                };
            }
            NodeAction::Navigate(url) => state.current_url = url,
            NodeAction::FailClick => {
                return Err(BrowserError::Command("element not interactable".to_string()));
            }
        }
        Ok(())
    }

    async fn fill(&self, element: &usize, value: &str) -> Result<(), BrowserError> {
        self.state.lock().unwrap().fills.push((*element, value.to_string()));
        Ok(())
    }

    async fn wait_for(&self, _locator: &Locator) -> Result<(), BrowserError> {
        if self.state.lock().unwrap().fail_wait {
            return Err(BrowserError::Timeout(30));
        }
        Ok(())
    }

    async fn wait_for_load(&self) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn storage_state(&self) -> Result<StorageState, BrowserError> {
        Ok(StorageState {
            origin: "https://lms.example".to_string(),
            cookies: vec![StoredCookie {
                name: "MoodleSession".to_string(),
                value: "fresh".to_string(),
                domain: Some("lms.example".to_string()),
                path: Some("/".to_string()),
                secure: true,
                http_only: true,
            }],
            local_storage: Default::default(),
        })
    }

    async fn restore_storage_state(&self, state: &StorageState) -> Result<(), BrowserError> {
        let mut site = self.state.lock().unwrap();
        site.restores += 1;
        if site.fail_restore {
            return Err(BrowserError::Command("unable to set cookie".to_string()));
        }
        if site.accept_saved_session && !state.cookies.is_empty() {
            site.logged_in = true;
        }
        Ok(())
    }
}

pub struct CapturingSink {
    pub sent: tokio::sync::Mutex<Vec<NotificationPayload>>,
    pub fail_titles: Vec<String>,
}

impl CapturingSink {
    pub fn new() -> Self {
        Self {
            sent: tokio::sync::Mutex::new(Vec::new()),
            fail_titles: Vec::new(),
        }
    }

    pub fn failing_for(titles: &[&str]) -> Self {
        Self {
            sent: tokio::sync::Mutex::new(Vec::new()),
            fail_titles: titles.iter().map(|t| t.to_string()).collect(),
        }
    }
}

#[async_trait]
impl NotificationSink for CapturingSink {
    async fn deliver(&self, payload: &NotificationPayload) -> Result<(), AppError> {
        if self.fail_titles.contains(&payload.title) {
            return Err(AppError::Notification("webhook responded 500".to_string()));
        }
        self.sent.lock().await.push(payload.clone());
        Ok(())
    }
}

pub fn temp_session_path() -> PathBuf {
    env::temp_dir()
        .join(format!("attendancebot_it_{}", Uuid::new_v4()))
        .join("session.json")
}

/// Settings pointing at the fake LMS, plus any overrides.
pub fn settings(session_file: &PathBuf, overrides: &[(&str, &str)]) -> Settings {
    let mut values: HashMap<String, String> = HashMap::new();
    values.insert("LMS_USER".into(), "TK000000".into());
    values.insert("LMS_PASS".into(), "pw".into());
    values.insert("LMS_LOGIN_URL".into(), LOGIN_URL.into());
    values.insert("LMS_CALENDAR_URL".into(), CALENDAR_URL.into());
    values.insert("SESSION_FILE".into(), session_file.display().to_string());
    for (k, v) in overrides {
        values.insert(k.to_string(), v.to_string());
    }
    Settings::resolve(|key| values.get(key).cloned()).expect("test settings are valid")
}

pub fn saved_session() -> StorageState {
    StorageState {
        origin: "https://lms.example".to_string(),
        cookies: vec![StoredCookie {
            name: "MoodleSession".to_string(),
            value: "saved".to_string(),
            domain: Some("lms.example".to_string()),
            path: Some("/".to_string()),
            secure: true,
            http_only: true,
        }],
        local_storage: Default::default(),
    }
}
