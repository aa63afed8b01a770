use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;

use crate::clients::webdriver::BrowserOptions;
use crate::error::AppError;
use crate::service::notification_decider::EligibilityPolicy;

const DEFAULT_LOGIN_URL: &str = "https://lms-tokyo.iput.ac.jp/login/index.php";
const DEFAULT_CALENDAR_URL: &str = "https://lms-tokyo.iput.ac.jp/calendar/view.php?view=day";
const DEFAULT_SESSION_FILE: &str = "session.json";
const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";
const DEFAULT_TIMEZONE: &str = "Asia/Tokyo";
const DEFAULT_POLICY: &str = "state";
const DEFAULT_LEAD_MINUTES: i64 = 5;
const DEFAULT_NAVIGATION_TIMEOUT_SECS: u64 = 120;
const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 30;
/// An event visit loads the activity page, possibly the form, then the calendar.
const EVENT_NAVIGATIONS: u32 = 3;

/// `KEY=value` pairs read from an env-style file.
#[derive(Debug, Default, Clone)]
pub struct AppConfig {
    values: HashMap<String, String>,
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self, AppError> {
        let content = fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("Unable to read {}: {}", path, e)))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, AppError> {
        let mut values = HashMap::new();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(AppError::config(format!("Invalid config line {}: {}", idx + 1, line)));
            };
            let key = key.trim();
            let mut value = value.trim().to_string();
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = value[1..value.len() - 1].to_string();
            }
            values.insert(key.to_string(), value);
        }
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Both values must be present and non-blank.
    pub fn new(username: Option<String>, password: Option<String>) -> Result<Self, AppError> {
        let username = username.filter(|v| !v.trim().is_empty());
        let password = password.filter(|v| !v.is_empty());
        match (username, password) {
            (Some(username), Some(password)) => Ok(Self { username, password }),
            _ => Err(AppError::config("LMS_USER and LMS_PASS must be set")),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything a run needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub credentials: Credentials,
    /// `None` means notifications are only logged.
    pub webhook_url: Option<String>,
    pub webhook_timeout: Duration,
    pub login_url: String,
    pub calendar_url: String,
    pub session_file: PathBuf,
    pub webdriver_url: String,
    pub headless: bool,
    pub policy: EligibilityPolicy,
    pub timezone: Tz,
    /// `None` leaves navigation unbounded.
    pub navigation_timeout: Option<Duration>,
    /// Bound on resolving one event. `None` when navigation is unbounded.
    pub event_timeout: Option<Duration>,
    pub submit_attendance: bool,
}

impl Settings {
    pub fn resolve<F>(get_prop: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials = Credentials::new(get_prop("LMS_USER"), get_prop("LMS_PASS"))?;
        let or_default =
            |key: &str, default: &str| get_prop(key).filter(|v| !v.is_empty()).unwrap_or(default.to_string());

        let lead_minutes = match get_prop("LEAD_MINUTES").filter(|v| !v.is_empty()) {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| AppError::config(format!("LEAD_MINUTES must be a number, got {}", raw)))?,
            None => DEFAULT_LEAD_MINUTES,
        };
        let policy = EligibilityPolicy::parse(&or_default("ELIGIBILITY_POLICY", DEFAULT_POLICY), lead_minutes)?;

        let timezone_name = or_default("TIMEZONE", DEFAULT_TIMEZONE);
        let timezone = timezone_name
            .parse::<Tz>()
            .map_err(|_| AppError::config(format!("Unknown TIMEZONE {}", timezone_name)))?;

        let timeout_secs = parse_secs(
            "NAVIGATION_TIMEOUT_SECS",
            get_prop("NAVIGATION_TIMEOUT_SECS"),
            DEFAULT_NAVIGATION_TIMEOUT_SECS,
        )?;
        let navigation_timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));
        let event_timeout = match get_prop("EVENT_TIMEOUT_SECS").filter(|v| !v.is_empty()) {
            Some(raw) => {
                let secs = parse_secs("EVENT_TIMEOUT_SECS", Some(raw), 0)?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => navigation_timeout.and_then(|t| t.checked_mul(EVENT_NAVIGATIONS)),
        };
        let webhook_secs = parse_secs(
            "WEBHOOK_TIMEOUT_SECS",
            get_prop("WEBHOOK_TIMEOUT_SECS"),
            DEFAULT_WEBHOOK_TIMEOUT_SECS,
        )?;
        if webhook_secs == 0 {
            return Err(AppError::config("WEBHOOK_TIMEOUT_SECS must be at least 1"));
        }

        Ok(Self {
            credentials,
            webhook_url: get_prop("SLACK_WEBHOOK_URL").filter(|v| !v.is_empty()),
            webhook_timeout: Duration::from_secs(webhook_secs),
            login_url: or_default("LMS_LOGIN_URL", DEFAULT_LOGIN_URL),
            calendar_url: or_default("LMS_CALENDAR_URL", DEFAULT_CALENDAR_URL),
            session_file: PathBuf::from(or_default("SESSION_FILE", DEFAULT_SESSION_FILE)),
            webdriver_url: or_default("WEBDRIVER_URL", DEFAULT_WEBDRIVER_URL),
            headless: parse_bool("HEADLESS", get_prop("HEADLESS"), true)?,
            policy,
            timezone,
            navigation_timeout,
            event_timeout,
            submit_attendance: parse_bool("SUBMIT_ATTENDANCE", get_prop("SUBMIT_ATTENDANCE"), true)?,
        })
    }

    pub fn browser_options(&self) -> BrowserOptions {
        BrowserOptions {
            webdriver_url: self.webdriver_url.clone(),
            headless: self.headless,
            navigation_timeout: self.navigation_timeout,
        }
    }
}

fn parse_secs(key: &str, raw: Option<String>, default: u64) -> Result<u64, AppError> {
    match raw.filter(|v| !v.is_empty()) {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| AppError::config(format!("{} must be a number, got {}", key, raw))),
        None => Ok(default),
    }
}

fn parse_bool(key: &str, raw: Option<String>, default: bool) -> Result<bool, AppError> {
    let Some(raw) = raw.filter(|v| !v.is_empty()) else {
        return Ok(default);
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::config(format!("{} must be true or false, got {}", key, raw))),
    }
}
