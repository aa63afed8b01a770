use tracing::{info, warn};

use crate::clients::browser::{Locator, Page};
use crate::config::Credentials;
use crate::error::AppError;
use crate::models::session::SessionStore;
use crate::service::lookup::{LOGIN_PASSWORD, LOGIN_SUBMIT, LOGIN_USERNAME};

/// How the authenticated context was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The saved session was still accepted; no credentials were submitted.
    ReusedSession,
    /// Credentials were submitted and a new session artifact was written.
    FreshLogin,
}

pub struct SessionManager {
    credentials: Credentials,
    store: SessionStore,
    login_url: String,
    target_url: String,
}

/// The LMS bounces unauthenticated requests to a URL containing `login`.
pub fn is_login_redirect(url: &str) -> bool {
    url.contains("login")
}

impl SessionManager {
    pub fn new(credentials: Credentials, store: SessionStore, login_url: String, target_url: String) -> Self {
        Self {
            credentials,
            store,
            login_url,
            target_url,
        }
    }

    /// Leaves `page` on the target resource with an authenticated context.
    pub async fn ensure_authenticated<P: Page + ?Sized>(&self, page: &P) -> Result<AuthOutcome, AppError> {
        match self.store.load() {
            Some(state) => {
                info!(path = %self.store.path().display(), "Using saved session");
                if let Err(e) = page.restore_storage_state(&state).await {
                    warn!(error = %e, "Unable to restore saved session, continuing without it");
                }
            }
            None => info!("No saved session found"),
        }

        info!(url = %self.target_url, "Accessing calendar directly");
        page.goto(&self.target_url).await?;
        if !is_login_redirect(&page.current_url().await?) {
            info!("Session is still valid");
            return Ok(AuthOutcome::ReusedSession);
        }

        info!("Session expired or invalid, logging in");
        self.login(page).await?;
        page.goto(&self.target_url).await?;
        let landed = page.current_url().await?;
        if is_login_redirect(&landed) {
            return Err(AppError::Authentication(format!(
                "still redirected to login after signing in ({})",
                landed
            )));
        }
        Ok(AuthOutcome::FreshLogin)
    }

    async fn login<P: Page + ?Sized>(&self, page: &P) -> Result<(), AppError> {
        page.goto(&self.login_url).await?;

        let username = first(page, LOGIN_USERNAME).await?;
        page.fill(&username, &self.credentials.username).await?;
        let password = first(page, LOGIN_PASSWORD).await?;
        page.fill(&password, &self.credentials.password).await?;
        let submit = first(page, LOGIN_SUBMIT).await?;
        page.click(&submit).await?;
        page.wait_for_load().await?;

        let settled = page.current_url().await?;
        if settled.starts_with(&self.login_url) {
            return Err(AppError::Authentication(
                "login form was rejected".to_string(),
            ));
        }

        let state = page.storage_state().await?;
        self.store.save(&state)?;
        info!(path = %self.store.path().display(), "New session saved");
        Ok(())
    }
}

async fn first<P: Page + ?Sized>(page: &P, selector: &str) -> Result<P::Element, AppError> {
    page.find_all(None, &Locator::css(selector))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Authentication(format!("login form field {} not found", selector)))
}
