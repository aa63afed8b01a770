use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::clients::webdriver::WebDriverPage;
use crate::clients::webhook::{LogSink, NotificationSink, WebhookSink};
use crate::config::Settings;
use crate::error::AppError;
use crate::tasks::attendance_run::{RunSummary, local_now, run_once};

/// Connects to WebDriver, performs one pass and always closes the browser.
pub async fn run(settings: Settings, dry_run: bool) -> Result<RunSummary, AppError> {
    let run_id = Uuid::new_v4();
    async move {
        let sink: Box<dyn NotificationSink> = match (&settings.webhook_url, dry_run) {
            (Some(url), false) => Box::new(WebhookSink::new(url.clone(), settings.webhook_timeout)?),
            (None, false) => {
                warn!("SLACK_WEBHOOK_URL is not set, notifications will only be logged");
                Box::new(LogSink)
            }
            (_, true) => Box::new(LogSink),
        };

        let page = WebDriverPage::connect(&settings.browser_options()).await?;
        info!(policy = ?settings.policy, "Browser session started");

        let result = run_once(&page, sink.as_ref(), &settings, local_now(settings.timezone)).await;

        if let Err(e) = page.close().await {
            warn!(error = %e, "Failed to close browser session");
        }
        result
    }
    .instrument(info_span!("run", id = %run_id))
    .await
}
