use std::env;
use std::time::Duration;

use url::Url;

const DEFAULT_QC_URL: &str = "https://bayi.mobilfon.com/mobilfon_framework/admin/qc_list";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Clone)]
pub struct Config {
    pub webdriver_endpoint: String,
    pub auto_start_driver: bool,
    pub preferred_driver: Option<String>,
    pub headless: bool,

    /// Fixed target-list URL on the dealer portal. The login form is reached
    /// by navigating here unauthenticated.
    pub qc_list_url: String,
    pub portal_email: Option<String>,
    pub portal_password: Option<String>,
    pub user_agent: String,

    /// Per-candidate wait for form-field selectors.
    pub field_timeout: Duration,
    /// Per-candidate wait for submit-control selectors.
    pub submit_timeout: Duration,
    /// Per-candidate wait for content-button selectors.
    pub button_timeout: Duration,
    pub login_settle: Duration,
    pub page_settle: Duration,
    /// Settle after submitting the search. The portal renders results
    /// asynchronously with no reliable completion signal.
    pub search_settle: Duration,
    pub detail_settle: Duration,
    /// Bounded wait for a new window after clicking the detail button.
    pub new_window_wait: Duration,
    /// Whole-request deadline; teardown fires when it elapses.
    pub request_deadline: Duration,

    pub max_degraded_parts: usize,
    pub debug_screenshots: bool,
}

fn env_ms(key: &str, default_ms: u64) -> Duration {
    Duration::from_millis(
        env::var(key)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default_ms),
    )
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| v.to_lowercase() == "true" || v == "1")
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            webdriver_endpoint: env::var("WEBDRIVER_ENDPOINT")
                .unwrap_or_else(|_| "auto".to_string()),
            auto_start_driver: env_bool("WEBDRIVER_AUTO_START", true),
            preferred_driver: env::var("WEBDRIVER_PREFERRED_DRIVER").ok(),
            headless: env_bool("WEBDRIVER_HEADLESS", true),

            qc_list_url: env::var("MOBILFON_QC_URL").unwrap_or_else(|_| DEFAULT_QC_URL.to_string()),
            portal_email: env::var("MOBILFON_EMAIL").ok(),
            portal_password: env::var("MOBILFON_PASSWORD").ok(),
            user_agent: env::var("SCRAPER_USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),

            field_timeout: env_ms("SCRAPER_FIELD_TIMEOUT_MS", 3_000),
            submit_timeout: env_ms("SCRAPER_SUBMIT_TIMEOUT_MS", 2_000),
            button_timeout: env_ms("SCRAPER_BUTTON_TIMEOUT_MS", 10_000),
            login_settle: env_ms("SCRAPER_LOGIN_SETTLE_MS", 3_000),
            page_settle: env_ms("SCRAPER_PAGE_SETTLE_MS", 2_000),
            search_settle: env_ms("SCRAPER_SEARCH_SETTLE_MS", 30_000),
            detail_settle: env_ms("SCRAPER_DETAIL_SETTLE_MS", 5_000),
            new_window_wait: env_ms("SCRAPER_NEW_WINDOW_WAIT_MS", 5_000),
            request_deadline: env_ms("SCRAPER_REQUEST_DEADLINE_MS", 120_000),

            max_degraded_parts: env::var("SCRAPER_MAX_DEGRADED_PARTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            debug_screenshots: env_bool("SCRAPER_DEBUG_SCREENSHOTS", false),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.webdriver_endpoint != "auto"
            && !self.webdriver_endpoint.starts_with("http://")
            && !self.webdriver_endpoint.starts_with("https://")
        {
            return Err(format!(
                "Invalid WebDriver endpoint '{}'. Must be 'auto' or start with http:// or https://",
                self.webdriver_endpoint
            ));
        }

        if Url::parse(&self.qc_list_url).is_err() {
            return Err(format!("Invalid MOBILFON_QC_URL '{}'", self.qc_list_url));
        }

        // Credentials must come from configuration; there is no baked-in
        // fallback. Fail at startup rather than at the first request.
        if self.portal_email.as_deref().unwrap_or("").is_empty() {
            return Err("MOBILFON_EMAIL is not set".to_string());
        }
        if self.portal_password.as_deref().unwrap_or("").is_empty() {
            return Err("MOBILFON_PASSWORD is not set".to_string());
        }

        if self.request_deadline.is_zero() {
            return Err("SCRAPER_REQUEST_DEADLINE_MS must be greater than 0".to_string());
        }
        if self.max_degraded_parts == 0 {
            return Err("SCRAPER_MAX_DEGRADED_PARTS must be greater than 0".to_string());
        }

        Ok(())
    }

    pub fn setup_guidance() -> &'static str {
        r#"
Mobilfon Scraper Setup:

1. Install a WebDriver (choose one):

   ChromeDriver:
   - macOS: brew install chromedriver
   - Ubuntu: sudo apt-get install chromium-chromedriver
   - Manual: https://chromedriver.chromium.org/

   GeckoDriver (Firefox):
   - macOS: brew install geckodriver
   - Ubuntu: sudo apt-get install firefox-geckodriver
   - Manual: https://github.com/mozilla/geckodriver/releases

2. Required environment variables:
   - MOBILFON_EMAIL: dealer portal login email
   - MOBILFON_PASSWORD: dealer portal login password

3. Optional environment variables:
   - MOBILFON_QC_URL: portal QC-list URL override
   - WEBDRIVER_ENDPOINT: 'auto' (default) or a specific URL
   - WEBDRIVER_AUTO_START: true (default) or false
   - WEBDRIVER_PREFERRED_DRIVER: chrome or firefox
   - WEBDRIVER_HEADLESS: true (default) or false for GUI mode
   - SCRAPER_SEARCH_SETTLE_MS: wait after submitting the search (default 30000)
   - SCRAPER_REQUEST_DEADLINE_MS: whole-request deadline (default 120000)
   - SCRAPER_DEBUG_SCREENSHOTS: true to write debug PNGs per request

4. Manual driver setup (if auto-start disabled):
   - Chrome: chromedriver --port=9515
   - Firefox: geckodriver --port=4444
   - Set WEBDRIVER_ENDPOINT to the appropriate URL
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            webdriver_endpoint: "auto".into(),
            auto_start_driver: true,
            preferred_driver: None,
            headless: true,
            qc_list_url: DEFAULT_QC_URL.into(),
            portal_email: Some("dealer@example.com".into()),
            portal_password: Some("secret".into()),
            user_agent: DEFAULT_USER_AGENT.into(),
            field_timeout: Duration::from_secs(3),
            submit_timeout: Duration::from_secs(2),
            button_timeout: Duration::from_secs(10),
            login_settle: Duration::from_secs(3),
            page_settle: Duration::from_secs(2),
            search_settle: Duration::from_secs(30),
            detail_settle: Duration::from_secs(5),
            new_window_wait: Duration::from_secs(5),
            request_deadline: Duration::from_secs(120),
            max_degraded_parts: 10,
            debug_screenshots: false,
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn missing_credentials_fail_closed() {
        let mut config = valid_config();
        config.portal_email = None;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.portal_password = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_endpoint_rejected() {
        let mut config = valid_config();
        config.webdriver_endpoint = "localhost:9515".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_qc_url_rejected() {
        let mut config = valid_config();
        config.qc_list_url = "not a url".into();
        assert!(config.validate().is_err());
    }
}
