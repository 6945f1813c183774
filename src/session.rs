//! Per-request browser session handle.
//!
//! Owns exactly one WebDriver session (one browser) and one active window at
//! a time. Created when a request enters the pipeline, torn down on every
//! exit path of that request; never held across requests.

use std::path::Path;
use std::time::Duration;

use fantoccini::{Client, ClientBuilder, elements::Element, key::Key, wd::WindowHandle};
use serde_json::json;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, ScrapeError};

const WINDOW_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct BrowserSession {
    client: Option<Client>,
}

impl BrowserSession {
    /// Connect to the WebDriver endpoint and start a fresh browser.
    pub async fn launch(config: &Config, endpoint: &str) -> Result<Self> {
        let caps = build_capabilities(config, endpoint);
        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(endpoint)
            .await?;
        debug!(endpoint, "browser session started");
        Ok(Self {
            client: Some(client),
        })
    }

    fn client(&self) -> Result<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| ScrapeError::Session("browser session already closed".to_string()))
    }

    pub async fn goto(&self, url: &str) -> Result<()> {
        self.client()?.goto(url).await?;
        Ok(())
    }

    pub async fn current_url(&self) -> Result<String> {
        Ok(self.client()?.current_url().await?.to_string())
    }

    pub async fn page_source(&self) -> Result<String> {
        Ok(self.client()?.source().await?)
    }

    /// Visible text of the page body. Falls back to empty on script faults so
    /// optional text heuristics never fail the pipeline.
    pub async fn body_text(&self) -> Result<String> {
        let value = self
            .client()?
            .execute("return document.body.innerText;", vec![])
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    pub async fn find_all(&self, selector: &str) -> Result<Vec<Element>> {
        Ok(self
            .client()?
            .find_all(fantoccini::Locator::Css(selector))
            .await?)
    }

    pub fn webdriver(&self) -> Result<&Client> {
        self.client()
    }

    /// Send the WebDriver Enter key to an element (keyboard submit).
    pub async fn press_enter(&self, element: &Element) -> Result<()> {
        let enter = char::from(Key::Enter).to_string();
        element.send_keys(&enter).await?;
        Ok(())
    }

    pub async fn scroll_into_view(&self, element: &Element) -> Result<()> {
        let arg = serde_json::to_value(element)
            .map_err(|e| ScrapeError::Session(format!("element serialization failed: {e}")))?;
        self.client()?
            .execute(
                "arguments[0].scrollIntoView({block: 'center'});",
                vec![arg],
            )
            .await?;
        Ok(())
    }

    pub async fn window_handles(&self) -> Result<Vec<WindowHandle>> {
        Ok(self.client()?.windows().await?)
    }

    /// Watch for a window not present in `before`, for at most `wait`. When
    /// one appears, the old active window is closed first and the new one
    /// becomes the session's active page; returns whether an adoption
    /// happened.
    pub async fn adopt_new_window(
        &mut self,
        before: &[WindowHandle],
        wait: Duration,
    ) -> Result<bool> {
        let deadline = Instant::now() + wait;
        loop {
            let handles = self.window_handles().await?;
            if let Some(new) = handles.iter().find(|&h| !before.contains(h)) {
                info!("detail view opened a new window, adopting it");
                let client = self.client()?;
                client.close_window().await?;
                client.switch_to_window(new.clone()).await?;
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(WINDOW_POLL_INTERVAL).await;
        }
    }

    /// Full-page screenshot written to `path`. Diagnostic only; failures are
    /// logged and swallowed.
    pub async fn screenshot_to(&self, path: &Path) {
        let result = async {
            let png = self.client()?.screenshot().await?;
            tokio::fs::write(path, png)
                .await
                .map_err(|e| ScrapeError::Session(format!("screenshot write failed: {e}")))?;
            Ok::<_, ScrapeError>(())
        }
        .await;

        match result {
            Ok(()) => debug!(path = %path.display(), "debug screenshot written"),
            Err(e) => warn!(path = %path.display(), "debug screenshot failed: {e}"),
        }
    }

    /// Tear the browser down. Closing an already-closed session is a no-op,
    /// so teardown may run on both the error path and the final cleanup.
    pub async fn close(&mut self) {
        if let Some(client) = self.client.take() {
            if let Err(e) = client.close().await {
                warn!("browser session close failed: {e}");
            } else {
                debug!("browser session closed");
            }
        }
    }
}

fn build_capabilities(config: &Config, endpoint: &str) -> serde_json::map::Map<String, serde_json::Value> {
    let is_firefox = endpoint.contains(":4444")
        || config
            .preferred_driver
            .as_ref()
            .is_some_and(|p| p.to_lowercase().contains("firefox") || p.to_lowercase().contains("gecko"));

    let mut caps = serde_json::Map::new();
    let user_agent_arg = format!("--user-agent={}", config.user_agent);

    if is_firefox {
        caps.insert("browserName".to_string(), json!("firefox"));
        let mut args = Vec::new();
        if config.headless {
            args.push("--headless".to_string());
        }
        caps.insert(
            "moz:firefoxOptions".to_string(),
            json!({ "args": args }),
        );
    } else {
        caps.insert("browserName".to_string(), json!("chrome"));
        let mut args = vec![
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-gpu".to_string(),
            user_agent_arg,
        ];
        if config.headless {
            args.insert(0, "--headless".to_string());
        }
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
    }

    caps.insert("acceptInsecureCerts".to_string(), json!(true));
    caps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn double_close_is_a_no_op() {
        let mut session = BrowserSession { client: None };
        session.close().await;
        session.close().await;
        assert!(session.client().is_err());
    }

    #[test]
    fn chrome_capabilities_carry_headless_and_user_agent() {
        let mut config = test_config();
        config.headless = true;
        let caps = build_capabilities(&config, "http://localhost:9515");
        let args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(args.iter().any(|a| a == "--headless"));
        assert!(
            args.iter()
                .any(|a| a.as_str().unwrap().starts_with("--user-agent="))
        );
    }

    #[test]
    fn firefox_endpoint_selects_gecko_capabilities() {
        let config = test_config();
        let caps = build_capabilities(&config, "http://localhost:4444");
        assert_eq!(caps["browserName"], "firefox");
        assert!(caps.contains_key("moz:firefoxOptions"));
    }

    fn test_config() -> Config {
        let mut config = Config::from_env();
        config.preferred_driver = None;
        config.user_agent = "test-agent".to_string();
        config
    }
}
