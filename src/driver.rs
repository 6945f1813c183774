//! WebDriver process management.
//!
//! Resolves the `auto` endpoint by finding a chromedriver/geckodriver
//! executable, starting it on its default port (or reusing one already
//! listening there), and polling the WebDriver `/status` endpoint until it
//! answers. The driver process is shared by all requests — isolation happens
//! at the WebDriver-session level — and is killed on shutdown.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::process::Child;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, ScrapeError};

const READINESS_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverType {
    Chrome,
    Firefox,
}

impl DriverType {
    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "chrome" | "chromium" => Some(DriverType::Chrome),
            "firefox" | "gecko" => Some(DriverType::Firefox),
            _ => None,
        }
    }

    pub fn executable_name(self) -> &'static str {
        match self {
            DriverType::Chrome => {
                if cfg!(windows) {
                    "chromedriver.exe"
                } else {
                    "chromedriver"
                }
            }
            DriverType::Firefox => {
                if cfg!(windows) {
                    "geckodriver.exe"
                } else {
                    "geckodriver"
                }
            }
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            DriverType::Chrome => 9515,
            DriverType::Firefox => 4444,
        }
    }

    pub fn browser_name(self) -> &'static str {
        match self {
            DriverType::Chrome => "Chrome",
            DriverType::Firefox => "Firefox",
        }
    }
}

#[derive(Clone)]
pub struct DriverManager {
    managed: Arc<Mutex<HashMap<DriverType, Child>>>,
}

impl DriverManager {
    pub fn new() -> Self {
        Self {
            managed: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Resolve the WebDriver endpoint for the current configuration. An
    /// explicit endpoint is used as-is; `auto` starts (or reuses) a local
    /// driver.
    pub async fn resolve_endpoint(&self, config: &Config) -> Result<String> {
        if config.webdriver_endpoint != "auto" {
            return Ok(config.webdriver_endpoint.clone());
        }
        if !config.auto_start_driver {
            return Err(ScrapeError::Session(
                "WEBDRIVER_ENDPOINT is 'auto' but auto-start is disabled".to_string(),
            ));
        }

        let driver_type = config
            .preferred_driver
            .as_deref()
            .and_then(DriverType::from_string)
            .unwrap_or(DriverType::Chrome);

        self.ensure_started(driver_type).await
    }

    /// Start the driver if nothing is answering on its port yet.
    pub async fn ensure_started(&self, driver_type: DriverType) -> Result<String> {
        let port = driver_type.default_port();
        let endpoint = format!("http://localhost:{port}");

        if is_service_ready(port).await {
            debug!(
                "{} already answering on port {port}",
                driver_type.browser_name()
            );
            return Ok(endpoint);
        }

        let driver_path = find_driver_executable(driver_type).ok_or_else(|| {
            ScrapeError::Session(format!(
                "{} executable not found in PATH\n{}",
                driver_type.executable_name(),
                Config::setup_guidance()
            ))
        })?;

        info!(
            "starting {} from {} on port {port}",
            driver_type.browser_name(),
            driver_path.display()
        );
        self.spawn(driver_type, &driver_path, port)?;
        self.wait_for_service_ready(port).await?;

        Ok(endpoint)
    }

    fn spawn(&self, driver_type: DriverType, path: &Path, port: u16) -> Result<()> {
        let mut command = tokio::process::Command::new(path);
        match driver_type {
            DriverType::Chrome => {
                command
                    .arg(format!("--port={port}"))
                    .arg("--whitelisted-ips=127.0.0.1");
            }
            DriverType::Firefox => {
                command
                    .arg("--port")
                    .arg(port.to_string())
                    .arg("--host")
                    .arg("127.0.0.1");
            }
        }

        let child = command
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ScrapeError::Session(format!(
                    "Failed to start {}: {e}",
                    driver_type.browser_name()
                ))
            })?;

        self.managed.lock().unwrap().insert(driver_type, child);
        Ok(())
    }

    async fn wait_for_service_ready(&self, port: u16) -> Result<()> {
        let start = std::time::Instant::now();
        while start.elapsed() < READINESS_TIMEOUT {
            if is_service_ready(port).await {
                info!("WebDriver service ready on port {port}");
                return Ok(());
            }
            debug!("waiting for WebDriver service on port {port}");
            sleep(Duration::from_millis(250)).await;
        }
        Err(ScrapeError::Session(format!(
            "WebDriver service on port {port} did not become ready within {READINESS_TIMEOUT:?}"
        )))
    }

    /// Kill every driver this process started. Safe to call more than once.
    pub async fn stop_all(&self) {
        let drained: Vec<(DriverType, Child)> = {
            let mut managed = self.managed.lock().unwrap();
            managed.drain().collect()
        };

        for (driver_type, mut child) in drained {
            match child.kill().await {
                Ok(()) => info!("stopped managed {}", driver_type.browser_name()),
                Err(e) => warn!(
                    "failed to stop managed {}: {e}",
                    driver_type.browser_name()
                ),
            }
        }
    }
}

impl Default for DriverManager {
    fn default() -> Self {
        Self::new()
    }
}

async fn is_service_ready(port: u16) -> bool {
    let endpoint = format!("http://localhost:{port}/status");
    match reqwest::Client::new()
        .get(&endpoint)
        .timeout(Duration::from_secs(2))
        .send()
        .await
    {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}

fn find_driver_executable(driver_type: DriverType) -> Option<PathBuf> {
    let exe_name = driver_type.executable_name();

    if let Ok(path_var) = std::env::var("PATH") {
        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(exe_name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }

    let fallbacks: &[&str] = if cfg!(target_os = "macos") {
        &["/usr/local/bin", "/opt/homebrew/bin"]
    } else if cfg!(windows) {
        &["C:\\WebDrivers"]
    } else {
        &["/usr/bin", "/usr/local/bin", "/snap/bin"]
    };

    fallbacks
        .iter()
        .map(|dir| PathBuf::from(dir).join(exe_name))
        .find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_type_parsing() {
        assert_eq!(DriverType::from_string("chrome"), Some(DriverType::Chrome));
        assert_eq!(DriverType::from_string("Gecko"), Some(DriverType::Firefox));
        assert_eq!(DriverType::from_string("safari"), None);
    }

    #[test]
    fn default_ports_match_convention() {
        assert_eq!(DriverType::Chrome.default_port(), 9515);
        assert_eq!(DriverType::Firefox.default_port(), 4444);
    }

    #[tokio::test]
    async fn stop_all_with_nothing_managed_is_a_no_op() {
        let manager = DriverManager::new();
        manager.stop_all().await;
        manager.stop_all().await;
    }
}
