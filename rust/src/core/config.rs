use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::api::DEFAULT_API_BASE_URL;

pub(crate) const CONFIG_FILE_NAME: &str = "umee_config.json";
pub(crate) const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
pub(crate) const DEFAULT_SCROLL_SETTLE_MS: u64 = 100;
// Keeps a typo in the config from turning polling into a busy loop.
const MIN_POLL_INTERVAL_MS: u64 = 50;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub(crate) api_base_url: Option<String>,
    pub(crate) poll_interval_ms: Option<u64>,
    pub(crate) scroll_settle_ms: Option<u64>,
    /// `tracing` filter directives, e.g. `umee_core=trace,info`.
    pub(crate) log_filter: Option<String>,
}

pub(crate) fn load_app_config(data_dir: &str) -> AppConfig {
    let path = Path::new(data_dir).join(CONFIG_FILE_NAME);
    let Ok(bytes) = std::fs::read(&path) else {
        return AppConfig::default();
    };
    match serde_json::from_slice::<AppConfig>(&bytes) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(%e, path = %path.display(), "ignoring malformed config");
            AppConfig::default()
        }
    }
}

pub(crate) fn default_app_config_json() -> String {
    serde_json::json!({
        "api_base_url": DEFAULT_API_BASE_URL,
        "poll_interval_ms": DEFAULT_POLL_INTERVAL_MS,
        "scroll_settle_ms": DEFAULT_SCROLL_SETTLE_MS,
    })
    .to_string()
}

impl AppConfig {
    pub(crate) fn api_base_url(&self) -> String {
        if let Some(url) = &self.api_base_url {
            if !url.trim().is_empty() {
                return url.trim().to_string();
            }
        }
        if let Ok(url) = std::env::var("UMEE_API_URL") {
            if !url.trim().is_empty() {
                return url.trim().to_string();
            }
        }
        DEFAULT_API_BASE_URL.to_string()
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        let ms = self
            .poll_interval_ms
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS)
            .max(MIN_POLL_INTERVAL_MS);
        Duration::from_millis(ms)
    }

    pub(crate) fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms.unwrap_or(DEFAULT_SCROLL_SETTLE_MS))
    }
}
