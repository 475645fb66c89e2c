//! Client configuration loaded from environment variables.

use std::time::Duration;

use atelier_core::protocol::PUSH_PORT;

use crate::error::PanelError;
use crate::poll::{PollConfig, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_MAX_ATTEMPTS};

/// Default panel API base URL.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

/// Default delay before the completed progress bar is hidden.
pub const DEFAULT_FINISH_DELAY: Duration = Duration::from_millis(1500);

/// Default HTTP request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Panel client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelConfig {
    /// HTTP base URL of the panel API.
    pub base_url: String,
    /// WebSocket base URL of the push channel.
    pub ws_url: String,
    pub poll: PollConfig,
    /// How long the completed progress bar stays visible.
    pub finish_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self::for_base_url(DEFAULT_BASE_URL)
    }
}

impl PanelConfig {
    /// Defaults for a given base URL; the push channel is assumed on the
    /// same host at port 8188.
    pub fn for_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ws_url: derive_ws_url(base_url),
            poll: PollConfig::default(),
            finish_delay: DEFAULT_FINISH_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                      |
    /// |------------------------|------------------------------|
    /// | `PANEL_BASE_URL`       | `http://127.0.0.1:5000`      |
    /// | `PANEL_WS_URL`         | `ws://<base host>:8188`      |
    /// | `POLL_INTERVAL_MS`     | `1000`                       |
    /// | `POLL_MAX_ATTEMPTS`    | `60`                         |
    /// | `FINISH_DELAY_MS`      | `1500`                       |
    /// | `REQUEST_TIMEOUT_SECS` | `120`                        |
    pub fn from_env() -> Result<Self, PanelError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PanelError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("PANEL_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into());
        let mut config = Self::for_base_url(&base_url);

        if let Some(ws_url) = lookup("PANEL_WS_URL") {
            config.ws_url = ws_url.trim_end_matches('/').to_string();
        }

        config.poll.interval = Duration::from_millis(parse_or(
            &lookup,
            "POLL_INTERVAL_MS",
            DEFAULT_POLL_INTERVAL.as_millis() as u64,
        )?);
        config.poll.max_attempts = parse_or(&lookup, "POLL_MAX_ATTEMPTS", DEFAULT_POLL_MAX_ATTEMPTS)?;
        config.finish_delay = Duration::from_millis(parse_or(
            &lookup,
            "FINISH_DELAY_MS",
            DEFAULT_FINISH_DELAY.as_millis() as u64,
        )?);
        config.request_timeout = Duration::from_secs(parse_or(
            &lookup,
            "REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT.as_secs(),
        )?);

        if config.poll.max_attempts == 0 {
            return Err(PanelError::Config(
                "POLL_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, PanelError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| PanelError::Config(format!("{key} must be a non-negative integer, got '{raw}'"))),
    }
}

/// `ws://<host>:8188` for the host of `base_url`; `localhost` if it has none.
pub fn derive_ws_url(base_url: &str) -> String {
    let host = reqwest::Url::parse(base_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "localhost".to_string());
    format!("ws://{host}:{PUSH_PORT}")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_any_variables() {
        let config = PanelConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.ws_url, "ws://127.0.0.1:8188");
        assert_eq!(config.poll, PollConfig::default());
        assert_eq!(config.finish_delay, Duration::from_millis(1500));
    }

    #[test]
    fn ws_url_follows_base_host() {
        let config =
            PanelConfig::from_lookup(lookup_from(&[("PANEL_BASE_URL", "http://gpu-box:5000/")]))
                .unwrap();
        assert_eq!(config.base_url, "http://gpu-box:5000");
        assert_eq!(config.ws_url, "ws://gpu-box:8188");
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = PanelConfig::from_lookup(lookup_from(&[
            ("PANEL_WS_URL", "ws://push:9000/"),
            ("POLL_INTERVAL_MS", "250"),
            ("POLL_MAX_ATTEMPTS", "10"),
            ("FINISH_DELAY_MS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.ws_url, "ws://push:9000");
        assert_eq!(config.poll.interval, Duration::from_millis(250));
        assert_eq!(config.poll.max_attempts, 10);
        assert_eq!(config.finish_delay, Duration::ZERO);
    }

    #[test]
    fn invalid_number_is_a_config_error() {
        let err = PanelConfig::from_lookup(lookup_from(&[("POLL_MAX_ATTEMPTS", "many")]))
            .unwrap_err();
        assert_matches!(err, PanelError::Config(msg) if msg.contains("POLL_MAX_ATTEMPTS"));
    }

    #[test]
    fn zero_attempts_rejected() {
        let err =
            PanelConfig::from_lookup(lookup_from(&[("POLL_MAX_ATTEMPTS", "0")])).unwrap_err();
        assert_matches!(err, PanelError::Config(_));
    }
}
