//! Process configuration read from the environment

use crate::messenger::DEFAULT_GRAPH_API_URL;
use crate::state_machine::FlowKind;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Required environment variable {0} is not set")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Everything the bot needs to start
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub verify_token: String,
    pub page_access_token: String,
    pub port: u16,
    pub session_timeout: Duration,
    pub sweep_interval: Duration,
    pub send_timeout: Duration,
    pub flow: FlowKind,
    pub graph_api_url: String,
    /// Unset means completed forms are only logged
    pub report_webhook_url: Option<String>,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let verify_token = required("VERIFY_TOKEN")?;
        let page_access_token = required("PAGE_ACCESS_TOKEN")?;
        let port = parse_or("PORT", get("PORT").as_deref(), 3000)?;
        let session_timeout =
            seconds("SESSION_TIMEOUT_SECS", get("SESSION_TIMEOUT_SECS").as_deref(), 1800)?;
        let sweep_interval =
            seconds("SWEEP_INTERVAL_SECS", get("SWEEP_INTERVAL_SECS").as_deref(), 60)?;
        let send_timeout = seconds("SEND_TIMEOUT_SECS", get("SEND_TIMEOUT_SECS").as_deref(), 10)?;
        let flow = parse_or("BOT_FLOW", get("BOT_FLOW").as_deref(), FlowKind::default())?;

        Ok(Self {
            verify_token,
            page_access_token,
            port,
            session_timeout,
            sweep_interval,
            send_timeout,
            flow,
            graph_api_url: get("GRAPH_API_URL")
                .unwrap_or_else(|| DEFAULT_GRAPH_API_URL.to_string()),
            report_webhook_url: get("REPORT_WEBHOOK_URL"),
        })
    }
}

fn parse_or<T>(name: &'static str, raw: Option<&str>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
    }
}

/// Whole seconds; zero is rejected
fn seconds(name: &'static str, raw: Option<&str>, default: u64) -> Result<Duration, ConfigError> {
    match parse_or(name, raw, default)? {
        0 => Err(ConfigError::Invalid {
            name,
            reason: "must be greater than zero".to_string(),
        }),
        secs => Ok(Duration::from_secs(secs)),
    }
}
