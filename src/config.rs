use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

/// Default backend address used during local development.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// How long a success notification stays visible.
pub const DEFAULT_NOTIFICATION_TTL_MS: u64 = 3000;
/// Longest notification lifetime accepted: one day.
pub const MAX_NOTIFICATION_TTL_MS: u64 = 24 * 60 * 60 * 1000;

/// What a per-lead action does when its backend call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure and keep the last known state. Nothing reaches the caller
    /// beyond a `Failed` outcome.
    #[default]
    LogAndRetainPriorState,
    /// Keep the last known state, record the failure on the action state and
    /// return the error to the caller.
    Surface,
}

impl FromStr for FailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" | "log_and_retain" => Ok(FailurePolicy::LogAndRetainPriorState),
            "surface" => Ok(FailurePolicy::Surface),
            other => anyhow::bail!(
                "ACTION_FAILURE_POLICY must be 'log' or 'surface', got '{}'",
                other
            ),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api_url: String,
    pub port: u16,
    pub notification_ttl_ms: u64,
    pub failure_policy: FailurePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            port: 3000,
            notification_ttl_ms: DEFAULT_NOTIFICATION_TTL_MS,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            api_url: std::env::var("LEAD_API_URL")
                .or_else(|_| Ok::<_, anyhow::Error>(DEFAULT_API_URL.to_string()))
                .and_then(|url| {
                    validate_api_url(&url)?;
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            notification_ttl_ms: parse_notification_ttl(
                &std::env::var("NOTIFICATION_TTL_MS")
                    .unwrap_or_else(|_| DEFAULT_NOTIFICATION_TTL_MS.to_string()),
            )?,
            failure_policy: match std::env::var("ACTION_FAILURE_POLICY") {
                Ok(raw) if !raw.trim().is_empty() => raw.parse()?,
                _ => FailurePolicy::default(),
            },
        };

        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Lead API URL: {}", config.api_url);
        tracing::debug!("Server Port: {}", config.port);
        tracing::debug!("Notification TTL: {}ms", config.notification_ttl_ms);
        tracing::debug!("Action failure policy: {:?}", config.failure_policy);

        Ok(config)
    }

    pub fn notification_ttl(&self) -> Duration {
        Duration::from_millis(self.notification_ttl_ms)
    }
}

/// Parses `NOTIFICATION_TTL_MS`: a positive number of milliseconds, at most one day.
pub fn parse_notification_ttl(raw: &str) -> anyhow::Result<u64> {
    let ms: u64 = raw
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("NOTIFICATION_TTL_MS must be a positive integer"))?;
    if ms == 0 {
        anyhow::bail!("NOTIFICATION_TTL_MS must be greater than zero");
    }
    if ms > MAX_NOTIFICATION_TTL_MS {
        anyhow::bail!(
            "NOTIFICATION_TTL_MS must be at most {} (one day)",
            MAX_NOTIFICATION_TTL_MS
        );
    }
    Ok(ms)
}

/// Checks that a backend base address is usable.
pub fn validate_api_url(url: &str) -> anyhow::Result<()> {
    if url.trim().is_empty() {
        anyhow::bail!("LEAD_API_URL cannot be empty");
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("LEAD_API_URL must start with http:// or https://");
    }
    Ok(())
}
