use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use dotenvy::dotenv;
use serde::Deserialize;

use crate::recovery::ReconnectPolicy;

/// Which front-end shell embeds the tracker. The tracker logic is identical;
/// the variant parameterizes configuration and request routing instead of
/// being copy-pasted per app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Cashier,
    Deposit,
    Withdrawal,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Cashier => "cashier",
            Variant::Deposit => "deposit",
            Variant::Withdrawal => "withdrawal",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cashier" => Ok(Variant::Cashier),
            "deposit" => Ok(Variant::Deposit),
            "withdrawal" => Ok(Variant::Withdrawal),
            other => anyhow::bail!("unknown variant: {}", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend_url: String,
    pub events_url: String,
    pub variant: Variant,
    pub reconnect_max_attempts: u32,
    pub reconnect_base_delay_ms: u64,
    pub reconnect_backoff_factor: f64,
    pub reconnect_max_delay_ms: u64,
    pub poll_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            backend_url: env::var("TELLER_BACKEND_URL")?,
            events_url: env::var("TELLER_EVENTS_URL")?,
            variant: env::var("TELLER_VARIANT")
                .unwrap_or_else(|_| "deposit".to_string())
                .parse()?,
            reconnect_max_attempts: env::var("TELLER_RECONNECT_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            reconnect_base_delay_ms: env::var("TELLER_RECONNECT_BASE_DELAY_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()?,
            reconnect_backoff_factor: env::var("TELLER_RECONNECT_BACKOFF_FACTOR")
                .unwrap_or_else(|_| "1.2".to_string())
                .parse()?,
            reconnect_max_delay_ms: env::var("TELLER_RECONNECT_MAX_DELAY_MS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()?,
            poll_interval_secs: env::var("TELLER_POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
        })
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.reconnect_max_attempts,
            base_delay: Duration::from_millis(self.reconnect_base_delay_ms),
            factor: self.reconnect_backoff_factor,
            max_delay: Duration::from_millis(self.reconnect_max_delay_ms),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
