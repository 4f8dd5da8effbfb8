use std::fmt;
use std::net::SocketAddr;

use anyhow::{anyhow, Context, Result};

use crate::guard::DEFAULT_RATE_LIMIT;

pub const DEFAULT_LLM_BASE_URL: &str = "https://api.upstage.ai/v1";
pub const DEFAULT_LLM_MODEL: &str = "solar-pro2";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub database: DatabaseConfig,
    pub bind_addr: SocketAddr,
    pub rate_limit_per_minute: u32,
}

#[derive(Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

/// One endpoint, two credential tiers.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    /// Restricted read role used for browsing and plain search.
    pub anon: Credentials,
    /// Elevated role used only for server-side tool execution.
    pub service: Credentials,
}

#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    pub key: String,
}

// Keys never reach the logs.
impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl AppConfig {
    /// Reads `.env` (if present) and the process environment. Fails fast on
    /// any missing required variable.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let must = |name: &str| -> Result<String> {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("Missing env: {}", name))
        };

        let llm = LlmConfig {
            api_key: must("UPSTAGE_API_KEY")?,
            base_url: lookup("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            model: lookup("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
        };

        let database = DatabaseConfig {
            url: must("DATABASE_URL")?,
            anon: Credentials {
                user: must("DATABASE_ANON_USER")?,
                key: must("DATABASE_ANON_KEY")?,
            },
            service: Credentials {
                user: must("DATABASE_SERVICE_USER")?,
                key: must("DATABASE_SERVICE_KEY")?,
            },
        };

        let bind_addr: SocketAddr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .context("BIND_ADDR must be a socket address like 0.0.0.0:3000")?;

        let rate_limit_per_minute: u32 = match lookup("RATE_LIMIT_PER_MINUTE") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("RATE_LIMIT_PER_MINUTE must be a number, got '{}'", raw))?,
            None => DEFAULT_RATE_LIMIT,
        };

        Ok(Self {
            llm,
            database,
            bind_addr,
            rate_limit_per_minute,
        })
    }
}
