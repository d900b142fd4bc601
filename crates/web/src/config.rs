//! Web console configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use taxi_common::DEFAULT_PAGE_SIZE;

/// Two weeks
const DEFAULT_SESSION_TTL_SECS: i64 = 60 * 60 * 24 * 14;

/// Web console configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// HTTP listen address
    pub listen: String,

    /// SQLite database file
    pub db_path: PathBuf,

    /// Rows per list page
    pub page_size: u32,

    /// Session lifetime in seconds
    pub session_ttl_secs: i64,

    /// Name of the session cookie
    pub cookie_name: String,

    /// Mark the session cookie `Secure` (HTTPS deployments)
    pub secure_cookies: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8000".to_string(),
            db_path: taxi_common::default_db_path(),
            page_size: DEFAULT_PAGE_SIZE,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            cookie_name: "sessionid".to_string(),
            secure_cookies: false,
        }
    }
}

impl WebConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `TAXI_*` environment overrides
    pub fn apply_env(&mut self) -> anyhow::Result<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(listen) = non_empty("TAXI_LISTEN") {
            self.listen = listen;
        }
        if let Some(path) = non_empty("TAXI_DB_PATH") {
            self.db_path = PathBuf::from(path);
        }
        if let Some(size) = non_empty("TAXI_PAGE_SIZE") {
            self.page_size = size
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("TAXI_PAGE_SIZE must be a positive integer"))?;
        }
        if let Some(ttl) = non_empty("TAXI_SESSION_TTL_SECS") {
            self.session_ttl_secs = ttl
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("TAXI_SESSION_TTL_SECS must be an integer"))?;
        }
        if let Some(secure) = non_empty("TAXI_SECURE_COOKIES") {
            self.secure_cookies = secure == "1" || secure.eq_ignore_ascii_case("true");
        }

        self.validate()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.page_size == 0 {
            anyhow::bail!("page_size must be at least 1");
        }
        if self.session_ttl_secs <= 0 {
            anyhow::bail!("session_ttl_secs must be positive");
        }
        if self.cookie_name.trim().is_empty() {
            anyhow::bail!("cookie_name must not be empty");
        }
        Ok(())
    }
}
