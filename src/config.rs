//! Client configuration
//!
//! Settings come from environment variables and the local settings table.
//! Environment variables take precedence over stored values.

use crate::db::Database;
use anyhow::{anyhow, Result};
use std::env;

// Settings keys for database storage
pub const SETTING_API_URL: &str = "api_url";
pub const SETTING_DEMO_MODE: &str = "demo_mode";
pub const SETTING_PAGE_SIZE: &str = "page_size";

// Environment variable names
const ENV_API_URL: &str = "REGISTROS_API_URL";
const ENV_DEMO_MODE: &str = "REGISTROS_DEMO_MODE";
const ENV_PAGE_SIZE: &str = "REGISTROS_PAGE_SIZE";

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_PAGE_SIZE: u32 = 20;
/// The listing endpoint rejects larger pages.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Which backend serves the records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Http,
    Demo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub backend: BackendKind,
    pub page_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            backend: BackendKind::Http,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Config {
    /// Load configuration from environment variables and database settings.
    pub fn load(db: &Database) -> Result<Self> {
        let api_url = env::var(ENV_API_URL)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or(db.get_setting(SETTING_API_URL)?)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let demo = env::var(ENV_DEMO_MODE)
            .ok()
            .or(db.get_setting(SETTING_DEMO_MODE)?)
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        let page_size = match env::var(ENV_PAGE_SIZE).ok().or(db.get_setting(SETTING_PAGE_SIZE)?) {
            Some(raw) => parse_page_size(&raw)?,
            None => DEFAULT_PAGE_SIZE,
        };

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            backend: if demo { BackendKind::Demo } else { BackendKind::Http },
            page_size,
        })
    }

    /// Validate and store a single setting.
    pub fn store(db: &Database, key: &str, value: &str) -> Result<()> {
        match key {
            SETTING_API_URL => {
                url::Url::parse(value).map_err(|e| anyhow!("Invalid API URL '{}': {}", value, e))?;
            }
            SETTING_DEMO_MODE => {
                let _ = parse_bool(value);
            }
            SETTING_PAGE_SIZE => {
                parse_page_size(value)?;
            }
            other => return Err(anyhow!("Unknown setting '{}'", other)),
        }
        db.set_setting(key, value.trim())
    }

    pub fn keys() -> &'static [&'static str] {
        &[SETTING_API_URL, SETTING_DEMO_MODE, SETTING_PAGE_SIZE]
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn parse_page_size(s: &str) -> Result<u32> {
    let n: u32 = s
        .trim()
        .parse()
        .map_err(|_| anyhow!("page_size must be a number, got '{}'", s))?;
    if n == 0 || n > MAX_PAGE_SIZE {
        return Err(anyhow!("page_size must be between 1 and {}", MAX_PAGE_SIZE));
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_values_are_used() {
        let db = Database::open_memory().unwrap();
        Config::store(&db, SETTING_API_URL, "https://api.example.test/").unwrap();
        Config::store(&db, SETTING_PAGE_SIZE, "50").unwrap();
        Config::store(&db, SETTING_DEMO_MODE, "true").unwrap();

        let config = Config::load(&db).unwrap();
        // Only assert what no environment variable can override in CI.
        if env::var(ENV_API_URL).is_err() {
            assert_eq!(config.api_url, "https://api.example.test");
        }
        if env::var(ENV_PAGE_SIZE).is_err() {
            assert_eq!(config.page_size, 50);
        }
        if env::var(ENV_DEMO_MODE).is_err() {
            assert_eq!(config.backend, BackendKind::Demo);
        }
    }

    #[test]
    fn store_rejects_bad_values() {
        let db = Database::open_memory().unwrap();
        assert!(Config::store(&db, SETTING_PAGE_SIZE, "0").is_err());
        assert!(Config::store(&db, SETTING_PAGE_SIZE, "101").is_err());
        assert!(Config::store(&db, SETTING_API_URL, "not a url").is_err());
        assert!(Config::store(&db, "theme", "dark").is_err());
    }

    #[test]
    fn parse_bool_variants() {
        assert!(parse_bool("TRUE"));
        assert!(parse_bool(" 1 "));
        assert!(!parse_bool("no"));
        assert!(!parse_bool(""));
    }
}
