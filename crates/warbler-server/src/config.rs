use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use tracing::warn;

const DEV_SECRET: &str = "dev-secret-change-me";

/// Settings read from the environment (and `.env`, if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub secret_key: String,
    pub host: String,
    pub port: u16,
    pub session_days: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let db_path = lookup("DATABASE_URL")
            .map(|url| sqlite_path(&url))
            .unwrap_or_else(|| PathBuf::from("warbler.db"));

        let secret_key = lookup("SECRET_KEY").unwrap_or_else(|| {
            warn!("SECRET_KEY not set, using the development secret");
            DEV_SECRET.into()
        });

        let host = lookup("WARBLER_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = lookup("WARBLER_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("WARBLER_PORT must be a port number")?;
        let session_days = lookup("WARBLER_SESSION_DAYS")
            .unwrap_or_else(|| "31".into())
            .parse()
            .context("WARBLER_SESSION_DAYS must be a whole number of days")?;
        if session_days <= 0 {
            anyhow::bail!("WARBLER_SESSION_DAYS must be positive");
        }

        Ok(Self {
            db_path,
            secret_key,
            host,
            port,
            session_days,
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

/// Accept either a bare path or a `sqlite://` URL.
fn sqlite_path(url: &str) -> PathBuf {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.db_path, PathBuf::from("warbler.db"));
        assert_eq!(config.secret_key, DEV_SECRET);
        assert_eq!(config.port, 3000);
        assert_eq!(config.session_days, 31);
        assert_eq!(config.addr().unwrap().port(), 3000);
    }

    #[test]
    fn test_database_url_forms() {
        let config = config_from(&[("DATABASE_URL", "sqlite:///var/lib/warbler.db")]).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/var/lib/warbler.db"));

        let config = config_from(&[("DATABASE_URL", "data/w.db")]).unwrap();
        assert_eq!(config.db_path, PathBuf::from("data/w.db"));
    }

    #[test]
    fn test_bad_numbers_are_errors() {
        assert!(config_from(&[("WARBLER_PORT", "http")]).is_err());
        assert!(config_from(&[("WARBLER_SESSION_DAYS", "0")]).is_err());
    }
}
