use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};

use ajchat_types::HISTORY_LIMIT;

/// Runtime settings, read from the environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub public_dir: PathBuf,
    pub history_limit: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("AJCHAT_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = lookup("AJCHAT_PORT")
            .unwrap_or_else(|| "8000".into())
            .parse()
            .context("AJCHAT_PORT must be a port number")?;
        let db_path = lookup("AJCHAT_DB_PATH")
            .unwrap_or_else(|| "ajchat.db".into())
            .into();
        let public_dir = lookup("AJCHAT_PUBLIC_DIR")
            .unwrap_or_else(|| "public".into())
            .into();
        let history_limit = match lookup("AJCHAT_HISTORY_LIMIT") {
            Some(raw) => raw
                .parse()
                .context("AJCHAT_HISTORY_LIMIT must be a non-negative integer")?,
            None => HISTORY_LIMIT,
        };

        Ok(Self {
            host,
            port,
            db_path,
            public_dir,
            history_limit,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.port, 8000);
        assert_eq!(cfg.db_path, PathBuf::from("ajchat.db"));
        assert_eq!(cfg.public_dir, PathBuf::from("public"));
        assert_eq!(cfg.history_limit, 100);
        assert_eq!(cfg.addr().unwrap().to_string(), "0.0.0.0:8000");
    }

    #[test]
    fn overrides() {
        let cfg = config(&[
            ("AJCHAT_HOST", "127.0.0.1"),
            ("AJCHAT_PORT", "9001"),
            ("AJCHAT_HISTORY_LIMIT", "20"),
        ])
        .unwrap();
        assert_eq!(cfg.addr().unwrap().to_string(), "127.0.0.1:9001");
        assert_eq!(cfg.history_limit, 20);
    }

    #[test]
    fn bad_numbers_are_errors() {
        assert!(config(&[("AJCHAT_PORT", "eighty")]).is_err());
        assert!(config(&[("AJCHAT_HISTORY_LIMIT", "-1")]).is_err());
    }
}
