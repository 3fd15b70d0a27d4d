//! INI file configuration adapter.
//!
//! `DATABASE_URL`, when set, overrides the store selection from the file.

use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;
use tracing::debug;

pub const DATABASE_URL_VAR: &str = "DATABASE_URL";

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }

    /// No file: every key falls back to its default.
    pub fn empty() -> Self {
        Self { config: Ini::new() }
    }

    /// Apply `DATABASE_URL` from the environment, if present.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(DATABASE_URL_VAR) {
            if !url.trim().is_empty() {
                self.apply_database_url(&url);
            }
        }
        self
    }

    /// `postgres://` and `postgresql://` URLs select Postgres; anything else is
    /// a SQLite path, with an optional `sqlite://` prefix.
    pub fn apply_database_url(&mut self, url: &str) {
        let url = url.trim();
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            debug!("database url selects postgres");
            self.set("database", "backend", "postgres");
            self.set("postgres", "connection_string", url);
        } else {
            let path = url.strip_prefix("sqlite://").unwrap_or(url);
            debug!(path, "database url selects sqlite");
            self.set("database", "backend", "sqlite");
            self.set("sqlite", "path", path);
        }
    }

    fn set(&mut self, section: &str, key: &str, value: &str) {
        self.config.set(section, key, Some(value.to_string()));
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}
