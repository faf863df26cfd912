//! Application configuration management
//!
//! Configuration lives in a small JSON file under the data directory and is
//! merged with defaults on load, so a config written by an older deployment
//! (or one with missing keys) still yields a complete structure.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::Result;

/// SMTP settings for the invitation-mail collaborator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmailConfig {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub sender_name: String,
    pub sender_email: String,
    pub use_tls: bool,
}

impl Default for EmailConfig {
    fn default() -> Self {
        // Demo defaults point at a local debugging SMTP sink.
        Self {
            smtp_server: "127.0.0.1".to_string(),
            smtp_port: 1025,
            username: String::new(),
            password: String::new(),
            sender_name: "Vote For Me".to_string(),
            sender_email: "noreply@vote-for-me.app".to_string(),
            use_tls: false,
        }
    }
}

impl EmailConfig {
    /// Whether enough is configured to attempt delivery
    pub fn is_configured(&self) -> bool {
        !self.smtp_server.is_empty()
    }
}

/// Application limits and toggles
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApplicationConfig {
    pub memory_limit_mb: u64,
    pub max_sessions_cache: usize,
    pub session_timeout_days: u32,
    pub demo_mode: bool,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            memory_limit_mb: 100,
            max_sessions_cache: 20,
            session_timeout_days: 7,
            demo_mode: true,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub application: ApplicationConfig,
}

impl Config {
    /// Create configuration for testing
    pub fn for_testing() -> Self {
        let mut config = Config::default();
        config.application.demo_mode = true;
        config.application.max_sessions_cache = 4;
        config
    }
}

/// Loads and persists the configuration file with default-merge semantics
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    config: Config,
}

impl ConfigStore {
    /// Open the config store, creating the file with defaults when absent.
    ///
    /// A corrupt or unreadable file degrades to defaults with a logged
    /// error rather than failing startup.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join("config.json");

        let config = if path.exists() {
            match fs::read_to_string(&path)
                .map_err(crate::Error::from)
                .and_then(|raw| serde_json::from_str::<Config>(&raw).map_err(crate::Error::from))
            {
                Ok(config) => config,
                Err(e) => {
                    tracing::error!("Failed to load config, using defaults: {e}");
                    Config::default()
                }
            }
        } else {
            let config = Config::default();
            let store = Self {
                path: path.clone(),
                config: config.clone(),
            };
            store.save()?;
            config
        };

        Ok(Self { path, config })
    }

    /// Resolve the data directory: `LIVEPOLL_DATA_DIR` env override (a
    /// `.env` file is honored), falling back to `data/`.
    pub fn resolve_data_dir() -> PathBuf {
        dotenvy::dotenv().ok();
        std::env::var("LIVEPOLL_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"))
    }

    /// Current configuration
    pub fn get(&self) -> &Config {
        &self.config
    }

    /// Replace the email section and persist
    pub fn update_email(&mut self, email: EmailConfig) -> Result<()> {
        self.config.email = email;
        self.save()
    }

    /// Replace the application section and persist
    pub fn update_application(&mut self, application: ApplicationConfig) -> Result<()> {
        self.config.application = application;
        self.save()
    }

    /// Persist the current configuration atomically (tmp file + rename)
    pub fn save(&self) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        let raw = serde_json::to_string_pretty(&self.config)?;
        if let Err(e) = fs::write(&tmp, raw).and_then(|_| fs::rename(&tmp, &self.path)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        tracing::info!("Configuration saved to {}", self.path.display());
        Ok(())
    }
}
