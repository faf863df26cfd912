//! Application context
//!
//! Wires the configuration store, session store, event bus, manager, and
//! admin authentication together for embedders. One context per data
//! directory; everything hangs off it.

use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::auth::AdminAuth;
use crate::config::ConfigStore;
use crate::manager::SessionManager;
use crate::notify::EventBus;
use crate::store::SessionStore;
use crate::Result;

/// Shared application state
pub struct AppContext {
    config: Mutex<ConfigStore>,
    events: Arc<EventBus>,
    sessions: SessionManager,
    auth: AdminAuth,
}

impl AppContext {
    /// Open (or initialize) everything under `data_dir`.
    ///
    /// Creates the directory layout, loads or creates the configuration
    /// file, and sizes the session cache from it.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;

        let config = ConfigStore::open(data_dir)?;
        let cache_capacity = config.get().application.max_sessions_cache;

        let store = SessionStore::open(data_dir)?;
        let events = Arc::new(EventBus::new());
        let sessions = SessionManager::new(store, events.clone(), cache_capacity);

        tracing::info!("Application context opened at {}", data_dir.display());
        Ok(Self {
            config: Mutex::new(config),
            events,
            sessions,
            auth: AdminAuth::with_default_password(),
        })
    }

    /// Open under the environment-resolved data directory
    pub fn open_default() -> Result<Self> {
        Self::open(ConfigStore::resolve_data_dir())
    }

    /// Session operations
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Event bus for realtime subscribers
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Admin authentication
    pub fn auth(&self) -> &AdminAuth {
        &self.auth
    }

    /// Run a closure against the configuration store
    pub fn with_config<R>(&self, f: impl FnOnce(&mut ConfigStore) -> R) -> R {
        let mut config = self.config.lock().expect("config lock poisoned");
        f(&mut config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApplicationConfig;
    use tempfile::TempDir;

    #[test]
    fn test_open_initializes_layout() {
        let dir = TempDir::new().unwrap();
        let ctx = AppContext::open(dir.path()).unwrap();

        assert!(dir.path().join("config.json").exists());
        assert!(dir.path().join("active").exists());
        assert!(dir.path().join("completed").exists());

        let session = ctx
            .sessions()
            .create_session("Bootstrap", "", 10, true)
            .unwrap();
        assert!(ctx.sessions().get_session(&session.id).is_ok());
        assert!(ctx.auth().verify("admin123"));
    }

    #[test]
    fn test_config_updates_persist() {
        let dir = TempDir::new().unwrap();
        let ctx = AppContext::open(dir.path()).unwrap();

        ctx.with_config(|c| {
            let mut app = c.get().application.clone();
            app.session_timeout_days = 14;
            c.update_application(app)
        })
        .unwrap();

        let reopened = ConfigStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get().application.session_timeout_days, 14);
        assert_eq!(
            reopened.get().application.memory_limit_mb,
            ApplicationConfig::default().memory_limit_mb
        );
    }
}
