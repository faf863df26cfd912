//! Live Poll Platform
//!
//! Session-based group voting: encrypted participant links, file-backed
//! persistence, and realtime result fan-out.

pub mod auth;
pub mod config;
pub mod context;
pub mod errors;
pub mod link;
pub mod mail;
pub mod manager;
pub mod notify;
pub mod results;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use errors::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the platform with proper logging
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "livepoll=info".into()),
        )
        .init();

    tracing::info!("📊 Live poll platform v{} initialized", VERSION);
    Ok(())
}
