//! Taxi Service Common Library
//!
//! Entity types, SQLite persistence, form validation and password hashing
//! shared by the web console.

pub mod db;
pub mod error;
pub mod password;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use db::Database;
pub use error::{Error, Result};
pub use types::*;
pub use validation::{
    CarForm, DriverCreationForm, DriverLicenseUpdateForm, FormErrors, LicenseError, LoginForm,
    ManufacturerForm,
};

/// Taxi service version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default store path
pub fn default_store_path() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".taxi-service")
}

/// Default database path
pub fn default_db_path() -> std::path::PathBuf {
    default_store_path().join("taxi.db")
}

/// Default configuration file path
pub fn default_config_path() -> std::path::PathBuf {
    default_store_path().join("config.toml")
}

/// Home directory helper
mod dirs {
    pub fn home_dir() -> Option<std::path::PathBuf> {
        std::env::var_os("HOME").map(std::path::PathBuf::from)
    }
}
