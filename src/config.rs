use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Historial";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum accepted attachment size (50 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Get the application data directory.
/// `~/Historial/` unless overridden with `HISTORIAL_DATA_DIR`.
pub fn app_data_dir() -> PathBuf {
    if let Ok(dir) = env::var("HISTORIAL_DATA_DIR") {
        return PathBuf::from(dir);
    }
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Historial")
}

/// Path of the SQLite database file (`HISTORIAL_DB` override).
pub fn database_path() -> PathBuf {
    match env::var("HISTORIAL_DB") {
        Ok(path) => PathBuf::from(path),
        Err(_) => app_data_dir().join("historial.db"),
    }
}

/// Base directory for uploaded attachments (`HISTORIAL_UPLOADS_DIR` override).
/// Attachments land under `<uploads>/patients/<patient_id>/`.
pub fn uploads_dir() -> PathBuf {
    match env::var("HISTORIAL_UPLOADS_DIR") {
        Ok(path) => PathBuf::from(path),
        Err(_) => app_data_dir().join("uploads"),
    }
}

/// Socket address the API server binds to (`HISTORIAL_BIND` override).
pub fn bind_addr() -> SocketAddr {
    env::var("HISTORIAL_BIND")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8080)))
}

/// Default log filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> String {
    "info,historial=debug".to_string()
}

/// Settings for issuing and verifying bearer tokens.
#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub expiration_hours: i64,
}

impl JwtSettings {
    /// Read token settings from the environment.
    ///
    /// `HISTORIAL_JWT_SECRET` has a development fallback so the server
    /// starts out of the box; deployments must set their own secret.
    pub fn from_env() -> Self {
        Self {
            secret: env::var("HISTORIAL_JWT_SECRET")
                .unwrap_or_else(|_| "historial-dev-secret-change-me".to_string()),
            issuer: env::var("HISTORIAL_JWT_ISSUER").unwrap_or_else(|_| "historial".to_string()),
            audience: env::var("HISTORIAL_JWT_AUDIENCE")
                .unwrap_or_else(|_| "historial-api".to_string()),
            expiration_hours: env::var("HISTORIAL_JWT_EXPIRATION_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_name_is_historial() {
        assert_eq!(APP_NAME, "Historial");
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }

    #[test]
    fn upload_cap_is_50_mib() {
        assert_eq!(MAX_UPLOAD_BYTES, 52_428_800);
    }

    #[test]
    fn jwt_settings_have_defaults() {
        let settings = JwtSettings::from_env();
        assert!(!settings.secret.is_empty());
        assert!(!settings.issuer.is_empty());
        assert!(settings.expiration_hours > 0);
    }
}
