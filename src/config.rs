//! Process configuration, resolved once at startup from the environment.

use std::path::PathBuf;
use std::time::Duration;

/// Fallback admin password when ADMIN_PASSWORD is unset, kept from the
/// original deployment. Operators are warned loudly when it is in effect.
const DEFAULT_ADMIN_PASSWORD: &str = "GRCCRISPYCRITTERS";

const DEFAULT_DATA_FILE: &str = "poker_data.json";
const DEFAULT_REFRESH_SECS: u64 = 2;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Shared static secret compared against the password presented on the
    /// admin route. Plain string equality, no hashing or lockout.
    pub admin_password: String,
    /// Backing file for the session document.
    pub data_path: PathBuf,
    /// How often the refresh watcher polls the store fingerprint.
    pub refresh_interval: Duration,
    /// When set, the watcher notifies every interval even if the fingerprint
    /// did not change, so clients re-render unconditionally.
    pub force_refresh: bool,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let admin_password = match std::env::var("ADMIN_PASSWORD") {
            Ok(s) if !s.trim().is_empty() => s.trim().to_string(),
            _ => {
                tracing::warn!(
                    "ADMIN_PASSWORD not set - falling back to the built-in default password"
                );
                DEFAULT_ADMIN_PASSWORD.to_string()
            }
        };

        let data_path = std::env::var("POKER_DATA_FILE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE));

        let refresh_secs = std::env::var("POKER_REFRESH_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_REFRESH_SECS);

        let force_refresh = std::env::var("POKER_FORCE_REFRESH")
            .map(|s| matches!(s.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);

        // 8075 is ascii for "PK"
        let port = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(8075);

        Self {
            admin_password,
            data_path,
            refresh_interval: Duration::from_secs(refresh_secs),
            force_refresh,
            port,
        }
    }

    /// Check a presented admin password against the configured secret.
    pub fn verify_admin(&self, password: &str) -> bool {
        constant_time_eq(self.admin_password.as_bytes(), password.as_bytes())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            data_path: PathBuf::from(DEFAULT_DATA_FILE),
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_SECS),
            force_refresh: false,
            port: 8075,
        }
    }
}

/// Constant-time byte comparison to prevent timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
