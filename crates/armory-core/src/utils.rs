//! Shared utility functions for Armory crates

use std::path::PathBuf;

/// Get the user's home directory
///
/// Prefers the HOME environment variable over dirs::home_dir() so that
/// container setups overriding HOME behave the same as the shell scripts
/// the published wrappers run under.
pub fn get_home_dir() -> crate::error::Result<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        return Ok(PathBuf::from(home));
    }

    dirs::home_dir().ok_or_else(|| {
        crate::error::Error::Io(std::io::Error::other(
            "could not determine home directory",
        ))
    })
}

/// Host identity string for the report header
pub fn host_identity() -> String {
    let host = std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|s| s.trim().to_string())
        })
        .unwrap_or_else(|| "unknown-host".to_string());

    let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    format!("{user}@{host}")
}
