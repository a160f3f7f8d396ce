//! Runtime settings loaded from the environment.
//!
//! Values come from process environment variables, optionally seeded from a
//! `.env` file in the working directory. Every setting has a default, so an
//! empty environment yields a usable configuration.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::correction::LoopConfig;
use crate::error::ConfigError;
use crate::verify::VerifierConfig;

/// Fully-resolved settings for the verifier, the correction loop and the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Verifier identity, timeouts and placeholder markers.
    pub verifier: VerifierConfig,
    /// Retry bounds and the task-level deadline.
    pub correction: LoopConfig,
    /// Root directory of the task store.
    pub store_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            verifier: VerifierConfig::default(),
            correction: LoopConfig::default(),
            store_dir: PathBuf::from(".vouch"),
        }
    }
}

impl Settings {
    /// Loads settings from the process environment (and `.env`, if present).
    ///
    /// # Errors
    ///
    /// Returns an error if any variable holds an unparseable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is the common case.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable holds an unparseable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(id) = lookup("VOUCH_VERIFIER_ID").filter(|v| !v.trim().is_empty()) {
            settings.verifier.identity = id.trim().to_string();
        }
        if let Some(secs) = parse::<u64>(&lookup, "VOUCH_COMMAND_TIMEOUT_SECS")? {
            settings.verifier.command_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>(&lookup, "VOUCH_HTTP_TIMEOUT_SECS")? {
            settings.verifier.http_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = lookup("VOUCH_PLACEHOLDER_MARKERS") {
            let markers: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(String::from)
                .collect();
            if markers.is_empty() {
                return Err(invalid("VOUCH_PLACEHOLDER_MARKERS", &raw, "no markers listed"));
            }
            settings.verifier.placeholder_markers = markers;
        }

        if let Some(max) = parse::<u32>(&lookup, "VOUCH_MAX_ATTEMPTS")? {
            if max == 0 {
                return Err(invalid("VOUCH_MAX_ATTEMPTS", "0", "at least one attempt is required"));
            }
            settings.correction.max_attempts = max;
        }
        if let Some(max) = parse::<u32>(&lookup, "VOUCH_MAX_LOCAL_PATCHES")? {
            settings.correction.max_local_patches = max;
        }
        if let Some(secs) = parse::<u64>(&lookup, "VOUCH_TASK_TIMEOUT_SECS")? {
            settings.correction.task_timeout = Some(Duration::from_secs(secs));
        }

        if let Some(dir) = lookup("VOUCH_STORE_DIR").filter(|v| !v.trim().is_empty()) {
            settings.store_dir = PathBuf::from(dir);
        }

        Ok(settings)
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| invalid(key, &raw, &e.to_string())),
    }
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
