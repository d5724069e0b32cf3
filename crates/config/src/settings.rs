//! Reasoning engine settings taken from the environment.
//!
//! Variables:
//! - `LTM_API_KEY_ENV`: name of the variable holding the API key
//!   (default `GOOGLE_API_KEY`)
//! - `LTM_ENGINE_URL`: OpenAI-compatible base URL
//! - `LTM_MODEL`: model used when a pipeline names none
//! - `LTM_ENGINE_TIMEOUT_SECS`: per-request timeout
//!
//! A missing key is not an error here; the engine reports it on first use.

use serde::{Deserialize, Serialize};

use crate::file::DEFAULT_MODEL;

pub const DEFAULT_API_KEY_ENV: &str = "GOOGLE_API_KEY";
pub const DEFAULT_ENGINE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

#[derive(Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.into()
}
fn default_base_url() -> String {
    DEFAULT_ENGINE_URL.into()
}
fn default_model() -> String {
    DEFAULT_MODEL.into()
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            default_model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for EngineSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineSettings")
            .field(
                "api_key",
                &match self.api_key {
                    Some(_) => "[REDACTED]",
                    None => "None",
                },
            )
            .field("api_key_env", &self.api_key_env)
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl EngineSettings {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(env) = non_empty("LTM_API_KEY_ENV") {
            settings.api_key_env = env;
        }
        settings.api_key = non_empty(&settings.api_key_env);

        if let Some(url) = non_empty("LTM_ENGINE_URL") {
            settings.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = non_empty("LTM_MODEL") {
            settings.default_model = model;
        }
        if let Some(timeout) = non_empty("LTM_ENGINE_TIMEOUT_SECS") {
            match timeout.parse() {
                Ok(secs) => settings.timeout_secs = secs,
                Err(_) => tracing::warn!(value = %timeout, "Ignoring invalid LTM_ENGINE_TIMEOUT_SECS"),
            }
        }

        settings
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let settings = EngineSettings::from_lookup(lookup(&[]));
        assert!(!settings.has_api_key());
        assert_eq!(settings.api_key_env, "GOOGLE_API_KEY");
        assert_eq!(settings.default_model, "gemini-2.5-flash-lite");
        assert_eq!(settings.base_url, DEFAULT_ENGINE_URL);
    }

    #[test]
    fn reads_key_from_configured_variable() {
        let settings = EngineSettings::from_lookup(lookup(&[
            ("LTM_API_KEY_ENV", "MY_KEY"),
            ("MY_KEY", "secret"),
            ("GOOGLE_API_KEY", "ignored"),
            ("LTM_ENGINE_URL", "http://localhost:8080/v1/"),
            ("LTM_MODEL", "local-model"),
        ]));
        assert_eq!(settings.api_key.as_deref(), Some("secret"));
        assert_eq!(settings.base_url, "http://localhost:8080/v1");
        assert_eq!(settings.default_model, "local-model");
    }

    #[test]
    fn empty_key_counts_as_missing() {
        let settings = EngineSettings::from_lookup(lookup(&[("GOOGLE_API_KEY", "  ")]));
        assert!(!settings.has_api_key());
    }

    #[test]
    fn debug_redacts_key() {
        let settings = EngineSettings::from_lookup(lookup(&[("GOOGLE_API_KEY", "sk-very-secret")]));
        let debug = format!("{settings:?}");
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
