//! Application constants and startup configuration.
//!
//! Credentials for the remote completion service come from the environment
//! (optionally seeded from a `.env` file). A missing credential is fatal at
//! startup, never a per-request condition.

use std::collections::HashMap;

use thiserror::Error;

use crate::pipeline::types::RequestKind;

/// Application-level constants
pub const APP_NAME: &str = "CarePilot";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Model used for every request kind unless overridden.
pub const DEFAULT_MODEL_ID: &str = "ibm/granite-13b-instruct-v2";

/// Default IBM Cloud IAM endpoint for API-key token exchange.
pub const DEFAULT_IAM_URL: &str = "https://iam.cloud.ibm.com";

/// Default HTTP timeout for a completion call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub const ENV_URL: &str = "WATSONX_URL";
pub const ENV_API_KEY: &str = "WATSONX_APIKEY";
pub const ENV_PROJECT_ID: &str = "WATSONX_PROJECT_ID";
pub const ENV_IAM_URL: &str = "WATSONX_IAM_URL";
pub const ENV_TIMEOUT: &str = "CAREPILOT_TIMEOUT_SECS";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "carepilot_lib=info,carepilot=info,warn"
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Required configuration value missing: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

/// Per-kind model identifier mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMap {
    models: HashMap<RequestKind, String>,
}

impl ModelMap {
    /// Every kind mapped to the same model.
    pub fn uniform(model_id: &str) -> Self {
        let models = RequestKind::ALL
            .iter()
            .map(|kind| (*kind, model_id.to_string()))
            .collect();
        Self { models }
    }

    pub fn with_model(mut self, kind: RequestKind, model_id: &str) -> Self {
        self.models.insert(kind, model_id.to_string());
        self
    }

    pub fn model_for(&self, kind: RequestKind) -> &str {
        self.models
            .get(&kind)
            .map(String::as_str)
            .unwrap_or(DEFAULT_MODEL_ID)
    }
}

impl Default for ModelMap {
    fn default() -> Self {
        Self::uniform(DEFAULT_MODEL_ID)
    }
}

/// Remote completion service settings.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub service_url: String,
    pub api_key: String,
    pub project_id: String,
    pub iam_url: String,
    pub timeout_secs: u64,
    pub models: ModelMap,
}

impl ServiceConfig {
    /// Load from the process environment, after reading an optional `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Blank values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let service_url = require(ENV_URL)?;
        let api_key = require(ENV_API_KEY)?;
        let project_id = require(ENV_PROJECT_ID)?;

        let iam_url = get(ENV_IAM_URL).unwrap_or_else(|| DEFAULT_IAM_URL.to_string());
        let timeout_secs = match get(ENV_TIMEOUT) {
            Some(raw) => raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
                var: ENV_TIMEOUT,
                value: raw.clone(),
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let mut models = ModelMap::default();
        for kind in RequestKind::ALL {
            if let Some(model_id) = get(&model_env_var(kind)) {
                models = models.with_model(kind, &model_id);
            }
        }

        Ok(Self {
            service_url,
            api_key,
            project_id,
            iam_url,
            timeout_secs,
            models,
        })
    }
}

/// `CAREPILOT_MODEL_<KIND>` override variable for a request kind.
pub fn model_env_var(kind: RequestKind) -> String {
    format!("CAREPILOT_MODEL_{}", kind.as_str().to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    fn full_env() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_URL, "https://us-south.ml.cloud.ibm.com"),
            (ENV_API_KEY, "secret-key"),
            (ENV_PROJECT_ID, "project-123"),
        ]
    }

    #[test]
    fn loads_required_values_with_defaults() {
        let config = ServiceConfig::from_lookup(lookup_from(&full_env())).unwrap();
        assert_eq!(config.service_url, "https://us-south.ml.cloud.ibm.com");
        assert_eq!(config.project_id, "project-123");
        assert_eq!(config.iam_url, DEFAULT_IAM_URL);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.models.model_for(RequestKind::Chat), DEFAULT_MODEL_ID);
    }

    #[test]
    fn missing_api_key_is_fatal() {
        let env = vec![(ENV_URL, "https://x"), (ENV_PROJECT_ID, "p")];
        let err = ServiceConfig::from_lookup(lookup_from(&env)).unwrap_err();
        assert_eq!(err, ConfigError::Missing(ENV_API_KEY));
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let env = vec![(ENV_URL, "   "), (ENV_API_KEY, "k"), (ENV_PROJECT_ID, "p")];
        let err = ServiceConfig::from_lookup(lookup_from(&env)).unwrap_err();
        assert_eq!(err, ConfigError::Missing(ENV_URL));
    }

    #[test]
    fn per_kind_model_override() {
        let mut env = full_env();
        env.push(("CAREPILOT_MODEL_SYMPTOM_CHECK", "ibm/granite-3-8b-instruct"));
        let config = ServiceConfig::from_lookup(lookup_from(&env)).unwrap();
        assert_eq!(
            config.models.model_for(RequestKind::SymptomCheck),
            "ibm/granite-3-8b-instruct"
        );
        assert_eq!(config.models.model_for(RequestKind::Chat), DEFAULT_MODEL_ID);
    }

    #[test]
    fn invalid_timeout_rejected() {
        let mut env = full_env();
        env.push((ENV_TIMEOUT, "soon"));
        let err = ServiceConfig::from_lookup(lookup_from(&env)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: ENV_TIMEOUT, .. }));
    }

    #[test]
    fn model_env_var_names() {
        assert_eq!(model_env_var(RequestKind::Chat), "CAREPILOT_MODEL_CHAT");
        assert_eq!(
            model_env_var(RequestKind::TrendSummary),
            "CAREPILOT_MODEL_TREND_SUMMARY"
        );
    }

    #[test]
    fn app_name_is_carepilot() {
        assert_eq!(APP_NAME, "CarePilot");
    }
}
