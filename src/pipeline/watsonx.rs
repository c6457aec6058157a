use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::client::{CompletionClient, GenerationParams};
use super::CompletionError;
use crate::config::ServiceConfig;

/// Text-generation API version pinned in the query string.
pub const API_VERSION: &str = "2023-05-29";

const IAM_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// Refresh the bearer token this many seconds before it expires.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// HTTP client for the hosted watsonx.ai text-generation endpoint.
///
/// The API key is exchanged for an IAM bearer token on first use; the token
/// is cached and refreshed shortly before expiry.
pub struct WatsonxClient {
    service_url: String,
    iam_url: String,
    api_key: String,
    project_id: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
    token: Mutex<Option<BearerToken>>,
}

#[derive(Debug, Clone)]
struct BearerToken {
    value: String,
    expires_at: i64,
}

impl BearerToken {
    fn is_fresh(&self, now: i64) -> bool {
        now + TOKEN_REFRESH_MARGIN_SECS < self.expires_at
    }
}

impl WatsonxClient {
    pub fn new(
        service_url: &str,
        iam_url: &str,
        api_key: &str,
        project_id: &str,
        timeout_secs: u64,
    ) -> Result<Self, CompletionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| CompletionError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            service_url: service_url.trim_end_matches('/').to_string(),
            iam_url: iam_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            project_id: project_id.to_string(),
            client,
            timeout_secs,
            token: Mutex::new(None),
        })
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self, CompletionError> {
        Self::new(
            &config.service_url,
            &config.iam_url,
            &config.api_key,
            &config.project_id,
            config.timeout_secs,
        )
    }

    fn generation_url(&self) -> String {
        format!(
            "{}/ml/v1/text/generation?version={API_VERSION}",
            self.service_url
        )
    }

    fn token_url(&self) -> String {
        format!("{}/identity/token", self.iam_url)
    }

    /// Cached bearer token, exchanging the API key when missing or stale.
    fn bearer_token(&self) -> Result<String, CompletionError> {
        let now = chrono::Utc::now().timestamp();
        let mut cached = self
            .token
            .lock()
            .map_err(|_| CompletionError::HttpClient("Token cache lock poisoned".into()))?;

        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.value.clone());
        }

        let fresh = self.request_token()?;
        tracing::debug!(expires_at = fresh.expires_at, "Obtained IAM bearer token");
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    fn request_token(&self) -> Result<BearerToken, CompletionError> {
        let url = self.token_url();
        let response = self
            .client
            .post(&url)
            .form(&[("grant_type", IAM_GRANT_TYPE), ("apikey", self.api_key.as_str())])
            .send()
            .map_err(|e| self.map_send_error(e, &self.iam_url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CompletionError::Authentication(format!(
                "token exchange returned status {}: {body}",
                status.as_u16()
            )));
        }

        let parsed: IamTokenResponse = response
            .json()
            .map_err(|e| CompletionError::ResponseParsing(e.to_string()))?;

        Ok(BearerToken {
            value: parsed.access_token,
            expires_at: parsed.expiration,
        })
    }

    fn map_send_error(&self, e: reqwest::Error, target: &str) -> CompletionError {
        if e.is_connect() {
            CompletionError::Connection(target.to_string())
        } else if e.is_timeout() {
            CompletionError::Timeout(self.timeout_secs)
        } else {
            CompletionError::HttpClient(e.to_string())
        }
    }
}

/// Request body for POST /ml/v1/text/generation
#[derive(Serialize)]
struct GenerationRequest<'a> {
    model_id: &'a str,
    input: &'a str,
    project_id: &'a str,
    parameters: &'a GenerationParams,
}

/// Response body from /ml/v1/text/generation
#[derive(Deserialize)]
struct GenerationResponse {
    results: Vec<GenerationResult>,
}

#[derive(Deserialize)]
struct GenerationResult {
    generated_text: String,
}

/// Response body from /identity/token
#[derive(Deserialize)]
struct IamTokenResponse {
    access_token: String,
    expiration: i64,
}

impl CompletionClient for WatsonxClient {
    fn complete(
        &self,
        model_id: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, CompletionError> {
        let token = self.bearer_token()?;
        let body = GenerationRequest {
            model_id,
            input: prompt,
            project_id: &self.project_id,
            parameters: params,
        };

        let response = self
            .client
            .post(self.generation_url())
            .bearer_auth(token)
            .json(&body)
            .send()
            .map_err(|e| self.map_send_error(e, &self.service_url))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            // Drop the token so the next call re-exchanges the key.
            if let Ok(mut cached) = self.token.lock() {
                *cached = None;
            }
            let body = response.text().unwrap_or_default();
            return Err(CompletionError::Authentication(body));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerationResponse = response
            .json()
            .map_err(|e| CompletionError::ResponseParsing(e.to_string()))?;

        first_generated_text(parsed)
    }
}

fn first_generated_text(response: GenerationResponse) -> Result<String, CompletionError> {
    response
        .results
        .into_iter()
        .next()
        .map(|r| r.generated_text)
        .ok_or(CompletionError::EmptyResults)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> WatsonxClient {
        WatsonxClient::new(
            "https://us-south.ml.cloud.ibm.com/",
            "https://iam.cloud.ibm.com/",
            "key",
            "project-1",
            30,
        )
        .unwrap()
    }

    #[test]
    fn urls_trim_trailing_slash() {
        let client = client();
        assert_eq!(
            client.generation_url(),
            "https://us-south.ml.cloud.ibm.com/ml/v1/text/generation?version=2023-05-29"
        );
        assert_eq!(client.token_url(), "https://iam.cloud.ibm.com/identity/token");
    }

    #[test]
    fn from_config_copies_settings() {
        let config = ServiceConfig::from_lookup(|name: &str| match name {
            "WATSONX_URL" => Some("https://eu-de.ml.cloud.ibm.com".into()),
            "WATSONX_APIKEY" => Some("k".into()),
            "WATSONX_PROJECT_ID" => Some("p".into()),
            "CAREPILOT_TIMEOUT_SECS" => Some("45".into()),
            _ => None,
        })
        .unwrap();
        let client = WatsonxClient::from_config(&config).unwrap();
        assert_eq!(client.project_id, "p");
        assert_eq!(client.timeout_secs, 45);
        assert!(client.generation_url().starts_with("https://eu-de.ml.cloud.ibm.com/"));
    }

    #[test]
    fn request_body_shape() {
        let params = GenerationParams::default();
        let body = GenerationRequest {
            model_id: "ibm/granite-13b-instruct-v2",
            input: "Hello",
            project_id: "project-1",
            parameters: &params,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model_id"], "ibm/granite-13b-instruct-v2");
        assert_eq!(json["input"], "Hello");
        assert_eq!(json["project_id"], "project-1");
        assert_eq!(json["parameters"]["decoding_method"], "greedy");
        assert_eq!(json["parameters"]["stop_sequences"][0], "User:");
    }

    #[test]
    fn first_result_is_returned() {
        let parsed: GenerationResponse = serde_json::from_str(
            r#"{"model_id":"m","results":[{"generated_text":" Drink water.","generated_token_count":4,"stop_reason":"eos_token"}]}"#,
        )
        .unwrap();
        assert_eq!(first_generated_text(parsed).unwrap(), " Drink water.");
    }

    #[test]
    fn empty_results_is_an_error() {
        let parsed: GenerationResponse = serde_json::from_str(r#"{"results":[]}"#).unwrap();
        assert_eq!(first_generated_text(parsed).unwrap_err(), CompletionError::EmptyResults);
    }

    #[test]
    fn token_freshness_respects_margin() {
        let token = BearerToken {
            value: "t".into(),
            expires_at: 1_000,
        };
        assert!(token.is_fresh(900));
        assert!(!token.is_fresh(950));
        assert!(!token.is_fresh(1_100));
    }

    #[test]
    fn iam_response_parses() {
        let parsed: IamTokenResponse = serde_json::from_str(
            r#"{"access_token":"abc","refresh_token":"not_supported","token_type":"Bearer","expires_in":3600,"expiration":1700003600}"#,
        )
        .unwrap();
        assert_eq!(parsed.access_token, "abc");
        assert_eq!(parsed.expiration, 1_700_003_600);
    }

    #[test]
    fn unreachable_service_maps_to_connection_error() {
        let client = WatsonxClient::new("http://127.0.0.1:1", "http://127.0.0.1:1", "k", "p", 2).unwrap();
        let err = client
            .complete("m", "hi", &GenerationParams::default())
            .unwrap_err();
        assert!(matches!(
            err,
            CompletionError::Connection(_) | CompletionError::Timeout(_) | CompletionError::HttpClient(_)
        ));
    }
}
