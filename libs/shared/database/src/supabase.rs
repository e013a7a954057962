use std::time::Duration;

use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

use shared_config::AppConfig;

/// Typed storage failures. Callers branch on these; the raw PostgREST error
/// body is logged here and never forwarded to API callers.
#[derive(Error, Debug)]
pub enum StorageError {
    /// A database constraint rejected the write (PostgREST 409). For the
    /// reservations table this is the partial unique index on
    /// (provider_id, date, slot_time) over active rows.
    #[error("storage conflict: {0}")]
    Conflict(String),

    #[error("authentication rejected by storage: {0}")]
    Auth(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    /// The bounded request timeout elapsed or the service was unreachable.
    /// Retryable; never interpreted as success or as a definite failure.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode storage response: {0}")]
    Decode(String),
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        let client = match Client::builder()
            .timeout(Duration::from_secs(config.storage_timeout_secs))
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                // Requests made through this fallback client carry no
                // timeout bound.
                warn!("Failed to build HTTP client with timeout, using defaults: {}", e);
                Client::new()
            }
        };

        Self {
            client,
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(key) = HeaderValue::from_str(&self.anon_key) {
            headers.insert("apikey", key);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            if let Ok(bearer) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, bearer);
            }
        }

        headers
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T, StorageError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, auth_token, body, None)
            .await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, StorageError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let mut headers = self.get_headers(auth_token);
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await.map_err(|e| {
            error!("Storage request to {} failed: {}", url, e);
            if e.is_timeout() || e.is_connect() {
                StorageError::Unavailable(e.to_string())
            } else {
                StorageError::Api {
                    status: 0,
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("API error ({}): {}", status, error_text);

            return Err(match status {
                StatusCode::CONFLICT => StorageError::Conflict(error_text),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    StorageError::Auth(error_text)
                }
                StatusCode::NOT_FOUND => StorageError::NotFound(error_text),
                StatusCode::REQUEST_TIMEOUT
                | StatusCode::BAD_GATEWAY
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT => StorageError::Unavailable(error_text),
                other => StorageError::Api {
                    status: other.as_u16(),
                    message: error_text,
                },
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| StorageError::Decode(e.to_string()))
    }

    /// Headers asking PostgREST to echo the affected rows back.
    pub fn return_representation() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}
