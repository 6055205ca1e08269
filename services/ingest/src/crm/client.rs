use std::time::Duration;

use chrono::{DateTime, Utc};
use crmirror_common::error::{CrmirrorError, CrmirrorResult};
use crmirror_config::{get_var_or, parse_var_or};
use crmirror_db::sync::models::ObjectType;
use reqwest::{Client, RequestBuilder, StatusCode};

use super::models::Page;
use crate::retry::{retry_after, RetryPolicy};

#[derive(Debug, Clone)]
pub struct CrmClientConfig {
    pub base_url: String,
    pub access_token: String,
    pub page_size: u32,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl CrmClientConfig {
    /// Load CRM config from environment.
    ///
    /// Returns `Ok(None)` when `CRM_ACCESS_TOKEN` is unset; `Err` on a malformed value.
    pub fn from_env() -> CrmirrorResult<Option<Self>> {
        let access_token = match std::env::var("CRM_ACCESS_TOKEN") {
            Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
            _ => return Ok(None),
        };

        let page_size: u32 = parse_var_or("CRM_PAGE_SIZE", 100)?;
        if page_size == 0 || page_size > 100 {
            return Err(CrmirrorError::Config(format!(
                "CRM_PAGE_SIZE must be between 1 and 100, got {page_size}"
            )));
        }

        let retry = RetryPolicy {
            max_retries: parse_var_or("CRM_MAX_RETRIES", 3)?,
            ..RetryPolicy::default()
        };

        Ok(Some(Self {
            base_url: get_var_or("CRM_BASE_URL", "https://api.hubapi.com")
                .trim_end_matches('/')
                .to_string(),
            access_token,
            page_size,
            timeout_secs: parse_var_or("CRM_TIMEOUT_SECS", 30)?,
            retry,
        }))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("HTTP {status}: {body}")]
    Http { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

impl From<UpstreamError> for CrmirrorError {
    fn from(err: UpstreamError) -> Self {
        CrmirrorError::Upstream(err.to_string())
    }
}

#[derive(Clone)]
pub struct CrmClient {
    client: Client,
    config: CrmClientConfig,
}

impl CrmClient {
    pub fn new(config: CrmClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &CrmClientConfig {
        &self.config
    }

    /// For testing: create a client pointing at a specific base URL (e.g., wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.to_string();
        self
    }

    /// One page of the plain list endpoint, used by full syncs.
    pub async fn list_page(
        &self,
        object_type: ObjectType,
        properties: &[&str],
        associations: Option<&str>,
        after: Option<&str>,
    ) -> Result<Page, UpstreamError> {
        let url = format!("{}/crm/v3/objects/{}", self.config.base_url, object_type);
        let mut query: Vec<(&str, String)> = vec![
            ("limit", self.config.page_size.to_string()),
            ("properties", properties.join(",")),
        ];
        if let Some(assoc) = associations {
            query.push(("associations", assoc.to_string()));
        }
        if let Some(after) = after {
            query.push(("after", after.to_string()));
        }

        self.send_with_retry(|| self.client.get(&url).query(&query))
            .await
    }

    /// One page of objects modified at or after `since`, oldest first.
    pub async fn search_page(
        &self,
        object_type: ObjectType,
        properties: &[&str],
        modified_property: &str,
        since: DateTime<Utc>,
        after: Option<&str>,
    ) -> Result<Page, UpstreamError> {
        let url = format!(
            "{}/crm/v3/objects/{}/search",
            self.config.base_url, object_type
        );
        let mut body = serde_json::json!({
            "filterGroups": [{
                "filters": [{
                    "propertyName": modified_property,
                    "operator": "GTE",
                    "value": since.timestamp_millis().to_string(),
                }]
            }],
            "sorts": [{ "propertyName": modified_property, "direction": "ASCENDING" }],
            "properties": properties,
            "limit": self.config.page_size,
        });
        if let Some(after) = after {
            body["after"] = serde_json::Value::String(after.to_string());
        }

        self.send_with_retry(|| self.client.post(&url).json(&body))
            .await
    }

    pub async fn owners_page(&self, after: Option<&str>) -> Result<Page, UpstreamError> {
        let url = format!("{}/crm/v3/owners", self.config.base_url);
        let mut query: Vec<(&str, String)> = vec![("limit", self.config.page_size.to_string())];
        if let Some(after) = after {
            query.push(("after", after.to_string()));
        }

        self.send_with_retry(|| self.client.get(&url).query(&query))
            .await
    }

    async fn send_with_retry<F>(&self, build: F) -> Result<Page, UpstreamError>
    where
        F: Fn() -> RequestBuilder,
    {
        let policy = self.config.retry;
        let mut last_error = String::new();
        let mut wait: Option<Duration> = None;

        for attempt in 0..policy.attempts() {
            if attempt > 0 {
                let backoff = wait.take().unwrap_or_else(|| policy.delay(attempt));
                tracing::warn!(
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %last_error,
                    "retrying crm request after backoff"
                );
                tokio::time::sleep(backoff).await;
            }

            let response = match build().bearer_auth(&self.config.access_token).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = e.to_string();
                    if e.is_timeout() || e.is_connect() {
                        continue;
                    }
                    return Err(UpstreamError::Request(e));
                }
            };

            let status = response.status();

            if status.is_success() {
                return response.json::<Page>().await.map_err(UpstreamError::Request);
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                wait = retry_after(
                    response
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok()),
                );
                last_error = "429 Too Many Requests".to_string();
                continue;
            }

            if status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                last_error = format!("{status}: {body}");
                continue;
            }

            // Fail fast on 4xx (except 429 handled above)
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Http { status, body });
        }

        Err(UpstreamError::MaxRetriesExceeded {
            attempts: policy.attempts(),
            last_error,
        })
    }
}
