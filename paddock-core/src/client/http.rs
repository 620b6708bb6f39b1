//! HTTP implementation of [`EntitlementApi`] over `reqwest`.
//!
//! Transient failures (transport errors, 5xx, 429) are retried inside a
//! single fetch with exponential backoff via `backon`; everything else is
//! returned to the cache on the first attempt.

use std::time::Duration;

use async_trait::async_trait;
use backon::{BackoffBuilder, ExponentialBuilder};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use super::EntitlementApi;
use crate::config::ApiConfig;
use crate::error::FetchError;
use crate::models::{OrganizationId, PermissionAssignment, PermissionKey, SubscriptionDocument, TierDefinition};
use crate::{Error, Result};

/// Client for the entitlement endpoints of the backend
#[derive(Clone)]
pub struct HttpEntitlementApi {
    client: reqwest::Client,
    base_url: Url,
    auth_token: Option<String>,
    max_retries: usize,
    retry_min_delay: Duration,
    retry_max_delay: Duration,
}

impl HttpEntitlementApi {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::InvalidInput(format!("Invalid API base URL {}: {e}", config.base_url)))?;
        // Url::join replaces the last segment unless the base ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("paddock/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            auth_token: config.auth_token.clone(),
            max_retries: config.max_retries,
            retry_min_delay: Duration::from_millis(config.retry_min_delay_ms),
            retry_max_delay: Duration::from_millis(config.retry_max_delay_ms),
        })
    }

    /// Replace the bearer token, e.g. after the session is refreshed
    #[must_use]
    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append `segments` to the base URL, percent-encoding each one.
    ///
    /// Ids come from the backend and are never interpreted as path syntax.
    /// Empty, `.` and `..` segments cannot name a document and are rejected.
    fn endpoint(&self, segments: &[&str]) -> std::result::Result<Url, FetchError> {
        if let Some(bad) = segments.iter().find(|s| matches!(**s, "" | "." | "..")) {
            return Err(FetchError::NotFound(format!("Invalid path segment {bad:?}")));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| FetchError::Network(format!("Base URL {} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET the endpoint at `segments` and decode the JSON body, retrying transient failures
    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> std::result::Result<T, FetchError> {
        let url = self.endpoint(segments)?;

        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.retry_min_delay)
            .with_max_delay(self.retry_max_delay)
            .with_max_times(self.max_retries)
            .with_jitter()
            .build();

        let mut last_err = None;
        for delay in std::iter::once(Duration::ZERO).chain(backoff) {
            if delay > Duration::ZERO {
                tokio::time::sleep(delay).await;
            }

            match self.send_once(&url, query).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() => {
                    tracing::warn!(url = %url, error = %e, "Entitlement request failed, retrying");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| FetchError::Network("Retry exhausted".to_string())))
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        url: &Url,
        query: &[(&str, &str)],
    ) -> std::result::Result<T, FetchError> {
        let mut request = self.client.get(url.clone()).query(query);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = String::from_utf8_lossy(&body).chars().take(256).collect::<String>();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::Unauthorized(message),
                StatusCode::NOT_FOUND => FetchError::NotFound(url.path().to_string()),
                _ => FetchError::Status {
                    code: status.as_u16(),
                    message,
                },
            });
        }

        serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[async_trait]
impl EntitlementApi for HttpEntitlementApi {
    async fn permission_assignment(&self, key: &PermissionKey) -> std::result::Result<PermissionAssignment, FetchError> {
        let segments = [
            "v1",
            "organizations",
            key.organization_id.as_str(),
            "members",
            key.user_id.as_str(),
            "permissions",
        ];
        match &key.stable_id {
            Some(stable) => self.get_json(&segments, &[("stableId", stable.as_str())]).await,
            None => self.get_json(&segments, &[]).await,
        }
    }

    async fn subscription(&self, organization_id: &OrganizationId) -> std::result::Result<SubscriptionDocument, FetchError> {
        self.get_json(&["v1", "organizations", organization_id.as_str(), "subscription"], &[])
            .await
    }

    async fn tier_catalog(&self) -> std::result::Result<Vec<TierDefinition>, FetchError> {
        self.get_json(&["v1", "subscription-tiers"], &[]).await
    }
}

impl std::fmt::Debug for HttpEntitlementApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEntitlementApi")
            .field("base_url", &self.base_url.as_str())
            .field("auth_token", &self.auth_token.as_ref().map(|_| "***"))
            .field("max_retries", &self.max_retries)
            .finish()
    }
}
