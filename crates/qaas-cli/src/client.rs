//! `QaaS` HTTP API client.

use std::path::Path;

use qaas_core::Owner;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API client errors.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("configuration error: {0}")]
    Config(String),
}

/// A registered webhook as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebhookInfo {
    pub hash: String,
    pub groupname: String,
    pub username: String,
    pub description: String,
    pub created: String,
    pub url: String,
}

#[derive(Serialize)]
struct ConfigRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    hash: Option<&'a str>,
    groupname: &'a str,
    username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

impl<'a> ConfigRequest<'a> {
    fn for_owner(owner: &'a Owner) -> Self {
        Self {
            hash: None,
            groupname: owner.group(),
            username: owner.user(),
            description: None,
        }
    }
}

#[derive(Deserialize)]
struct UrlResponse {
    webhook: String,
}

#[derive(Deserialize)]
struct InfoResponse {
    webhook: WebhookInfo,
}

#[derive(Deserialize)]
struct ListResponse {
    webhooks: Vec<WebhookInfo>,
}

#[derive(Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// `server` is `scheme://host`; `ca_cert` is an extra PEM root to trust.
    pub fn new(server: &str, port: u16, ca_cert: Option<&Path>) -> Result<Self, ApiError> {
        let server = server.trim_end_matches('/');
        if server.is_empty() {
            return Err(ApiError::Config("server is empty".into()));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(path) = ca_cert {
            let pem = std::fs::read(path)
                .map_err(|e| ApiError::Config(format!("cannot read {}: {e}", path.display())))?;
            builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: format!("{server}:{port}"),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Turn a non-success response into `ApiError::Api` carrying the body.
    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp.text().await.unwrap_or_default();
        Err(ApiError::Api {
            status: status.as_u16(),
            message: message.trim().to_string(),
        })
    }

    /// Register `hash`; returns the callback URL.
    pub async fn register(
        &self,
        hash: &str,
        owner: &Owner,
        description: Option<&str>,
    ) -> Result<String, ApiError> {
        let body = ConfigRequest {
            hash: Some(hash),
            description,
            ..ConfigRequest::for_owner(owner)
        };
        let resp = self
            .http
            .put(self.url("/configuration"))
            .json(&body)
            .send()
            .await?;
        let parsed: UrlResponse = Self::check(resp).await?.json().await?;
        Ok(parsed.webhook)
    }

    pub async fn list(&self, owner: &Owner) -> Result<Vec<WebhookInfo>, ApiError> {
        let resp = self
            .http
            .get(self.url("/configuration"))
            .json(&ConfigRequest::for_owner(owner))
            .send()
            .await?;
        let parsed: ListResponse = Self::check(resp).await?.json().await?;
        Ok(parsed.webhooks)
    }

    pub async fn info(&self, hash: &str) -> Result<WebhookInfo, ApiError> {
        let resp = self
            .http
            .get(self.url(&format!("/configuration/{hash}")))
            .send()
            .await?;
        let parsed: InfoResponse = Self::check(resp).await?.json().await?;
        Ok(parsed.webhook)
    }

    pub async fn delete(&self, hash: &str, owner: &Owner) -> Result<(), ApiError> {
        let resp = self
            .http
            .delete(self.url(&format!("/configuration/{hash}")))
            .json(&ConfigRequest::for_owner(owner))
            .send()
            .await?;
        let _: serde_json::Value = Self::check(resp).await?.json().await?;
        Ok(())
    }

    /// Deliver `payload` to webhook `hash`; returns the response text.
    pub async fn trigger(
        &self,
        hash: &str,
        payload: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ApiError> {
        let resp = self
            .http
            .post(self.url(&format!("/webhook/{hash}")))
            .header(CONTENT_TYPE, content_type)
            .body(payload)
            .send()
            .await?;
        Ok(Self::check(resp).await?.text().await?)
    }
}
