//! Multipart upload of violation frames with retry and token refresh.

use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::error::SenderError;
use crate::token::{Credentials, TokenManager};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8002";

/// Configurable options for the violation sender.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Base URL of the violation API.
    pub api_url: String,

    /// Maximum upload attempts per record.
    pub max_retries: u32,

    /// Overall timeout per HTTP request.
    pub timeout: Duration,

    /// First retry delay; doubled after every further transport failure.
    pub initial_backoff: Duration,

    /// Credentials for token acquisition.
    pub credentials: Credentials,
}

impl SenderConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            max_retries: 3,
            timeout: Duration::from_secs(10),
            initial_backoff: Duration::from_secs(1),
            credentials,
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }
}

/// One captured violation: the frame image plus detection metadata.
#[derive(Debug, Clone)]
pub struct ViolationRecord {
    pub site: String,
    pub stream_name: String,
    pub image: Bytes,
    pub detection_time: Option<DateTime<Utc>>,
    pub warnings_json: Option<String>,
    pub detections_json: Option<String>,
    pub cone_polygon_json: Option<String>,
    pub pole_polygon_json: Option<String>,
}

impl ViolationRecord {
    pub fn new(site: impl Into<String>, stream_name: impl Into<String>, image: Bytes) -> Self {
        Self {
            site: site.into(),
            stream_name: stream_name.into(),
            image,
            detection_time: None,
            warnings_json: None,
            detections_json: None,
            cone_polygon_json: None,
            pole_polygon_json: None,
        }
    }

    pub fn detection_time(mut self, at: DateTime<Utc>) -> Self {
        self.detection_time = Some(at);
        self
    }

    pub fn warnings_json(mut self, json: impl Into<String>) -> Self {
        self.warnings_json = Some(json.into());
        self
    }

    pub fn detections_json(mut self, json: impl Into<String>) -> Self {
        self.detections_json = Some(json.into());
        self
    }

    pub fn cone_polygon_json(mut self, json: impl Into<String>) -> Self {
        self.cone_polygon_json = Some(json.into());
        self
    }

    pub fn pole_polygon_json(mut self, json: impl Into<String>) -> Self {
        self.pole_polygon_json = Some(json.into());
        self
    }
}

/// Sends violation records to the backend API.
///
/// Uses one pooled client for all uploads. Connection timeouts retry
/// with exponential backoff, a 401 triggers a token refresh and a
/// retry, and other HTTP failures propagate to the caller.
pub struct ViolationSender {
    client: Client,
    config: SenderConfig,
    tokens: TokenManager,
}

impl ViolationSender {
    pub fn new(config: SenderConfig) -> Result<Self, SenderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(5)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;
        let tokens = TokenManager::new(client.clone(), config.api_url.clone(), config.credentials.clone());
        Ok(Self {
            client,
            config,
            tokens,
        })
    }

    /// Upload one record, returning the backend's violation id when the
    /// response carries one.
    pub async fn send(&self, record: &ViolationRecord) -> Result<Option<String>, SenderError> {
        let mut access_token = self.tokens.access_token().await?;
        let upload_url = format!("{}/upload", self.config.api_url);
        let mut backoff = self.config.initial_backoff;

        for attempt in 0..self.config.max_retries {
            // Multipart forms are single-use, so rebuild per attempt.
            let form = build_form(record)?;
            let result = self
                .client
                .post(&upload_url)
                .bearer_auth(&access_token)
                .multipart(form)
                .send()
                .await;

            match result {
                Ok(response) if response.status() == StatusCode::UNAUTHORIZED => {
                    warn!(attempt = attempt + 1, "upload unauthorized, refreshing token");
                    access_token = self.tokens.refresh().await?;
                    if attempt + 1 >= self.config.max_retries {
                        return Err(SenderError::HttpStatus {
                            status: StatusCode::UNAUTHORIZED,
                            url: upload_url,
                        });
                    }
                }
                Ok(response) if !response.status().is_success() => {
                    return Err(SenderError::HttpStatus {
                        status: response.status(),
                        url: upload_url,
                    });
                }
                Ok(response) => {
                    let body: serde_json::Value =
                        response
                            .json()
                            .await
                            .map_err(|e| SenderError::MalformedResponse {
                                reason: e.to_string(),
                            })?;
                    let violation_id = body
                        .get("violation_id")
                        .and_then(|id| id.as_str())
                        .map(str::to_owned);
                    debug!(?violation_id, site = %record.site, "violation uploaded");
                    return Ok(violation_id);
                }
                Err(err) if err.is_timeout() || err.is_connect() => {
                    warn!(
                        attempt = attempt + 1,
                        error = %err,
                        "upload attempt failed, backing off"
                    );
                    if attempt + 1 < self.config.max_retries {
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
                Err(err) => return Err(SenderError::Network { source: err }),
            }
        }

        Err(SenderError::RetriesExhausted {
            attempts: self.config.max_retries,
        })
    }
}

fn build_form(record: &ViolationRecord) -> Result<Form, SenderError> {
    let image = Part::bytes(record.image.to_vec())
        .file_name("violation.jpg")
        .mime_str("image/jpeg")
        .map_err(|e| SenderError::Network { source: e })?;

    let mut form = Form::new()
        .part("image", image)
        .text("site", record.site.clone())
        .text("stream_name", record.stream_name.clone());

    if let Some(at) = record.detection_time {
        form = form.text("detection_time", at.to_rfc3339());
    }
    if let Some(json) = &record.warnings_json {
        form = form.text("warnings_json", json.clone());
    }
    if let Some(json) = &record.detections_json {
        form = form.text("detections_json", json.clone());
    }
    if let Some(json) = &record.cone_polygon_json {
        form = form.text("cone_polygon_json", json.clone());
    }
    if let Some(json) = &record.pole_polygon_json {
        form = form.text("pole_polygon_json", json.clone());
    }

    Ok(form)
}
