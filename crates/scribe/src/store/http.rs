//! HTTP client for the external records API.
//!
//! All requests are paced by a proactive rate limiter and carry a request
//! timeout. Rate-limited queries are retried with exponential backoff; a
//! create is only replayed when the store rejected it outright, since a
//! request that died mid-flight may still have landed.

use std::time::Duration;

use async_trait::async_trait;
use backon::Retryable;
use chrono::{DateTime, Utc};
use reqwest::header::RETRY_AFTER;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::rate_limit::{ApiRateLimiter, rate_limits};
use crate::retry::default_backoff;

use super::RecordStore;
use super::errors::{Result, StoreError};
use super::types::{
    FieldProbe, NewRecord, QUERY_PAGE_SIZE, RecordFilter, RecordPage, StoredRecord,
};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the records API.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base URL of the records API.
    pub base_url: Url,
    /// Bearer token.
    pub token: String,
    /// Collection holding the commit records.
    pub collection: String,
    /// Proactive rate limit applied to every request.
    pub requests_per_second: u32,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl StoreConfig {
    /// Create a config with default pacing and timeout.
    pub fn new(base_url: Url, token: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            base_url,
            token: token.into(),
            collection: collection.into(),
            requests_per_second: rate_limits::STORE_DEFAULT_RPS,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Record store client backed by the records HTTP API.
#[derive(Clone)]
pub struct HttpRecordStore {
    http: reqwest::Client,
    config: StoreConfig,
    limiter: ApiRateLimiter,
}

impl HttpRecordStore {
    /// Build a client from connection settings.
    pub fn new(config: StoreConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        let limiter = ApiRateLimiter::new(config.requests_per_second);

        Ok(Self {
            http,
            config,
            limiter,
        })
    }

    fn endpoint(&self, suffix: &str) -> String {
        format!(
            "{}/v1/collections/{}/{}",
            self.config.base_url.as_str().trim_end_matches('/'),
            self.config.collection,
            suffix
        )
    }

    async fn query_once(
        &self,
        filter: &RecordFilter,
        cursor: Option<&str>,
        sort: Option<&str>,
        page_size: usize,
    ) -> Result<QueryResponse> {
        self.limiter.wait().await;

        let body = QueryRequest {
            filter: WireFilter {
                project: &filter.project,
                identifier: filter.identifier.as_deref(),
            },
            cursor,
            sort,
            page_size,
        };

        let resp = self
            .http
            .post(self.endpoint("query"))
            .bearer_auth(&self.config.token)
            .json(&body)
            .send()
            .await?;
        let resp = check_status(resp, &filter.project).await?;

        Ok(resp.json::<QueryResponse>().await?)
    }

    async fn create_once(&self, record: &NewRecord) -> Result<()> {
        self.limiter.wait().await;

        let body = WireNewRecord::from_record(record);
        let resource = record.identifier.as_deref().unwrap_or(&record.project);

        let resp = self
            .http
            .post(self.endpoint("records"))
            .bearer_auth(&self.config.token)
            .json(&body)
            .send()
            .await?;
        check_status(resp, resource).await?;

        Ok(())
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn query_page(
        &self,
        filter: &RecordFilter,
        cursor: Option<String>,
    ) -> Result<RecordPage> {
        let response = (|| async {
            self.query_once(filter, cursor.as_deref(), None, QUERY_PAGE_SIZE)
                .await
        })
        .retry(default_backoff())
        .when(StoreError::is_retryable)
        .notify(|err, dur| {
            tracing::debug!(project = %filter.project, retry_in = ?dur, error = %err, "Retrying store query");
        })
        .await?;

        Ok(RecordPage {
            records: response.records.into_iter().map(into_stored_record).collect(),
            next_cursor: response.next_cursor,
        })
    }

    async fn create_record(&self, record: &NewRecord) -> Result<()> {
        (|| async { self.create_once(record).await })
            .retry(default_backoff())
            .when(StoreError::is_rate_limited)
            .notify(|err, dur| {
                tracing::debug!(project = %record.project, retry_in = ?dur, error = %err, "Retrying store write");
            })
            .await
    }

    async fn newest_timestamp(&self, project: &str) -> Result<Option<DateTime<Utc>>> {
        let filter = RecordFilter::project(project);
        let response = (|| async {
            self.query_once(&filter, None, Some("committed_at.desc"), 1)
                .await
        })
        .retry(default_backoff())
        .when(StoreError::is_retryable)
        .await?;

        Ok(response.records.first().map(|r| r.committed_at))
    }

    async fn probe_identifier_field(&self) -> FieldProbe {
        self.limiter.wait().await;

        let resp = self
            .http
            .get(self.endpoint("schema"))
            .bearer_auth(&self.config.token)
            .send()
            .await;

        let schema: SchemaResponse = match resp {
            Ok(resp) => match check_status(resp, &self.config.collection).await {
                Ok(resp) => match resp.json().await {
                    Ok(schema) => schema,
                    Err(e) => {
                        tracing::debug!(error = %e, "Schema probe failed to decode");
                        return FieldProbe::Unknown;
                    }
                },
                Err(e) => {
                    tracing::debug!(error = %e, "Schema probe rejected");
                    return FieldProbe::Unknown;
                }
            },
            Err(e) => {
                tracing::debug!(error = %e, "Schema probe failed");
                return FieldProbe::Unknown;
            }
        };

        if schema.fields.iter().any(|f| f.name == IDENTIFIER_FIELD) {
            FieldProbe::Present
        } else {
            FieldProbe::Absent
        }
    }

    async fn add_identifier_field(&self) -> Result<()> {
        self.limiter.wait().await;

        let body = AddFieldRequest {
            name: IDENTIFIER_FIELD,
            kind: "text",
        };

        let resp = self
            .http
            .post(self.endpoint("fields"))
            .bearer_auth(&self.config.token)
            .json(&body)
            .send()
            .await?;

        match check_status(resp, IDENTIFIER_FIELD).await {
            Ok(_) => Ok(()),
            // The column already exists, which is what we wanted.
            Err(e) if e.is_conflict() => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Name of the identifier column in the destination schema.
const IDENTIFIER_FIELD: &str = "identifier";

/// Map an error response to a [`StoreError`], draining the body for context.
async fn check_status(resp: reqwest::Response, resource: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let retry_after = resp
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let body = resp.text().await.unwrap_or_default();

    Err(classify_status(status.as_u16(), retry_after, resource, &body))
}

/// Translate an HTTP status into the store error taxonomy.
fn classify_status(
    status: u16,
    retry_after_secs: Option<u64>,
    resource: &str,
    body: &str,
) -> StoreError {
    match status {
        401 | 403 => StoreError::AuthRequired,
        404 => StoreError::not_found(resource),
        409 => StoreError::Conflict {
            resource: resource.to_string(),
        },
        429 => StoreError::RateLimited {
            retry_after: retry_after_secs.map(Duration::from_secs),
        },
        _ => {
            // Keep error bodies short; char-wise so multi-byte text can't
            // split.
            let message: String = body.chars().take(200).collect();
            StoreError::api(status, message)
        }
    }
}

// ---------- Wire format ----------

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    filter: WireFilter<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sort: Option<&'a str>,
    page_size: usize,
}

#[derive(Debug, Serialize)]
struct WireFilter<'a> {
    project: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    identifier: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    records: Vec<WireRecord>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireRecord {
    id: String,
    project: String,
    #[serde(default)]
    identifier: Option<String>,
    message: String,
    committed_at: DateTime<Utc>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireNewRecord<'a> {
    project: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    identifier: Option<&'a str>,
    message: &'a str,
    committed_at: DateTime<Utc>,
    url: &'a str,
}

impl<'a> WireNewRecord<'a> {
    fn from_record(record: &'a NewRecord) -> Self {
        Self {
            project: &record.project,
            identifier: record.identifier.as_deref(),
            message: &record.message,
            committed_at: record.committed_at,
            url: &record.url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SchemaResponse {
    fields: Vec<FieldDef>,
}

#[derive(Debug, Deserialize)]
struct FieldDef {
    name: String,
    #[allow(dead_code)]
    #[serde(default)]
    kind: String,
}

#[derive(Debug, Serialize)]
struct AddFieldRequest<'a> {
    name: &'a str,
    kind: &'a str,
}

/// Convert a wire record into the domain shape.
fn into_stored_record(wire: WireRecord) -> StoredRecord {
    StoredRecord {
        id: wire.id,
        project: wire.project,
        identifier: wire.identifier,
        message: wire.message,
        committed_at: wire.committed_at,
        url: wire.url,
    }
}
