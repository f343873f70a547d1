//! Remote export service contract
//!
//! The pipeline only talks to the export service through [`ExportService`].
//! The production implementation is [`http::HttpExportClient`]; tests inject
//! in-memory fakes through the same trait object.

use crate::ExportJob;
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

pub mod http;
pub mod retry_formatter;

pub use http::{Credentials, HttpExportClient};

/// Broad category of a remote failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// Connection, DNS or mid-body transport failure
    Network,
    /// Request exceeded the configured timeout
    Timeout,
    /// Service answered with a non-success HTTP status
    Http,
    /// Response body could not be decoded
    Decode,
    /// Response decoded but is missing something the contract requires
    InvalidResponse,
}

/// Error raised when a call crosses the remote-service boundary
///
/// Provider fields (`code`, `http_status`, `provider_message`, `more_info`) are
/// filled from the service's JSON error body when one is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteServiceError {
    /// What this crate was doing when the call failed
    pub context: String,
    /// Failure category
    pub kind: RemoteErrorKind,
    /// Provider error code
    pub code: Option<i64>,
    /// HTTP status of the failed response
    pub http_status: Option<u16>,
    /// Provider message, or the transport error text
    pub provider_message: Option<String>,
    /// Provider documentation link for the error
    pub more_info: Option<String>,
}

/// Error body returned by the export service
#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    more_info: Option<String>,
    #[serde(default)]
    status: Option<u16>,
}

impl RemoteServiceError {
    fn bare(context: impl Into<String>, kind: RemoteErrorKind) -> Self {
        Self {
            context: context.into(),
            kind,
            code: None,
            http_status: None,
            provider_message: None,
            more_info: None,
        }
    }

    /// Transport-level failure from reqwest
    pub fn network(context: impl Into<String>, err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            RemoteErrorKind::Timeout
        } else {
            RemoteErrorKind::Network
        };
        let mut error = Self::bare(context, kind);
        error.http_status = err.status().map(|s| s.as_u16());
        error.provider_message = Some(err.to_string());
        error
    }

    /// Non-success HTTP response; the body is parsed for provider details when possible
    pub fn from_response(context: impl Into<String>, status: u16, body: &str) -> Self {
        let mut error = Self::bare(context, RemoteErrorKind::Http);
        error.http_status = Some(status);

        match serde_json::from_str::<ProviderErrorBody>(body) {
            Ok(parsed) => {
                error.code = parsed.code;
                error.provider_message = parsed.message;
                error.more_info = parsed.more_info;
                if let Some(reported) = parsed.status {
                    error.http_status = Some(reported);
                }
            }
            Err(_) => {
                let trimmed = body.trim();
                if !trimmed.is_empty() {
                    error.provider_message = Some(trimmed.chars().take(200).collect());
                }
            }
        }
        error
    }

    /// Body could not be decoded into the expected shape
    pub fn decode(context: impl Into<String>, message: impl Into<String>) -> Self {
        let mut error = Self::bare(context, RemoteErrorKind::Decode);
        error.provider_message = Some(message.into());
        error
    }

    /// Response is well-formed but breaks the service contract
    pub fn invalid_response(context: impl Into<String>, message: impl Into<String>) -> Self {
        let mut error = Self::bare(context, RemoteErrorKind::InvalidResponse);
        error.provider_message = Some(message.into());
        error
    }

    /// Replace the context while keeping provider details
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Whether retrying the same call later can reasonably succeed
    pub fn is_transient(&self) -> bool {
        match self.kind {
            RemoteErrorKind::Network | RemoteErrorKind::Timeout => true,
            RemoteErrorKind::Http => matches!(self.http_status, Some(408 | 429) | Some(500..=599)),
            RemoteErrorKind::Decode | RemoteErrorKind::InvalidResponse => false,
        }
    }

    /// Whether the service reported the resource as missing
    pub fn is_not_found(&self) -> bool {
        self.http_status == Some(404)
    }
}

impl std::fmt::Display for RemoteServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.context)?;
        if let Some(status) = self.http_status {
            write!(f, " (HTTP {status})")?;
        }
        if let Some(code) = self.code {
            write!(f, " [code {code}]")?;
        }
        if let Some(message) = &self.provider_message {
            write!(f, ": {message}")?;
        }
        if let Some(more_info) = &self.more_info {
            write!(f, " (see {more_info})")?;
        }
        Ok(())
    }
}

impl std::error::Error for RemoteServiceError {}

/// Result type for remote calls
pub type RemoteResult<T> = Result<T, RemoteServiceError>;

/// Operations the pipeline needs from the export service
#[async_trait]
pub trait ExportService: Send + Sync {
    /// List the most recent jobs for a resource type
    async fn list_jobs(&self, resource_type: &str, limit: usize) -> RemoteResult<Vec<ExportJob>>;

    /// Submit a new export job covering `start_day..=end_day`
    async fn create_job(
        &self,
        resource_type: &str,
        start_day: &str,
        end_day: &str,
        friendly_name: &str,
    ) -> RemoteResult<ExportJob>;

    /// Fetch the current snapshot of one job
    async fn fetch_job(&self, resource_type: &str, job_id: &str) -> RemoteResult<ExportJob>;

    /// Resolve where the compressed artifact for `day` can be fetched from
    async fn fetch_day_location(&self, resource_type: &str, day: &str) -> RemoteResult<Url>;
}
