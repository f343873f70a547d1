//! Retry message formatting for day downloads.
//!
//! Classifies download failures and renders consistent retry, recovery and
//! final-failure log lines so a failed day can be diagnosed from the log alone.

use std::time::Duration;

use super::{RemoteErrorKind, RemoteServiceError};

/// Classification of retry errors for user messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryErrorType {
    /// Request or body read timed out
    NetworkTimeout,
    /// Connection refused, DNS failure, or a dropped stream
    NetworkOffline,
    /// HTTP 429
    RateLimit,
    /// HTTP 5xx
    ServerError(u16),
    /// HTTP 401/403
    AuthFailed(u16),
    /// Other HTTP 4xx
    ClientError(u16),
    /// Local disk write failed
    LocalIo,
    /// Service response broke the contract (missing redirect, bad JSON)
    BadResponse,
    /// Anything else
    NetworkGeneric,
}

impl RetryErrorType {
    /// Short description used inside retry log lines.
    pub fn description(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "network timeout",
            Self::NetworkOffline => "connection failed",
            Self::RateLimit => "rate limit exceeded",
            Self::ServerError(code) => match code {
                502 => "bad gateway",
                503 => "service unavailable",
                504 => "gateway timeout",
                _ => "server error",
            },
            Self::AuthFailed(_) => "authentication failed",
            Self::ClientError(code) => match code {
                403 => "access denied",
                404 => "artifact not found",
                410 => "artifact expired",
                _ => "client error",
            },
            Self::LocalIo => "local write failed",
            Self::BadResponse => "unexpected service response",
            Self::NetworkGeneric => "network error",
        }
    }

    /// Suggested remediation shown with the final failure.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "Increase --timeout-secs or check network latency",
            Self::NetworkOffline => "Verify internet connectivity and DNS resolution",
            Self::RateLimit => "Lower --concurrency so fewer days download at once",
            Self::ServerError(_) => "The export service may be degraded, try again later",
            Self::AuthFailed(_) => "Check BULK_EXPORT_USERNAME / BULK_EXPORT_PASSWORD",
            Self::ClientError(_) => "Content links expire; rerun to request fresh ones",
            Self::LocalIo => "Check free disk space and permissions on the download root",
            Self::BadResponse => "Check --base-url points at the export service",
            Self::NetworkGeneric => "Check network connectivity and try again",
        }
    }

    /// Whether another attempt can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::AuthFailed(_) | Self::ClientError(_))
    }

    /// Classify from an HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::AuthFailed(status),
            408 => Self::NetworkTimeout,
            429 => Self::RateLimit,
            500..=599 => Self::ServerError(status),
            400..=499 => Self::ClientError(status),
            _ => Self::NetworkGeneric,
        }
    }

    /// Classify from a transport error.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_status(status.as_u16());
        }
        if err.is_timeout() {
            Self::NetworkTimeout
        } else if err.is_connect() || err.is_body() || err.is_decode() {
            Self::NetworkOffline
        } else {
            Self::NetworkGeneric
        }
    }

    /// Classify a failure reported by the export service.
    pub fn from_remote(err: &RemoteServiceError) -> Self {
        match err.kind {
            RemoteErrorKind::Timeout => Self::NetworkTimeout,
            RemoteErrorKind::Network => Self::NetworkOffline,
            RemoteErrorKind::Http => err
                .http_status
                .map(Self::from_status)
                .unwrap_or(Self::NetworkGeneric),
            RemoteErrorKind::Decode | RemoteErrorKind::InvalidResponse => Self::BadResponse,
        }
    }
}

/// Context for formatting retry messages.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Current attempt number (1-based)
    pub attempt: u32,
    /// Maximum number of attempts configured
    pub max_attempts: u32,
    /// Type of error that triggered retry
    pub error_type: RetryErrorType,
    /// Backoff duration until next attempt
    pub backoff_duration: Duration,
    /// Day being downloaded (`YYYY-MM-DD`)
    pub day: String,
    /// Original error message for details
    pub error_message: String,
}

impl RetryContext {
    /// Convenience constructor used by the downloader.
    pub fn new(
        attempt: u32,
        max_attempts: u32,
        error_type: RetryErrorType,
        backoff_duration: Duration,
        day: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            attempt,
            max_attempts,
            error_type,
            backoff_duration,
            day: day.into(),
            error_message: error_message.into(),
        }
    }

    /// Standardized retry message with attempt counters.
    pub fn format_retry(&self) -> String {
        format!(
            "Retrying {} (attempt {}/{}) after {} - waiting {:.1} seconds...",
            self.day,
            self.attempt,
            self.max_attempts,
            self.error_type.description(),
            self.backoff_duration.as_secs_f64()
        )
    }

    /// Message when a later attempt succeeds.
    pub fn format_success(&self) -> String {
        format!(
            "Download of {} succeeded on attempt {}/{}",
            self.day, self.attempt, self.max_attempts
        )
    }

    /// Multi-line final failure summary with suggestions.
    pub fn format_failure(&self) -> String {
        let mut lines = vec![
            format!(
                "[FAILED] {} failed after {} attempt(s)",
                self.day, self.attempt
            ),
            format!("  Last error: {}", self.error_message),
            "  Suggestions:".to_string(),
        ];
        for suggestion in self.format_suggestions() {
            lines.push(format!("    - {suggestion}"));
        }
        lines.join("\n")
    }

    /// Suggestions tailored to the failure.
    pub fn format_suggestions(&self) -> Vec<String> {
        let mut suggestions = vec![self.error_type.suggestion().to_string()];
        if self.error_type.is_retryable() {
            suggestions.push(format!(
                "Try increasing --max-retries (current attempts: {})",
                self.max_attempts
            ));
        }
        suggestions
    }
}
