//! HTTP implementation of the export service contract
//!
//! Endpoints (relative to the configured base URL):
//! - `GET  /v1/Exports/{resource}/Jobs?PageSize={n}` - recent jobs
//! - `POST /v1/Exports/{resource}/Jobs` - create a job (form encoded)
//! - `GET  /v1/Exports/{resource}/Jobs/{job_id}` - job snapshot
//! - `GET  /v1/Exports/{resource}/Days/{day}` - redirect to the day's artifact
//!
//! The day endpoint answers with a redirect; this client never follows it and
//! hands the target URL back to the downloader instead.

use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::{redirect, Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ExportService, RemoteResult, RemoteServiceError};
use crate::config::ExportConfig;
use crate::ExportJob;

/// HTTP connect timeout (seconds)
const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Basic-auth credentials for the export service
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account or key identifier
    pub username: String,
    /// Secret
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct JobPage {
    #[serde(default)]
    jobs: Vec<ExportJob>,
}

#[derive(Debug, Deserialize)]
struct DayResource {
    #[serde(default)]
    redirect_to: Option<String>,
}

/// Export service client over HTTPS
pub struct HttpExportClient {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
}

impl HttpExportClient {
    /// Create a client for `base_url` with the given request timeout
    pub fn new(
        base_url: impl Into<String>,
        request_timeout: Duration,
        credentials: Option<Credentials>,
    ) -> RemoteResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
            .timeout(request_timeout)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| RemoteServiceError::network("building HTTP client", &e))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// Create a client from runtime configuration
    pub fn from_config(config: &ExportConfig) -> RemoteResult<Self> {
        Self::new(
            config.base_url.clone(),
            config.request_timeout,
            config.credentials.clone(),
        )
    }

    /// Base URL this client talks to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn jobs_url(&self, resource_type: &str) -> String {
        format!("{}/v1/Exports/{}/Jobs", self.base_url, resource_type)
    }

    fn job_url(&self, resource_type: &str, job_id: &str) -> String {
        format!("{}/{}", self.jobs_url(resource_type), job_id)
    }

    fn day_url(&self, resource_type: &str, day: &str) -> String {
        format!("{}/v1/Exports/{}/Days/{}", self.base_url, resource_type, day)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(creds) => request.basic_auth(&creds.username, Some(&creds.password)),
            None => request,
        }
    }

    /// Send a request and decode a JSON success body
    async fn send_json<T>(&self, request: RequestBuilder, context: &str) -> RemoteResult<T>
    where
        T: DeserializeOwned,
    {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| RemoteServiceError::network(context, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "{} failed", context);
            return Err(RemoteServiceError::from_response(context, status.as_u16(), &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| RemoteServiceError::decode(context, e.to_string()))
    }
}

#[async_trait]
impl ExportService for HttpExportClient {
    async fn list_jobs(&self, resource_type: &str, limit: usize) -> RemoteResult<Vec<ExportJob>> {
        let context = format!("listing {resource_type} export jobs");
        debug!(resource_type, limit, "Listing export jobs");

        let request = self
            .client
            .get(self.jobs_url(resource_type))
            .query(&[("PageSize", limit.to_string())]);
        let page: JobPage = self.send_json(request, &context).await?;

        debug!(count = page.jobs.len(), "Received export jobs");
        Ok(page.jobs)
    }

    async fn create_job(
        &self,
        resource_type: &str,
        start_day: &str,
        end_day: &str,
        friendly_name: &str,
    ) -> RemoteResult<ExportJob> {
        let context = format!("creating {resource_type} export job {start_day}..{end_day}");
        debug!(resource_type, start_day, end_day, friendly_name, "Creating export job");

        let request = self.client.post(self.jobs_url(resource_type)).form(&[
            ("StartDay", start_day),
            ("EndDay", end_day),
            ("FriendlyName", friendly_name),
        ]);
        let job: ExportJob = self.send_json(request, &context).await?;

        if job.id.is_empty() {
            return Err(RemoteServiceError::invalid_response(
                context,
                "created job has no identifier",
            ));
        }
        Ok(job)
    }

    async fn fetch_job(&self, resource_type: &str, job_id: &str) -> RemoteResult<ExportJob> {
        let context = format!("fetching export job {job_id}");
        let request = self.client.get(self.job_url(resource_type, job_id));
        self.send_json(request, &context).await
    }

    async fn fetch_day_location(&self, resource_type: &str, day: &str) -> RemoteResult<Url> {
        let context = format!("resolving content location for {day}");
        let response = self
            .authorize(self.client.get(self.day_url(resource_type, day)))
            .send()
            .await
            .map_err(|e| RemoteServiceError::network(&context, &e))?;

        let status = response.status();
        let request_url = response.url().clone();

        let target = if status.is_redirection() {
            response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
                .ok_or_else(|| {
                    RemoteServiceError::invalid_response(&context, "redirect without Location header")
                })?
        } else if status.is_success() {
            let body: DayResource = response
                .json()
                .await
                .map_err(|e| RemoteServiceError::decode(&context, e.to_string()))?;
            body.redirect_to.ok_or_else(|| {
                RemoteServiceError::invalid_response(&context, "day resource has no redirect_to")
            })?
        } else {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteServiceError::from_response(context, status.as_u16(), &body));
        };

        // Relative locations resolve against the day endpoint
        request_url.join(&target).map_err(|e| {
            RemoteServiceError::invalid_response(context, format!("bad content URL {target:?}: {e}"))
        })
    }
}
