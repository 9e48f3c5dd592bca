use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap};
use reqwest::{Client, Response, StatusCode, Url};

use super::error::JobError;
use super::types::{JobHandle, JobRequest, PollOutcome, RawResult, Rejection, SubmitOutcome};
use crate::config::RemoteConfig;

/// Body fields checked, in order, for a job id when the header is absent.
const BODY_ID_FIELDS: &[&str] = &["id", "job_id", "req_id"];

/// Submission and status calls against a long-running job service.
///
/// The runner is generic over this trait so tests can script responses
/// without a network.
#[allow(async_fn_in_trait)]
pub trait JobService {
    async fn submit(&self, request: &JobRequest) -> Result<SubmitOutcome, JobError>;
    async fn poll(&self, handle: &JobHandle) -> Result<PollOutcome, JobError>;
}

pub struct RemoteJobClient {
    credential: String,
    endpoint: String,
    status_endpoint: String,
    job_id_header: String,
    client: Client,
}

impl RemoteJobClient {
    /// Builds a client. Fails without touching the network when the
    /// credential is missing or an endpoint is not a valid URL.
    pub fn new(config: &RemoteConfig) -> Result<Self, JobError> {
        if config.credential.trim().is_empty() {
            return Err(JobError::Configuration(
                "missing API credential (set FORECAST_API_KEY)".into(),
            ));
        }
        if config.endpoint.trim().is_empty() {
            return Err(JobError::Configuration("missing endpoint URL".into()));
        }
        let status_endpoint = config.status_endpoint();
        for url in [&config.endpoint, &status_endpoint] {
            Url::parse(url)
                .map_err(|e| JobError::Configuration(format!("invalid endpoint {url:?}: {e}")))?;
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| JobError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            credential: config.credential.clone(),
            endpoint: config.endpoint.clone(),
            status_endpoint,
            job_id_header: config.job_id_header.clone(),
            client,
        })
    }

    /// Status URL for a job id returned by the service.
    pub fn status_url(&self, id: &str) -> String {
        format!("{}/{}", self.status_endpoint.trim_end_matches('/'), id)
    }

    fn job_id(&self, headers: &HeaderMap, body: &[u8]) -> Option<String> {
        if let Some(id) = headers
            .get(self.job_id_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            return Some(id.to_string());
        }

        let value: serde_json::Value = serde_json::from_slice(body).ok()?;
        BODY_ID_FIELDS.iter().find_map(|field| match &value[*field] {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }
}

async fn read_result(response: Response) -> Result<RawResult, JobError> {
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let bytes = response.bytes().await?;
    Ok(RawResult::new(bytes.to_vec(), content_type))
}

async fn error_message(response: Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string())
}

fn unexpected_status(status: StatusCode) -> JobError {
    JobError::Protocol(format!("unexpected status {}", status.as_u16()))
}

impl JobService for RemoteJobClient {
    async fn submit(&self, request: &JobRequest) -> Result<SubmitOutcome, JobError> {
        log::debug!("POST {} ({:?})", self.endpoint, request);
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.credential)
            .header(ACCEPT, "*/*")
            .json(request)
            .send()
            .await?;

        let status = response.status();

        if status == StatusCode::ACCEPTED {
            let headers = response.headers().clone();
            let body = response.bytes().await?;
            let id = self.job_id(&headers, &body).ok_or_else(|| {
                JobError::Protocol("202 Accepted without a job identifier".into())
            })?;
            let status_url = self.status_url(&id);
            return Ok(SubmitOutcome::Accepted(JobHandle { id, status_url }));
        }

        if status.is_success() {
            return Ok(SubmitOutcome::Completed(read_result(response).await?));
        }

        if status.is_client_error() {
            return Ok(SubmitOutcome::Rejected(Rejection {
                status: status.as_u16(),
                message: error_message(response).await,
            }));
        }

        if status.is_server_error() {
            return Err(JobError::Transient {
                status: Some(status.as_u16()),
                message: error_message(response).await,
            });
        }

        Err(unexpected_status(status))
    }

    async fn poll(&self, handle: &JobHandle) -> Result<PollOutcome, JobError> {
        log::debug!("GET {}", handle.status_url);
        let response = self
            .client
            .get(&handle.status_url)
            .bearer_auth(&self.credential)
            .header(ACCEPT, "*/*")
            .send()
            .await?;

        let status = response.status();

        if status == StatusCode::ACCEPTED {
            return Ok(PollOutcome::Pending);
        }

        if status.is_success() {
            return Ok(PollOutcome::Completed(read_result(response).await?));
        }

        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(JobError::InvalidHandle(handle.id.clone()));
        }

        if status.is_client_error() {
            return Ok(PollOutcome::Rejected(Rejection {
                status: status.as_u16(),
                message: error_message(response).await,
            }));
        }

        if status.is_server_error() {
            return Err(JobError::Transient {
                status: Some(status.as_u16()),
                message: error_message(response).await,
            });
        }

        Err(unexpected_status(status))
    }
}
