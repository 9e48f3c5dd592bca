use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::JobState;
use crate::remote::{JobHandle, JobRequest};

/// Bounded retry for transient failures, with a flat cool-down between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Wait between attempts.
    pub cooldown: Duration,
}

impl RetryPolicy {
    /// Total number of attempts this policy permits.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Whether another attempt is allowed after `failures` consecutive
    /// transient failures.
    pub fn should_retry(&self, failures: u32) -> bool {
        failures <= self.max_retries
    }
}

/// One remote inference request and what has happened to it so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Local id, unrelated to the service's job id.
    pub id: String,
    pub request: JobRequest,
    pub state: JobState,
    pub state_history: Vec<JobState>,
    pub handle: Option<JobHandle>,
    pub submit_attempts: u32,
    pub polls: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(request: JobRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            request,
            state: JobState::Submitted,
            state_history: Vec::new(),
            handle: None,
            submit_attempts: 0,
            polls: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub(super) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Audit record written once a run ends, whatever the outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: String,
    pub remote_id: Option<String>,
    pub input_selector: String,
    pub final_state: JobState,
    pub state_transitions: Vec<JobState>,
    pub submit_attempts: u32,
    pub polls: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl JobReport {
    pub fn from_job(job: &Job) -> Self {
        let now = Utc::now();
        let duration = now - job.created_at;
        let mut transitions = job.state_history.clone();
        transitions.push(job.state);

        Self {
            job_id: job.id.clone(),
            remote_id: job.handle.as_ref().map(|h| h.id.clone()),
            input_selector: job.request.input_selector.clone(),
            final_state: job.state,
            state_transitions: transitions,
            submit_attempts: job.submit_attempts,
            polls: job.polls,
            started_at: job.created_at,
            finished_at: now,
            duration_ms: duration.num_milliseconds(),
        }
    }
}
