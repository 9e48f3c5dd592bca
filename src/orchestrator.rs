use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;

use crate::config::RemoteConfig;
use crate::remote::{
    DecodedPayload, JobError, JobHandle, JobService, PollOutcome, RawResult, SubmitOutcome,
    decode,
};
use crate::state_machine::{Job, JobState, RetryPolicy, StateMachine, Transition};

/// Shared cancellation flag. Waits and remote calls race against it, so
/// cancelling interrupts them instead of waiting for them to finish.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<watch::Sender<bool>>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            cancelled: Arc::new(tx),
        }
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.cancelled.subscribe();
        // The sender lives in `self`, so this only returns once cancelled.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Hooks for reporting progress while a job runs. Both default to no-ops.
pub trait RunObserver {
    fn on_state(&self, _state: JobState) {}
    fn on_retry(&self, _attempt: u32, _max: u32, _reason: &JobError) {}
}

impl RunObserver for () {}

impl<T: RunObserver + ?Sized> RunObserver for &T {
    fn on_state(&self, state: JobState) {
        (**self).on_state(state);
    }

    fn on_retry(&self, attempt: u32, max: u32, reason: &JobError) {
        (**self).on_retry(attempt, max, reason);
    }
}

/// Submits one job, waits for it and decodes the result.
pub struct JobRunner<S, O = ()> {
    service: S,
    policy: RetryPolicy,
    poll_interval: Duration,
    max_polls: u32,
    cancel: CancellationToken,
    observer: O,
}

impl<S: JobService> JobRunner<S> {
    pub fn new(service: S, config: &RemoteConfig) -> Self {
        Self {
            service,
            policy: config.retry_policy(),
            poll_interval: config.poll_interval(),
            max_polls: config.max_polls,
            cancel: CancellationToken::new(),
            observer: (),
        }
    }
}

impl<S: JobService, O: RunObserver> JobRunner<S, O> {
    pub fn with_observer<P: RunObserver>(self, observer: P) -> JobRunner<S, P> {
        JobRunner {
            service: self.service,
            policy: self.policy,
            poll_interval: self.poll_interval,
            max_polls: self.max_polls,
            cancel: self.cancel,
            observer,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run `job` to a terminal state.
    ///
    /// Rejections, invalid handles, exhausted retries and cancellation come
    /// back as errors. A payload that cannot be decoded is still `Ok`.
    pub async fn run(&self, job: &mut Job) -> Result<DecodedPayload, JobError> {
        job.request.validate()?;

        let raw = match self.submit_with_retry(job).await? {
            SubmitOutcome::Completed(raw) => {
                self.enter(job, JobState::Completed)?;
                raw
            }
            SubmitOutcome::Rejected(rejection) => {
                self.enter(job, JobState::Rejected)?;
                return Err(rejection.into());
            }
            SubmitOutcome::Accepted(handle) => {
                log::info!("job accepted as {}", handle.id);
                job.handle = Some(handle.clone());
                self.enter(job, JobState::Accepted)?;
                self.poll_until_resolved(job, &handle).await?
            }
        };

        log::info!(
            "job {} completed with {} bytes ({})",
            job.id,
            raw.bytes.len(),
            if raw.content_type.is_empty() {
                "untyped"
            } else {
                raw.content_type.as_str()
            }
        );
        Ok(decode(raw))
    }

    fn enter(&self, job: &mut Job, state: JobState) -> Result<(), JobError> {
        match StateMachine::advance(job, state)? {
            Transition::Next(state) => self.observer.on_state(state),
            Transition::Terminal(state) => {
                log::debug!("job {} reached {state}", job.id);
                self.observer.on_state(state);
            }
        }
        Ok(())
    }

    fn check_cancelled(&self) -> Result<(), JobError> {
        if self.cancel.is_cancelled() {
            Err(JobError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Runs `call` unless the job is cancelled first.
    async fn guarded<T>(
        &self,
        call: impl Future<Output = Result<T, JobError>>,
    ) -> Result<T, JobError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(JobError::Cancelled),
            result = call => result,
        }
    }

    async fn pause(&self, duration: Duration) -> Result<(), JobError> {
        self.check_cancelled()?;
        if !duration.is_zero() {
            self.guarded(async {
                sleep(duration).await;
                Ok(())
            })
            .await?;
        }
        self.check_cancelled()
    }

    async fn submit_with_retry(&self, job: &mut Job) -> Result<SubmitOutcome, JobError> {
        let mut failures = 0;
        loop {
            self.check_cancelled()?;
            job.submit_attempts += 1;

            match self.guarded(self.service.submit(&job.request)).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) if err.is_transient() => {
                    failures += 1;
                    if !self.policy.should_retry(failures) {
                        return Err(JobError::RetriesExhausted {
                            attempts: job.submit_attempts,
                            last: Box::new(err),
                        });
                    }
                    log::warn!(
                        "submit attempt {}/{} failed: {err} (waiting {:?})",
                        job.submit_attempts,
                        self.policy.max_attempts(),
                        self.policy.cooldown
                    );
                    self.observer
                        .on_retry(failures, self.policy.max_retries, &err);
                    self.pause(self.policy.cooldown).await?;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn poll_until_resolved(
        &self,
        job: &mut Job,
        handle: &JobHandle,
    ) -> Result<RawResult, JobError> {
        let mut failures = 0;
        loop {
            if job.polls >= self.max_polls {
                return Err(JobError::PollLimitExceeded {
                    id: handle.id.clone(),
                    polls: job.polls,
                });
            }
            self.pause(self.poll_interval).await?;
            job.polls += 1;

            match self.guarded(self.service.poll(handle)).await {
                Ok(PollOutcome::Pending) => {
                    failures = 0;
                    log::debug!("job {} pending after poll {}", handle.id, job.polls);
                    self.enter(job, JobState::Pending)?;
                }
                Ok(PollOutcome::Completed(raw)) => {
                    self.enter(job, JobState::Completed)?;
                    return Ok(raw);
                }
                Ok(PollOutcome::Rejected(rejection)) => {
                    self.enter(job, JobState::Rejected)?;
                    return Err(rejection.into());
                }
                Err(JobError::InvalidHandle(id)) => {
                    self.enter(job, JobState::InvalidHandle)?;
                    return Err(JobError::InvalidHandle(id));
                }
                Err(err) if err.is_transient() => {
                    failures += 1;
                    if !self.policy.should_retry(failures) {
                        return Err(JobError::RetriesExhausted {
                            attempts: failures,
                            last: Box::new(err),
                        });
                    }
                    // The handle is still valid; the next poll retries it.
                    log::warn!("poll {} for job {} failed: {err}", job.polls, handle.id);
                    self.observer
                        .on_retry(failures, self.policy.max_retries, &err);
                }
                Err(err) => return Err(err),
            }
        }
    }
}
