use std::fmt;

use serde::{Deserialize, Serialize};

use super::job::Job;
use crate::remote::JobError;

/// Lifecycle of a single remote job.
///
/// `Submitted → {Accepted → Pending* → (Completed | Rejected | InvalidHandle)} | Completed | Rejected`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Submitted,
    Accepted,
    Pending,
    Completed,
    Rejected,
    InvalidHandle,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Rejected | JobState::InvalidHandle
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Submitted => write!(f, "SUBMITTED"),
            JobState::Accepted => write!(f, "ACCEPTED"),
            JobState::Pending => write!(f, "PENDING"),
            JobState::Completed => write!(f, "COMPLETED"),
            JobState::Rejected => write!(f, "REJECTED"),
            JobState::InvalidHandle => write!(f, "INVALID_HANDLE"),
        }
    }
}

/// The result of applying a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Moved to a non-terminal state; the job is still in flight.
    Next(JobState),
    /// Reached a terminal state.
    Terminal(JobState),
}

/// Drives a `Job` through its states, refusing anything the lifecycle
/// does not allow.
pub struct StateMachine;

impl StateMachine {
    fn allowed(from: JobState, to: JobState) -> bool {
        use JobState::*;
        match from {
            Submitted => matches!(to, Accepted | Completed | Rejected),
            Accepted | Pending => matches!(to, Pending | Completed | Rejected | InvalidHandle),
            Completed | Rejected | InvalidHandle => false,
        }
    }

    /// Move `job` to `to`, recording the previous state in its history.
    ///
    /// Terminal states are never left, and `Submitted` is never re-entered.
    pub fn advance(job: &mut Job, to: JobState) -> Result<Transition, JobError> {
        let from = job.state;
        if !Self::allowed(from, to) {
            return Err(JobError::IllegalTransition { from, to });
        }

        job.state_history.push(from);
        job.state = to;
        job.touch();

        if to.is_terminal() {
            Ok(Transition::Terminal(to))
        } else {
            Ok(Transition::Next(to))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::JobRequest;

    fn make_job() -> Job {
        Job::new(JobRequest::new("0", 1, 4))
    }

    #[test]
    fn deferred_path_walks_all_states() {
        let mut job = make_job();
        assert_eq!(job.state, JobState::Submitted);

        let t = StateMachine::advance(&mut job, JobState::Accepted).unwrap();
        assert_eq!(t, Transition::Next(JobState::Accepted));

        let t = StateMachine::advance(&mut job, JobState::Pending).unwrap();
        assert_eq!(t, Transition::Next(JobState::Pending));

        let t = StateMachine::advance(&mut job, JobState::Pending).unwrap();
        assert_eq!(t, Transition::Next(JobState::Pending));

        let t = StateMachine::advance(&mut job, JobState::Completed).unwrap();
        assert_eq!(t, Transition::Terminal(JobState::Completed));

        assert_eq!(
            job.state_history,
            vec![
                JobState::Submitted,
                JobState::Accepted,
                JobState::Pending,
                JobState::Pending
            ]
        );
    }

    #[test]
    fn synchronous_completion_is_terminal() {
        let mut job = make_job();
        let t = StateMachine::advance(&mut job, JobState::Completed).unwrap();
        assert_eq!(t, Transition::Terminal(JobState::Completed));
        assert!(job.state.is_terminal());
    }

    #[test]
    fn terminal_states_are_never_left() {
        for terminal in [
            JobState::Completed,
            JobState::Rejected,
            JobState::InvalidHandle,
        ] {
            let mut job = make_job();
            StateMachine::advance(&mut job, JobState::Accepted).unwrap();
            StateMachine::advance(&mut job, terminal).unwrap();

            let err = StateMachine::advance(&mut job, JobState::Pending).unwrap_err();
            assert!(matches!(err, JobError::IllegalTransition { from, .. } if from == terminal));
            assert_eq!(job.state, terminal);
        }
    }

    #[test]
    fn invalid_handle_requires_a_handle() {
        let mut job = make_job();
        let err = StateMachine::advance(&mut job, JobState::InvalidHandle).unwrap_err();
        assert!(matches!(err, JobError::IllegalTransition { .. }));
        assert!(job.state_history.is_empty());
    }

    #[test]
    fn submitted_is_never_reentered() {
        let mut job = make_job();
        StateMachine::advance(&mut job, JobState::Accepted).unwrap();
        assert!(StateMachine::advance(&mut job, JobState::Submitted).is_err());
    }

    #[test]
    fn state_display() {
        assert_eq!(JobState::Submitted.to_string(), "SUBMITTED");
        assert_eq!(JobState::Pending.to_string(), "PENDING");
        assert_eq!(JobState::InvalidHandle.to_string(), "INVALID_HANDLE");
    }
}
