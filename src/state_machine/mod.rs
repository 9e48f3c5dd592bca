mod job;
mod state;

pub use job::{Job, JobReport, RetryPolicy};
pub use state::{JobState, StateMachine, Transition};
