pub mod client;
pub mod decode;
pub mod error;
pub mod types;

pub use client::{JobService, RemoteJobClient};
pub use decode::{DecodedPayload, decode};
pub use error::JobError;
pub use types::{JobHandle, JobRequest, PollOutcome, RawResult, Rejection, SubmitOutcome};
