//! Pacing for asynchronous Metadata API jobs

pub mod backoff;

pub use backoff::{PollConfig, PollOutcome, PollPolicy};
