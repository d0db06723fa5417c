//! Detection request pipeline
//!
//! - `orchestrator`: decode → estimate → validate → persist for one request
//! - `outcome`: the tagged result handed to the transport layer

mod orchestrator;
mod outcome;

pub use orchestrator::DetectionOrchestrator;
pub use outcome::{DetectionOutcome, FailureReason, RejectionReason};
