//! Remote job handling: failure classification and adaptive polling.

pub mod classifier;
pub mod poller;

pub use classifier::{Outcome, classify};
pub use poller::{AdaptiveJobPoller, PollConfig};
