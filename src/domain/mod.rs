//! Domain layer containing the outbox model and failure classification.
//!
//! # Module Organization
//!
//! - `outbox` - Outbox event, delivery state, exit and retry status, store errors
//! - `classifier` - Pure classification of transport and persistence failures
//! - `state_machine` - Validated transitions for lifecycle enums

pub mod classifier;
pub mod outbox;
pub mod state_machine;
