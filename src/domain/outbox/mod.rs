//! Outbox domain - the event row, its delivery state and outcome tags.

mod errors;
mod event;
mod state;
mod status;

pub use errors::OutboxError;
pub use event::{validate_schema, NewOutboxEvent, OutboxEvent, DEFAULT_CLAIM_TIMEOUT, DEFAULT_SCHEMA};
pub use state::OutboxState;
pub use status::{ExitStatus, RetryStatus};
