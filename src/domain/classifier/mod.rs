//! Failure classification.
//!
//! - `publish` - transport failures into [`PublishErrorType`] for retry decisions
//! - `persistence` - insert failures into [`InsertFailure`] for idempotent inserts

mod persistence;
mod publish;

pub use persistence::{
    classify_insert_failure, InsertFailure, PersistenceFailure, PgErrorCode,
    MESSAGE_ID_CONSTRAINT,
};
pub use publish::{classify, classify_message, PublishErrorType, TransportError};
