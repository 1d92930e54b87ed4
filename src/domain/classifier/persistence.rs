//! Persistence failure classification for outbox inserts.
//!
//! A producer that retries its business transaction re-submits the same
//! `message_id`. That unique violation means "already recorded" and must be
//! told apart from every other write failure, including unique violations on
//! other constraints.

/// PostgreSQL SQLSTATE codes the outbox cares about.
///
/// Full list: <https://www.postgresql.org/docs/current/errcodes-appendix.html>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PgErrorCode;

impl PgErrorCode {
    /// Unique violation (duplicate key) - Code 23505
    pub const UNIQUE_VIOLATION: &'static str = "23505";

    /// Check constraint violation - Code 23514
    pub const CHECK_VIOLATION: &'static str = "23514";

    /// Not null violation - Code 23502
    pub const NOT_NULL_VIOLATION: &'static str = "23502";

    #[inline]
    pub fn is_unique_violation(code: &str) -> bool {
        code == Self::UNIQUE_VIOLATION
    }
}

/// Name of the unique constraint on `outbox.message_id`.
pub const MESSAGE_ID_CONSTRAINT: &str = "outbox_message_id_key";

const UNIQUE_VIOLATION_PATTERNS: &[&str] = &[
    "duplicate key value violates unique constraint",
    "unique constraint failed",
];

/// Database failure reduced to the fields classification needs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PersistenceFailure {
    /// SQLSTATE, when the backend reported one
    pub code: Option<String>,
    /// Violated constraint, when the backend reported one
    pub constraint: Option<String>,
    pub message: String,
}

impl PersistenceFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }

    /// The failure a second insert of `message_id` produces.
    pub fn duplicate_message_id(message_id: &str) -> Self {
        Self::new(format!(
            "duplicate key value violates unique constraint \"{}\" (message_id)=({})",
            MESSAGE_ID_CONSTRAINT, message_id
        ))
        .with_code(PgErrorCode::UNIQUE_VIOLATION)
        .with_constraint(MESSAGE_ID_CONSTRAINT)
    }
}

/// Typed outcome of classifying a failed insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertFailure {
    /// The `message_id` is already recorded.
    Duplicate,
    /// Anything else.
    Other,
}

/// Classifies a failed insert by SQLSTATE and/or message pattern.
pub fn classify_insert_failure(failure: &PersistenceFailure) -> InsertFailure {
    let message = failure.message.to_lowercase();

    let unique_violation = failure
        .code
        .as_deref()
        .map(PgErrorCode::is_unique_violation)
        .unwrap_or(false)
        || UNIQUE_VIOLATION_PATTERNS.iter().any(|p| message.contains(p));

    if !unique_violation {
        return InsertFailure::Other;
    }

    let on_message_id = match failure.constraint.as_deref() {
        Some(constraint) => constraint.contains("message_id"),
        None => message.contains("message_id"),
    };

    if on_message_id {
        InsertFailure::Duplicate
    } else {
        InsertFailure::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_message_id_is_duplicate() {
        let failure = PersistenceFailure::duplicate_message_id("m-1");
        assert_eq!(classify_insert_failure(&failure), InsertFailure::Duplicate);
    }

    #[test]
    fn code_and_constraint_are_enough() {
        let failure = PersistenceFailure::new("error returned from database")
            .with_code("23505")
            .with_constraint(MESSAGE_ID_CONSTRAINT);
        assert_eq!(classify_insert_failure(&failure), InsertFailure::Duplicate);
    }

    #[test]
    fn message_pattern_works_without_code() {
        let failure = PersistenceFailure::new(
            "ERROR: duplicate key value violates unique constraint \"outbox_message_id_key\"",
        );
        assert_eq!(classify_insert_failure(&failure), InsertFailure::Duplicate);
    }

    #[test]
    fn unique_violation_on_other_constraint_is_other() {
        let failure = PersistenceFailure::new("duplicate key value violates unique constraint \"outbox_pkey\"")
            .with_code(PgErrorCode::UNIQUE_VIOLATION)
            .with_constraint("outbox_pkey");
        assert_eq!(classify_insert_failure(&failure), InsertFailure::Other);
    }

    #[test]
    fn non_unique_constraint_failure_is_other() {
        let failure = PersistenceFailure::new("new row violates check constraint \"outbox_state_check\"")
            .with_code(PgErrorCode::CHECK_VIOLATION)
            .with_constraint("outbox_state_check");
        assert_eq!(classify_insert_failure(&failure), InsertFailure::Other);
    }

    #[test]
    fn connectivity_failure_is_other() {
        let failure = PersistenceFailure::new("connection reset by peer");
        assert_eq!(classify_insert_failure(&failure), InsertFailure::Other);
    }
}
