//! Delivery state of an outbox row.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::state_machine::StateMachine;

/// Delivery state of an outbox event.
///
/// ```text
/// pending --> processing --> published
///    ^            |    \
///    |            |     --> failed
///    +------------+  (re-queue with error_message)
/// ```
///
/// A relay that publishes without claiming may also move `pending`
/// straight to `published` or `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutboxState {
    #[default]
    Pending,
    Processing,
    Published,
    Failed,
}

impl OutboxState {
    pub const ALL: [OutboxState; 4] = [
        OutboxState::Pending,
        OutboxState::Processing,
        OutboxState::Published,
        OutboxState::Failed,
    ];

    /// States a row may be in for an update to `target` to apply.
    ///
    /// Re-queueing also refreshes the error of a row that is already pending.
    pub fn sources_of(target: OutboxState) -> Vec<OutboxState> {
        Self::ALL
            .into_iter()
            .filter(|state| {
                state.can_transition_to(&target)
                    || (target == OutboxState::Pending && *state == OutboxState::Pending)
            })
            .collect()
    }

    /// Stable string form, as stored in the `state` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxState::Pending => "pending",
            OutboxState::Processing => "processing",
            OutboxState::Published => "published",
            OutboxState::Failed => "failed",
        }
    }

    /// Returns true if a relay poll may pick this row up.
    pub fn is_deliverable(&self) -> bool {
        matches!(self, OutboxState::Pending)
    }
}

impl StateMachine for OutboxState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use OutboxState::*;
        matches!(
            (self, target),
            (Pending, Processing)
                | (Pending, Published)
                | (Pending, Failed)
                | (Processing, Published)
                | (Processing, Failed)
                | (Processing, Pending)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use OutboxState::*;
        match self {
            Pending => vec![Processing, Published, Failed],
            Processing => vec![Published, Failed, Pending],
            Published | Failed => vec![],
        }
    }
}

impl fmt::Display for OutboxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutboxState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OutboxState::Pending),
            "processing" => Ok(OutboxState::Processing),
            "published" => Ok(OutboxState::Published),
            "failed" => Ok(OutboxState::Failed),
            other => Err(format!("unknown outbox state '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_sources_follow_transitions() {
        assert_eq!(
            OutboxState::sources_of(OutboxState::Published),
            vec![OutboxState::Pending, OutboxState::Processing]
        );
        assert_eq!(
            OutboxState::sources_of(OutboxState::Processing),
            vec![OutboxState::Pending]
        );
        assert_eq!(
            OutboxState::sources_of(OutboxState::Pending),
            vec![OutboxState::Pending, OutboxState::Processing]
        );
    }

    #[test]
    fn default_is_pending() {
        assert_eq!(OutboxState::default(), OutboxState::Pending);
    }

    #[test]
    fn processing_can_be_requeued() {
        assert!(OutboxState::Processing.can_transition_to(&OutboxState::Pending));
        assert_eq!(
            OutboxState::Processing.transition_to(OutboxState::Pending).unwrap(),
            OutboxState::Pending
        );
    }

    #[test]
    fn terminal_states_reject_every_transition() {
        for terminal in [OutboxState::Published, OutboxState::Failed] {
            assert!(terminal.is_terminal());
            for target in OutboxState::ALL {
                assert!(terminal.transition_to(target).is_err());
            }
        }
    }

    #[test]
    fn only_pending_is_deliverable() {
        assert!(OutboxState::Pending.is_deliverable());
        assert!(!OutboxState::Processing.is_deliverable());
        assert!(!OutboxState::Published.is_deliverable());
        assert!(!OutboxState::Failed.is_deliverable());
    }

    #[test]
    fn parses_its_own_string_form() {
        for state in [
            OutboxState::Pending,
            OutboxState::Processing,
            OutboxState::Published,
            OutboxState::Failed,
        ] {
            assert_eq!(state.as_str().parse::<OutboxState>().unwrap(), state);
        }
        assert!("done".parse::<OutboxState>().is_err());
    }
}
