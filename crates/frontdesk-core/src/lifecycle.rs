//! Session lifecycle state machine with validated transitions.
//!
//! Open -> Active (first agent message)
//! Open/Active -> Closed (explicit close)
//! Closed is terminal.

use crate::error::FrontdeskError;
use crate::types::SessionStatus;

/// Something that can move a session between states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// An agent sent a message into the session.
    AgentMessage,
    /// Staff closed the session.
    Close,
}

/// Validate that a status transition is allowed.
///
/// Valid transitions:
/// - Open -> Active
/// - Open -> Closed
/// - Active -> Closed
pub fn validate_transition(from: SessionStatus, to: SessionStatus) -> Result<(), FrontdeskError> {
    let valid = matches!(
        (from, to),
        (SessionStatus::Open, SessionStatus::Active)
            | (SessionStatus::Open, SessionStatus::Closed)
            | (SessionStatus::Active, SessionStatus::Closed)
    );

    if valid {
        Ok(())
    } else {
        Err(FrontdeskError::InvalidTransition { from, to })
    }
}

impl SessionStatus {
    /// Compute the status after `event`.
    ///
    /// An agent message into an already active session leaves it active.
    /// Any event against a closed session is rejected.
    pub fn apply(self, event: LifecycleEvent) -> Result<SessionStatus, FrontdeskError> {
        let target = match event {
            LifecycleEvent::AgentMessage => SessionStatus::Active,
            LifecycleEvent::Close => SessionStatus::Closed,
        };
        if self == target && self != SessionStatus::Closed {
            return Ok(self);
        }
        validate_transition(self, target)?;
        Ok(target)
    }

    pub fn is_closed(&self) -> bool {
        *self == SessionStatus::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =====================================================================
    // Valid transitions
    // =====================================================================

    #[test]
    fn test_open_to_active() {
        assert!(validate_transition(SessionStatus::Open, SessionStatus::Active).is_ok());
    }

    #[test]
    fn test_open_to_closed() {
        assert!(validate_transition(SessionStatus::Open, SessionStatus::Closed).is_ok());
    }

    #[test]
    fn test_active_to_closed() {
        assert!(validate_transition(SessionStatus::Active, SessionStatus::Closed).is_ok());
    }

    // =====================================================================
    // Invalid transitions
    // =====================================================================

    #[test]
    fn test_active_to_open_invalid() {
        assert!(validate_transition(SessionStatus::Active, SessionStatus::Open).is_err());
    }

    #[test]
    fn test_closed_is_terminal() {
        for to in [SessionStatus::Open, SessionStatus::Active, SessionStatus::Closed] {
            assert!(validate_transition(SessionStatus::Closed, to).is_err());
        }
    }

    #[test]
    fn test_self_transitions_invalid() {
        assert!(validate_transition(SessionStatus::Open, SessionStatus::Open).is_err());
        assert!(validate_transition(SessionStatus::Active, SessionStatus::Active).is_err());
    }

    // =====================================================================
    // Events
    // =====================================================================

    #[test]
    fn test_agent_message_activates_open_session() {
        assert_eq!(
            SessionStatus::Open.apply(LifecycleEvent::AgentMessage).unwrap(),
            SessionStatus::Active
        );
    }

    #[test]
    fn test_agent_message_keeps_active() {
        assert_eq!(
            SessionStatus::Active.apply(LifecycleEvent::AgentMessage).unwrap(),
            SessionStatus::Active
        );
    }

    #[test]
    fn test_close_from_open_and_active() {
        assert_eq!(
            SessionStatus::Open.apply(LifecycleEvent::Close).unwrap(),
            SessionStatus::Closed
        );
        assert_eq!(
            SessionStatus::Active.apply(LifecycleEvent::Close).unwrap(),
            SessionStatus::Closed
        );
    }

    #[test]
    fn test_closed_rejects_every_event() {
        let err = SessionStatus::Closed
            .apply(LifecycleEvent::AgentMessage)
            .unwrap_err();
        assert!(matches!(
            err,
            FrontdeskError::InvalidTransition {
                from: SessionStatus::Closed,
                to: SessionStatus::Active
            }
        ));
        assert!(SessionStatus::Closed.apply(LifecycleEvent::Close).is_err());
    }

    #[test]
    fn test_event_sequences_never_regress() {
        // Walk every event sequence of length 4 and check the status order.
        let events = [LifecycleEvent::AgentMessage, LifecycleEvent::Close];
        let rank = |s: SessionStatus| match s {
            SessionStatus::Open => 0,
            SessionStatus::Active => 1,
            SessionStatus::Closed => 2,
        };
        for mask in 0..16u32 {
            let mut status = SessionStatus::Open;
            for i in 0..4 {
                let event = events[((mask >> i) & 1) as usize];
                if let Ok(next) = status.apply(event) {
                    assert!(rank(next) >= rank(status));
                    status = next;
                }
            }
        }
    }
}
