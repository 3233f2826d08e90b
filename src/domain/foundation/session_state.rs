//! SessionState enum for tracking the lifecycle of a live connection.

use std::fmt;

use super::StateMachine;

/// Lifecycle state of one connection session.
///
/// `Connecting → Active → Closing → Closed`. Nothing re-enters `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Connecting,
    Active,
    Closing,
    Closed,
}

impl StateMachine for SessionState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SessionState::*;
        matches!(
            (self, target),
            (Connecting, Active) | (Connecting, Closing) | (Active, Closing) | (Closing, Closed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SessionState::*;
        match self {
            Connecting => vec![Active, Closing],
            Active => vec![Closing],
            Closing => vec![Closed],
            Closed => vec![],
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Connecting => "connecting",
            SessionState::Active => "active",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_connecting() {
        assert_eq!(SessionState::default(), SessionState::Connecting);
    }

    #[test]
    fn happy_path_is_valid() {
        let state = SessionState::Connecting
            .transition_to(SessionState::Active)
            .and_then(|s| s.transition_to(SessionState::Closing))
            .and_then(|s| s.transition_to(SessionState::Closed))
            .unwrap();
        assert_eq!(state, SessionState::Closed);
    }

    #[test]
    fn nothing_re_enters_active() {
        assert!(!SessionState::Closing.can_transition_to(&SessionState::Active));
        assert!(!SessionState::Closed.can_transition_to(&SessionState::Active));
        assert!(!SessionState::Active.can_transition_to(&SessionState::Active));
    }

    #[test]
    fn closed_is_terminal() {
        assert!(SessionState::Closed.is_terminal());
        assert!(!SessionState::Closing.is_terminal());
    }

    #[test]
    fn display_is_lowercase() {
        assert_eq!(SessionState::Closing.to_string(), "closing");
    }
}
