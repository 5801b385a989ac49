//! Connection lifecycle.

use serde::Serialize;

use crate::domain::foundation::StateMachine;

/// Lifecycle of a persistent connection.
///
/// `Connecting` covers registration and the `connected` notice and is
/// tracked by the socket handler only. A connection is registered with the
/// hub while it is `Open`; `Closed` is terminal and never revived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl StateMachine for ConnectionState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use ConnectionState::*;
        // A failed handshake goes straight to Closed.
        matches!((self, target), (Connecting, Open) | (Connecting, Closed) | (Open, Closed))
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ConnectionState::*;
        match self {
            Connecting => vec![Open, Closed],
            Open => vec![Closed],
            Closed => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connecting_opens() {
        assert_eq!(
            ConnectionState::Connecting.transition_to(ConnectionState::Open),
            Ok(ConnectionState::Open)
        );
    }

    #[test]
    fn open_closes() {
        assert_eq!(
            ConnectionState::Open.transition_to(ConnectionState::Closed),
            Ok(ConnectionState::Closed)
        );
    }

    #[test]
    fn closed_is_terminal() {
        assert!(ConnectionState::Closed.is_terminal());
        assert!(ConnectionState::Closed
            .transition_to(ConnectionState::Open)
            .is_err());
    }

    #[test]
    fn open_cannot_reenter_connecting() {
        assert!(!ConnectionState::Open.can_transition_to(&ConnectionState::Connecting));
    }

    #[test]
    fn refused_connection_closes_without_opening() {
        assert_eq!(
            ConnectionState::Connecting.transition_to(ConnectionState::Closed),
            Ok(ConnectionState::Closed)
        );
    }
}
