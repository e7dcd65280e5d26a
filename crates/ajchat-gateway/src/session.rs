use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use ajchat_types::identity::Identity;

/// An encoded JSON frame, serialized once and shared by every recipient.
pub type Outbound = Arc<str>;

/// Registry-assigned connection handle. Ids only grow, so id order is
/// connection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnId(pub(crate) u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Connection lifecycle: `Pending` until a valid hello, then
/// `Authenticated`; `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Pending,
    Authenticated(Identity),
    Closed,
}

/// One live connection's runtime state.
pub struct Session {
    id: ConnId,
    state: SessionState,
    mood: Option<String>,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl Session {
    pub(crate) fn new(id: ConnId, tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            id,
            state: SessionState::Pending,
            mood: None,
            tx,
        }
    }

    pub fn id(&self) -> ConnId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn identity(&self) -> Option<Identity> {
        match self.state {
            SessionState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn mood(&self) -> Option<&str> {
        self.mood.as_deref()
    }

    /// Move to `Authenticated`. Returns the identity held before, if any.
    /// A closed session stays closed.
    pub(crate) fn authenticate(&mut self, identity: Identity) -> Option<Identity> {
        let previous = self.identity();
        if self.state != SessionState::Closed {
            self.state = SessionState::Authenticated(identity);
        }
        previous
    }

    pub(crate) fn set_mood(&mut self, mood: Option<String>) {
        self.mood = mood;
    }

    /// Move to `Closed`, returning the identity the session had reached.
    pub(crate) fn close(&mut self) -> Option<Identity> {
        let identity = self.identity();
        self.state = SessionState::Closed;
        identity
    }

    /// Queue a frame. False if the connection's writer is gone.
    pub(crate) fn send(&self, frame: &Outbound) -> bool {
        self.tx.send(frame.clone()).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_transitions() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut session = Session::new(ConnId(1), tx);
        assert_eq!(session.state(), SessionState::Pending);
        assert_eq!(session.identity(), None);

        assert_eq!(session.authenticate(Identity::J), None);
        assert_eq!(session.state(), SessionState::Authenticated(Identity::J));

        assert_eq!(session.authenticate(Identity::A), Some(Identity::J));
        assert_eq!(session.close(), Some(Identity::A));
        assert_eq!(session.state(), SessionState::Closed);

        // Terminal.
        session.authenticate(Identity::J);
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn closing_a_pending_session_reports_no_identity() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut session = Session::new(ConnId(7), tx);
        assert_eq!(session.close(), None);
    }

    #[test]
    fn send_fails_once_receiver_is_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session::new(ConnId(1), tx);
        let frame: Outbound = Arc::from("{}");
        assert!(session.send(&frame));
        drop(rx);
        assert!(!session.send(&frame));
    }
}
