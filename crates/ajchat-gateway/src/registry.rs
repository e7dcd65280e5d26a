use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, mpsc};
use tracing::trace;

use ajchat_types::identity::Identity;

use crate::session::{ConnId, Outbound, Session};

/// Who a frame goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Every registered session, authenticated or not
    All,
    /// Sessions authenticated as this identity
    Identity(Identity),
    /// Everyone but one connection
    AllExcept(ConnId),
    /// A single connection
    Only(ConnId),
}

impl Audience {
    fn includes(&self, session: &Session) -> bool {
        match *self {
            Audience::All => true,
            Audience::Identity(identity) => session.identity() == Some(identity),
            Audience::AllExcept(conn) => session.id() != conn,
            Audience::Only(conn) => session.id() == conn,
        }
    }
}

/// Live connections and their identity/mood.
///
/// Constructed once at startup and shared by `Arc`; the lock is only taken
/// for writing on connect, identify, mood change and disconnect, so a
/// fan-out never observes a half-applied mutation.
pub struct SessionRegistry {
    next_id: AtomicU64,
    sessions: RwLock<BTreeMap<ConnId, Session>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            sessions: RwLock::new(BTreeMap::new()),
        }
    }

    /// Add a pending session. Frames delivered to it arrive on the receiver.
    pub async fn register(&self) -> (ConnId, mpsc::UnboundedReceiver<Outbound>) {
        let conn = ConnId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.sessions.write().await.insert(conn, Session::new(conn, tx));
        (conn, rx)
    }

    /// Authenticate `conn` as `identity`.
    ///
    /// `None` if the connection is unknown, otherwise `Some(previous identity)`.
    /// Several connections may hold the same identity.
    pub async fn set_identity(&self, conn: ConnId, identity: Identity) -> Option<Option<Identity>> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&conn)?;
        Some(session.authenticate(identity))
    }

    /// Update the mood of an authenticated session, returning its identity.
    pub async fn set_mood(&self, conn: ConnId, mood: Option<String>) -> Option<Identity> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&conn)?;
        let identity = session.identity()?;
        session.set_mood(mood);
        Some(identity)
    }

    /// Remove `conn`, returning the identity it had authenticated as.
    pub async fn unregister(&self, conn: ConnId) -> Option<Identity> {
        let mut session = self.sessions.write().await.remove(&conn)?;
        session.close()
    }

    pub async fn identity_of(&self, conn: ConnId) -> Option<Identity> {
        self.sessions.read().await.get(&conn).and_then(Session::identity)
    }

    /// Whether any session is authenticated as `identity`.
    pub async fn is_online(&self, identity: Identity) -> bool {
        self.sessions
            .read()
            .await
            .values()
            .any(|s| s.identity() == Some(identity))
    }

    /// Mood of the first session authenticated as `identity` that has one.
    pub async fn mood_of(&self, identity: Identity) -> Option<String> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.identity() == Some(identity))
            .find_map(|s| s.mood().map(str::to_string))
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Visit every session matching `predicate`, in connection order.
    pub async fn for_each<P, F>(&self, predicate: P, mut f: F)
    where
        P: Fn(&Session) -> bool,
        F: FnMut(&Session),
    {
        for session in self.sessions.read().await.values() {
            if predicate(session) {
                f(session);
            }
        }
    }

    /// Queue `frame` for every session in `audience`. Returns how many took it.
    pub async fn deliver(&self, audience: Audience, frame: Outbound) -> usize {
        let mut delivered = 0;
        self.for_each(
            |s| audience.includes(s),
            |s| {
                if s.send(&frame) {
                    delivered += 1;
                } else {
                    trace!("{} writer gone, frame dropped", s.id());
                }
            },
        )
        .await;
        delivered
    }
}
