use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use ajchat_db::{Collection, Record, Stores};
use ajchat_types::events::{ClientCommand, ServerEvent};
use ajchat_types::identity::Identity;
use ajchat_types::models::{CalendarEvent, Countdown, Media, Message, WishlistItem};
use ajchat_types::{HISTORY_LIMIT, MAX_TEXT_CHARS, now_millis, truncate_chars};

use crate::registry::{Audience, SessionRegistry};
use crate::session::{ConnId, Outbound};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("store operation failed: {0:#}")]
    Store(anyhow::Error),

    #[error("store task panicked or was cancelled: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("failed to encode outbound frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A collection that is broadcast as a full snapshot after every change.
trait Snapshot: Record {
    fn collection(stores: &Stores) -> &Collection<Self>;
    fn snapshot(records: Vec<Self>) -> ServerEvent;
}

impl Snapshot for CalendarEvent {
    fn collection(stores: &Stores) -> &Collection<Self> {
        &stores.calendar
    }

    fn snapshot(events: Vec<Self>) -> ServerEvent {
        ServerEvent::Calendar { events }
    }
}

impl Snapshot for WishlistItem {
    fn collection(stores: &Stores) -> &Collection<Self> {
        &stores.wishlist
    }

    fn snapshot(items: Vec<Self>) -> ServerEvent {
        ServerEvent::Wishlist { items }
    }
}

impl Snapshot for Countdown {
    fn collection(stores: &Stores) -> &Collection<Self> {
        &stores.countdowns
    }

    fn snapshot(countdowns: Vec<Self>) -> ServerEvent {
        ServerEvent::Countdowns { countdowns }
    }
}

/// Routes decoded client commands to the record stores and fans the results
/// out to connected sessions.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    registry: Arc<SessionRegistry>,
    stores: Stores,
    history_limit: usize,
}

impl Dispatcher {
    pub fn new(registry: Arc<SessionRegistry>, stores: Stores) -> Self {
        Self::with_history_limit(registry, stores, HISTORY_LIMIT)
    }

    pub fn with_history_limit(registry: Arc<SessionRegistry>, stores: Stores, history_limit: usize) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                registry,
                stores,
                history_limit,
            }),
        }
    }

    /// Register a new pending connection.
    pub async fn connect(&self) -> (ConnId, mpsc::UnboundedReceiver<Outbound>) {
        let (conn, rx) = self.inner.registry.register().await;
        info!("{} connected", conn);
        (conn, rx)
    }

    /// Close `conn`. Presence goes offline once an identity has no sessions left.
    pub async fn disconnect(&self, conn: ConnId) -> Result<(), DispatchError> {
        let identity = self.inner.registry.unregister(conn).await;
        info!(
            "{} disconnected ({})",
            conn,
            identity.map_or("never identified", Identity::as_str)
        );

        if let Some(identity) = identity {
            self.announce_offline_if_gone(identity).await?;
        }
        Ok(())
    }

    /// Decode one text frame and dispatch it. Frames that do not decode are
    /// logged and dropped; the connection stays up.
    pub async fn handle_frame(&self, conn: ConnId, text: &str) -> Result<(), DispatchError> {
        match serde_json::from_str::<ClientCommand>(text) {
            Ok(cmd) => self.handle_command(conn, cmd).await,
            Err(e) => {
                let cut = text.char_indices().nth(200).map_or(text.len(), |(i, _)| i);
                warn!("{} bad frame: {} -- raw: {}", conn, e, &text[..cut]);
                Ok(())
            }
        }
    }

    pub async fn handle_command(&self, conn: ConnId, cmd: ClientCommand) -> Result<(), DispatchError> {
        trace!("{} -> {}", conn, cmd.kind());

        match cmd {
            ClientCommand::Hello { user } => self.hello(conn, user).await,

            // Shared state is not attributed to anyone, so these run for
            // pending sessions too.
            ClientCommand::Clear {} => {
                let removed = self.blocking(|s| s.messages.clear()).await?;
                info!("{} cleared the history ({} messages)", conn, removed);
                self.send(Audience::All, &ServerEvent::History { messages: Vec::new() })
                    .await
            }

            ClientCommand::GetNotes {} => {
                let content = self.blocking(|s| s.notes.get()).await?;
                self.send(Audience::Only(conn), &ServerEvent::Notes { content }).await
            }

            ClientCommand::Notes { content } => {
                let content = self.blocking(move |s| s.notes.save(&content)).await?;
                self.send(Audience::AllExcept(conn), &ServerEvent::Notes { content })
                    .await
            }

            ClientCommand::GetCalendar {} => self.list_records::<CalendarEvent>(conn).await,
            ClientCommand::SaveCalendarEvent { event } => self.save_record(conn, event).await,
            ClientCommand::DeleteCalendarEvent { event_id } => {
                self.delete_record::<CalendarEvent>(conn, event_id).await
            }

            ClientCommand::GetWishlist {} => self.list_records::<WishlistItem>(conn).await,
            ClientCommand::SaveWishlistItem { item } => self.save_record(conn, item).await,
            ClientCommand::DeleteWishlistItem { item_id } => {
                self.delete_record::<WishlistItem>(conn, item_id).await
            }

            ClientCommand::GetCountdowns {} => self.list_records::<Countdown>(conn).await,
            ClientCommand::SaveCountdown { countdown } => self.save_record(conn, countdown).await,
            ClientCommand::DeleteCountdown { countdown_id } => {
                self.delete_record::<Countdown>(conn, countdown_id).await
            }

            cmd => self.handle_identified(conn, cmd).await,
        }
    }

    /// Commands that carry the sender's identity. Dropped until `hello`.
    async fn handle_identified(&self, conn: ConnId, cmd: ClientCommand) -> Result<(), DispatchError> {
        let Some(user) = self.inner.registry.identity_of(conn).await else {
            debug!("{} sent {} before hello, ignoring", conn, cmd.kind());
            return Ok(());
        };

        match cmd {
            ClientCommand::Chat { id, text, media, time } => {
                self.chat(user, id, text, media, time).await
            }

            ClientCommand::Typing { typing } => {
                self.send(Audience::Identity(user.partner()), &ServerEvent::Typing { user, typing })
                    .await
            }

            ClientCommand::Read {} => {
                self.send(Audience::Identity(user.partner()), &ServerEvent::Read { user })
                    .await
            }

            ClientCommand::Reaction { id, emoji } => self.reaction(user, id, emoji).await,

            ClientCommand::Delete { id } => self.delete(user, id).await,

            ClientCommand::Mood { mood } => {
                self.inner.registry.set_mood(conn, mood.clone()).await;
                self.send(
                    Audience::Identity(user.partner()),
                    &ServerEvent::Presence { user, online: true, mood },
                )
                .await
            }

            other => {
                debug!("{} is not an identified command, ignoring", other.kind());
                Ok(())
            }
        }
    }

    async fn hello(&self, conn: ConnId, user: Identity) -> Result<(), DispatchError> {
        let registry = &self.inner.registry;
        let Some(previous) = registry.set_identity(conn, user).await else {
            return Ok(());
        };
        info!("{} identified as {}", conn, user);

        let limit = self.inner.history_limit;
        let messages = self.blocking(move |s| s.messages.history(limit)).await?;
        self.send(Audience::Only(conn), &ServerEvent::History { messages }).await?;

        self.send(
            Audience::All,
            &ServerEvent::Presence { user, online: true, mood: None },
        )
        .await?;

        if let Some(previous) = previous.filter(|p| *p != user) {
            self.announce_offline_if_gone(previous).await?;
        }

        // Let a late joiner know the partner is already here.
        let partner = user.partner();
        if registry.is_online(partner).await {
            let mood = registry.mood_of(partner).await;
            self.send(
                Audience::Only(conn),
                &ServerEvent::Presence { user: partner, online: true, mood },
            )
            .await?;
        }
        Ok(())
    }

    async fn chat(
        &self,
        user: Identity,
        id: Option<String>,
        text: Option<String>,
        media: Option<Media>,
        time: Option<u64>,
    ) -> Result<(), DispatchError> {
        let now = now_millis();
        let msg = Message {
            id: id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("{}-{}", user, now)),
            user,
            text: text
                .filter(|t| !t.is_empty())
                .map(|t| truncate_chars(&t, MAX_TEXT_CHARS)),
            media,
            time: time.unwrap_or(now),
            read: false,
            reactions: Default::default(),
        };

        let stored = msg.clone();
        self.blocking(move |s| s.messages.save(&stored)).await?;
        self.send(Audience::All, &ServerEvent::Chat(msg)).await
    }

    async fn reaction(&self, user: Identity, id: String, emoji: String) -> Result<(), DispatchError> {
        if id.is_empty() || emoji.is_empty() {
            debug!("{} sent a reaction without id or emoji, ignoring", user);
            return Ok(());
        }

        let (lookup_id, lookup_emoji) = (id.clone(), emoji.clone());
        let added = self
            .blocking(move |s| s.messages.add_reaction(&lookup_id, user, &lookup_emoji))
            .await?;

        match added {
            // The client bumps its counter on every frame, so repeats stay quiet.
            Some(false) => {
                debug!("{} already reacted {} to {}", user, emoji, id);
                Ok(())
            }
            found => {
                if found.is_none() {
                    debug!("{} reacted to unknown message {}", user, id);
                }
                self.send(Audience::All, &ServerEvent::Reaction { id, user, emoji })
                    .await
            }
        }
    }

    async fn delete(&self, user: Identity, id: String) -> Result<(), DispatchError> {
        if id.is_empty() || !user.owns_message_id(&id) {
            debug!("{} may not delete message {:?}, ignoring", user, id);
            return Ok(());
        }

        let target = id.clone();
        if !self.blocking(move |s| s.messages.delete(&target)).await? {
            debug!("{} deleted unknown message {}", user, id);
        }
        self.send(Audience::All, &ServerEvent::Delete { id }).await
    }

    async fn list_records<T: Snapshot>(&self, conn: ConnId) -> Result<(), DispatchError> {
        let records = self.blocking(|s| T::collection(s).list()).await?;
        self.send(Audience::Only(conn), &T::snapshot(records)).await
    }

    async fn save_record<T: Snapshot>(&self, conn: ConnId, record: T) -> Result<(), DispatchError> {
        if record.id().is_empty() {
            debug!("{} saved a {} record without id, ignoring", conn, T::NAMESPACE);
            return Ok(());
        }
        let records = self.blocking(move |s| T::collection(s).save(&record)).await?;
        self.send(Audience::All, &T::snapshot(records)).await
    }

    async fn delete_record<T: Snapshot>(&self, conn: ConnId, id: String) -> Result<(), DispatchError> {
        if id.is_empty() {
            debug!("{} deleted a {} record without id, ignoring", conn, T::NAMESPACE);
            return Ok(());
        }
        let records = self.blocking(move |s| T::collection(s).delete(&id)).await?;
        self.send(Audience::All, &T::snapshot(records)).await
    }

    async fn announce_offline_if_gone(&self, identity: Identity) -> Result<(), DispatchError> {
        if self.inner.registry.is_online(identity).await {
            return Ok(());
        }
        self.send(
            Audience::All,
            &ServerEvent::Presence { user: identity, online: false, mood: None },
        )
        .await
    }

    /// Serialize once and hand the frame to every session in `audience`.
    async fn send(&self, audience: Audience, event: &ServerEvent) -> Result<(), DispatchError> {
        let frame: Outbound = serde_json::to_string(event)?.into();
        let delivered = self.inner.registry.deliver(audience, frame).await;
        trace!("delivered to {} session(s) ({:?})", delivered, audience);
        Ok(())
    }

    /// Run a store operation off the async runtime.
    async fn blocking<F, T>(&self, f: F) -> Result<T, DispatchError>
    where
        F: FnOnce(&Stores) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let stores = self.inner.stores.clone();
        tokio::task::spawn_blocking(move || f(&stores))
            .await?
            .map_err(DispatchError::Store)
    }
}
