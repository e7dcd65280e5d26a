use serde::{Deserialize, Serialize};

use crate::identity::Identity;
use crate::models::{CalendarEvent, Countdown, Media, Message, WishlistItem};

/// Frames sent FROM the browser TO the server.
///
/// Every frame carries a `type` discriminator. Fields the client sends but the
/// server does not read (e.g. `user` on `chat`) are ignored; anything that does
/// not fit one of these shapes fails to decode and is dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientCommand {
    /// Claim an identity for this connection
    Hello { user: Identity },

    Chat {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        media: Option<Media>,
        #[serde(default)]
        time: Option<u64>,
    },

    Typing {
        #[serde(default)]
        typing: bool,
    },

    /// "I have read my partner's messages"
    Read {},

    Reaction { id: String, emoji: String },

    Delete { id: String },

    /// Wipe the whole message history
    Clear {},

    GetNotes {},

    Notes { content: String },

    /// Set or clear (when absent) this session's mood
    Mood {
        #[serde(default)]
        mood: Option<String>,
    },

    GetCalendar {},
    SaveCalendarEvent { event: CalendarEvent },
    DeleteCalendarEvent {
        #[serde(rename = "eventId")]
        event_id: String,
    },

    GetWishlist {},
    SaveWishlistItem { item: WishlistItem },
    DeleteWishlistItem {
        #[serde(rename = "itemId")]
        item_id: String,
    },

    GetCountdowns {},
    SaveCountdown { countdown: Countdown },
    DeleteCountdown {
        #[serde(rename = "countdownId")]
        countdown_id: String,
    },
}

impl ClientCommand {
    /// Wire name of the command, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Hello { .. } => "hello",
            Self::Chat { .. } => "chat",
            Self::Typing { .. } => "typing",
            Self::Read {} => "read",
            Self::Reaction { .. } => "reaction",
            Self::Delete { .. } => "delete",
            Self::Clear {} => "clear",
            Self::GetNotes {} => "getNotes",
            Self::Notes { .. } => "notes",
            Self::Mood { .. } => "mood",
            Self::GetCalendar {} => "getCalendar",
            Self::SaveCalendarEvent { .. } => "saveCalendarEvent",
            Self::DeleteCalendarEvent { .. } => "deleteCalendarEvent",
            Self::GetWishlist {} => "getWishlist",
            Self::SaveWishlistItem { .. } => "saveWishlistItem",
            Self::DeleteWishlistItem { .. } => "deleteWishlistItem",
            Self::GetCountdowns {} => "getCountdowns",
            Self::SaveCountdown { .. } => "saveCountdown",
            Self::DeleteCountdown { .. } => "deleteCountdown",
        }
    }
}

/// Frames sent FROM the server TO the browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Full message history (also sent empty after a clear)
    History { messages: Vec<Message> },

    /// An identity came online, went offline, or changed mood
    Presence {
        user: Identity,
        online: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mood: Option<String>,
    },

    /// A new message, exactly as persisted
    Chat(Message),

    Typing { user: Identity, typing: bool },

    Read { user: Identity },

    Reaction {
        id: String,
        user: Identity,
        emoji: String,
    },

    Delete { id: String },

    Notes { content: String },

    Calendar { events: Vec<CalendarEvent> },

    Wishlist { items: Vec<WishlistItem> },

    Countdowns { countdowns: Vec<Countdown> },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: serde_json::Value) -> Result<ClientCommand, serde_json::Error> {
        serde_json::from_value(value)
    }

    #[test]
    fn hello_requires_a_known_identity() {
        assert_eq!(
            decode(json!({ "type": "hello", "user": "J" })).unwrap(),
            ClientCommand::Hello { user: Identity::J }
        );
        assert!(decode(json!({ "type": "hello", "user": "mallory" })).is_err());
        assert!(decode(json!({ "type": "hello" })).is_err());
    }

    #[test]
    fn chat_ignores_client_supplied_user() {
        let cmd = decode(json!({
            "type": "chat",
            "user": "a",
            "text": "hi",
            "time": 1_700_000_000_000u64,
            "id": "a-1700000000000"
        }))
        .unwrap();
        assert_eq!(
            cmd,
            ClientCommand::Chat {
                id: Some("a-1700000000000".into()),
                text: Some("hi".into()),
                media: None,
                time: Some(1_700_000_000_000),
            }
        );
    }

    #[test]
    fn bodyless_commands_accept_extra_fields() {
        assert_eq!(decode(json!({ "type": "read", "user": "a" })).unwrap(), ClientCommand::Read {});
        assert_eq!(decode(json!({ "type": "clear" })).unwrap(), ClientCommand::Clear {});
        assert_eq!(decode(json!({ "type": "getNotes" })).unwrap(), ClientCommand::GetNotes {});
    }

    #[test]
    fn collection_delete_ids_use_client_field_names() {
        assert_eq!(
            decode(json!({ "type": "deleteCalendarEvent", "eventId": "evt-1" })).unwrap(),
            ClientCommand::DeleteCalendarEvent { event_id: "evt-1".into() }
        );
        assert_eq!(
            decode(json!({ "type": "deleteWishlistItem", "itemId": "wish-1" })).unwrap(),
            ClientCommand::DeleteWishlistItem { item_id: "wish-1".into() }
        );
        assert_eq!(
            decode(json!({ "type": "deleteCountdown", "countdownId": "cd-1" })).unwrap(),
            ClientCommand::DeleteCountdown { countdown_id: "cd-1".into() }
        );
    }

    #[test]
    fn unknown_or_misshapen_frames_fail() {
        assert!(decode(json!({ "type": "selfDestruct" })).is_err());
        assert!(decode(json!({ "text": "no type" })).is_err());
        assert!(decode(json!({ "type": "reaction", "id": "J-1" })).is_err());
        assert!(decode(json!({ "type": "notes", "content": 42 })).is_err());
    }

    #[test]
    fn typing_defaults_to_false() {
        assert_eq!(
            decode(json!({ "type": "typing" })).unwrap(),
            ClientCommand::Typing { typing: false }
        );
    }

    #[test]
    fn chat_event_is_flattened_message() {
        let event = ServerEvent::Chat(Message {
            id: "J-5".into(),
            user: Identity::J,
            text: Some("hi".into()),
            media: None,
            time: 5,
            read: false,
            reactions: Default::default(),
        });
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "chat", "id": "J-5", "user": "J", "text": "hi", "time": 5, "read": false })
        );
    }

    #[test]
    fn presence_omits_missing_mood() {
        let event = ServerEvent::Presence { user: Identity::A, online: false, mood: None };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "presence", "user": "a", "online": false })
        );
    }
}
