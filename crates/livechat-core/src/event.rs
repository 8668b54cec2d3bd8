//! Chat event types.
//!
//! This module provides the typed events produced from the broadcast stream:
//! - [`DanmuMessage`]: a regular scrolling chat message
//! - [`SuperChatMessage`]: a paid, highlighted message
//! - [`GiftMessage`]: a gift sent to the streamer
//! - [`ChatEvent`]: the tagged union handed to consumers
//!
//! Events are immutable once constructed. Absent optional fields use
//! documented defaults: no medal means an empty name and level 0, and a
//! missing timestamp is 0.

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};

/// A fan medal shown next to a username.
///
/// The default value (empty name, level 0) means "no medal".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medal {
    /// Medal name (usually derived from the streamer's fan club).
    #[serde(rename = "medal_name", default)]
    pub name: String,
    /// Medal level.
    #[serde(rename = "medal_level", default)]
    pub level: u32,
}

impl Medal {
    /// Creates a medal with the given name and level.
    pub fn new(name: impl Into<String>, level: u32) -> Self {
        Self {
            name: name.into(),
            level,
        }
    }

    /// Returns true if this represents "no medal".
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

/// A regular chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DanmuMessage {
    /// Message text.
    pub text: String,
    /// Sender display name.
    pub username: String,
    /// Sender carries the room-admin badge.
    pub is_room_admin: bool,
    /// Sender carries a guard (fleet) badge.
    pub is_guard: bool,
    /// Sender's medal, empty when none.
    #[serde(flatten)]
    pub medal: Medal,
    /// Unix timestamp (seconds) the message was sent, 0 if unknown.
    pub timestamp: i64,
}

/// A paid, highlighted chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperChatMessage {
    /// Message text.
    pub text: String,
    /// Sender display name.
    pub username: String,
    /// Price in whole currency units.
    pub price: i64,
    /// Sender's medal, only populated for guard members.
    #[serde(flatten)]
    pub medal: Medal,
    /// Unix timestamp (seconds), 0 if unknown.
    pub timestamp: i64,
}

/// A gift sent to the streamer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftMessage {
    /// Sender display name.
    pub username: String,
    /// Action verb supplied by the server (e.g. "投喂").
    pub action: String,
    /// Gift name.
    pub gift_name: String,
    /// Number of gifts in this event.
    pub amount: u32,
    /// Sender's medal, empty when none.
    #[serde(flatten)]
    pub medal: Medal,
    /// Unix timestamp (seconds), 0 if unknown.
    pub timestamp: i64,
}

/// A typed chat event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Regular chat message.
    Danmu(DanmuMessage),
    /// Paid message.
    SuperChat(SuperChatMessage),
    /// Gift event.
    Gift(GiftMessage),
    /// A command tag with no typed representation.
    Unrecognized {
        /// The raw `cmd` value.
        command: String,
    },
}

impl ChatEvent {
    /// Returns the sender name, if the event has one.
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::Danmu(m) => Some(&m.username),
            Self::SuperChat(m) => Some(&m.username),
            Self::Gift(m) => Some(&m.username),
            Self::Unrecognized { .. } => None,
        }
    }

    /// Returns the origin timestamp, if the event carries a non-zero one.
    pub fn timestamp(&self) -> Option<i64> {
        let ts = match self {
            Self::Danmu(m) => m.timestamp,
            Self::SuperChat(m) => m.timestamp,
            Self::Gift(m) => m.timestamp,
            Self::Unrecognized { .. } => 0,
        };
        (ts != 0).then_some(ts)
    }

    /// Returns the origin time in the local timezone.
    pub fn local_time(&self) -> Option<DateTime<Local>> {
        self.timestamp()
            .and_then(|ts| Local.timestamp_opt(ts, 0).single())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn danmu() -> DanmuMessage {
        DanmuMessage {
            text: "hello".into(),
            username: "alice".into(),
            is_room_admin: false,
            is_guard: true,
            medal: Medal::new("粉丝团", 5),
            timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn medal_default_is_empty() {
        let medal = Medal::default();
        assert!(medal.is_empty());
        assert_eq!(medal.level, 0);
    }

    #[test]
    fn event_accessors() {
        let event = ChatEvent::Danmu(danmu());
        assert_eq!(event.username(), Some("alice"));
        assert_eq!(event.timestamp(), Some(1_700_000_000));
        assert!(event.local_time().is_some());

        let unknown = ChatEvent::Unrecognized {
            command: "WATCHED_CHANGE".into(),
        };
        assert_eq!(unknown.username(), None);
        assert_eq!(unknown.timestamp(), None);
    }

    #[test]
    fn zero_timestamp_is_unknown() {
        let mut msg = danmu();
        msg.timestamp = 0;
        assert_eq!(ChatEvent::Danmu(msg).timestamp(), None);
    }

    #[test]
    fn serializes_flat_medal_with_type_tag() {
        let json = serde_json::to_value(ChatEvent::Danmu(danmu())).unwrap();
        assert_eq!(json["type"], "danmu");
        assert_eq!(json["medal_name"], "粉丝团");
        assert_eq!(json["medal_level"], 5);
        assert!(json.get("medal").is_none());
    }

    #[test]
    fn json_roundtrip() {
        let event = ChatEvent::SuperChat(SuperChatMessage {
            text: "hi".into(),
            username: "bob".into(),
            price: 50,
            medal: Medal::default(),
            timestamp: 0,
        });
        let json = serde_json::to_string(&event).unwrap();
        let back: ChatEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
