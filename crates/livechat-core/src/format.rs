//! Output formatting for chat events.
//!
//! Two output formats are supported:
//! - **TTY**: one human-readable line per event, badges in brackets
//! - **JSON**: one JSON object per line, tagged by event type
//!
//! # Example
//!
//! ```rust
//! use livechat_core::format::{FormatOptions, LineFormatter};
//! use livechat_core::{ChatEvent, DanmuMessage, Medal};
//!
//! let formatter = LineFormatter::new(FormatOptions::default());
//! let event = ChatEvent::Danmu(DanmuMessage {
//!     text: "hello".into(),
//!     username: "alice".into(),
//!     is_room_admin: false,
//!     is_guard: false,
//!     medal: Medal::default(),
//!     timestamp: 0,
//! });
//! assert_eq!(formatter.format(&event).as_deref(), Some("alice: hello"));
//! ```

use serde::{Deserialize, Serialize};

use crate::event::{ChatEvent, Medal};

/// Badge shown for room admins.
const ADMIN_BADGE: &str = "房";
/// Badge shown for guard members.
const GUARD_BADGE: &str = "舰";

/// The output format for event display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Human-readable terminal output.
    #[default]
    Tty,
    /// Machine-readable JSON lines.
    Json,
}

/// Configuration options for output formatting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    /// Output format.
    pub output_format: OutputFormat,
    /// Prefix TTY lines with the local origin time.
    pub show_time: bool,
    /// Currency symbol used for super chat prices.
    pub currency_symbol: String,
    /// Print unrecognized commands instead of hiding them.
    pub show_unrecognized: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Tty,
            show_time: false,
            currency_symbol: "¥".to_string(),
            show_unrecognized: false,
        }
    }
}

impl FormatOptions {
    /// Builder: set the output format.
    #[must_use]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Builder: show origin timestamps.
    #[must_use]
    pub fn with_show_time(mut self, show_time: bool) -> Self {
        self.show_time = show_time;
        self
    }

    /// Builder: show unrecognized command tags.
    #[must_use]
    pub fn with_show_unrecognized(mut self, show: bool) -> Self {
        self.show_unrecognized = show;
        self
    }
}

/// Renders chat events as single output lines.
#[derive(Debug, Clone, Default)]
pub struct LineFormatter {
    options: FormatOptions,
}

impl LineFormatter {
    /// Creates a formatter with the given options.
    pub fn new(options: FormatOptions) -> Self {
        Self { options }
    }

    /// Formats one event, or returns `None` if the event should not be shown.
    pub fn format(&self, event: &ChatEvent) -> Option<String> {
        match self.options.output_format {
            OutputFormat::Tty => self.format_tty(event),
            OutputFormat::Json => self.format_json(event),
        }
    }

    fn format_json(&self, event: &ChatEvent) -> Option<String> {
        if matches!(event, ChatEvent::Unrecognized { .. }) && !self.options.show_unrecognized {
            return None;
        }
        serde_json::to_string(event).ok()
    }

    fn format_tty(&self, event: &ChatEvent) -> Option<String> {
        let time = self.time_prefix(event);
        let parts: Vec<String> = match event {
            ChatEvent::Danmu(msg) => {
                let member = if msg.is_room_admin {
                    Some(ADMIN_BADGE)
                } else if msg.is_guard {
                    Some(GUARD_BADGE)
                } else {
                    None
                };
                vec![
                    time,
                    badges(member, &msg.medal),
                    format!("{}:", msg.username),
                    msg.text.clone(),
                ]
            }
            ChatEvent::SuperChat(msg) => {
                // Super chat medals are only kept for guard members.
                let member = (!msg.medal.is_empty()).then_some(GUARD_BADGE);
                vec![
                    time,
                    format!("{}{}", self.options.currency_symbol, msg.price),
                    badges(member, &msg.medal),
                    format!("{}:", msg.username),
                    msg.text.clone(),
                ]
            }
            ChatEvent::Gift(msg) => vec![
                time,
                badges(None, &msg.medal),
                msg.username.clone(),
                format!("{} {}x{}", msg.action, msg.gift_name, msg.amount),
            ],
            ChatEvent::Unrecognized { command } => {
                if !self.options.show_unrecognized {
                    return None;
                }
                vec![time, format!("<{}>", command)]
            }
        };

        let line = parts
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Some(line)
    }

    fn time_prefix(&self, event: &ChatEvent) -> String {
        if !self.options.show_time {
            return String::new();
        }
        event
            .local_time()
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_default()
    }
}

/// Renders `[member][medalN]`, omitting empty parts.
fn badges(member: Option<&str>, medal: &Medal) -> String {
    let mut out = String::new();
    if let Some(member) = member {
        out.push_str(&format!("[{}]", member));
    }
    if !medal.is_empty() {
        out.push_str(&format!("[{}{}]", medal.name, medal.level));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{DanmuMessage, GiftMessage, SuperChatMessage};

    fn danmu(is_room_admin: bool, is_guard: bool, medal: Medal) -> ChatEvent {
        ChatEvent::Danmu(DanmuMessage {
            text: "hello".into(),
            username: "alice".into(),
            is_room_admin,
            is_guard,
            medal,
            timestamp: 1_700_000_000,
        })
    }

    fn tty() -> LineFormatter {
        LineFormatter::new(FormatOptions::default())
    }

    #[test]
    fn plain_danmu() {
        let line = tty().format(&danmu(false, false, Medal::default())).unwrap();
        insta::assert_snapshot!(line, @"alice: hello");
    }

    #[test]
    fn admin_badge_wins_over_guard() {
        let line = tty()
            .format(&danmu(true, true, Medal::new("粉丝团", 12)))
            .unwrap();
        insta::assert_snapshot!(line, @"[房][粉丝团12] alice: hello");
    }

    #[test]
    fn guard_badge() {
        let line = tty().format(&danmu(false, true, Medal::default())).unwrap();
        insta::assert_snapshot!(line, @"[舰] alice: hello");
    }

    #[test]
    fn super_chat_line() {
        let event = ChatEvent::SuperChat(SuperChatMessage {
            text: "hi".into(),
            username: "bob".into(),
            price: 50,
            medal: Medal::new("喵", 21),
            timestamp: 0,
        });
        insta::assert_snapshot!(tty().format(&event).unwrap(), @"¥50 [舰][喵21] bob: hi");
    }

    #[test]
    fn super_chat_without_medal_has_no_badge() {
        let event = ChatEvent::SuperChat(SuperChatMessage {
            text: "hi".into(),
            username: "bob".into(),
            price: 30,
            medal: Medal::default(),
            timestamp: 0,
        });
        insta::assert_snapshot!(tty().format(&event).unwrap(), @"¥30 bob: hi");
    }

    #[test]
    fn gift_line() {
        let event = ChatEvent::Gift(GiftMessage {
            username: "carol".into(),
            action: "投喂".into(),
            gift_name: "辣条".into(),
            amount: 3,
            medal: Medal::default(),
            timestamp: 0,
        });
        insta::assert_snapshot!(tty().format(&event).unwrap(), @"carol 投喂 辣条x3");
    }

    #[test]
    fn unrecognized_hidden_by_default() {
        let event = ChatEvent::Unrecognized {
            command: "ONLINE_RANK_COUNT".into(),
        };
        assert!(tty().format(&event).is_none());

        let shown = LineFormatter::new(FormatOptions::default().with_show_unrecognized(true));
        assert_eq!(shown.format(&event).as_deref(), Some("<ONLINE_RANK_COUNT>"));
    }

    #[test]
    fn show_time_prefixes_clock() {
        let formatter = LineFormatter::new(FormatOptions::default().with_show_time(true));
        let line = formatter
            .format(&danmu(false, false, Medal::default()))
            .unwrap();
        let (clock, rest) = line.split_once(' ').unwrap();
        assert_eq!(clock.len(), 8);
        assert_eq!(clock.matches(':').count(), 2);
        assert_eq!(rest, "alice: hello");
    }

    #[test]
    fn json_line() {
        let formatter = LineFormatter::new(FormatOptions::default().with_format(OutputFormat::Json));
        let line = formatter
            .format(&danmu(false, false, Medal::default()))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "danmu");
        assert_eq!(value["username"], "alice");
        assert_eq!(value["medal_level"], 0);
    }
}
