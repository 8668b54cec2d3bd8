//! Maps decoded sub-frames to typed chat events.
//!
//! Message payloads are JSON objects tagged by `cmd`. Chat messages use a
//! positional `info` array; paid messages and gifts use a keyed `data`
//! object. The positions below are fixed by the server.

use livechat_core::{ChatEvent, DanmuMessage, GiftMessage, Medal, SuperChatMessage};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{ProtocolError, ProtocolResult};
use crate::framing::SubFrame;
use crate::types::{Operation, VerifyReply};

/// Command tag of a regular chat message.
pub const CMD_DANMU: &str = "DANMU_MSG";
/// Command tag of a paid message.
pub const CMD_SUPER_CHAT: &str = "SUPER_CHAT_MESSAGE";
/// Command tag of a gift.
pub const CMD_GIFT: &str = "SEND_GIFT";

// Positions inside a DANMU_MSG `info` array.
const INFO_TEXT: usize = 1;
const INFO_USER: usize = 2;
const INFO_MEDAL: usize = 3;
const INFO_META: usize = 9;

// Positions inside `info[INFO_USER]`.
const USER_NAME: usize = 1;
const USER_ADMIN: usize = 2;
const USER_GUARD: usize = 7;

// Positions inside `info[INFO_MEDAL]`.
const MEDAL_LEVEL: usize = 0;
const MEDAL_NAME: usize = 1;

/// What to do with a message whose command has no typed representation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownCommandPolicy {
    /// Skip it quietly.
    #[default]
    Drop,
    /// Emit it as [`ChatEvent::Unrecognized`].
    Emit,
}

/// The result of dispatching one sub-frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Keepalive reply, with the popularity counter when present.
    HeartbeatReply { popularity: Option<u32> },
    /// Verify handshake reply.
    VerifyReply { code: i64 },
    /// A typed chat event for the consumer.
    Event(ChatEvent),
    /// Nothing for the consumer.
    Ignored {
        operation: u32,
        command: Option<String>,
    },
}

/// Turns sub-frames into [`Dispatch`] values.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageDispatcher {
    policy: UnknownCommandPolicy,
}

impl MessageDispatcher {
    /// Creates a dispatcher with the given policy for unknown commands.
    pub fn new(policy: UnknownCommandPolicy) -> Self {
        Self { policy }
    }

    /// Dispatches one sub-frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not valid JSON or a known command
    /// is missing a required field. The error concerns this sub-frame only.
    pub fn dispatch(&self, frame: &SubFrame) -> ProtocolResult<Dispatch> {
        match Operation::from_code(frame.operation()) {
            Some(Operation::HeartbeatReply) => {
                let popularity = frame
                    .payload
                    .get(..4)
                    .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]));
                debug!(?popularity, "heartbeat reply");
                Ok(Dispatch::HeartbeatReply { popularity })
            }
            Some(Operation::VerifyReply) => {
                let reply: VerifyReply = serde_json::from_slice(&frame.payload)?;
                Ok(Dispatch::VerifyReply { code: reply.code })
            }
            Some(Operation::Message) => {
                let message: Value = serde_json::from_slice(&frame.payload)?;
                self.dispatch_message(&message)
            }
            _ => {
                trace!(operation = frame.operation(), "ignoring frame");
                Ok(Dispatch::Ignored {
                    operation: frame.operation(),
                    command: None,
                })
            }
        }
    }

    fn dispatch_message(&self, message: &Value) -> ProtocolResult<Dispatch> {
        let raw = message
            .get("cmd")
            .and_then(Value::as_str)
            .ok_or_else(|| ProtocolError::decode("message", "missing cmd"))?;
        let command = raw.split(':').next().unwrap_or(raw);

        let event = match command {
            CMD_DANMU => ChatEvent::Danmu(parse_danmu(message)?),
            CMD_SUPER_CHAT => ChatEvent::SuperChat(parse_super_chat(message)?),
            CMD_GIFT => ChatEvent::Gift(parse_gift(message)?),
            _ => match self.policy {
                UnknownCommandPolicy::Drop => {
                    trace!(command = raw, "dropping unrecognized command");
                    return Ok(Dispatch::Ignored {
                        operation: Operation::Message.code(),
                        command: Some(raw.to_string()),
                    });
                }
                UnknownCommandPolicy::Emit => ChatEvent::Unrecognized {
                    command: raw.to_string(),
                },
            },
        };
        Ok(Dispatch::Event(event))
    }
}

fn parse_danmu(message: &Value) -> ProtocolResult<DanmuMessage> {
    let missing = |what: &str| ProtocolError::decode(CMD_DANMU, format!("missing {}", what));

    let info = message
        .get("info")
        .and_then(Value::as_array)
        .ok_or_else(|| missing("info"))?;

    let text = info
        .get(INFO_TEXT)
        .and_then(Value::as_str)
        .ok_or_else(|| missing("text"))?;

    let user = info
        .get(INFO_USER)
        .and_then(Value::as_array)
        .ok_or_else(|| missing("user"))?;
    let username = user
        .get(USER_NAME)
        .and_then(Value::as_str)
        .ok_or_else(|| missing("username"))?;

    let medal = match info.get(INFO_MEDAL).and_then(Value::as_array) {
        Some(medal) if !medal.is_empty() => Medal::new(
            medal.get(MEDAL_NAME).and_then(Value::as_str).unwrap_or_default(),
            medal.get(MEDAL_LEVEL).map(as_u32).unwrap_or_default(),
        ),
        _ => Medal::default(),
    };

    let timestamp = info
        .get(INFO_META)
        .and_then(|meta| meta.get("ts"))
        .map(as_i64)
        .unwrap_or_default();

    Ok(DanmuMessage {
        text: text.to_string(),
        username: username.to_string(),
        is_room_admin: user.get(USER_ADMIN).is_some_and(is_truthy),
        is_guard: user.get(USER_GUARD).is_some_and(is_truthy),
        medal,
        timestamp,
    })
}

fn parse_super_chat(message: &Value) -> ProtocolResult<SuperChatMessage> {
    let missing =
        |what: &str| ProtocolError::decode(CMD_SUPER_CHAT, format!("missing {}", what));

    let data = message.get("data").ok_or_else(|| missing("data"))?;
    let text = data
        .get("message")
        .and_then(Value::as_str)
        .ok_or_else(|| missing("message"))?;
    let username = data
        .pointer("/user_info/uname")
        .and_then(Value::as_str)
        .ok_or_else(|| missing("user_info.uname"))?;
    let price = data
        .get("price")
        .and_then(integer)
        .ok_or_else(|| missing("price"))?;

    // Medal is only shown for guard members.
    let medal = match data.get("medal_info") {
        Some(info) if info.get("guard_level").map(as_i64).unwrap_or_default() != 0 => {
            medal_from_info(info)
        }
        _ => Medal::default(),
    };

    Ok(SuperChatMessage {
        text: text.to_string(),
        username: username.to_string(),
        price,
        medal,
        timestamp: data.get("ts").map(as_i64).unwrap_or_default(),
    })
}

fn parse_gift(message: &Value) -> ProtocolResult<GiftMessage> {
    let missing = |what: &str| ProtocolError::decode(CMD_GIFT, format!("missing {}", what));

    let data = message.get("data").ok_or_else(|| missing("data"))?;
    let field = |name: &'static str| {
        data.get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| missing(name))
    };

    let username = field("uname")?;
    let gift_name = field("giftName")?;
    let action = data.get("action").and_then(Value::as_str).unwrap_or_default();
    let amount = data.get("num").map(as_u32).unwrap_or(1);

    let medal = match data.get("medal_info") {
        Some(info) if info.get("medal_level").map(as_u32).unwrap_or_default() != 0 => {
            medal_from_info(info)
        }
        _ => Medal::default(),
    };

    Ok(GiftMessage {
        username: username.to_string(),
        action: action.to_string(),
        gift_name: gift_name.to_string(),
        amount,
        medal,
        timestamp: data.get("timestamp").map(as_i64).unwrap_or_default(),
    })
}

fn medal_from_info(info: &Value) -> Medal {
    Medal::new(
        info.get("medal_name")
            .and_then(Value::as_str)
            .unwrap_or_default(),
        info.get("medal_level").map(as_u32).unwrap_or_default(),
    )
}

/// `true`, non-zero numbers and non-empty strings, arrays or objects are truthy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Null => false,
    }
}

/// Reads an integer that may arrive as a number or a numeric string.
fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_i64(value: &Value) -> i64 {
    integer(value).unwrap_or_default()
}

fn as_u32(value: &Value) -> u32 {
    integer(value)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::{FrameHeader, decode_frames, encode_frame};
    use crate::types::ProtocolVersion;
    use serde_json::json;

    fn message(body: &Value) -> SubFrame {
        frame(Operation::Message, body.to_string().as_bytes())
    }

    fn frame(operation: Operation, payload: &[u8]) -> SubFrame {
        SubFrame {
            header: FrameHeader::new(ProtocolVersion::PlainJson, operation, payload.len()),
            payload: payload.to_vec(),
        }
    }

    fn event(dispatch: Dispatch) -> ChatEvent {
        match dispatch {
            Dispatch::Event(event) => event,
            other => panic!("expected event, got {:?}", other),
        }
    }

    fn danmu_sample() -> Value {
        json!({
            "cmd": "DANMU_MSG",
            "info": [
                [0, 1, 25, 16777215, 1700000000123u64, 0, 0, "", 0, 0, 0],
                "hello",
                [1234, "alice", 1, 0, 0, 10000, 1, ""],
                [12, "粉丝团", "streamer", 1, 0],
                [],
                [],
                0,
                0,
                null,
                {"ts": 1700000000, "ct": "ABC"}
            ]
        })
    }

    #[test]
    fn danmu_message() {
        let dispatcher = MessageDispatcher::default();
        let event = event(dispatcher.dispatch(&message(&danmu_sample())).unwrap());

        assert_eq!(
            event,
            ChatEvent::Danmu(DanmuMessage {
                text: "hello".into(),
                username: "alice".into(),
                is_room_admin: true,
                is_guard: false,
                medal: Medal::new("粉丝团", 12),
                timestamp: 1_700_000_000,
            })
        );
    }

    #[test]
    fn danmu_without_medal_or_timestamp() {
        let body = json!({
            "cmd": "DANMU_MSG:4:0:2:2:2:0",
            "info": [[], "hi", [1, "bob", 0, 0, 0, 0, 0, 3], []]
        });
        let ChatEvent::Danmu(msg) = event(MessageDispatcher::default().dispatch(&message(&body)).unwrap())
        else {
            panic!("expected danmu");
        };
        assert!(msg.medal.is_empty());
        assert_eq!(msg.medal.level, 0);
        assert_eq!(msg.timestamp, 0);
        assert!(!msg.is_room_admin);
        assert!(msg.is_guard);
    }

    #[test]
    fn danmu_missing_username_is_decode_error() {
        let body = json!({"cmd": "DANMU_MSG", "info": [[], "hi", []]});
        let err = MessageDispatcher::default()
            .dispatch(&message(&body))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Decode { ref command, .. } if command == CMD_DANMU));
        assert!(!err.aborts_batch());
    }

    #[test]
    fn super_chat_without_medal() {
        let body = json!({
            "cmd": "SUPER_CHAT_MESSAGE",
            "data": {
                "message": "thanks",
                "price": 30,
                "ts": 1700000100,
                "user_info": {"uname": "carol"}
            }
        });
        let ChatEvent::SuperChat(msg) =
            event(MessageDispatcher::default().dispatch(&message(&body)).unwrap())
        else {
            panic!("expected super chat");
        };
        assert_eq!(msg.username, "carol");
        assert_eq!(msg.price, 30);
        assert_eq!(msg.medal.name, "");
        assert_eq!(msg.medal.level, 0);
        assert_eq!(msg.timestamp, 1_700_000_100);
    }

    #[test]
    fn super_chat_medal_requires_guard_level() {
        let with_guard = |guard_level: i64| {
            json!({
                "cmd": "SUPER_CHAT_MESSAGE",
                "data": {
                    "message": "m",
                    "price": "50",
                    "user_info": {"uname": "dave"},
                    "medal_info": {"medal_name": "喵", "medal_level": 21, "guard_level": guard_level}
                }
            })
        };
        let dispatcher = MessageDispatcher::default();

        let ChatEvent::SuperChat(guard) = event(dispatcher.dispatch(&message(&with_guard(3))).unwrap())
        else {
            panic!("expected super chat");
        };
        assert_eq!(guard.medal, Medal::new("喵", 21));
        assert_eq!(guard.price, 50);

        let ChatEvent::SuperChat(plain) = event(dispatcher.dispatch(&message(&with_guard(0))).unwrap())
        else {
            panic!("expected super chat");
        };
        assert!(plain.medal.is_empty());
    }

    #[test]
    fn send_gift() {
        let body = json!({
            "cmd": "SEND_GIFT",
            "data": {
                "uname": "erin",
                "action": "投喂",
                "giftName": "辣条",
                "num": 3,
                "timestamp": 1700000200,
                "medal_info": {"medal_name": "", "medal_level": 0}
            }
        });
        assert_eq!(
            event(MessageDispatcher::default().dispatch(&message(&body)).unwrap()),
            ChatEvent::Gift(GiftMessage {
                username: "erin".into(),
                action: "投喂".into(),
                gift_name: "辣条".into(),
                amount: 3,
                medal: Medal::default(),
                timestamp: 1_700_000_200,
            })
        );
    }

    #[test]
    fn unknown_command_policy() {
        let body = json!({"cmd": "ONLINE_RANK_COUNT", "data": {}});

        assert_eq!(
            MessageDispatcher::default().dispatch(&message(&body)).unwrap(),
            Dispatch::Ignored {
                operation: 5,
                command: Some("ONLINE_RANK_COUNT".into())
            }
        );
        assert_eq!(
            event(
                MessageDispatcher::new(UnknownCommandPolicy::Emit)
                    .dispatch(&message(&body))
                    .unwrap()
            ),
            ChatEvent::Unrecognized {
                command: "ONLINE_RANK_COUNT".into()
            }
        );
    }

    #[test]
    fn control_frames() {
        let dispatcher = MessageDispatcher::default();

        assert_eq!(
            dispatcher
                .dispatch(&frame(Operation::VerifyReply, br#"{"code":0}"#))
                .unwrap(),
            Dispatch::VerifyReply { code: 0 }
        );
        assert_eq!(
            dispatcher
                .dispatch(&frame(Operation::HeartbeatReply, &[0, 0, 1, 0]))
                .unwrap(),
            Dispatch::HeartbeatReply {
                popularity: Some(256)
            }
        );
        assert_eq!(
            dispatcher
                .dispatch(&frame(Operation::HeartbeatReply, &[]))
                .unwrap(),
            Dispatch::HeartbeatReply { popularity: None }
        );
        assert!(matches!(
            dispatcher.dispatch(&frame(Operation::HeartbeatRequest, &[])),
            Ok(Dispatch::Ignored { operation: 2, .. })
        ));
    }

    #[test]
    fn invalid_json_skips_only_that_subframe() {
        let good = |text: &str| {
            let mut sample = danmu_sample();
            sample["info"][1] = json!(text);
            encode_frame(
                ProtocolVersion::PlainJson,
                Operation::Message,
                sample.to_string().as_bytes(),
            )
        };
        let mut raw = good("first");
        raw.extend(encode_frame(
            ProtocolVersion::PlainJson,
            Operation::Message,
            b"{not json",
        ));
        raw.extend(good("third"));

        let dispatcher = MessageDispatcher::default();
        let mut texts = Vec::new();
        let mut errors = 0;
        for sub in decode_frames(&raw).unwrap() {
            match dispatcher.dispatch(&sub.unwrap()) {
                Ok(Dispatch::Event(ChatEvent::Danmu(msg))) => texts.push(msg.text),
                Ok(other) => panic!("unexpected {:?}", other),
                Err(e) => {
                    assert!(matches!(e, ProtocolError::Json(_)));
                    errors += 1;
                }
            }
        }
        assert_eq!(texts, ["first", "third"]);
        assert_eq!(errors, 1);
    }

    #[test]
    fn truthiness() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(2)));
        assert!(is_truthy(&json!("x")));
        assert!(is_truthy(&json!([1])));
        assert!(is_truthy(&json!({"a": 1})));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!([])));
        assert!(!is_truthy(&json!({})));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&Value::Null));
    }
}
