use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A chat message that passed validation. Immutable once accepted; shared
/// between the room history and every broadcast via `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub username: String,
    pub avatar: String,
    pub room: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(flatten)]
    pub body: MessageBody,
}

/// Exactly one of text or inline image data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageBody {
    Text(String),
    Image(String),
}

/// Why a submitted payload was dropped. Never surfaced to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotAnObject,
    MissingUsername,
    MissingAvatar,
    MissingRoom,
    NoBody,
    BothBodies,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Rejection::NotAnObject => "payload is not an object",
            Rejection::MissingUsername => "missing username",
            Rejection::MissingAvatar => "missing avatar",
            Rejection::MissingRoom => "missing room",
            Rejection::NoBody => "neither text nor image present",
            Rejection::BothBodies => "both text and image present",
        })
    }
}

fn non_empty_str(payload: &Value, field: &str) -> Option<String> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

impl Message {
    /// Validates a raw payload at the boundary, before any state mutation.
    pub fn parse(payload: &Value) -> Result<Self, Rejection> {
        if !payload.is_object() {
            return Err(Rejection::NotAnObject);
        }

        let username = non_empty_str(payload, "username").ok_or(Rejection::MissingUsername)?;
        let avatar = non_empty_str(payload, "avatar").ok_or(Rejection::MissingAvatar)?;
        let room = non_empty_str(payload, "room").ok_or(Rejection::MissingRoom)?;

        let body = match (non_empty_str(payload, "text"), non_empty_str(payload, "image")) {
            (Some(text), None) => MessageBody::Text(text),
            (None, Some(image)) => MessageBody::Image(image),
            (None, None) => return Err(Rejection::NoBody),
            (Some(_), Some(_)) => return Err(Rejection::BothBodies),
        };

        // carried verbatim, not validated
        let time = payload
            .get("time")
            .and_then(Value::as_str)
            .map(str::to_owned);

        Ok(Message {
            username,
            avatar,
            room,
            time,
            body,
        })
    }
}

/// Call-signaling payload. Transient: relayed verbatim, never stored.
#[derive(Debug, Clone)]
pub enum Signal {
    Offer(Value),
    Answer(Value),
    Candidate(Value),
}

impl Signal {
    pub(crate) fn into_event(self) -> ServerEvent {
        match self {
            Signal::Offer(sdp) => ServerEvent::VideoOffer { sdp },
            Signal::Answer(sdp) => ServerEvent::VideoAnswer { sdp },
            Signal::Candidate(candidate) => ServerEvent::IceCandidate { candidate },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinRoom { room: String },
    ChatMessage(Value),
    VideoOffer { sdp: Value },
    VideoAnswer { sdp: Value },
    IceCandidate { candidate: Value },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    MessageHistory(Vec<Arc<Message>>),
    ChatMessage(Arc<Message>),
    VideoOffer { sdp: Value },
    VideoAnswer { sdp: Value },
    IceCandidate { candidate: Value },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_well_formed_text_message() {
        let payload = json!({
            "text": "hello",
            "username": "bob",
            "avatar": "u1",
            "room": "general",
            "time": "10:30",
        });
        let msg = Message::parse(&payload).unwrap();
        assert_eq!(msg.username, "bob");
        assert_eq!(msg.time.as_deref(), Some("10:30"));
        assert!(matches!(msg.body, MessageBody::Text(ref t) if t == "hello"));
    }

    #[test]
    fn accepts_image_message_without_time() {
        let payload = json!({
            "image": "data:image/png;base64,AAAA",
            "username": "ann",
            "avatar": "u2",
            "room": "general",
        });
        let msg = Message::parse(&payload).unwrap();
        assert!(msg.time.is_none());
        assert!(matches!(msg.body, MessageBody::Image(_)));
    }

    #[test]
    fn identical_payloads_parse_to_equal_messages() {
        let payload = json!({
            "text": "hello",
            "username": "bob",
            "avatar": "u1",
            "room": "general",
            "time": "10:30",
        });
        assert_eq!(Message::parse(&payload), Message::parse(&payload));

        let image = json!({
            "image": "data:,",
            "username": "bob",
            "avatar": "u1",
            "room": "general",
        });
        assert_ne!(Message::parse(&payload), Message::parse(&image));
    }

    #[test]
    fn rejects_bodyless_payload() {
        let payload = json!({ "username": "a", "avatar": "u", "room": "general" });
        assert_eq!(Message::parse(&payload), Err(Rejection::NoBody));
    }

    #[test]
    fn rejects_payload_with_both_bodies() {
        let payload = json!({
            "text": "hi",
            "image": "data:,",
            "username": "a",
            "avatar": "u",
            "room": "general",
        });
        assert_eq!(Message::parse(&payload), Err(Rejection::BothBodies));
    }

    #[test]
    fn rejects_missing_or_empty_required_fields() {
        let payload = json!({ "text": "hi", "avatar": "u", "room": "general" });
        assert_eq!(Message::parse(&payload), Err(Rejection::MissingUsername));

        let payload = json!({ "text": "hi", "username": "", "avatar": "u", "room": "general" });
        assert_eq!(Message::parse(&payload), Err(Rejection::MissingUsername));

        let payload = json!({ "text": "hi", "username": "a", "room": "general" });
        assert_eq!(Message::parse(&payload), Err(Rejection::MissingAvatar));

        let payload = json!({ "text": "hi", "username": "a", "avatar": "u" });
        assert_eq!(Message::parse(&payload), Err(Rejection::MissingRoom));

        assert_eq!(Message::parse(&json!("hi")), Err(Rejection::NotAnObject));
    }

    #[test]
    fn chat_message_wire_shape() {
        let msg = Arc::new(
            Message::parse(&json!({
                "text": "hello",
                "username": "bob",
                "avatar": "u1",
                "room": "general",
                "time": "10:30",
            }))
            .unwrap(),
        );
        let frame = serde_json::to_value(ServerEvent::ChatMessage(msg)).unwrap();
        assert_eq!(frame["event"], "chat-message");
        assert_eq!(frame["data"]["text"], "hello");
        assert_eq!(frame["data"]["username"], "bob");
        assert_eq!(frame["data"]["time"], "10:30");
        assert!(frame["data"].get("image").is_none());
    }

    #[test]
    fn client_events_decode_by_event_name() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "video-offer",
            "data": { "sdp": { "type": "offer", "sdp": "v=0" } },
        }))
        .unwrap();
        assert!(matches!(event, ClientEvent::VideoOffer { .. }));

        let event: ClientEvent = serde_json::from_value(json!({
            "event": "join-room",
            "data": { "room": "general" },
        }))
        .unwrap();
        assert!(matches!(event, ClientEvent::JoinRoom { room } if room == "general"));
    }
}
