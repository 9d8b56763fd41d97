use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::user::UserIdentity;

/// Chat message routing kinds accepted over the socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// One-to-one message addressed by user id
    Private,
    /// Message fanned out to the members of a group
    Group,
    /// Message delivered to everyone online
    Broadcast,
}

impl MessageType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "private" => Some(Self::Private),
            "group" => Some(Self::Group),
            "broadcast" => Some(Self::Broadcast),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Group => "group",
            Self::Broadcast => "broadcast",
        }
    }
}

/// Frame as sent by a client. Anything the server assigns is ignored here.
#[derive(Debug, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub to: Option<i64>,
    #[serde(default)]
    pub group_id: Option<String>,
    pub content: String,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unknown message type: {0}")]
    UnknownType(String),
    #[error("private message without recipient")]
    MissingRecipient,
    #[error("group message without group id")]
    MissingGroup,
}

impl InboundFrame {
    pub fn decode(text: &str) -> Result<Self, FrameError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Attribute the frame to `sender` and stamp it with the receipt time.
    pub fn into_message(
        self,
        sender: &UserIdentity,
        received_at: DateTime<Utc>,
    ) -> Result<ChatMessage, FrameError> {
        let kind = MessageType::parse(&self.type_).ok_or(FrameError::UnknownType(self.type_))?;

        let (to, group_id) = match kind {
            MessageType::Private => (Some(self.to.ok_or(FrameError::MissingRecipient)?), None),
            MessageType::Group => {
                let group_id = self
                    .group_id
                    .filter(|id| !id.trim().is_empty())
                    .ok_or(FrameError::MissingGroup)?;
                (None, Some(group_id))
            }
            MessageType::Broadcast => (None, None),
        };

        Ok(ChatMessage {
            kind,
            to,
            group_id,
            content: self.content,
            from: sender.id,
            sender_nickname: sender.nickname.clone(),
            sender_avatar: sender.avatar.clone(),
            timestamp: received_at.timestamp(),
        })
    }
}

/// Chat message as delivered to recipients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub content: String,
    pub from: i64,
    pub sender_nickname: String,
    pub sender_avatar: String,
    /// Unix seconds, assigned on receipt
    pub timestamp: i64,
}

/// A persisted message as returned by the history endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoredMessage {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: Option<i64>,
    pub group_id: Option<String>,
    pub content: String,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn alice() -> UserIdentity {
        UserIdentity {
            id: 1,
            nickname: "alice".into(),
            avatar: "alice.png".into(),
        }
    }

    #[test]
    fn client_timestamp_and_sender_are_overridden() {
        let frame = InboundFrame::decode(
            r#"{"type":"private","to":2,"content":"hi","timestamp":12,"from":99}"#,
        )
        .unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let message = frame.into_message(&alice(), now).unwrap();

        assert_eq!(message.kind, MessageType::Private);
        assert_eq!(message.to, Some(2));
        assert_eq!(message.from, 1);
        assert_eq!(message.timestamp, now.timestamp());
    }

    #[test]
    fn encoded_message_uses_wire_names() {
        let frame =
            InboundFrame::decode(r#"{"type":"group","group_id":"7","content":"hey"}"#).unwrap();
        let message = frame.into_message(&alice(), Utc::now()).unwrap();
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["type"], "group");
        assert_eq!(value["group_id"], "7");
        assert!(value.get("to").is_none());
        assert_eq!(value["sender_nickname"], "alice");
    }

    #[test]
    fn incomplete_frames_are_rejected() {
        let missing_to = InboundFrame::decode(r#"{"type":"private","content":"x"}"#).unwrap();
        assert!(matches!(
            missing_to.into_message(&alice(), Utc::now()),
            Err(FrameError::MissingRecipient)
        ));

        let blank_group =
            InboundFrame::decode(r#"{"type":"group","group_id":" ","content":"x"}"#).unwrap();
        assert!(matches!(
            blank_group.into_message(&alice(), Utc::now()),
            Err(FrameError::MissingGroup)
        ));

        let unknown = InboundFrame::decode(r#"{"type":"typing","content":""}"#).unwrap();
        assert!(matches!(
            unknown.into_message(&alice(), Utc::now()),
            Err(FrameError::UnknownType(t)) if t == "typing"
        ));

        assert!(matches!(
            InboundFrame::decode("{not json"),
            Err(FrameError::Malformed(_))
        ));
    }
}
