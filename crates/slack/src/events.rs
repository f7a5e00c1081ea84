use serde::{Deserialize, Deserializer};

pub const MESSAGE_CHANGED_SUBTYPE: &str = "message_changed";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameKind {
    Hello,
    Message,
    Other(String),
}

#[derive(Debug, Deserialize)]
struct FrameHeader {
    #[serde(default, rename = "type")]
    kind: String,
}

/// Reads only the `type` discriminator; the rest of the frame is left alone.
pub fn frame_kind(frame: &str) -> Result<FrameKind, serde_json::Error> {
    let header = serde_json::from_str::<FrameHeader>(frame)?;
    Ok(match header.kind.as_str() {
        "hello" => FrameKind::Hello,
        "message" => FrameKind::Message,
        _ => FrameKind::Other(header.kind),
    })
}

/// A `message` event from the RTM stream.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MessageEvent {
    #[serde(deserialize_with = "null_as_empty")]
    pub channel: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub ts: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub text: String,
    pub subtype: Option<String>,
    /// Present on `message_changed` events; carries the edited text.
    pub message: Option<EditedMessage>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EditedMessage {
    #[serde(deserialize_with = "null_as_empty")]
    pub text: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub ts: String,
}

/// Slack sends `null` for absent strings on some events (attachment-only posts).
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EffectiveMessage<'a> {
    pub text: &'a str,
    pub timestamp: &'a str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageCategory<'a> {
    Regular(EffectiveMessage<'a>),
    Changed(EffectiveMessage<'a>),
    Ignored { subtype: &'a str },
}

impl MessageEvent {
    pub fn parse(frame: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(frame)
    }

    pub fn subtype(&self) -> &str {
        self.subtype.as_deref().unwrap_or_default()
    }

    pub fn categorize(&self) -> MessageCategory<'_> {
        match self.subtype() {
            "" => MessageCategory::Regular(EffectiveMessage { text: &self.text, timestamp: &self.ts }),
            MESSAGE_CHANGED_SUBTYPE => {
                let (text, timestamp) = self
                    .message
                    .as_ref()
                    .map(|edited| (edited.text.as_str(), edited.ts.as_str()))
                    .unwrap_or_default();
                MessageCategory::Changed(EffectiveMessage { text, timestamp })
            }
            subtype => MessageCategory::Ignored { subtype },
        }
    }
}
