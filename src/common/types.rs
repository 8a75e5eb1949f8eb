use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record id as the server sends it: a string (Mongo `_id`) or a number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecordId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

impl RecordId {
    fn into_string(self) -> String {
        match self {
            RecordId::Text(text) => text,
            RecordId::Signed(n) => n.to_string(),
            RecordId::Unsigned(n) => n.to_string(),
        }
    }
}

// Documents serialized with virtuals carry both `id` and `_id`; `id` wins.
fn pick_id(id: Option<RecordId>, object_id: Option<RecordId>) -> Result<String, String> {
    id.or(object_id)
        .map(RecordId::into_string)
        .ok_or_else(|| "missing field `id`".to_string())
}

/// A reachable user listed by the directory endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "PeerRecord")]
pub struct Peer {
    pub id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
}

impl Peer {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            email: None,
            profile_pic: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PeerRecord {
    #[serde(default)]
    id: Option<RecordId>,
    #[serde(rename = "_id", default)]
    object_id: Option<RecordId>,
    #[serde(alias = "fullName", default)]
    display_name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    profile_pic: Option<String>,
}

impl TryFrom<PeerRecord> for Peer {
    type Error = String;

    fn try_from(record: PeerRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: pick_id(record.id, record.object_id)?,
            display_name: record.display_name,
            email: record.email,
            profile_pic: record.profile_pic,
        })
    }
}

/// One chat message as stored by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "MessageRecord")]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageRecord {
    #[serde(default)]
    id: Option<RecordId>,
    #[serde(rename = "_id", default)]
    object_id: Option<RecordId>,
    sender_id: RecordId,
    #[serde(alias = "receiverId", default)]
    recipient_id: Option<RecordId>,
    #[serde(alias = "text", default)]
    content: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl TryFrom<MessageRecord> for Message {
    type Error = String;

    fn try_from(record: MessageRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: pick_id(record.id, record.object_id)?,
            sender_id: record.sender_id.into_string(),
            recipient_id: record
                .recipient_id
                .map(RecordId::into_string)
                .unwrap_or_default(),
            content: record.content,
            image: record.image,
            created_at: record.created_at,
        })
    }
}

/// Body of a create-message request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl OutgoingMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            image: None,
        }
    }
}
