use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ids handed out locally before the server has seen the draft start with this.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Whether `id` names a draft that exists on the server.
pub fn is_server_id(id: Option<&str>) -> bool {
    id.is_some_and(|id| !id.is_empty() && !id.starts_with(LOCAL_ID_PREFIX))
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// The latest known state of one draft, as kept on the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSnapshot {
    pub draft_id: Option<String>,
    pub content: Value,
    /// Epoch millis of the last local change.
    pub updated_at: i64,
}

impl DraftSnapshot {
    pub fn empty() -> Self {
        Self {
            draft_id: None,
            content: Value::Null,
            updated_at: 0,
        }
    }

    pub fn server_id(&self) -> Option<&str> {
        self.draft_id
            .as_deref()
            .filter(|id| is_server_id(Some(id)))
    }
}

/// A draft as listed by the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDraft {
    pub id: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(with = "timestamp")]
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboxOp {
    Create,
    Update,
    Delete,
}

/// A pending mutation for one draft key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    #[serde(rename = "type")]
    pub op: OutboxOp,
    /// Draft id for update/delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Content for create/update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    pub attempts: u32,
}

/// Reported when the server holds a draft newer than the local snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftConflict {
    pub key: String,
    /// `None` when nothing was stored locally.
    pub local: Option<DraftSnapshot>,
    pub remote: RemoteDraft,
}

/// Timestamps arrive as epoch millis or RFC 3339 strings; both become millis.
pub(crate) mod timestamp {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(millis: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(*millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .ok_or_else(|| de::Error::custom("timestamp out of range")),
            Value::String(s) => parse(&s).ok_or_else(|| {
                de::Error::custom(format!("unrecognised timestamp '{}'", s))
            }),
            other => Err(de::Error::custom(format!(
                "expected timestamp, got {}",
                other
            ))),
        }
    }

    fn parse(s: &str) -> Option<i64> {
        if let Ok(millis) = s.parse::<i64>() {
            return Some(millis);
        }
        chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.timestamp_millis())
    }
}
