//! Push-channel message types and parser.
//!
//! The backend sends JSON messages over WebSocket with the shape
//! `{"type": "<kind>", "data": {...}}`. Only the kinds that drive the
//! progress indicator are modelled. The `type` field alone selects the
//! kind; a missing or `null` `data` block is read as empty, so an
//! `executed` message always clears the started flag.

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use atelier_core::protocol::{MSG_TYPE_EXECUTED, MSG_TYPE_EXECUTING, MSG_TYPE_PROGRESS};

const KNOWN_TYPES: &[&str] = &[MSG_TYPE_PROGRESS, MSG_TYPE_EXECUTING, MSG_TYPE_EXECUTED];

/// Push messages the panel reacts to.
#[derive(Debug, Clone)]
pub enum PushMessage {
    /// Step-level progress of the running job.
    Progress(ProgressData),

    /// A node is executing; `node` is `None` once the prompt is done.
    Executing(ExecutingData),

    /// A node finished and produced output.
    Executed(Value),
}

/// Payload for `progress` messages.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgressData {
    /// Completion fraction; expected in `[0, 1]` but not trusted.
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub desc: Option<String>,
}

impl ProgressData {
    /// The reported fraction, `0` when absent or `null`.
    pub fn fraction(&self) -> f64 {
        self.value.unwrap_or(0.0)
    }
}

/// Payload for `executing` messages.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutingData {
    /// Node id; numeric ids are kept as their decimal text.
    #[serde(default, deserialize_with = "node_id")]
    pub node: Option<String>,
    #[serde(default)]
    pub prompt_id: Option<String>,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NodeRef {
    Text(String),
    Number(serde_json::Number),
}

fn node_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<NodeRef>::deserialize(deserializer)?.map(|node| match node {
        NodeRef::Text(id) => id,
        NodeRef::Number(id) => id.to_string(),
    }))
}

/// Parse a push-channel text frame.
///
/// Returns `Err` for malformed JSON, unknown `type` values and payload
/// fields of the wrong type.
pub fn parse_message(text: &str) -> Result<PushMessage, serde_json::Error> {
    let Envelope { kind, data } = serde_json::from_str(text)?;
    let data = if data.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        data
    };

    match kind.as_str() {
        MSG_TYPE_PROGRESS => Ok(PushMessage::Progress(serde_json::from_value(data)?)),
        MSG_TYPE_EXECUTING => Ok(PushMessage::Executing(serde_json::from_value(data)?)),
        MSG_TYPE_EXECUTED => Ok(PushMessage::Executed(data)),
        other => Err(de::Error::unknown_variant(other, KNOWN_TYPES)),
    }
}
