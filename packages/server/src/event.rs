//! Wire events and boundary validation.
//!
//! Every frame is a JSON envelope `{"event": "<name>", "data": {...}}`, one
//! frame per event, in both directions. Inbound frames decode into one
//! [`ClientEvent`] variant per catalog entry; the decode step performs the
//! field-presence and type checks, so the dispatch code only ever sees
//! validated events.
//!
//! Truthiness follows the conventions of the browser client: `null`,
//! `false`, `0` and `""` are falsy, everything else (including `[]` and
//! `{}`) is truthy.

use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    domain::{ConnectionId, OnlineUser},
    error::RelayError,
};

/// JS-style string coercion for loosely-typed payload fields: strings
/// interpolate without quotes, anything else uses its JSON rendering.
pub(crate) fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// JS-style truthiness for loosely-typed payload fields.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

fn parse_payload<T: DeserializeOwned>(event: &'static str, data: &Value) -> Result<T, RelayError> {
    serde_json::from_value(data.clone()).map_err(|_| RelayError::InvalidPayload {
        event,
        payload: data.clone(),
    })
}

fn ensure(ok: bool, event: &'static str, data: &Value) -> Result<(), RelayError> {
    if ok {
        Ok(())
    } else {
        Err(RelayError::InvalidPayload {
            event,
            payload: data.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JoinMeeting {
    pub username: String,
    pub position: Value,
    pub character: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskStatusUpdate {
    #[serde(rename = "taskId")]
    pub task_id: Value,
    /// Strict boolean: any other JSON type fails the decode.
    pub status: bool,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskCompleted {
    /// Any truthy JSON value; non-string values are coerced for the
    /// notification message the way a JS template literal would.
    pub username: Value,
    pub task: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ShareTask {
    pub task: Value,
    pub sender: Value,
    /// Looked up in the username index after string coercion.
    pub recipient: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpdatePosition {
    pub id: String,
    pub position: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SendMessage {
    pub id: Value,
    pub message: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebrtcSignal {
    pub target: String,
    /// Opaque peer-signaling payload, relayed verbatim.
    pub signal: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpdateTasks {
    /// Must be an array; the items themselves are not validated.
    pub tasks: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GetTasks {
    #[serde(rename = "targetId")]
    pub target_id: String,
}

/// A validated inbound event, one variant per catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    JoinMeeting(JoinMeeting),
    TaskStatusUpdate(TaskStatusUpdate),
    TaskCompleted(TaskCompleted),
    ShareTask(ShareTask),
    /// `raw` keeps the payload exactly as received, because the emission
    /// forwards it unchanged to the other clients.
    UpdatePosition { payload: UpdatePosition, raw: Value },
    SendMessage(SendMessage),
    WebrtcSignal(WebrtcSignal),
    UpdateTasks(UpdateTasks),
    GetTasks(GetTasks),
}

impl ClientEvent {
    /// Decode and validate one inbound text frame.
    pub fn decode(frame: &str) -> Result<Self, RelayError> {
        let envelope: Envelope =
            serde_json::from_str(frame).map_err(|e| RelayError::MalformedFrame {
                reason: e.to_string(),
            })?;
        Self::from_parts(&envelope.event, envelope.data)
    }

    /// Build a validated event from an event name and its data payload.
    pub fn from_parts(event: &str, data: Value) -> Result<Self, RelayError> {
        match event {
            "joinMeeting" => {
                let payload: JoinMeeting = parse_payload("joinMeeting", &data)?;
                ensure(
                    !payload.username.is_empty()
                        && is_truthy(&payload.position)
                        && !payload.character.is_empty(),
                    "joinMeeting",
                    &data,
                )?;
                Ok(Self::JoinMeeting(payload))
            }
            "taskStatusUpdate" => {
                let payload: TaskStatusUpdate = parse_payload("taskStatusUpdate", &data)?;
                ensure(is_truthy(&payload.task_id), "taskStatusUpdate", &data)?;
                Ok(Self::TaskStatusUpdate(payload))
            }
            "taskCompleted" => {
                let payload: TaskCompleted = parse_payload("taskCompleted", &data)?;
                ensure(
                    is_truthy(&payload.username) && is_truthy(&payload.task),
                    "taskCompleted",
                    &data,
                )?;
                Ok(Self::TaskCompleted(payload))
            }
            "shareTask" => {
                let payload: ShareTask = parse_payload("shareTask", &data)?;
                ensure(
                    is_truthy(&payload.task)
                        && is_truthy(&payload.sender)
                        && is_truthy(&payload.recipient),
                    "shareTask",
                    &data,
                )?;
                Ok(Self::ShareTask(payload))
            }
            "updatePosition" => {
                let payload: UpdatePosition = parse_payload("updatePosition", &data)?;
                ensure(
                    !payload.id.is_empty()
                        && payload.position.get("x").is_some_and(Value::is_number)
                        && payload.position.get("y").is_some_and(Value::is_number),
                    "updatePosition",
                    &data,
                )?;
                Ok(Self::UpdatePosition { payload, raw: data })
            }
            "sendMessage" => {
                let payload: SendMessage = parse_payload("sendMessage", &data)?;
                ensure(
                    is_truthy(&payload.id) && is_truthy(&payload.message),
                    "sendMessage",
                    &data,
                )?;
                Ok(Self::SendMessage(payload))
            }
            "webrtc-signal" => {
                let payload: WebrtcSignal = parse_payload("webrtc-signal", &data)?;
                ensure(
                    !payload.target.is_empty() && is_truthy(&payload.signal),
                    "webrtc-signal",
                    &data,
                )?;
                Ok(Self::WebrtcSignal(payload))
            }
            "updateTasks" => {
                let payload: UpdateTasks = parse_payload("updateTasks", &data)?;
                Ok(Self::UpdateTasks(payload))
            }
            "getTasks" => {
                let payload: GetTasks = parse_payload("getTasks", &data)?;
                ensure(!payload.target_id.is_empty(), "getTasks", &data)?;
                Ok(Self::GetTasks(payload))
            }
            other => Err(RelayError::UnknownEvent(other.to_string())),
        }
    }
}

/// An outbound event, serialized once per emission as the same
/// `{"event", "data"}` envelope.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Full roster snapshot, sent to a freshly joined client.
    #[serde(rename = "updateUsers")]
    UpdateUsers(Vec<OnlineUser>),
    /// New-user notice for everyone else.
    #[serde(rename = "user-joined")]
    UserJoined(OnlineUser),
    #[serde(rename = "taskStatusUpdated")]
    TaskStatusUpdated {
        #[serde(rename = "taskId")]
        task_id: Value,
        status: bool,
        username: String,
    },
    #[serde(rename = "taskNotification")]
    TaskNotification {
        username: Value,
        task: Value,
        message: String,
    },
    #[serde(rename = "taskShared")]
    TaskShared { sender: Value, task: Value },
    /// The inbound `updatePosition` payload, forwarded unchanged.
    #[serde(rename = "updatePosition")]
    UpdatePosition(Value),
    #[serde(rename = "chatMessage")]
    ChatMessage { id: Value, message: Value },
    #[serde(rename = "webrtc-signal")]
    WebrtcSignal {
        sender: ConnectionId,
        signal: Value,
    },
    #[serde(rename = "receiveTasks")]
    ReceiveTasks {
        #[serde(rename = "targetId")]
        target_id: String,
        tasks: Vec<Value>,
    },
}
