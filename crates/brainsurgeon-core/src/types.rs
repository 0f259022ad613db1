// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message types shared by the store, the dispatcher, and every handler.
//!
//! The payload is a closed tagged union keyed by [`MessageType`]: one variant
//! per schema, so handlers match exhaustively instead of poking at untyped
//! JSON. On the wire a payload renders as `{"type": "...", "payload": {...}}`
//! with camelCase field names, the format the extension process speaks.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Globally unique, time-ordered message identifier (UUID v7).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a fresh identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The process that produced a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// The extension observing live session activity.
    Extension,
    /// The API process performing maintenance.
    Api,
}

/// Closed set of message kinds carried by the bus.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
pub enum MessageType {
    #[strum(serialize = "session.updated")]
    #[serde(rename = "session.updated")]
    SessionUpdated,
    #[strum(serialize = "session.compacted")]
    #[serde(rename = "session.compacted")]
    SessionCompacted,
    #[strum(serialize = "prune.request")]
    #[serde(rename = "prune.request")]
    PruneRequest,
    #[strum(serialize = "prune.response")]
    #[serde(rename = "prune.response")]
    PruneResponse,
    #[strum(serialize = "restore.request")]
    #[serde(rename = "restore.request")]
    RestoreRequest,
    #[strum(serialize = "restore.response")]
    #[serde(rename = "restore.response")]
    RestoreResponse,
}

impl MessageType {
    pub const ALL: [MessageType; 6] = [
        MessageType::SessionUpdated,
        MessageType::SessionCompacted,
        MessageType::PruneRequest,
        MessageType::PruneResponse,
        MessageType::RestoreRequest,
        MessageType::RestoreResponse,
    ];

    /// Returns `true` for the `*.request` half of a protocol round-trip.
    pub fn is_request(self) -> bool {
        matches!(self, Self::PruneRequest | Self::RestoreRequest)
    }

    /// The message type that answers this one, if it is a request.
    pub fn response_type(self) -> Option<MessageType> {
        match self {
            Self::PruneRequest => Some(Self::PruneResponse),
            Self::RestoreRequest => Some(Self::RestoreResponse),
            _ => None,
        }
    }
}

/// `session.updated`: the extension saw new transcript entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdated {
    pub agent_id: String,
    pub session_id: String,
    #[serde(default)]
    pub entry_count: u64,
    #[serde(default)]
    pub last_entry_type: String,
}

/// `session.compacted`: the transcript was compacted in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCompacted {
    pub agent_id: String,
    pub session_id: String,
    #[serde(default)]
    pub entries_before: u64,
    #[serde(default)]
    pub entries_after: u64,
}

/// `prune.request`: externalize large tool outputs from a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneRequest {
    pub agent_id: String,
    pub session_id: String,
    /// Number of most recent tool outputs to keep inline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u32>,
}

/// `prune.response`: outcome of one handled [`PruneRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneResponse {
    pub agent_id: String,
    pub session_id: String,
    /// Count of entries externalized by this request.
    #[serde(default)]
    pub externalized: u32,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PruneResponse {
    pub fn succeeded(request: &PruneRequest, externalized: u32) -> Self {
        Self {
            agent_id: request.agent_id.clone(),
            session_id: request.session_id.clone(),
            externalized,
            success: true,
            error: None,
        }
    }

    pub fn failed(request: &PruneRequest, error: impl Into<String>) -> Self {
        Self {
            agent_id: request.agent_id.clone(),
            session_id: request.session_id.clone(),
            externalized: 0,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// `restore.request`: bring one externalized tool output back inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreRequest {
    pub agent_id: String,
    pub session_id: String,
    pub tool_call_id: String,
}

/// `restore.response`: outcome of one handled [`RestoreRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreResponse {
    pub agent_id: String,
    pub session_id: String,
    pub tool_call_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RestoreResponse {
    pub fn succeeded(request: &RestoreRequest) -> Self {
        Self {
            agent_id: request.agent_id.clone(),
            session_id: request.session_id.clone(),
            tool_call_id: request.tool_call_id.clone(),
            success: true,
            error: None,
        }
    }

    pub fn failed(request: &RestoreRequest, error: impl Into<String>) -> Self {
        Self {
            agent_id: request.agent_id.clone(),
            session_id: request.session_id.clone(),
            tool_call_id: request.tool_call_id.clone(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Typed message body, one variant per [`MessageType`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum MessagePayload {
    #[serde(rename = "session.updated")]
    SessionUpdated(SessionUpdated),
    #[serde(rename = "session.compacted")]
    SessionCompacted(SessionCompacted),
    #[serde(rename = "prune.request")]
    PruneRequest(PruneRequest),
    #[serde(rename = "prune.response")]
    PruneResponse(PruneResponse),
    #[serde(rename = "restore.request")]
    RestoreRequest(RestoreRequest),
    #[serde(rename = "restore.response")]
    RestoreResponse(RestoreResponse),
}

impl MessagePayload {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::SessionUpdated(_) => MessageType::SessionUpdated,
            Self::SessionCompacted(_) => MessageType::SessionCompacted,
            Self::PruneRequest(_) => MessageType::PruneRequest,
            Self::PruneResponse(_) => MessageType::PruneResponse,
            Self::RestoreRequest(_) => MessageType::RestoreRequest,
            Self::RestoreResponse(_) => MessageType::RestoreResponse,
        }
    }

    pub fn agent_id(&self) -> &str {
        match self {
            Self::SessionUpdated(p) => &p.agent_id,
            Self::SessionCompacted(p) => &p.agent_id,
            Self::PruneRequest(p) => &p.agent_id,
            Self::PruneResponse(p) => &p.agent_id,
            Self::RestoreRequest(p) => &p.agent_id,
            Self::RestoreResponse(p) => &p.agent_id,
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            Self::SessionUpdated(p) => &p.session_id,
            Self::SessionCompacted(p) => &p.session_id,
            Self::PruneRequest(p) => &p.session_id,
            Self::PruneResponse(p) => &p.session_id,
            Self::RestoreRequest(p) => &p.session_id,
            Self::RestoreResponse(p) => &p.session_id,
        }
    }

    /// Serialize only the body (without the type tag), as stored in the
    /// `payload` column.
    pub fn body_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::SessionUpdated(p) => serde_json::to_string(p),
            Self::SessionCompacted(p) => serde_json::to_string(p),
            Self::PruneRequest(p) => serde_json::to_string(p),
            Self::PruneResponse(p) => serde_json::to_string(p),
            Self::RestoreRequest(p) => serde_json::to_string(p),
            Self::RestoreResponse(p) => serde_json::to_string(p),
        }
    }

    /// Rebuild a payload from its stored type tag and body.
    pub fn from_body(kind: MessageType, body: &str) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            MessageType::SessionUpdated => Self::SessionUpdated(serde_json::from_str(body)?),
            MessageType::SessionCompacted => Self::SessionCompacted(serde_json::from_str(body)?),
            MessageType::PruneRequest => Self::PruneRequest(serde_json::from_str(body)?),
            MessageType::PruneResponse => Self::PruneResponse(serde_json::from_str(body)?),
            MessageType::RestoreRequest => Self::RestoreRequest(serde_json::from_str(body)?),
            MessageType::RestoreResponse => Self::RestoreResponse(serde_json::from_str(body)?),
        })
    }
}

impl From<SessionUpdated> for MessagePayload {
    fn from(p: SessionUpdated) -> Self {
        Self::SessionUpdated(p)
    }
}

impl From<SessionCompacted> for MessagePayload {
    fn from(p: SessionCompacted) -> Self {
        Self::SessionCompacted(p)
    }
}

impl From<PruneRequest> for MessagePayload {
    fn from(p: PruneRequest) -> Self {
        Self::PruneRequest(p)
    }
}

impl From<PruneResponse> for MessagePayload {
    fn from(p: PruneResponse) -> Self {
        Self::PruneResponse(p)
    }
}

impl From<RestoreRequest> for MessagePayload {
    fn from(p: RestoreRequest) -> Self {
        Self::RestoreRequest(p)
    }
}

impl From<RestoreResponse> for MessagePayload {
    fn from(p: RestoreResponse) -> Self {
        Self::RestoreResponse(p)
    }
}

/// A persisted bus message.
///
/// `payload` and `id` never change after creation; only the dispatch loop
/// flips `processed` (once) and stamps `processed_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    #[serde(flatten)]
    pub payload: MessagePayload,
    pub timestamp: DateTime<Utc>,
    pub source: Source,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        self.payload.message_type()
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}
