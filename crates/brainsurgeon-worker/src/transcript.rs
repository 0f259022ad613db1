// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`Externalizer`] over OpenClaw JSONL transcripts.
//!
//! A transcript lives at `agents/<agent>/sessions/<session>.jsonl`, one JSON
//! entry per line. Tool outputs are either `{"type": "tool_result", ...}`
//! entries or `{"type": "message", "message": {"role": "tool" | "toolResult"}}`
//! entries. Externalizing one moves its content to
//! `agents/<agent>/sessions/extracted/<session>/<toolCallId>.json` and leaves
//! a placeholder behind.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use brainsurgeon_config::model::BrainsurgeonConfig;
use brainsurgeon_core::{BrainsurgeonError, Externalizer};
use brainsurgeon_trash::validate_id;

/// Text left in place of externalized content.
pub const PLACEHOLDER: &str = "[externalized]";

const MARKER: &str = "_externalized";

/// One transcript line. Blank lines and lines that are not JSON objects are
/// written back untouched.
enum Line {
    Raw(String),
    Entry(Value),
}

impl Line {
    fn parse(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(v) if v.is_object() => Line::Entry(v),
            _ => Line::Raw(raw.to_string()),
        }
    }

    fn render(&self) -> Result<String, BrainsurgeonError> {
        match self {
            Line::Raw(s) => Ok(s.clone()),
            Line::Entry(v) => serde_json::to_string(v)
                .map_err(|e| BrainsurgeonError::Internal(format!("serialize transcript entry: {e}"))),
        }
    }
}

fn is_tool_output(entry: &Value) -> bool {
    match entry.get("type").and_then(Value::as_str) {
        Some("tool_result") => true,
        Some("message") => matches!(
            entry.pointer("/message/role").and_then(Value::as_str),
            Some("tool" | "toolResult")
        ),
        _ => false,
    }
}

fn tool_call_id(entry: &Value) -> Option<&str> {
    ["/toolCallId", "/tool_call_id", "/message/toolCallId", "/message/tool_call_id"]
        .iter()
        .find_map(|p| entry.pointer(p).and_then(Value::as_str))
}

fn carries_marker(entry: &Value) -> bool {
    entry.get(MARKER).and_then(Value::as_bool).unwrap_or(false)
}

fn is_placeholder_for(entry: &Value, call_id: &str) -> bool {
    carries_marker(entry) && tool_call_id(entry) == Some(call_id)
}

fn content_slot(entry: &mut Value) -> Option<&mut Value> {
    if entry.get("type").and_then(Value::as_str) == Some("message") {
        entry.get_mut("message")?.get_mut("content")
    } else {
        entry.get_mut("content")
    }
}

fn set_marker(entry: &mut Value, on: bool) {
    if let Some(obj) = entry.as_object_mut() {
        if on {
            obj.insert(MARKER.to_string(), Value::Bool(true));
        } else {
            obj.remove(MARKER);
        }
    }
}

/// Externalizer that edits transcripts on the local filesystem.
#[derive(Debug, Clone)]
pub struct JsonlExternalizer {
    root: PathBuf,
    default_keep_recent: u32,
}

impl JsonlExternalizer {
    pub fn new(root: impl Into<PathBuf>, default_keep_recent: u32) -> Self {
        Self {
            root: root.into(),
            default_keep_recent,
        }
    }

    pub fn from_config(config: &BrainsurgeonConfig) -> Self {
        Self::new(config.paths.openclaw_root(), config.worker.default_keep_recent)
    }

    fn sessions_dir(&self, agent_id: &str) -> PathBuf {
        self.root.join("agents").join(agent_id).join("sessions")
    }

    pub fn transcript_path(&self, agent_id: &str, session_id: &str) -> PathBuf {
        self.sessions_dir(agent_id).join(format!("{session_id}.jsonl"))
    }

    pub fn extracted_dir(&self, agent_id: &str, session_id: &str) -> PathBuf {
        self.sessions_dir(agent_id).join("extracted").join(session_id)
    }

    async fn load(&self, path: &Path) -> Result<Vec<Line>, BrainsurgeonError> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BrainsurgeonError::Validation(format!(
                    "transcript not found: {}",
                    path.display()
                )));
            }
            Err(e) => {
                return Err(BrainsurgeonError::Internal(format!(
                    "read {}: {e}",
                    path.display()
                )));
            }
        };
        Ok(text.lines().map(Line::parse).collect())
    }

    /// Rewrite through a sibling temp file so readers never see half a
    /// transcript.
    async fn store(&self, path: &Path, lines: &[Line]) -> Result<(), BrainsurgeonError> {
        let mut body = String::new();
        for line in lines {
            body.push_str(&line.render()?);
            body.push('\n');
        }
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("transcript.jsonl");
        let tmp = path.with_file_name(format!(".{file_name}.tmp"));
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| BrainsurgeonError::Internal(format!("write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| BrainsurgeonError::Internal(format!("replace {}: {e}", path.display())))
    }
}

#[async_trait]
impl Externalizer for JsonlExternalizer {
    async fn externalize(
        &self,
        agent_id: &str,
        session_id: &str,
        threshold: Option<u32>,
    ) -> Result<u32, BrainsurgeonError> {
        validate_id("agent id", agent_id)?;
        validate_id("session id", session_id)?;
        let keep = threshold.unwrap_or(self.default_keep_recent) as usize;

        let path = self.transcript_path(agent_id, session_id);
        let mut lines = self.load(&path).await?;

        let outputs: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter_map(|(i, l)| match l {
                Line::Entry(v) if is_tool_output(v) => Some(i),
                _ => None,
            })
            .collect();
        let older = outputs.len().saturating_sub(keep);

        let extracted = self.extracted_dir(agent_id, session_id);
        let mut count = 0u32;
        for &index in &outputs[..older] {
            let Line::Entry(entry) = &mut lines[index] else {
                continue;
            };
            if carries_marker(entry) {
                continue;
            }
            let Some(id) = tool_call_id(entry).map(str::to_string) else {
                debug!(agent_id, session_id, line = index, "tool output without a call id; kept inline");
                continue;
            };
            if let Err(e) = validate_id("tool call id", &id) {
                warn!(agent_id, session_id, error = %e, "tool output kept inline");
                continue;
            }
            let Some(slot) = content_slot(entry) else {
                continue;
            };

            let payload = serde_json::to_vec(slot)
                .map_err(|e| BrainsurgeonError::Internal(format!("serialize tool output: {e}")))?;
            tokio::fs::create_dir_all(&extracted).await.map_err(|e| {
                BrainsurgeonError::Internal(format!("create {}: {e}", extracted.display()))
            })?;
            let target = extracted.join(format!("{id}.json"));
            tokio::fs::write(&target, payload)
                .await
                .map_err(|e| BrainsurgeonError::Internal(format!("write {}: {e}", target.display())))?;

            *slot = Value::String(PLACEHOLDER.to_string());
            set_marker(entry, true);
            count += 1;
        }

        if count > 0 {
            self.store(&path, &lines).await?;
        }
        info!(agent_id, session_id, externalized = count, kept = keep, "transcript pruned");
        Ok(count)
    }

    async fn is_externalized(
        &self,
        agent_id: &str,
        session_id: &str,
        call_id: &str,
    ) -> Result<bool, BrainsurgeonError> {
        validate_id("agent id", agent_id)?;
        validate_id("session id", session_id)?;
        let lines = self.load(&self.transcript_path(agent_id, session_id)).await?;
        Ok(lines
            .iter()
            .any(|l| matches!(l, Line::Entry(v) if is_placeholder_for(v, call_id))))
    }

    async fn restore(
        &self,
        agent_id: &str,
        session_id: &str,
        call_id: &str,
    ) -> Result<bool, BrainsurgeonError> {
        validate_id("agent id", agent_id)?;
        validate_id("session id", session_id)?;
        validate_id("tool call id", call_id)?;

        let payload_path = self
            .extracted_dir(agent_id, session_id)
            .join(format!("{call_id}.json"));
        let raw = match tokio::fs::read(&payload_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(BrainsurgeonError::Internal(format!(
                    "read {}: {e}",
                    payload_path.display()
                )));
            }
        };
        let content: Value = serde_json::from_slice(&raw).map_err(|e| {
            BrainsurgeonError::Internal(format!("corrupt payload {}: {e}", payload_path.display()))
        })?;

        let path = self.transcript_path(agent_id, session_id);
        let mut lines = self.load(&path).await?;
        let target = lines.iter_mut().find_map(|l| match l {
            Line::Entry(v) => is_placeholder_for(v, call_id).then_some(v),
            Line::Raw(_) => None,
        });
        let Some(entry) = target else {
            return Ok(false);
        };
        let Some(slot) = content_slot(entry) else {
            return Ok(false);
        };
        *slot = content;
        set_marker(entry, false);

        self.store(&path, &lines).await?;
        if let Err(e) = tokio::fs::remove_file(&payload_path).await {
            warn!(path = %payload_path.display(), error = %e, "restored payload left on disk");
        }
        info!(agent_id, session_id, tool_call_id = call_id, "tool output restored");
        Ok(true)
    }
}
