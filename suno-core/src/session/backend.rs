//! Pluggable storage behind the session manager

use super::store::ChatMessage;
use crate::utils::{decode_filename, ensure_dir, safe_filename};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Summary of a stored session
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub key: String,
    pub message_count: usize,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Durable storage for session histories.
///
/// The manager keeps the authoritative copy in memory and writes every
/// append through to the backend; `load` is only consulted the first time a
/// key is seen by the process (or after idle eviction).
pub trait SessionBackend: Send + Sync {
    /// Stored messages for `key`, or `None` when nothing is stored
    fn load(&self, key: &str) -> crate::Result<Option<Vec<ChatMessage>>>;

    /// Append one message to `key`'s history
    fn append(&self, key: &str, message: &ChatMessage) -> crate::Result<()>;

    /// Drop everything stored for `key`; returns whether anything existed
    fn clear(&self, key: &str) -> crate::Result<bool>;

    /// Sessions known to the backend
    fn list(&self) -> crate::Result<Vec<SessionInfo>>;

    fn name(&self) -> &'static str;
}

/// Keeps nothing: histories live only as long as the process
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryBackend;

impl SessionBackend for MemoryBackend {
    fn load(&self, _key: &str) -> crate::Result<Option<Vec<ChatMessage>>> {
        Ok(None)
    }

    fn append(&self, _key: &str, _message: &ChatMessage) -> crate::Result<()> {
        Ok(())
    }

    fn clear(&self, _key: &str) -> crate::Result<bool> {
        Ok(false)
    }

    fn list(&self) -> crate::Result<Vec<SessionInfo>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct MetadataLine {
    #[serde(rename = "_type")]
    kind: String,
    key: String,
    created_at: DateTime<Utc>,
}

/// One `<encoded key>.jsonl` file per session: a metadata line followed by
/// one JSON-encoded message per line
#[derive(Debug, Clone)]
pub struct JsonlBackend {
    dir: PathBuf,
}

impl JsonlBackend {
    pub fn new<P: AsRef<Path>>(dir: P) -> crate::Result<Self> {
        let dir = ensure_dir(dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn session_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", safe_filename(key)))
    }

    fn read_file(path: &Path) -> crate::Result<(Option<MetadataLine>, Vec<ChatMessage>)> {
        let content = std::fs::read_to_string(path)?;
        let mut metadata = None;
        let mut messages = Vec::new();

        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line_num == 0 {
                if let Ok(meta) = serde_json::from_str::<MetadataLine>(line) {
                    if meta.kind == "metadata" {
                        metadata = Some(meta);
                        continue;
                    }
                }
            }
            match serde_json::from_str::<ChatMessage>(line) {
                Ok(msg) => messages.push(msg),
                Err(e) => warn!(
                    line = line_num + 1,
                    error = %e,
                    path = %path.display(),
                    "Skipping malformed session line"
                ),
            }
        }
        Ok((metadata, messages))
    }
}

impl SessionBackend for JsonlBackend {
    fn load(&self, key: &str) -> crate::Result<Option<Vec<ChatMessage>>> {
        let path = self.session_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let (metadata, messages) = Self::read_file(&path)?;
        if let Some(meta) = metadata {
            if meta.key != key {
                return Err(crate::Error::Session(format!(
                    "{} belongs to session '{}', not '{}'",
                    path.display(),
                    meta.key,
                    key
                )));
            }
        }
        Ok(Some(messages))
    }

    fn append(&self, key: &str, message: &ChatMessage) -> crate::Result<()> {
        let path = self.session_path(key);
        let is_new = !path.exists();

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;

        let mut buf = String::new();
        if is_new {
            let meta = MetadataLine {
                kind: "metadata".to_string(),
                key: key.to_string(),
                created_at: message.timestamp,
            };
            buf.push_str(&serde_json::to_string(&meta)?);
            buf.push('\n');
        }
        buf.push_str(&serde_json::to_string(message)?);
        buf.push('\n');
        file.write_all(buf.as_bytes())?;
        Ok(())
    }

    fn clear(&self, key: &str) -> crate::Result<bool> {
        let path = self.session_path(key);
        if path.exists() {
            std::fs::remove_file(&path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn list(&self) -> crate::Result<Vec<SessionInfo>> {
        let mut sessions = Vec::new();
        for entry in std::fs::read_dir(&self.dir)?.flatten() {
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "jsonl") {
                continue;
            }
            let (metadata, messages) = match Self::read_file(&path) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Unreadable session file");
                    continue;
                }
            };
            let key = match metadata {
                Some(meta) => meta.key,
                None => {
                    let stem = path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or_default();
                    decode_filename(stem).unwrap_or_else(|| stem.to_string())
                }
            };
            sessions.push(SessionInfo {
                key,
                message_count: messages.len(),
                updated_at: messages.last().map(|m| m.timestamp),
            });
        }
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    fn name(&self) -> &'static str {
        "jsonl"
    }
}
