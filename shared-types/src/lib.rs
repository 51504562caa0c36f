use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// An externally visible entry in the namespace.
///
/// `key` is the final segment of a slash-delimited namespaced key and
/// `path` everything before it; callers writing entries usually send the
/// full namespaced key in `key` and leave `path` empty, the storage engine
/// decomposes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entry {
    #[serde(default)]
    pub path: String,
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub secure: bool,
}

impl Entry {
    pub fn new(key: impl Into<String>, value: impl Into<String>, secure: bool) -> Self {
        Self {
            path: String::new(),
            key: key.into(),
            value: value.into(),
            secure,
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.key)
        } else {
            write!(f, "{}/{}", self.path, self.key)
        }
    }
}

/// What kind of mutation produced a record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Upsert,
    Delete,
}

/// Audit metadata attached to every persisted record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Unix seconds.
    pub updated_at: i64,
    pub updated_by: String,
    pub secure: bool,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl EntryMetadata {
    pub fn now(updated_by: impl Into<String>, secure: bool, action: Action) -> Self {
        Self {
            updated_at: chrono::Utc::now().timestamp(),
            updated_by: updated_by.into(),
            secure,
            action,
            hash: None,
        }
    }
}

/// One immutable line of per-key history.
///
/// `key` is the full original namespaced key, not the decomposed
/// path/key pair, so history lookups are equality queries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackingRecord {
    pub key: String,
    /// Unix seconds, used as the sort key.
    pub timestamp: i64,
    pub value: String,
    pub metadata: EntryMetadata,
}

/// A named template artifact scoped by service and stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoxSpec {
    pub service: String,
    pub stage: HashMap<String, Stage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stage {
    pub template: Template,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Template {
    /// Storage path inside the template backend once persisted.
    pub name: String,
    /// Template body; base64-encoded on upsert requests.
    #[serde(default)]
    pub value: String,
}

/// Tagged command envelope accepted by the box endpoint.
///
/// The tag set is closed: an unrecognized `command` fails
/// deserialization instead of being silently ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "command", content = "payload")]
pub enum Command {
    #[serde(rename = "upsert.template")]
    UpsertTemplate(BoxSpec),
    #[serde(rename = "upsert.variables")]
    UpsertVariables(BoxSpec),
}
