// # Monitor State
//
// The record persisted as the remote document.
//
// ## Document Format
//
// ```json
// {
//   "localIP": "192.168.1.5",
//   "networkInterface": "WLAN",
//   "lastUpdate": "2025-01-09 12:00:00",
//   "history": [
//     { "timestamp": "2025-01-09 12:00:00", "ip": "192.168.1.5", "change": "new" }
//   ]
// }
// ```
//
// Timestamps are local wall-clock time so the document stays human-readable
// and comparable across restarts.

pub mod timestamp;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

pub use timestamp::TIMESTAMP_FORMAT;

/// Maximum number of history entries kept in the document
pub const HISTORY_LIMIT: usize = 50;

/// How an observed address relates to the last published one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// No address was published before
    New,
    /// The address differs from the published one
    Updated,
    /// The address is unchanged (never stored in history)
    Same,
}

impl ChangeType {
    /// Classify an observation against the last published address
    pub fn classify(prior: Option<Ipv4Addr>, observed: Ipv4Addr) -> Self {
        match prior {
            None => ChangeType::New,
            Some(prior) if prior != observed => ChangeType::Updated,
            Some(_) => ChangeType::Same,
        }
    }

    /// Lowercase name as stored in the document
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::New => "new",
            ChangeType::Updated => "updated",
            ChangeType::Same => "same",
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One address change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// When the change was observed
    #[serde(with = "timestamp")]
    pub timestamp: NaiveDateTime,
    /// The new address
    pub ip: Ipv4Addr,
    /// `new` or `updated`
    pub change: ChangeType,
}

impl HistoryEntry {
    /// Create a history entry
    pub fn new(timestamp: NaiveDateTime, ip: Ipv4Addr, change: ChangeType) -> Self {
        Self {
            timestamp,
            ip,
            change,
        }
    }
}

/// The persisted monitor record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorState {
    /// Last successfully published address
    #[serde(rename = "localIP", default)]
    pub local_ip: Option<Ipv4Addr>,

    /// Interface that produced `local_ip`
    #[serde(rename = "networkInterface", default)]
    pub network_interface: Option<String>,

    /// Time of the last successful publish
    #[serde(rename = "lastUpdate", default, with = "timestamp::option")]
    pub last_update: Option<NaiveDateTime>,

    /// Address changes, oldest first, at most [`HISTORY_LIMIT`] entries
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl MonitorState {
    /// Empty state, as on a first run
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a change to the history
    ///
    /// `Same` observations are not history events and are ignored. The entry
    /// timestamp is clamped so the history never goes backwards in time, and
    /// the oldest entries are dropped beyond [`HISTORY_LIMIT`].
    pub fn record_change(&mut self, mut entry: HistoryEntry) {
        if entry.change == ChangeType::Same {
            return;
        }

        if let Some(last) = self.history.last()
            && entry.timestamp < last.timestamp
        {
            entry.timestamp = last.timestamp;
        }

        self.history.push(entry);
        trim_history(&mut self.history);
    }

    /// Seconds since the last publish, if one is recorded
    pub fn seconds_since_update(&self, now: NaiveDateTime) -> Option<i64> {
        self.last_update
            .map(|last| now.signed_duration_since(last).num_seconds())
    }

    /// Serialize as pretty-printed JSON (2-space indent, UTF-8 kept as-is)
    pub fn to_json(&self) -> Result<String, crate::Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a document
    ///
    /// Missing fields parse as absent; malformed content is an error.
    /// `same` entries written by other tools are dropped.
    pub fn from_json(content: &str) -> Result<Self, crate::Error> {
        let mut state: MonitorState = serde_json::from_str(content)?;
        state.history.retain(|e| e.change != ChangeType::Same);
        trim_history(&mut state.history);
        Ok(state)
    }
}

fn trim_history(history: &mut Vec<HistoryEntry>) {
    if history.len() > HISTORY_LIMIT {
        let excess = history.len() - HISTORY_LIMIT;
        history.drain(..excess);
    }
}
