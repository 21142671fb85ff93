//! Reconciler
//!
//! The Reconciler is responsible for:
//! - Loading the last published state at startup
//! - Selecting the current host address each cycle
//! - Classifying it against the last published address
//! - Publishing the document on change, or as a heartbeat when it is stale
//!
//! ## State Machine
//!
//! ```text
//!   INIT ──load──▶ IDLE ──tick──▶ CHECKING ──change / heartbeat──▶ PUBLISHING
//!                   ▲                │  │                              │
//!                   │          same, │  │ not found                    │ ok
//!                   │          fresh │  ▼                              │
//!                   │                │ ERROR ◀──── conflict / error ───┤
//!                   └────────────────┴───┴─────────────────────────────┘
//! ```
//!
//! ## Failure Containment
//!
//! Every per-cycle failure is logged and reported through the cycle result.
//! A failed publish leaves [`ReconcilerState`] untouched, so the next cycle
//! re-evaluates against the same baseline.

use chrono::{NaiveDateTime, SubsecRound};
use std::net::Ipv4Addr;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::selector::{InterfaceSelector, Selection};
use crate::state::{ChangeType, HistoryEntry, MonitorState, timestamp};
use crate::traits::{Clock, RemoteStore, SystemClock, VersionToken};

/// Seconds after which an unchanged address is published again
pub const HEARTBEAT_INTERVAL_SECS: i64 = 3600;

/// Reconciler phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Constructed, state not loaded yet
    Init,
    /// Waiting for the next cycle
    Idle,
    /// Selecting and classifying the current address
    Checking,
    /// Writing the document
    Publishing,
    /// A cycle failed (transient, always followed by `Idle`)
    Error,
}

/// In-memory view of the published state
///
/// Owned solely by the [`Reconciler`]. Only advanced after a successful write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilerState {
    /// Last successfully published address
    pub last_ip: Option<Ipv4Addr>,
    /// Interface of the last published address
    pub network_interface: Option<String>,
    /// Published history, oldest first
    pub history: Vec<HistoryEntry>,
    /// Most recently known remote version
    pub version: Option<VersionToken>,
}

impl ReconcilerState {
    fn from_document(state: MonitorState, version: VersionToken) -> Self {
        Self {
            last_ip: state.local_ip,
            network_interface: state.network_interface,
            history: state.history,
            version: Some(version),
        }
    }
}

/// Result of a successful cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The document was written
    ///
    /// `change` is `Same` for a heartbeat publish.
    Published {
        ip: Ipv4Addr,
        interface: String,
        change: ChangeType,
    },

    /// The address is unchanged and the document is fresh
    Unchanged { ip: Ipv4Addr },
}

/// What the heartbeat check decided
enum Heartbeat {
    Due,
    NotDue,
}

/// Change detection and publishing loop body
///
/// One [`Reconciler::tick`] runs one complete cycle. Cycles never overlap:
/// `tick` takes `&mut self`.
pub struct Reconciler {
    selector: InterfaceSelector,
    store: Box<dyn RemoteStore>,
    data_file: String,
    clock: Box<dyn Clock>,
    state: ReconcilerState,
    phase: Phase,
}

impl Reconciler {
    /// Create a reconciler using the system clock
    ///
    /// # Parameters
    ///
    /// - `selector`: Interface selector
    /// - `store`: Remote document store
    /// - `data_file`: Path of the document in the store
    pub fn new(
        selector: InterfaceSelector,
        store: Box<dyn RemoteStore>,
        data_file: impl Into<String>,
    ) -> Self {
        Self::with_clock(selector, store, data_file, Box::new(SystemClock))
    }

    /// Create a reconciler with an explicit clock
    pub fn with_clock(
        selector: InterfaceSelector,
        store: Box<dyn RemoteStore>,
        data_file: impl Into<String>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            selector,
            store,
            data_file: data_file.into(),
            clock,
            state: ReconcilerState::default(),
            phase: Phase::Init,
        }
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current in-memory state
    pub fn state(&self) -> &ReconcilerState {
        &self.state
    }

    /// Load the published state (`INIT → IDLE`)
    ///
    /// Best-effort: a missing document means first run, and an unreadable or
    /// malformed one is treated the same way. The version token of a
    /// malformed document is kept so the first publish can replace it.
    pub async fn load(&mut self) {
        match self.store.fetch(&self.data_file).await {
            Ok(Some(doc)) => match MonitorState::from_json(&doc.content) {
                Ok(state) => {
                    info!(
                        "Loaded state from {}: last IP {}, {} history entries",
                        self.store.store_name(),
                        state
                            .local_ip
                            .map(|ip| ip.to_string())
                            .unwrap_or_else(|| "None".to_string()),
                        state.history.len()
                    );
                    self.state = ReconcilerState::from_document(state, doc.version);
                }
                Err(e) => {
                    warn!(
                        "Remote document {} is malformed ({}), starting from empty state",
                        self.data_file, e
                    );
                    self.state = ReconcilerState {
                        version: Some(doc.version),
                        ..ReconcilerState::default()
                    };
                }
            },
            Ok(None) => {
                info!(
                    "No remote document {} found, it will be created",
                    self.data_file
                );
                self.state = ReconcilerState::default();
            }
            Err(e) => {
                warn!("Failed to load remote state: {}. Starting from empty state.", e);
                self.state = ReconcilerState::default();
            }
        }

        self.transition(Phase::Idle);
    }

    /// Run one cycle and report success
    pub async fn run_cycle(&mut self) -> bool {
        self.tick().await.is_ok()
    }

    /// Run one cycle
    ///
    /// Failures are logged here and returned for inspection; the reconciler
    /// is back in `Idle` either way.
    pub async fn tick(&mut self) -> Result<CycleOutcome> {
        if self.phase == Phase::Init {
            self.load().await;
        }

        info!("Checking local IP address");
        let result = self.check_and_publish().await;

        match &result {
            Ok(CycleOutcome::Published { ip, change, .. }) => {
                info!("Published {} ({})", ip, change);
            }
            Ok(CycleOutcome::Unchanged { ip }) => {
                debug!("IP address unchanged: {}", ip);
            }
            Err(e) => {
                self.transition(Phase::Error);
                error!("Cycle failed: {}", e);
            }
        }

        self.transition(Phase::Idle);
        result
    }

    async fn check_and_publish(&mut self) -> Result<CycleOutcome> {
        self.transition(Phase::Checking);

        let selection = self.selector.select()?;
        let now = self.clock.now().trunc_subsecs(0);
        let change = ChangeType::classify(self.state.last_ip, selection.address);

        info!(
            "Current IP address: {} (interface: {}), change: {}",
            selection.address, selection.interface, change
        );

        if change == ChangeType::Same {
            match self.check_heartbeat(now).await {
                Heartbeat::NotDue => {
                    return Ok(CycleOutcome::Unchanged {
                        ip: selection.address,
                    });
                }
                Heartbeat::Due => info!("Publishing heartbeat"),
            }
        } else {
            info!(
                "IP address changed: {} -> {}",
                self.state
                    .last_ip
                    .map(|ip| ip.to_string())
                    .unwrap_or_else(|| "None".to_string()),
                selection.address
            );
            self.refresh_version().await;
        }

        self.publish(selection, change, now).await
    }

    /// Decide whether an unchanged address must be published again
    ///
    /// Reads `lastUpdate` from the remote document. A missing, unreadable or
    /// malformed document forces the heartbeat.
    async fn check_heartbeat(&mut self, now: NaiveDateTime) -> Heartbeat {
        let doc = match self.store.fetch(&self.data_file).await {
            Ok(Some(doc)) => doc,
            Ok(None) => {
                warn!("Remote document {} is missing", self.data_file);
                self.state.version = None;
                return Heartbeat::Due;
            }
            Err(e) => {
                warn!("Failed to read remote document: {}", e);
                return Heartbeat::Due;
            }
        };

        self.state.version = Some(doc.version.clone());

        let elapsed = match MonitorState::from_json(&doc.content) {
            Ok(remote) => remote.seconds_since_update(now),
            Err(e) => {
                warn!("Remote document is malformed: {}", e);
                None
            }
        };

        match elapsed {
            Some(secs) if secs <= HEARTBEAT_INTERVAL_SECS => {
                debug!("Last update {}s ago, no heartbeat needed", secs);
                Heartbeat::NotDue
            }
            Some(secs) => {
                info!("Last update {}s ago, heartbeat due", secs);
                Heartbeat::Due
            }
            None => Heartbeat::Due,
        }
    }

    /// Re-read the remote version right before a write
    ///
    /// Falls back to the cached token when the read fails.
    async fn refresh_version(&mut self) {
        match self.store.fetch(&self.data_file).await {
            Ok(doc) => self.state.version = doc.map(|doc| doc.version),
            Err(e) => warn!("Failed to refresh remote version, using cached one: {}", e),
        }
    }

    /// Write the document (`CHECKING → PUBLISHING`)
    async fn publish(
        &mut self,
        selection: Selection,
        change: ChangeType,
        now: NaiveDateTime,
    ) -> Result<CycleOutcome> {
        self.transition(Phase::Publishing);

        let mut document = MonitorState {
            local_ip: Some(selection.address),
            network_interface: Some(selection.interface.clone()),
            last_update: Some(now),
            history: self.state.history.clone(),
        };
        document.record_change(HistoryEntry::new(now, selection.address, change));

        let content = document.to_json()?;
        let message = commit_message(selection.address, change, now);

        let written = self
            .store
            .write(
                &self.data_file,
                &content,
                &message,
                self.state.version.as_ref(),
            )
            .await;

        let version = match written {
            Ok(version) => version,
            Err(e) => {
                if e.is_conflict() {
                    warn!("Remote document changed concurrently, keeping previous baseline");
                }
                return Err(e);
            }
        };

        self.state = ReconcilerState {
            last_ip: document.local_ip,
            network_interface: document.network_interface,
            history: document.history,
            version: Some(version),
        };

        Ok(CycleOutcome::Published {
            ip: selection.address,
            interface: selection.interface,
            change,
        })
    }

    fn transition(&mut self, to: Phase) {
        if self.phase != to {
            debug!("Reconciler phase: {:?} -> {:?}", self.phase, to);
            self.phase = to;
        }
    }
}

/// Commit message for a publish
fn commit_message(ip: Ipv4Addr, change: ChangeType, now: NaiveDateTime) -> String {
    match change {
        ChangeType::Same => format!("Heartbeat local IP: {} ({})", ip, timestamp::format(&now)),
        _ => format!("Update local IP: {} ({})", ip, timestamp::format(&now)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, crate::state::TIMESTAMP_FORMAT).unwrap()
    }

    #[test]
    fn test_commit_message_contains_address_and_time() {
        let ip = Ipv4Addr::new(10, 0, 0, 2);
        let now = ts("2025-01-09 12:00:00");

        assert_eq!(
            commit_message(ip, ChangeType::Updated, now),
            "Update local IP: 10.0.0.2 (2025-01-09 12:00:00)"
        );
        assert_eq!(
            commit_message(ip, ChangeType::Same, now),
            "Heartbeat local IP: 10.0.0.2 (2025-01-09 12:00:00)"
        );
    }

    #[test]
    fn test_state_from_document() {
        let doc = MonitorState {
            local_ip: Some(Ipv4Addr::new(10, 0, 0, 2)),
            network_interface: Some("eth0".to_string()),
            last_update: Some(ts("2025-01-09 12:00:00")),
            history: Vec::new(),
        };
        let state = ReconcilerState::from_document(doc, VersionToken::new("abc"));

        assert_eq!(state.last_ip, Some(Ipv4Addr::new(10, 0, 0, 2)));
        assert_eq!(state.network_interface.as_deref(), Some("eth0"));
        assert_eq!(state.version, Some(VersionToken::new("abc")));
    }
}
