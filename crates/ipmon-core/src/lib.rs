// # ipmon-core
//
// Core library for the local IP monitor.
//
// ## Architecture Overview
//
// The monitor periodically determines the host's primary local IPv4 address
// and publishes it, with a change history, to a remote JSON document:
// - **InterfaceSource**: Trait for enumerating local network interfaces
// - **InterfaceSelector**: Priority/exclusion rules that pick one address
// - **RemoteStore**: Trait for reading and conditionally writing the document
// - **Reconciler**: Change detection, heartbeat and publish state machine
// - **Scheduler**: Fixed-interval driver with shutdown between cycles
//
// ## Design Principles
//
// 1. **Library-First**: The daemon is a thin shell around this crate
// 2. **Single Writer**: One cycle at a time, state owned by the Reconciler
// 3. **Optimistic Concurrency**: Every write carries the version it is based on
// 4. **Contained Failures**: A failed cycle is logged and retried next interval

pub mod config;
pub mod error;
pub mod reconciler;
pub mod scheduler;
pub mod selector;
pub mod state;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use config::{MonitorConfig, MonitorSettings, StoreConfig};
pub use error::{Error, Result};
pub use reconciler::{CycleOutcome, Phase, Reconciler, ReconcilerState};
pub use scheduler::{Scheduler, SchedulerEvent};
pub use selector::{InterfaceSelector, Selection, SelectionPolicy};
pub use state::{ChangeType, HistoryEntry, MonitorState};
pub use store::{FileRemoteStore, MemoryRemoteStore};
pub use traits::{Clock, InterfaceCandidate, InterfaceSource, RemoteStore, VersionToken};
