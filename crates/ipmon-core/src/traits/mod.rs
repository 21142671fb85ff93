//! Core traits for the IP monitor
//!
//! This module defines the seams between the core logic and the outside world.
//!
//! - [`InterfaceSource`]: Enumerate local network interfaces
//! - [`RemoteStore`]: Read and conditionally write the remote document
//! - [`Clock`]: Wall-clock time for persisted timestamps

pub mod clock;
pub mod interface_source;
pub mod remote_store;

pub use clock::{Clock, SystemClock};
pub use interface_source::{InterfaceCandidate, InterfaceSource};
pub use remote_store::{RemoteDocument, RemoteStore, VersionToken};
