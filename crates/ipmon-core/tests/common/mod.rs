//! Test doubles and common utilities for reconciler contract tests
//!
//! The doubles share their state through `Arc`s so a test can keep a handle
//! after the original has been boxed into a reconciler.

#![allow(dead_code)]

use chrono::{Duration, NaiveDateTime};
use ipmon_core::error::{Error, Result};
use ipmon_core::store::MemoryRemoteStore;
use ipmon_core::traits::{
    Clock, InterfaceCandidate, InterfaceSource, RemoteDocument, RemoteStore, VersionToken,
};
use ipmon_core::{InterfaceSelector, Reconciler, SelectionPolicy};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Document path used by every test
pub const DATA_FILE: &str = "data.json";

/// Parse a document timestamp
pub fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, ipmon_core::state::TIMESTAMP_FORMAT)
        .expect("valid test timestamp")
}

/// An up interface with one IPv4 address
pub fn up(name: &str, ip: [u8; 4]) -> InterfaceCandidate {
    InterfaceCandidate::new(name, vec![IpAddr::V4(Ipv4Addr::from(ip))], true)
}

/// An interface source whose interface list can be swapped between cycles
#[derive(Clone, Default)]
pub struct StaticInterfaceSource {
    candidates: Arc<Mutex<Vec<InterfaceCandidate>>>,
    fail: Arc<AtomicBool>,
    call_count: Arc<AtomicUsize>,
}

impl StaticInterfaceSource {
    pub fn new(candidates: Vec<InterfaceCandidate>) -> Self {
        Self {
            candidates: Arc::new(Mutex::new(candidates)),
            ..Self::default()
        }
    }

    /// Replace the reported interfaces
    pub fn set(&self, candidates: Vec<InterfaceCandidate>) {
        *self.candidates.lock().unwrap() = candidates;
    }

    /// Make enumeration fail
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of interfaces() calls
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl InterfaceSource for StaticInterfaceSource {
    fn interfaces(&self) -> Result<Vec<InterfaceCandidate>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::selection("interface enumeration failed"));
        }
        Ok(self.candidates.lock().unwrap().clone())
    }

    fn source_name(&self) -> &'static str {
        "static"
    }
}

/// A clock the test advances by hand
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<NaiveDateTime>>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, secs: i64) {
        let mut now = self.now.lock().unwrap();
        *now += Duration::seconds(secs);
    }

    pub fn set(&self, to: NaiveDateTime) {
        *self.now.lock().unwrap() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap()
    }
}

/// A store wrapper whose reads and writes can be switched to fail
///
/// Writes can fail with a conflict or with a plain write error. Reads can
/// fail independently. Everything else goes to the wrapped memory store.
#[derive(Clone, Default)]
pub struct FlakyStore {
    inner: MemoryRemoteStore,
    fail_reads: Arc<AtomicBool>,
    conflict_writes: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    write_attempts: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn new(inner: MemoryRemoteStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_conflict_writes(&self, conflict: bool) {
        self.conflict_writes.store(conflict, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of write() calls, failed ones included
    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RemoteStore for FlakyStore {
    async fn fetch(&self, path: &str) -> Result<Option<RemoteDocument>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::remote_read("store unreachable"));
        }
        self.inner.fetch(path).await
    }

    async fn write(
        &self,
        path: &str,
        content: &str,
        message: &str,
        version: Option<&VersionToken>,
    ) -> Result<VersionToken> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        if self.conflict_writes.load(Ordering::SeqCst) {
            return Err(Error::conflict("version mismatch"));
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::remote_write("store unreachable"));
        }
        self.inner.write(path, content, message, version).await
    }

    fn store_name(&self) -> &'static str {
        "flaky"
    }
}

/// Policy used throughout: Ethernet first, virtual adapters excluded
pub fn default_policy() -> SelectionPolicy {
    SelectionPolicy::new(["ethernet", "eth"], ["docker", "veth"])
}

/// Build a reconciler over the given doubles
pub fn reconciler(
    source: &StaticInterfaceSource,
    store: impl RemoteStore + 'static,
    clock: &ManualClock,
) -> Reconciler {
    let selector = InterfaceSelector::new(Box::new(source.clone()), default_policy());
    Reconciler::with_clock(selector, Box::new(store), DATA_FILE, Box::new(clock.clone()))
}
