// # Local Interface Source
//
// Enumerates the host's network interfaces for the local IP monitor.
//
// ## Enumeration
//
// Addresses come from `local_ip_address::list_afinet_netifas`, which yields
// one `(name, address)` pair per bound address. Pairs are grouped by
// interface name, keeping the order in which each name first appears.
//
// ## Up/Down Status
//
// - Linux: read from `/sys/class/net/<name>/operstate`. "up" and "unknown"
//   (reported by loopback and many tunnels) count as up. Interfaces without
//   the file (aliases, some virtual devices) count as up too.
// - Other platforms: the enumeration API only reports configured addresses,
//   so every reported interface counts as up.

use ipmon_core::traits::{InterfaceCandidate, InterfaceSource};
use ipmon_core::{Error, Result};
use std::net::IpAddr;

/// Interface source backed by the host's interface table
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalInterfaceSource;

impl LocalInterfaceSource {
    pub fn new() -> Self {
        Self
    }
}

impl InterfaceSource for LocalInterfaceSource {
    fn interfaces(&self) -> Result<Vec<InterfaceCandidate>> {
        let pairs = local_ip_address::list_afinet_netifas()
            .map_err(|e| Error::selection(format!("Failed to enumerate interfaces: {}", e)))?;

        let candidates = group_by_interface(pairs, interface_is_up);
        tracing::debug!("Enumerated {} interfaces", candidates.len());
        Ok(candidates)
    }

    fn source_name(&self) -> &'static str {
        "local"
    }
}

/// Group `(name, address)` pairs into candidates in first-seen order
fn group_by_interface<F>(pairs: Vec<(String, IpAddr)>, is_up: F) -> Vec<InterfaceCandidate>
where
    F: Fn(&str) -> bool,
{
    let mut candidates: Vec<InterfaceCandidate> = Vec::new();

    for (name, address) in pairs {
        match candidates.iter_mut().find(|c| c.name == name) {
            Some(candidate) => candidate.addresses.push(address),
            None => {
                let up = is_up(&name);
                candidates.push(InterfaceCandidate::new(name, vec![address], up));
            }
        }
    }

    candidates
}

/// Interpret an `operstate` value
fn operstate_is_up(state: &str) -> bool {
    matches!(state.trim(), "up" | "unknown")
}

#[cfg(target_os = "linux")]
fn interface_is_up(name: &str) -> bool {
    let path = std::path::Path::new("/sys/class/net").join(name).join("operstate");
    match std::fs::read_to_string(&path) {
        Ok(state) => operstate_is_up(&state),
        Err(_) => true,
    }
}

#[cfg(not(target_os = "linux"))]
fn interface_is_up(_name: &str) -> bool {
    true
}
