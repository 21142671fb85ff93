//! Interface selection
//!
//! Chooses the one IPv4 address that represents this host.
//!
//! ## Algorithm
//!
//! 1. **Priority pass**: for each priority fragment in order, scan interfaces
//!    (in enumeration order) whose name contains the fragment. The first
//!    non-loopback IPv4 address of an eligible interface wins.
//! 2. **Fallback pass**: scan every eligible interface in enumeration order.
//! 3. Otherwise: `Error::Selection`.
//!
//! An interface is eligible when it is up and its name contains no exclusion
//! fragment. All name matching is case-insensitive substring matching.
//! IPv6 addresses are never selected.

use std::net::{IpAddr, Ipv4Addr};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::traits::{InterfaceCandidate, InterfaceSource};

/// Interface selection rules
///
/// Fragments are stored lowercased; the policy is immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionPolicy {
    priority: Vec<String>,
    exclude: Vec<String>,
}

impl SelectionPolicy {
    /// Create a policy from priority and exclusion fragments
    pub fn new<P, E>(priority: P, exclude: E) -> Self
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        Self {
            priority: priority
                .into_iter()
                .map(|f| f.as_ref().to_lowercase())
                .collect(),
            exclude: exclude
                .into_iter()
                .map(|f| f.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Priority fragments, most preferred first
    pub fn priority(&self) -> &[String] {
        &self.priority
    }

    /// Whether an interface name matches any exclusion fragment
    pub fn is_excluded(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.exclude.iter().any(|f| name.contains(f.as_str()))
    }

    fn is_eligible(&self, candidate: &InterfaceCandidate) -> bool {
        candidate.is_up && !self.is_excluded(&candidate.name)
    }
}

/// The address chosen to represent the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Selected IPv4 address
    pub address: Ipv4Addr,
    /// Name of the interface it is bound to
    pub interface: String,
}

/// First non-loopback IPv4 address of an interface
fn first_usable_v4(candidate: &InterfaceCandidate) -> Option<Ipv4Addr> {
    candidate.addresses.iter().find_map(|addr| match addr {
        IpAddr::V4(v4) if !v4.is_loopback() => Some(*v4),
        _ => None,
    })
}

/// Select an address from an enumerated interface list
///
/// Returns `None` when no eligible interface has a usable IPv4 address.
pub fn select_address(
    policy: &SelectionPolicy,
    candidates: &[InterfaceCandidate],
) -> Option<Selection> {
    let eligible = || candidates.iter().filter(|c| policy.is_eligible(c));

    for fragment in policy.priority() {
        let hit = eligible()
            .filter(|c| c.name.to_lowercase().contains(fragment.as_str()))
            .find_map(|c| first_usable_v4(c).map(|address| (c, address)));

        if let Some((candidate, address)) = hit {
            debug!(
                "Priority fragment '{}' matched {} ({})",
                fragment, candidate.name, address
            );
            return Some(Selection {
                address,
                interface: candidate.name.clone(),
            });
        }
    }

    eligible()
        .find_map(|c| first_usable_v4(c).map(|address| (c, address)))
        .map(|(candidate, address)| {
            debug!("Fallback selected {} ({})", candidate.name, address);
            Selection {
                address,
                interface: candidate.name.clone(),
            }
        })
}

/// Interface selector
///
/// Pairs an [`InterfaceSource`] with a [`SelectionPolicy`].
pub struct InterfaceSelector {
    source: Box<dyn InterfaceSource>,
    policy: SelectionPolicy,
}

impl InterfaceSelector {
    /// Create a new selector
    pub fn new(source: Box<dyn InterfaceSource>, policy: SelectionPolicy) -> Self {
        Self { source, policy }
    }

    /// The policy in use
    pub fn policy(&self) -> &SelectionPolicy {
        &self.policy
    }

    /// Enumerate interfaces and select the host address
    ///
    /// # Returns
    ///
    /// - `Ok(Selection)`: The chosen address and interface
    /// - `Err(Error::Selection)`: Enumeration failed or nothing qualified
    pub fn select(&self) -> Result<Selection> {
        let candidates = self.source.interfaces().map_err(|e| {
            Error::selection(format!(
                "Failed to enumerate interfaces via {}: {}",
                self.source.source_name(),
                e
            ))
        })?;

        debug!("Enumerated {} interface(s)", candidates.len());

        match select_address(&self.policy, &candidates) {
            Some(selection) => {
                info!(
                    "Selected interface {} - {}",
                    selection.interface, selection.address
                );
                Ok(selection)
            }
            None => {
                warn!("No usable network interface found");
                Err(Error::selection(format!(
                    "none of {} interface(s) has an eligible IPv4 address",
                    candidates.len()
                )))
            }
        }
    }
}
