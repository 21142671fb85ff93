// # Interface Source Trait
//
// Defines how the monitor enumerates the host's network interfaces.
//
// ## Implementations
//
// - Host enumeration: `ipmon-iface-local` crate
// - Static lists: test doubles
//
// The source only reports what the OS sees. Choosing an address is the job
// of [`crate::selector::InterfaceSelector`].

use std::net::IpAddr;

/// One network interface as reported by the OS
///
/// Candidates are re-read every cycle and carry no identity beyond their name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceCandidate {
    /// Interface name (e.g. "eth0", "Ethernet0", "WLAN")
    pub name: String,
    /// Bound addresses in the order the OS reported them
    pub addresses: Vec<IpAddr>,
    /// Whether the interface is up
    pub is_up: bool,
}

impl InterfaceCandidate {
    /// Create an interface candidate
    pub fn new(name: impl Into<String>, addresses: Vec<IpAddr>, is_up: bool) -> Self {
        Self {
            name: name.into(),
            addresses,
            is_up,
        }
    }
}

/// Trait for interface enumeration
///
/// Enumeration is a quick local syscall, so the trait is synchronous.
/// Implementations must return interfaces in a stable enumeration order:
/// selection uses that order as a tie-break.
pub trait InterfaceSource: Send + Sync {
    /// List all interfaces with their addresses and up/down status
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<InterfaceCandidate>)`: Interfaces in enumeration order
    /// - `Err(Error)`: If the OS query failed
    fn interfaces(&self) -> Result<Vec<InterfaceCandidate>, crate::Error>;

    /// Get the source name (for logging)
    fn source_name(&self) -> &'static str;
}
