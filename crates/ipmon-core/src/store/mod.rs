// # Remote Store Implementations
//
// This module provides implementations of the RemoteStore trait that need
// no network access. The GitHub backend lives in `ipmon-store-github`.

pub mod file;
pub mod memory;

pub use file::FileRemoteStore;
pub use memory::MemoryRemoteStore;
