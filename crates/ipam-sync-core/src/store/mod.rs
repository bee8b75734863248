// # Address Store Implementations
//
// Store implementations that live in the core crate. Remote stores live in
// their own crates (see `ipam-sync-netbox`).

pub mod memory;

pub use memory::MemoryAddressStore;
