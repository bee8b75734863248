//! Core traits for the IPAM sync system
//!
//! This module defines the abstract interfaces that collaborators implement.
//!
//! - [`ObservationSource`]: List networks and the clients observed on them
//! - [`AddressStore`]: Read prefixes and create/update/delete address records

pub mod address_store;
pub mod observation_source;

pub use address_store::AddressStore;
pub use observation_source::ObservationSource;
