//! Network state types and kernel enumeration.
//!
//! This module provides:
//! - Core entity types ([`Address`], [`Interface`], [`Route`])
//! - Address and route classification ([`filter`])
//! - Decoding of rtnetlink messages into entities ([`platform`])
//! - Full-state enumeration ([`Snapshotter`], [`NetworkState`], [`StateSource`])

pub mod filter;
pub(crate) mod platform;
mod snapshot;
mod types;

pub use snapshot::{NetworkState, Snapshotter, StateSource};
pub use types::{Address, Interface, IpFamily, Route};

pub(crate) use types::RouteDetails;
