//! IPMON: Linux network-state monitor
//!
//! A library for watching the kernel's network configuration over rtnetlink
//! and delivering structured updates whenever interfaces, addresses or
//! routes change.

pub mod env;
pub mod monitor;
pub mod network;
pub mod notify;
