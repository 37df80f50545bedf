//! Address and route classification.
//!
//! Pure predicates deciding which kernel entries the monitor keeps:
//! snapshots retain only link-local unicast and global unicast addresses,
//! and only main-table routes of universe or link scope whose destination
//! is not link-local.

use std::net::IpAddr;

use netlink_packet_route::route::RouteScope;

/// The kernel's main routing table.
pub const MAIN_TABLE: u32 = 254;

/// Returns true for link-local unicast addresses (IPv4 169.254.0.0/16,
/// IPv6 fe80::/10).
#[must_use]
pub fn is_link_local_unicast(address: &IpAddr) -> bool {
    match address {
        IpAddr::V4(v4) => v4.is_link_local(),
        IpAddr::V6(v6) => v6.is_unicast_link_local(),
    }
}

/// Returns true for globally routable unicast addresses.
///
/// Everything that is not unspecified, loopback, multicast, link-local
/// unicast or the IPv4 limited-broadcast address counts as global unicast;
/// notably this includes unique-local IPv6 addresses, which are only
/// excluded later when rendering the environment.
#[must_use]
pub fn is_global_unicast(address: &IpAddr) -> bool {
    if address.is_unspecified()
        || address.is_loopback()
        || address.is_multicast()
        || is_link_local_unicast(address)
    {
        return false;
    }
    match address {
        IpAddr::V4(v4) => !v4.is_broadcast(),
        IpAddr::V6(_) => true,
    }
}

/// Returns true if an address belongs in a snapshot at all.
#[must_use]
pub fn is_monitored_address(address: &IpAddr) -> bool {
    is_link_local_unicast(address) || is_global_unicast(address)
}

/// Returns true if a route's scope and table make its changes worth
/// reporting: universe or link scope, main table.
#[must_use]
pub fn is_reportable_route(scope: RouteScope, table: u32) -> bool {
    matches!(scope, RouteScope::Universe | RouteScope::Link) && table == MAIN_TABLE
}

/// Returns true if a route belongs in a snapshot: reportable scope/table
/// and a destination (if any) that is not link-local.
#[must_use]
pub fn keep_route(scope: RouteScope, table: u32, destination: Option<&IpAddr>) -> bool {
    is_reportable_route(scope, table)
        && destination.is_none_or(|address| !is_link_local_unicast(address))
}
