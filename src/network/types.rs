//! Core entity types for the observed network state.

use std::net::IpAddr;

use netlink_packet_route::route::RouteScope;
use serde::Serialize;

/// Address family of a route or address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpFamily {
    /// IPv4.
    V4,
    /// IPv6.
    V6,
}

impl IpFamily {
    /// Returns the family of the given address.
    #[must_use]
    pub const fn of(address: &IpAddr) -> Self {
        match address {
            IpAddr::V4(_) => Self::V4,
            IpAddr::V6(_) => Self::V6,
        }
    }
}

/// An IP address assigned to an interface, with its prefix length and
/// remaining valid lifetime.
///
/// Immutable once constructed; every snapshot builds fresh values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    /// The address literal.
    pub address: IpAddr,
    /// CIDR prefix length.
    #[serde(rename = "mask")]
    pub prefix_len: u8,
    /// Seconds until the address expires; `0` means permanent or not tracked.
    #[serde(skip_serializing_if = "lifetime_is_untracked")]
    pub valid_lft: u32,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // signature dictated by serde
fn lifetime_is_untracked(valid_lft: &u32) -> bool {
    *valid_lft == 0
}

impl Address {
    /// Creates an address with no lifetime information.
    #[must_use]
    pub const fn new(address: IpAddr, prefix_len: u8) -> Self {
        Self {
            address,
            prefix_len,
            valid_lft: 0,
        }
    }

    /// Creates an address carrying a kernel-reported valid lifetime.
    ///
    /// The kernel reports permanent addresses with a lifetime of `u32::MAX`
    /// ("forever"); those are normalized to `0` (not tracked).
    #[must_use]
    pub const fn with_lifetime(address: IpAddr, prefix_len: u8, valid_lft: u32) -> Self {
        let valid_lft = if valid_lft == u32::MAX { 0 } else { valid_lft };
        Self {
            address,
            prefix_len,
            valid_lft,
        }
    }
}

/// Kernel metadata carried by a route but never exposed to library
/// consumers: used for default-route selection and change filtering only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RouteDetails {
    pub(crate) family: IpFamily,
    pub(crate) priority: u32,
    pub(crate) scope: RouteScope,
    pub(crate) table: u32,
}

/// A row of the main routing table.
///
/// `destination` is either a CIDR literal or the `"default"` sentinel for
/// routes with no destination prefix. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    /// Destination prefix literal, or [`Route::DEFAULT_DESTINATION`].
    pub destination: String,
    /// Next-hop gateway, when the route has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<IpAddr>,
    /// Preferred source address, when the kernel reports one.
    #[serde(rename = "src", skip_serializing_if = "Option::is_none")]
    pub source: Option<IpAddr>,
    /// Name of the owning interface (empty if unresolved).
    pub link: String,
    #[serde(skip)]
    pub(crate) details: RouteDetails,
}

impl Route {
    /// Destination label used for routes without a destination prefix.
    pub const DEFAULT_DESTINATION: &'static str = "default";

    /// Returns true if this route has no destination prefix.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.destination == Self::DEFAULT_DESTINATION
    }

    pub(crate) const fn family(&self) -> IpFamily {
        self.details.family
    }

    pub(crate) const fn priority(&self) -> u32 {
        self.details.priority
    }
}

/// A network interface with its administrative state and kept addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Interface {
    /// Administrative up/down state.
    pub up: bool,
    /// Addresses that survived classification, in kernel enumeration order.
    #[serde(rename = "addr")]
    pub addresses: Vec<Address>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn family_of_matches_address_kind() {
        assert_eq!(IpFamily::of(&ip("192.0.2.1")), IpFamily::V4);
        assert_eq!(IpFamily::of(&ip("2001:db8::1")), IpFamily::V6);
    }

    #[test]
    fn new_address_has_no_lifetime() {
        let address = Address::new(ip("192.0.2.1"), 24);
        assert_eq!(address.valid_lft, 0);
    }

    #[test]
    fn forever_lifetime_normalizes_to_untracked() {
        let address = Address::with_lifetime(ip("192.0.2.1"), 24, u32::MAX);
        assert_eq!(address.valid_lft, 0);
    }

    #[test]
    fn finite_lifetime_is_kept() {
        let address = Address::with_lifetime(ip("192.0.2.1"), 24, 3600);
        assert_eq!(address.valid_lft, 3600);
    }

    #[test]
    fn address_serializes_mask_and_skips_untracked_lifetime() {
        let value = serde_json::to_value(Address::new(ip("192.0.2.1"), 24)).unwrap();
        assert_eq!(value["address"], "192.0.2.1");
        assert_eq!(value["mask"], 24);
        assert!(value.get("valid_lft").is_none());

        let value =
            serde_json::to_value(Address::with_lifetime(ip("192.0.2.1"), 24, 600)).unwrap();
        assert_eq!(value["valid_lft"], 600);
    }

    #[test]
    fn default_route_is_detected_by_sentinel() {
        let details = RouteDetails {
            family: IpFamily::V4,
            priority: 100,
            scope: RouteScope::Universe,
            table: 254,
        };
        let route = Route {
            destination: Route::DEFAULT_DESTINATION.to_string(),
            gateway: None,
            source: None,
            link: "eth0".to_string(),
            details,
        };
        assert!(route.is_default());

        let route = Route {
            destination: "10.0.0.0/8".to_string(),
            ..route
        };
        assert!(!route.is_default());
    }

    #[test]
    fn route_serialization_hides_kernel_details() {
        let route = Route {
            destination: "10.0.0.0/8".to_string(),
            gateway: Some(ip("192.0.2.254")),
            source: None,
            link: "eth0".to_string(),
            details: RouteDetails {
                family: IpFamily::V4,
                priority: 100,
                scope: RouteScope::Universe,
                table: 254,
            },
        };
        let value = serde_json::to_value(&route).unwrap();
        assert_eq!(value["destination"], "10.0.0.0/8");
        assert_eq!(value["gateway"], "192.0.2.254");
        assert!(value.get("src").is_none());
        assert!(value.get("details").is_none());
        assert!(value.get("priority").is_none());
    }
}
