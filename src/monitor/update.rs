//! The update model: what the monitor reports and how it serializes.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

use serde::{Serialize, Serializer};

use crate::network::{Address, Interface, NetworkState, Route};

/// A change tag attached to an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Change {
    /// An address or route was added.
    Add,
    /// An address or route was removed.
    Delete,
    /// The interface went administratively up.
    Up,
    /// The interface went administratively down.
    Down,
    /// Promiscuous mode was enabled.
    Promisc,
    /// Promiscuous mode was disabled.
    NoPromisc,
    /// ARP was disabled.
    NoArp,
    /// ARP was enabled.
    Arp,
    /// The broadcast flag was set.
    Broadcast,
    /// The broadcast flag was cleared.
    NoBroadcast,
    /// The loopback flag was set.
    Loopback,
    /// The loopback flag was cleared.
    NoLoopback,
    /// The point-to-point flag was set.
    PointToPoint,
    /// The point-to-point flag was cleared.
    NoPointToPoint,
    /// The multicast flag was set.
    Multicast,
    /// The multicast flag was cleared.
    NoMulticast,
}

impl Change {
    /// The tag as it appears on the wire and in the environment.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Delete => "delete",
            Self::Up => "up",
            Self::Down => "down",
            Self::Promisc => "promisc",
            Self::NoPromisc => "nopromisc",
            Self::NoArp => "noarp",
            Self::Arp => "arp",
            Self::Broadcast => "broadcast",
            Self::NoBroadcast => "nobroadcast",
            Self::Loopback => "loopback",
            Self::NoLoopback => "noloopback",
            Self::PointToPoint => "pointtopoint",
            Self::NoPointToPoint => "nopointtopoint",
            Self::Multicast => "multicast",
            Self::NoMulticast => "nomulticast",
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of an address change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressChange {
    /// [`Change::Add`] or [`Change::Delete`].
    pub change: Change,
    /// Interface the address belongs to (empty if unresolved).
    pub link: String,
    /// The address involved.
    pub address: Address,
}

/// Payload of a link flag change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkChange {
    /// One tag per tracked flag bit that changed.
    pub changes: Vec<Change>,
    /// The interface that changed (empty if unresolved).
    pub link: String,
}

/// Payload of a route change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteChange {
    /// [`Change::Add`] or [`Change::Delete`], when the record kind is known.
    pub change: Option<Change>,
    /// Destination of the route; `None` for default routes.
    pub destination: Option<Address>,
    /// Next-hop gateway, when present.
    pub gateway: Option<IpAddr>,
    /// Preferred source address, when present.
    pub source: Option<IpAddr>,
    /// Owning interface (empty if unresolved).
    pub link: String,
}

/// What triggered an update.
///
/// One case per update type; the full snapshot travels on [`Update`]
/// regardless of the case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateKind {
    /// The synthetic first update emitted before the event loop starts.
    Init,
    /// A heartbeat update emitted after a quiet period.
    Interval,
    /// An address was added to or removed from an interface.
    Address(AddressChange),
    /// Interface flags changed.
    Link(LinkChange),
    /// A route with a destination prefix changed.
    Route(RouteChange),
    /// A default route (no destination prefix) changed.
    DefaultRoute(RouteChange),
}

impl UpdateKind {
    /// The update type label used on the wire and in the environment.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Interval => "interval",
            Self::Address(_) => "address",
            Self::Link(_) => "link",
            Self::Route(_) => "route",
            Self::DefaultRoute(_) => "default_route",
        }
    }
}

/// The unit of observation: why the monitor fired, plus a complete
/// freshly-enumerated snapshot of interfaces and routes.
///
/// Updates are immutable once constructed; the engine keeps no reference to
/// an update after the handler returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    /// What triggered this update.
    pub kind: UpdateKind,
    /// Full interface snapshot at the moment of the event.
    pub interfaces: BTreeMap<String, Interface>,
    /// Full filtered routing table at the moment of the event.
    pub routes: Vec<Route>,
}

impl Update {
    /// Builds an update from a fresh snapshot.
    pub(crate) fn new(kind: UpdateKind, state: NetworkState) -> Self {
        let (interfaces, routes) = state.into_parts();
        Self {
            kind,
            interfaces,
            routes,
        }
    }

    /// The change tags of this update; empty for full snapshots.
    #[must_use]
    pub fn changes(&self) -> Vec<Change> {
        match &self.kind {
            UpdateKind::Init | UpdateKind::Interval => Vec::new(),
            UpdateKind::Address(change) => vec![change.change],
            UpdateKind::Link(change) => change.changes.clone(),
            UpdateKind::Route(change) | UpdateKind::DefaultRoute(change) => {
                change.change.into_iter().collect()
            }
        }
    }

    /// Name of the interface the change pertains to; empty when the update
    /// is not about a single interface.
    #[must_use]
    pub fn link(&self) -> &str {
        match &self.kind {
            UpdateKind::Init | UpdateKind::Interval => "",
            UpdateKind::Address(change) => &change.link,
            UpdateKind::Link(change) => &change.link,
            UpdateKind::Route(change) | UpdateKind::DefaultRoute(change) => &change.link,
        }
    }

    /// The single address involved in an address or route change.
    #[must_use]
    pub fn address(&self) -> Option<&Address> {
        match &self.kind {
            UpdateKind::Address(change) => Some(&change.address),
            UpdateKind::Route(change) | UpdateKind::DefaultRoute(change) => {
                change.destination.as_ref()
            }
            _ => None,
        }
    }

    /// The gateway of a route change.
    #[must_use]
    pub fn gateway(&self) -> Option<IpAddr> {
        match &self.kind {
            UpdateKind::Route(change) | UpdateKind::DefaultRoute(change) => change.gateway,
            _ => None,
        }
    }

    /// The source address of a route change.
    #[must_use]
    pub fn source(&self) -> Option<IpAddr> {
        match &self.kind {
            UpdateKind::Route(change) | UpdateKind::DefaultRoute(change) => change.source,
            _ => None,
        }
    }
}

/// Flat wire shape consumed by child processes reading JSON on stdin.
#[derive(Serialize)]
struct WireUpdate<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    change: Vec<Change>,
    #[serde(skip_serializing_if = "str::is_empty")]
    link: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<&'a Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gateway: Option<IpAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<IpAddr>,
    routes: &'a [Route],
    interfaces: &'a BTreeMap<String, Interface>,
}

impl Serialize for Update {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireUpdate {
            kind: self.kind.label(),
            change: self.changes(),
            link: self.link(),
            address: self.address(),
            gateway: self.gateway(),
            source: self.source(),
            routes: &self.routes,
            interfaces: &self.interfaces,
        }
        .serialize(serializer)
    }
}
