//! Translation of raw kernel change records into updates.
//!
//! Every derivation starts from a fresh snapshot and only annotates why it
//! was taken; partial state tracking against out-of-order kernel
//! notifications is not attempted. The returned flag says whether the
//! change is notable enough to report.

use netlink_packet_route::link::LinkFlag;

use crate::network::{Address, NetworkState, filter, platform};

use super::subscribe::{AddressRecord, LinkRecord, RouteRecord};
use super::update::{AddressChange, Change, LinkChange, RouteChange, Update, UpdateKind};

/// Tracked link flag bits and their set/cleared tags.
const TRACKED_FLAGS: [(LinkFlag, Change, Change); 7] = [
    (LinkFlag::Up, Change::Up, Change::Down),
    (LinkFlag::Promisc, Change::Promisc, Change::NoPromisc),
    (LinkFlag::Noarp, Change::NoArp, Change::Arp),
    (LinkFlag::Broadcast, Change::Broadcast, Change::NoBroadcast),
    (LinkFlag::Loopback, Change::Loopback, Change::NoLoopback),
    (
        LinkFlag::Pointopoint,
        Change::PointToPoint,
        Change::NoPointToPoint,
    ),
    (LinkFlag::Multicast, Change::Multicast, Change::NoMulticast),
];

/// Derives an address update. Address changes are always notable; records
/// without an address payload are dropped.
pub(crate) fn address_change(
    state: NetworkState,
    record: &AddressRecord,
) -> Option<(Update, bool)> {
    let (ip, prefix_len, _) = platform::address_parts(&record.message)?;
    let link = state
        .link_name(record.message.header.index)
        .unwrap_or_default()
        .to_string();
    let change = if record.added {
        Change::Add
    } else {
        Change::Delete
    };
    let kind = UpdateKind::Address(AddressChange {
        change,
        link,
        address: Address::new(ip, prefix_len),
    });
    Some((Update::new(kind, state), true))
}

/// Derives a link update. Notable only when the administrative up/down bit
/// is among the changed flags; other flag churn is suppressed.
pub(crate) fn link_change(state: NetworkState, record: &LinkRecord) -> Option<(Update, bool)> {
    let header = &record.message.header;
    let link = platform::link_name(&record.message)
        .or_else(|| state.link_name(header.index))
        .unwrap_or_default()
        .to_string();

    let mut changes = Vec::new();
    for (flag, set, cleared) in TRACKED_FLAGS {
        if !header.change_mask.contains(&flag) {
            continue;
        }
        changes.push(if header.flags.contains(&flag) {
            set
        } else {
            cleared
        });
    }
    let notable = header.change_mask.contains(&LinkFlag::Up);

    let kind = UpdateKind::Link(LinkChange { changes, link });
    Some((Update::new(kind, state), notable))
}

/// Derives a route update. Notable only for main-table routes of universe
/// or link scope.
pub(crate) fn route_change(state: NetworkState, record: &RouteRecord) -> Option<(Update, bool)> {
    let message = &record.message;
    let destination = platform::route_destination(message)
        .map(|ip| Address::new(ip, message.header.destination_prefix_length));
    let link = platform::route_oif(message)
        .and_then(|index| state.link_name(index))
        .unwrap_or_default()
        .to_string();

    let change = RouteChange {
        change: Some(if record.added {
            Change::Add
        } else {
            Change::Delete
        }),
        gateway: platform::route_gateway(message),
        source: platform::route_source(message),
        link,
        destination: destination.clone(),
    };
    let kind = if destination.is_some() {
        UpdateKind::Route(change)
    } else {
        UpdateKind::DefaultRoute(change)
    };
    let notable =
        filter::is_reportable_route(message.header.scope, platform::route_table(message));

    Some((Update::new(kind, state), notable))
}

#[cfg(test)]
#[path = "derive_tests.rs"]
mod tests;
