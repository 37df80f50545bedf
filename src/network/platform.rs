//! Decoding of rtnetlink messages into entity fields.
//!
//! Shared by snapshot enumeration and change derivation so both read the
//! kernel's attribute soup the same way.

use std::net::IpAddr;

use netlink_packet_route::AddressFamily;
use netlink_packet_route::address::{AddressAttribute, AddressMessage};
use netlink_packet_route::link::{LinkAttribute, LinkMessage};
use netlink_packet_route::route::{RouteAddress, RouteAttribute, RouteMessage};

use super::IpFamily;

/// Extracts the address literal, prefix length and raw valid lifetime from
/// an address message. Returns `None` when the message carries no address.
pub(crate) fn address_parts(message: &AddressMessage) -> Option<(IpAddr, u8, u32)> {
    let mut address = None;
    let mut local = None;
    let mut valid_lft = 0;
    for attribute in &message.attributes {
        match attribute {
            AddressAttribute::Address(ip) => address = Some(*ip),
            AddressAttribute::Local(ip) => local = Some(*ip),
            AddressAttribute::CacheInfo(info) => valid_lft = info.ifa_valid,
            _ => {}
        }
    }
    // IFA_LOCAL is the interface address; on point-to-point links
    // IFA_ADDRESS is the peer, everywhere else the two coincide.
    let ip = local.or(address)?;
    Some((ip, message.header.prefix_len, valid_lft))
}

/// Extracts the interface name attribute from a link message.
pub(crate) fn link_name(message: &LinkMessage) -> Option<&str> {
    message.attributes.iter().find_map(|attribute| match attribute {
        LinkAttribute::IfName(name) => Some(name.as_str()),
        _ => None,
    })
}

fn route_address(address: &RouteAddress) -> Option<IpAddr> {
    match address {
        RouteAddress::Inet(v4) => Some(IpAddr::V4(*v4)),
        RouteAddress::Inet6(v6) => Some(IpAddr::V6(*v6)),
        _ => None,
    }
}

/// The route's destination address, or `None` for default routes (no
/// destination prefix).
pub(crate) fn route_destination(message: &RouteMessage) -> Option<IpAddr> {
    if message.header.destination_prefix_length == 0 {
        return None;
    }
    message.attributes.iter().find_map(|attribute| match attribute {
        RouteAttribute::Destination(address) => route_address(address),
        _ => None,
    })
}

pub(crate) fn route_gateway(message: &RouteMessage) -> Option<IpAddr> {
    message.attributes.iter().find_map(|attribute| match attribute {
        RouteAttribute::Gateway(address) => route_address(address),
        _ => None,
    })
}

pub(crate) fn route_source(message: &RouteMessage) -> Option<IpAddr> {
    message.attributes.iter().find_map(|attribute| match attribute {
        RouteAttribute::PrefSource(address) => route_address(address),
        _ => None,
    })
}

/// The output interface index, when present.
pub(crate) fn route_oif(message: &RouteMessage) -> Option<u32> {
    message.attributes.iter().find_map(|attribute| match attribute {
        RouteAttribute::Oif(index) => Some(*index),
        _ => None,
    })
}

/// The route priority (metric); routes without one sort as 0.
pub(crate) fn route_priority(message: &RouteMessage) -> u32 {
    message
        .attributes
        .iter()
        .find_map(|attribute| match attribute {
            RouteAttribute::Priority(priority) => Some(*priority),
            _ => None,
        })
        .unwrap_or(0)
}

/// The effective routing table id: the table attribute (present for table
/// ids above 255) wins over the header byte.
pub(crate) fn route_table(message: &RouteMessage) -> u32 {
    message
        .attributes
        .iter()
        .find_map(|attribute| match attribute {
            RouteAttribute::Table(table) => Some(*table),
            _ => None,
        })
        .unwrap_or_else(|| u32::from(message.header.table))
}

pub(crate) fn route_family(message: &RouteMessage) -> Option<IpFamily> {
    match message.header.address_family {
        AddressFamily::Inet => Some(IpFamily::V4),
        AddressFamily::Inet6 => Some(IpFamily::V6),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netlink_packet_route::address::CacheInfo;
    use std::net::Ipv4Addr;

    #[test]
    fn address_parts_prefer_local_over_address() {
        let mut message = AddressMessage::default();
        message.header.prefix_len = 24;
        message
            .attributes
            .push(AddressAttribute::Address("192.0.2.2".parse().unwrap()));
        message
            .attributes
            .push(AddressAttribute::Local("192.0.2.1".parse().unwrap()));

        let (ip, prefix_len, _) = address_parts(&message).unwrap();
        assert_eq!(ip, "192.0.2.1".parse::<IpAddr>().unwrap());
        assert_eq!(prefix_len, 24);
    }

    #[test]
    fn address_parts_fall_back_to_address_attribute() {
        let mut message = AddressMessage::default();
        message.header.prefix_len = 64;
        message
            .attributes
            .push(AddressAttribute::Address("2001:db8::1".parse().unwrap()));

        let (ip, _, _) = address_parts(&message).unwrap();
        assert_eq!(ip, "2001:db8::1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn address_parts_carry_cache_info_lifetime() {
        let mut message = AddressMessage::default();
        message
            .attributes
            .push(AddressAttribute::Local("192.0.2.1".parse().unwrap()));
        let mut info = CacheInfo::default();
        info.ifa_valid = 600;
        message.attributes.push(AddressAttribute::CacheInfo(info));

        let (_, _, valid_lft) = address_parts(&message).unwrap();
        assert_eq!(valid_lft, 600);
    }

    #[test]
    fn address_parts_require_an_address() {
        let message = AddressMessage::default();
        assert!(address_parts(&message).is_none());
    }

    #[test]
    fn destination_is_none_without_prefix() {
        let mut message = RouteMessage::default();
        message
            .attributes
            .push(RouteAttribute::Destination(RouteAddress::Inet(
                Ipv4Addr::UNSPECIFIED,
            )));
        assert!(route_destination(&message).is_none());

        message.header.destination_prefix_length = 8;
        assert!(route_destination(&message).is_some());
    }

    #[test]
    fn table_attribute_overrides_header_byte() {
        let mut message = RouteMessage::default();
        message.header.table = 254;
        assert_eq!(route_table(&message), 254);

        message.attributes.push(RouteAttribute::Table(1000));
        assert_eq!(route_table(&message), 1000);
    }

    #[test]
    fn missing_priority_defaults_to_zero() {
        let message = RouteMessage::default();
        assert_eq!(route_priority(&message), 0);
    }
}
