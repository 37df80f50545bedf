//! Full-state enumeration of interfaces, addresses and routes.
//!
//! Enumeration is best-effort: a failing kernel dump degrades to empty
//! results for that category and is logged, never surfaced. Every snapshot
//! re-reads the kernel; nothing is cached between calls.

use std::collections::{BTreeMap, HashMap};
use std::io;

use futures::TryStreamExt;
use netlink_packet_route::link::LinkFlag;
use rtnetlink::{Handle, IpVersion, new_connection};
use tokio::task::JoinHandle;

use super::filter;
use super::platform;
use super::types::{Address, Interface, Route, RouteDetails};

/// A complete snapshot of the kernel's network configuration, filtered to
/// what the monitor reports.
#[derive(Debug, Clone, Default)]
pub struct NetworkState {
    /// Interfaces by name.
    pub interfaces: BTreeMap<String, Interface>,
    /// Kept rows of the main routing table, in enumeration order.
    pub routes: Vec<Route>,
    link_names: HashMap<u32, String>,
}

impl NetworkState {
    pub(crate) fn new(
        interfaces: BTreeMap<String, Interface>,
        routes: Vec<Route>,
        link_names: HashMap<u32, String>,
    ) -> Self {
        Self {
            interfaces,
            routes,
            link_names,
        }
    }

    /// Resolves a kernel interface index to its name, if the interface was
    /// present when this snapshot was taken.
    #[must_use]
    pub fn link_name(&self, index: u32) -> Option<&str> {
        self.link_names.get(&index).map(String::as_str)
    }

    pub(crate) fn into_parts(self) -> (BTreeMap<String, Interface>, Vec<Route>) {
        (self.interfaces, self.routes)
    }
}

/// Source of full network-state snapshots.
///
/// The event loop only depends on this trait, so tests can drive it with
/// canned states instead of a live netlink socket.
pub trait StateSource {
    /// Takes a fresh snapshot of the current network state.
    fn snapshot(&self) -> impl Future<Output = NetworkState> + Send;
}

/// [`StateSource`] backed by a dedicated rtnetlink dump connection.
pub struct Snapshotter {
    handle: Handle,
    driver: JoinHandle<()>,
}

impl Snapshotter {
    /// Opens the rtnetlink connection used for state dumps.
    ///
    /// # Errors
    ///
    /// Returns an error if the netlink socket cannot be opened. Must be
    /// called from within a Tokio runtime; the connection driver is spawned
    /// onto it.
    pub fn connect() -> io::Result<Self> {
        let (connection, handle, _) = new_connection()?;
        let driver = tokio::spawn(connection);
        Ok(Self { handle, driver })
    }
}

impl Drop for Snapshotter {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

impl StateSource for Snapshotter {
    async fn snapshot(&self) -> NetworkState {
        let (mut interfaces, link_names) = enumerate_links(&self.handle).await;
        collect_addresses(&self.handle, &mut interfaces, &link_names).await;
        let routes = enumerate_routes(&self.handle, &link_names).await;
        NetworkState::new(interfaces, routes, link_names)
    }
}

async fn enumerate_links(handle: &Handle) -> (BTreeMap<String, Interface>, HashMap<u32, String>) {
    let mut interfaces = BTreeMap::new();
    let mut link_names = HashMap::new();

    let mut links = handle.link().get().execute();
    loop {
        match links.try_next().await {
            Ok(Some(message)) => {
                let Some(name) = platform::link_name(&message) else {
                    continue;
                };
                let up = message.header.flags.contains(&LinkFlag::Up);
                link_names.insert(message.header.index, name.to_string());
                interfaces.insert(
                    name.to_string(),
                    Interface {
                        up,
                        addresses: Vec::new(),
                    },
                );
            }
            Ok(None) => break,
            Err(error) => {
                tracing::warn!("interface enumeration failed: {error}");
                break;
            }
        }
    }

    (interfaces, link_names)
}

async fn collect_addresses(
    handle: &Handle,
    interfaces: &mut BTreeMap<String, Interface>,
    link_names: &HashMap<u32, String>,
) {
    let mut addresses = handle.address().get().execute();
    loop {
        match addresses.try_next().await {
            Ok(Some(message)) => {
                let Some((ip, prefix_len, valid_lft)) = platform::address_parts(&message) else {
                    continue;
                };
                if !filter::is_monitored_address(&ip) {
                    continue;
                }
                let Some(interface) = link_names
                    .get(&message.header.index)
                    .and_then(|name| interfaces.get_mut(name))
                else {
                    continue;
                };
                interface
                    .addresses
                    .push(Address::with_lifetime(ip, prefix_len, valid_lft));
            }
            Ok(None) => break,
            Err(error) => {
                tracing::warn!("address enumeration failed: {error}");
                break;
            }
        }
    }
}

async fn enumerate_routes(handle: &Handle, link_names: &HashMap<u32, String>) -> Vec<Route> {
    let mut routes = Vec::new();
    for version in [IpVersion::V4, IpVersion::V6] {
        let mut rows = handle.route().get(version).execute();
        loop {
            match rows.try_next().await {
                Ok(Some(message)) => {
                    if let Some(route) = route_from_message(&message, link_names) {
                        routes.push(route);
                    }
                }
                Ok(None) => break,
                Err(error) => {
                    tracing::warn!("route enumeration failed: {error}");
                    break;
                }
            }
        }
    }
    routes
}

fn route_from_message(
    message: &netlink_packet_route::route::RouteMessage,
    link_names: &HashMap<u32, String>,
) -> Option<Route> {
    let family = platform::route_family(message)?;
    let destination = platform::route_destination(message);
    let table = platform::route_table(message);
    if !filter::keep_route(message.header.scope, table, destination.as_ref()) {
        return None;
    }

    let destination = destination.map_or_else(
        || Route::DEFAULT_DESTINATION.to_string(),
        |ip| format!("{ip}/{}", message.header.destination_prefix_length),
    );
    let link = platform::route_oif(message)
        .and_then(|index| link_names.get(&index))
        .cloned()
        .unwrap_or_default();

    Some(Route {
        destination,
        gateway: platform::route_gateway(message),
        source: platform::route_source(message),
        link,
        details: RouteDetails {
            family,
            priority: platform::route_priority(message),
            scope: message.header.scope,
            table,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use netlink_packet_route::AddressFamily;
    use netlink_packet_route::route::{RouteAddress, RouteAttribute, RouteMessage, RouteScope};

    fn names(entries: &[(u32, &str)]) -> HashMap<u32, String> {
        entries
            .iter()
            .map(|(index, name)| (*index, (*name).to_string()))
            .collect()
    }

    fn main_table_route() -> RouteMessage {
        let mut message = RouteMessage::default();
        message.header.address_family = AddressFamily::Inet;
        message.header.scope = RouteScope::Universe;
        message.header.table = 254;
        message
    }

    #[test]
    fn default_route_gets_sentinel_destination() {
        let mut message = main_table_route();
        message
            .attributes
            .push(RouteAttribute::Gateway(RouteAddress::Inet(
                "192.0.2.254".parse().unwrap(),
            )));
        message.attributes.push(RouteAttribute::Oif(2));

        let route = route_from_message(&message, &names(&[(2, "eth0")])).unwrap();
        assert!(route.is_default());
        assert_eq!(route.link, "eth0");
        assert_eq!(route.gateway, Some("192.0.2.254".parse().unwrap()));
    }

    #[test]
    fn destination_renders_as_cidr_literal() {
        let mut message = main_table_route();
        message.header.destination_prefix_length = 8;
        message
            .attributes
            .push(RouteAttribute::Destination(RouteAddress::Inet(
                "10.0.0.0".parse().unwrap(),
            )));

        let route = route_from_message(&message, &HashMap::new()).unwrap();
        assert_eq!(route.destination, "10.0.0.0/8");
        assert_eq!(route.link, "");
    }

    #[test]
    fn routes_outside_main_table_are_dropped() {
        let mut message = main_table_route();
        message.header.table = 255;
        assert!(route_from_message(&message, &HashMap::new()).is_none());
    }

    #[test]
    fn host_scope_routes_are_dropped() {
        let mut message = main_table_route();
        message.header.scope = RouteScope::Host;
        assert!(route_from_message(&message, &HashMap::new()).is_none());
    }

    #[test]
    fn link_local_destinations_are_dropped() {
        let mut message = main_table_route();
        message.header.destination_prefix_length = 16;
        message
            .attributes
            .push(RouteAttribute::Destination(RouteAddress::Inet(
                "169.254.0.0".parse().unwrap(),
            )));
        assert!(route_from_message(&message, &HashMap::new()).is_none());
    }

    #[test]
    fn link_name_resolves_only_known_indexes() {
        let state = NetworkState::new(BTreeMap::new(), Vec::new(), names(&[(3, "wlan0")]));
        assert_eq!(state.link_name(3), Some("wlan0"));
        assert_eq!(state.link_name(4), None);
    }
}
