//! Kernel change subscriptions.
//!
//! One rtnetlink socket per change category, bound to that category's
//! multicast groups. A forwarder task decodes raw netlink messages into
//! typed records and delivers them over a bounded single-slot channel, so
//! a slow consumer backpressures onto the kernel's own socket buffering.

use std::fmt;

use futures::StreamExt;
use netlink_packet_core::NetlinkPayload;
use netlink_packet_route::RouteNetlinkMessage;
use netlink_packet_route::address::AddressMessage;
use netlink_packet_route::link::LinkMessage;
use netlink_packet_route::route::RouteMessage;
use netlink_sys::{AsyncSocket, SocketAddr};
use rtnetlink::constants::{
    RTMGRP_IPV4_IFADDR, RTMGRP_IPV4_ROUTE, RTMGRP_IPV6_IFADDR, RTMGRP_IPV6_ROUTE, RTMGRP_LINK,
    RTMGRP_NEIGH,
};
use rtnetlink::new_connection;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::error::MonitorError;

/// A kernel change-notification category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Address additions and removals.
    Address,
    /// Interface flag and state changes.
    Link,
    /// Routing table changes.
    Route,
    /// Neighbour table changes.
    Neighbour,
}

impl Category {
    const fn groups(self) -> u32 {
        match self {
            Self::Address => RTMGRP_IPV4_IFADDR | RTMGRP_IPV6_IFADDR,
            Self::Link => RTMGRP_LINK,
            Self::Route => RTMGRP_IPV4_ROUTE | RTMGRP_IPV6_ROUTE,
            Self::Neighbour => RTMGRP_NEIGH,
        }
    }

    /// Whether existing entries are replayed as synthetic records when the
    /// subscription opens.
    const fn replays_existing(self) -> bool {
        matches!(self, Self::Neighbour)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Address => "address",
            Self::Link => "link",
            Self::Route => "route",
            Self::Neighbour => "neighbour",
        })
    }
}

/// An address was added to or removed from an interface.
#[derive(Debug)]
pub(crate) struct AddressRecord {
    pub(crate) message: AddressMessage,
    pub(crate) added: bool,
}

/// Interface flags or state changed.
#[derive(Debug)]
pub(crate) struct LinkRecord {
    pub(crate) message: LinkMessage,
}

/// A route was added or removed.
#[derive(Debug)]
pub(crate) struct RouteRecord {
    pub(crate) message: RouteMessage,
    pub(crate) added: bool,
}

/// A neighbour table entry changed. Carries no payload; neighbour records
/// are consumed only to keep the subscription alive.
#[derive(Debug)]
pub(crate) struct NeighbourRecord;

fn decode_address(message: RouteNetlinkMessage) -> Option<AddressRecord> {
    match message {
        RouteNetlinkMessage::NewAddress(message) => Some(AddressRecord {
            message,
            added: true,
        }),
        RouteNetlinkMessage::DelAddress(message) => Some(AddressRecord {
            message,
            added: false,
        }),
        _ => None,
    }
}

fn decode_link(message: RouteNetlinkMessage) -> Option<LinkRecord> {
    match message {
        RouteNetlinkMessage::NewLink(message) | RouteNetlinkMessage::DelLink(message) => {
            Some(LinkRecord { message })
        }
        _ => None,
    }
}

fn decode_route(message: RouteNetlinkMessage) -> Option<RouteRecord> {
    match message {
        RouteNetlinkMessage::NewRoute(message) => Some(RouteRecord {
            message,
            added: true,
        }),
        RouteNetlinkMessage::DelRoute(message) => Some(RouteRecord {
            message,
            added: false,
        }),
        _ => None,
    }
}

fn decode_neighbour(message: RouteNetlinkMessage) -> Option<NeighbourRecord> {
    match message {
        RouteNetlinkMessage::NewNeighbour(_) | RouteNetlinkMessage::DelNeighbour(_) => {
            Some(NeighbourRecord)
        }
        _ => None,
    }
}

/// A live subscription to one change category.
///
/// Dropping the subscription aborts its tasks, which closes the underlying
/// netlink socket.
#[derive(Debug)]
pub(crate) struct Subscription<T> {
    records: mpsc::Receiver<T>,
    tasks: Vec<JoinHandle<()>>,
}

impl<T: Send + 'static> Subscription<T> {
    fn open(
        category: Category,
        decode: fn(RouteNetlinkMessage) -> Option<T>,
    ) -> Result<Self, MonitorError> {
        let (mut connection, handle, mut messages) =
            new_connection().map_err(|source| MonitorError::Subscribe { category, source })?;
        connection
            .socket_mut()
            .socket_mut()
            .bind(&SocketAddr::new(0, category.groups()))
            .map_err(|source| MonitorError::Subscribe { category, source })?;

        let driver = tokio::spawn(connection);
        let (records_tx, records) = mpsc::channel(1);
        let forwarder = tokio::spawn(async move {
            if category.replays_existing() {
                use futures::TryStreamExt;

                let mut existing = handle.neighbours().get().execute();
                loop {
                    match existing.try_next().await {
                        Ok(Some(entry)) => {
                            let Some(record) = decode(RouteNetlinkMessage::NewNeighbour(entry))
                            else {
                                continue;
                            };
                            if records_tx.send(record).await.is_err() {
                                return;
                            }
                        }
                        Ok(None) => break,
                        Err(error) => {
                            tracing::debug!("{category} replay failed: {error}");
                            break;
                        }
                    }
                }
            }

            while let Some((message, _source)) = messages.next().await {
                if let NetlinkPayload::InnerMessage(message) = message.payload {
                    if let Some(record) = decode(message) {
                        if records_tx.send(record).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Ok(Self {
            records,
            tasks: vec![driver, forwarder],
        })
    }

    /// Receives the next record; `None` once the subscription has closed.
    pub(crate) async fn recv(&mut self) -> Option<T> {
        self.records.recv().await
    }

    /// Builds a subscription fed by a plain channel, for event-loop tests.
    #[cfg(test)]
    pub(crate) fn from_channel(records: mpsc::Receiver<T>) -> Self {
        Self {
            records,
            tasks: Vec::new(),
        }
    }
}

impl Subscription<AddressRecord> {
    pub(crate) fn addresses() -> Result<Self, MonitorError> {
        Self::open(Category::Address, decode_address)
    }
}

impl Subscription<LinkRecord> {
    pub(crate) fn links() -> Result<Self, MonitorError> {
        Self::open(Category::Link, decode_link)
    }
}

impl Subscription<RouteRecord> {
    pub(crate) fn routes() -> Result<Self, MonitorError> {
        Self::open(Category::Route, decode_route)
    }
}

impl Subscription<NeighbourRecord> {
    pub(crate) fn neighbours() -> Result<Self, MonitorError> {
        Self::open(Category::Neighbour, decode_neighbour)
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
