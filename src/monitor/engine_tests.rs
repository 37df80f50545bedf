//! Tests for the event loop: init emission, suppression, debounce and
//! cancellation.

use super::*;
use crate::monitor::subscribe::{AddressRecord, LinkRecord, NeighbourRecord, RouteRecord};
use crate::network::{Interface, NetworkState};

use netlink_packet_route::AddressFamily;
use netlink_packet_route::address::{AddressAttribute, AddressMessage};
use netlink_packet_route::link::{LinkFlag, LinkMessage};
use netlink_packet_route::route::{RouteMessage, RouteScope};

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// State source handing out canned snapshots.
struct FakeSource {
    states: Mutex<VecDeque<NetworkState>>,
}

impl FakeSource {
    fn with_states(states: Vec<NetworkState>) -> Self {
        Self {
            states: Mutex::new(states.into()),
        }
    }
}

impl StateSource for FakeSource {
    async fn snapshot(&self) -> NetworkState {
        self.states.lock().unwrap().pop_front().unwrap_or_default()
    }
}

/// Handler recording every update it receives.
#[derive(Clone, Default)]
struct Recorder {
    updates: Arc<Mutex<Vec<Update>>>,
}

impl Recorder {
    fn labels(&self) -> Vec<&'static str> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .map(|update| update.kind.label())
            .collect()
    }

    fn len(&self) -> usize {
        self.updates.lock().unwrap().len()
    }
}

impl UpdateHandler for Recorder {
    fn handle(&mut self, update: Update) -> impl Future<Output = ()> + Send {
        self.updates.lock().unwrap().push(update);
        future::ready(())
    }
}

struct Senders {
    addresses: mpsc::Sender<AddressRecord>,
    links: mpsc::Sender<LinkRecord>,
    routes: mpsc::Sender<RouteRecord>,
    neighbours: mpsc::Sender<NeighbourRecord>,
}

fn test_channels() -> (Senders, Channels) {
    let (addresses_tx, addresses) = mpsc::channel(1);
    let (links_tx, links) = mpsc::channel(1);
    let (routes_tx, routes) = mpsc::channel(1);
    let (neighbours_tx, neighbours) = mpsc::channel(1);
    (
        Senders {
            addresses: addresses_tx,
            links: links_tx,
            routes: routes_tx,
            neighbours: neighbours_tx,
        },
        Channels {
            addresses: Subscription::from_channel(addresses),
            links: Subscription::from_channel(links),
            routes: Subscription::from_channel(routes),
            neighbours: Subscription::from_channel(neighbours),
        },
    )
}

fn state_with_interface(name: &str, index: u32) -> NetworkState {
    let mut interfaces = BTreeMap::new();
    interfaces.insert(
        name.to_string(),
        Interface {
            up: true,
            addresses: Vec::new(),
        },
    );
    let link_names: HashMap<u32, String> = [(index, name.to_string())].into();
    NetworkState::new(interfaces, Vec::new(), link_names)
}

fn address_record() -> AddressRecord {
    let mut message = AddressMessage::default();
    message.header.prefix_len = 24;
    message.header.index = 2;
    message
        .attributes
        .push(AddressAttribute::Address("192.0.2.1".parse().unwrap()));
    AddressRecord {
        message,
        added: true,
    }
}

fn promisc_only_link_record() -> LinkRecord {
    let mut message = LinkMessage::default();
    message.header.index = 2;
    message.header.flags = vec![LinkFlag::Promisc];
    message.header.change_mask = vec![LinkFlag::Promisc];
    LinkRecord { message }
}

fn foreign_table_route_record() -> RouteRecord {
    let mut message = RouteMessage::default();
    message.header.address_family = AddressFamily::Inet;
    message.header.scope = RouteScope::Universe;
    message.header.table = 10;
    RouteRecord {
        message,
        added: true,
    }
}

fn spawn_loop(
    channels: Channels,
    states: Vec<NetworkState>,
    shutdown: oneshot::Receiver<()>,
    interval: Option<Duration>,
    recorder: Recorder,
) -> JoinHandle<Result<(), MonitorError>> {
    tokio::spawn(async move {
        let source = FakeSource::with_states(states);
        let mut recorder = recorder;
        run_loop(
            channels,
            &source,
            async move {
                let _ = shutdown.await;
            },
            interval,
            &mut recorder,
        )
        .await
    })
}

/// Lets the spawned loop task run on the current-thread test runtime.
async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn init_update_is_emitted_first() {
    let (_senders, channels) = test_channels();
    let (_stop_tx, stop_rx) = oneshot::channel();
    let recorder = Recorder::default();
    let state = state_with_interface("eth0", 2);

    let _task = spawn_loop(channels, vec![state], stop_rx, None, recorder.clone());
    settle().await;

    assert_eq!(recorder.labels(), vec!["init"]);
    let updates = recorder.updates.lock().unwrap();
    assert!(updates[0].interfaces.contains_key("eth0"));
}

#[tokio::test]
async fn notable_address_record_produces_update() {
    let (senders, channels) = test_channels();
    let (_stop_tx, stop_rx) = oneshot::channel();
    let recorder = Recorder::default();
    let states = vec![state_with_interface("eth0", 2), state_with_interface("eth0", 2)];

    let _task = spawn_loop(channels, states, stop_rx, None, recorder.clone());
    settle().await;

    senders.addresses.send(address_record()).await.unwrap();
    settle().await;

    assert_eq!(recorder.labels(), vec!["init", "address"]);
    let updates = recorder.updates.lock().unwrap();
    assert_eq!(updates[1].link(), "eth0");
}

#[tokio::test]
async fn flag_only_link_record_is_suppressed() {
    let (senders, channels) = test_channels();
    let (_stop_tx, stop_rx) = oneshot::channel();
    let recorder = Recorder::default();

    let _task = spawn_loop(channels, Vec::new(), stop_rx, None, recorder.clone());
    settle().await;

    senders.links.send(promisc_only_link_record()).await.unwrap();
    settle().await;

    assert_eq!(recorder.labels(), vec!["init"]);
}

#[tokio::test]
async fn route_record_outside_main_table_is_suppressed() {
    let (senders, channels) = test_channels();
    let (_stop_tx, stop_rx) = oneshot::channel();
    let recorder = Recorder::default();

    let _task = spawn_loop(channels, Vec::new(), stop_rx, None, recorder.clone());
    settle().await;

    senders
        .routes
        .send(foreign_table_route_record())
        .await
        .unwrap();
    settle().await;

    assert_eq!(recorder.labels(), vec!["init"]);
}

#[tokio::test]
async fn neighbour_records_are_consumed_without_updates() {
    let (senders, channels) = test_channels();
    let (_stop_tx, stop_rx) = oneshot::channel();
    let recorder = Recorder::default();

    let _task = spawn_loop(channels, Vec::new(), stop_rx, None, recorder.clone());
    settle().await;

    senders.neighbours.send(NeighbourRecord).await.unwrap();
    settle().await;

    assert_eq!(recorder.labels(), vec!["init"]);
}

#[tokio::test]
async fn shutdown_ends_loop_cleanly() {
    let (_senders, channels) = test_channels();
    let (stop_tx, stop_rx) = oneshot::channel();
    let recorder = Recorder::default();

    let task = spawn_loop(channels, Vec::new(), stop_rx, None, recorder.clone());
    settle().await;

    stop_tx.send(()).unwrap();
    let result = task.await.unwrap();
    assert!(result.is_ok());
    assert_eq!(recorder.len(), 1);
}

#[tokio::test]
async fn closed_subscription_channel_ends_loop_cleanly() {
    let (senders, channels) = test_channels();
    let (_stop_tx, stop_rx) = oneshot::channel();
    let recorder = Recorder::default();

    let task = spawn_loop(channels, Vec::new(), stop_rx, None, recorder.clone());
    settle().await;

    drop(senders);
    let result = task.await.unwrap();
    assert!(result.is_ok());
}

#[tokio::test(start_paused = true)]
async fn heartbeat_fires_after_quiet_period() {
    let (_senders, channels) = test_channels();
    let (_stop_tx, stop_rx) = oneshot::channel();
    let recorder = Recorder::default();

    let _task = spawn_loop(
        channels,
        Vec::new(),
        stop_rx,
        Some(Duration::from_secs(5)),
        recorder.clone(),
    );
    settle().await;
    assert_eq!(recorder.labels(), vec!["init"]);

    tokio::time::advance(Duration::from_secs(5)).await;
    settle().await;

    assert_eq!(recorder.labels(), vec!["init", "interval"]);
}

#[tokio::test(start_paused = true)]
async fn notable_event_defers_the_heartbeat() {
    let (senders, channels) = test_channels();
    let (_stop_tx, stop_rx) = oneshot::channel();
    let recorder = Recorder::default();
    let states = vec![
        state_with_interface("eth0", 2),
        state_with_interface("eth0", 2),
    ];

    let _task = spawn_loop(
        channels,
        states,
        stop_rx,
        Some(Duration::from_secs(5)),
        recorder.clone(),
    );
    settle().await;

    // a real event two seconds in pushes the heartbeat back to t=7
    tokio::time::advance(Duration::from_secs(2)).await;
    senders.addresses.send(address_record()).await.unwrap();
    settle().await;
    assert_eq!(recorder.labels(), vec!["init", "address"]);

    // t=5: the original heartbeat slot passes quietly
    tokio::time::advance(Duration::from_secs(3)).await;
    settle().await;
    assert_eq!(recorder.labels(), vec!["init", "address"]);

    // t=7: the deferred heartbeat fires
    tokio::time::advance(Duration::from_secs(2)).await;
    settle().await;
    assert_eq!(recorder.labels(), vec!["init", "address", "interval"]);
}

#[tokio::test(start_paused = true)]
async fn heartbeat_updates_take_fresh_snapshots() {
    let (_senders, channels) = test_channels();
    let (_stop_tx, stop_rx) = oneshot::channel();
    let recorder = Recorder::default();
    let states = vec![
        state_with_interface("eth0", 2),
        state_with_interface("eth1", 3),
    ];

    let _task = spawn_loop(
        channels,
        states,
        stop_rx,
        Some(Duration::from_secs(5)),
        recorder.clone(),
    );
    settle().await;

    tokio::time::advance(Duration::from_secs(5)).await;
    settle().await;

    let updates = recorder.updates.lock().unwrap();
    assert_eq!(updates.len(), 2);
    assert!(updates[0].interfaces.contains_key("eth0"));
    assert!(updates[1].interfaces.contains_key("eth1"));
}
