//! The multiplexed monitoring event loop.
//!
//! One logical worker waits on the four kernel subscriptions, an optional
//! heartbeat timer and a shutdown future, derives an update for every
//! record and hands notable updates to the caller's handler. Handler
//! invocations are awaited to completion before the next event is taken,
//! so a slow handler backpressures the whole loop.

use std::future;
use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::network::{Snapshotter, StateSource};

use super::derive;
use super::error::MonitorError;
use super::subscribe::{AddressRecord, LinkRecord, NeighbourRecord, RouteRecord, Subscription};
use super::update::{Update, UpdateKind};

/// Receiver of monitoring updates.
///
/// The loop never invokes the handler reentrantly: each call is awaited
/// before the next event is processed.
pub trait UpdateHandler {
    /// Handles one update.
    fn handle(&mut self, update: Update) -> impl Future<Output = ()> + Send;
}

impl<H: UpdateHandler> UpdateHandler for &mut H {
    fn handle(&mut self, update: Update) -> impl Future<Output = ()> + Send {
        (**self).handle(update)
    }
}

/// The four open change subscriptions driving one monitoring loop.
pub(crate) struct Channels {
    pub(crate) addresses: Subscription<AddressRecord>,
    pub(crate) links: Subscription<LinkRecord>,
    pub(crate) routes: Subscription<RouteRecord>,
    pub(crate) neighbours: Subscription<NeighbourRecord>,
}

impl Channels {
    fn open() -> Result<Self, MonitorError> {
        // neighbours first: their subscription replays existing entries
        let neighbours = Subscription::neighbours()?;
        let addresses = Subscription::addresses()?;
        let routes = Subscription::routes()?;
        let links = Subscription::links()?;
        Ok(Self {
            addresses,
            links,
            routes,
            neighbours,
        })
    }
}

/// Watches the kernel's network configuration until `shutdown` resolves.
///
/// Emits one synthetic `init` update before entering the wait loop, then
/// one update per notable kernel change. With `interval` set, a heartbeat
/// snapshot is emitted after each quiet period of that length; notable
/// changes push the next heartbeat back by a full period.
///
/// Returns `Ok(())` on shutdown or when a subscription channel closes.
///
/// # Errors
///
/// Returns [`MonitorError`] only when a subscription or the snapshot
/// connection cannot be established, before any update has been emitted.
pub async fn monitor<S, H>(
    shutdown: S,
    interval: Option<Duration>,
    mut handler: H,
) -> Result<(), MonitorError>
where
    S: Future<Output = ()> + Send,
    H: UpdateHandler + Send,
{
    let channels = Channels::open()?;
    let source = Snapshotter::connect().map_err(MonitorError::Connect)?;
    run_loop(channels, &source, shutdown, interval, &mut handler).await
}

pub(crate) async fn run_loop<St, S, H>(
    mut channels: Channels,
    source: &St,
    shutdown: S,
    interval: Option<Duration>,
    handler: &mut H,
) -> Result<(), MonitorError>
where
    St: StateSource,
    S: Future<Output = ()>,
    H: UpdateHandler,
{
    let initial = Update::new(UpdateKind::Init, source.snapshot().await);
    handler.handle(initial).await;

    let mut heartbeat = interval.map(|period| {
        let mut timer = time::interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer
    });

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => return Ok(()),

            record = channels.addresses.recv() => {
                let Some(record) = record else { return Ok(()) };
                let derived = derive::address_change(source.snapshot().await, &record);
                if let Some((update, notable)) = derived {
                    if notable {
                        handler.handle(update).await;
                        defer_heartbeat(heartbeat.as_mut());
                    }
                }
            }

            record = channels.links.recv() => {
                let Some(record) = record else { return Ok(()) };
                let derived = derive::link_change(source.snapshot().await, &record);
                if let Some((update, notable)) = derived {
                    if notable {
                        handler.handle(update).await;
                        defer_heartbeat(heartbeat.as_mut());
                    }
                }
            }

            record = channels.routes.recv() => {
                let Some(record) = record else { return Ok(()) };
                let derived = derive::route_change(source.snapshot().await, &record);
                if let Some((update, notable)) = derived {
                    if notable {
                        handler.handle(update).await;
                        defer_heartbeat(heartbeat.as_mut());
                    }
                }
            }

            record = channels.neighbours.recv() => {
                // consumed only to keep the subscription alive; neighbour
                // changes produce no updates
                if record.is_none() {
                    return Ok(());
                }
            }

            () = next_tick(heartbeat.as_mut()) => {
                let update = Update::new(UpdateKind::Interval, source.snapshot().await);
                handler.handle(update).await;
            }
        }
    }
}

/// Pushes the next heartbeat a full period away from now.
fn defer_heartbeat(heartbeat: Option<&mut Interval>) {
    if let Some(timer) = heartbeat {
        timer.reset();
    }
}

async fn next_tick(heartbeat: Option<&mut Interval>) {
    match heartbeat {
        Some(timer) => {
            timer.tick().await;
        }
        None => future::pending().await,
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
