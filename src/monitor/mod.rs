//! Monitor layer: kernel change subscriptions, update derivation and the
//! multiplexed event loop.
//!
//! This module provides:
//! - The update model ([`Update`], [`UpdateKind`], [`Change`])
//! - Kernel change subscriptions ([`Category`])
//! - The event loop ([`monitor`], [`UpdateHandler`])
//! - Error handling ([`MonitorError`])

mod derive;
mod engine;
mod error;
mod subscribe;
mod update;

pub use engine::{UpdateHandler, monitor};
pub use error::MonitorError;
pub use subscribe::Category;
pub use update::{AddressChange, Change, LinkChange, RouteChange, Update, UpdateKind};
