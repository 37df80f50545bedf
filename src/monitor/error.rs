//! Error types for the monitor layer.

use std::io;

use thiserror::Error;

use super::subscribe::Category;

/// Error type for monitoring startup.
///
/// Monitoring fails only while it is being set up; once the event loop is
/// running, enumeration failures degrade to empty snapshots and handler
/// failures stay with the handler.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Failed to open the rtnetlink connection used for state dumps.
    #[error("Failed to open netlink connection: {0}")]
    Connect(#[source] io::Error),

    /// Failed to subscribe to one of the kernel change categories.
    #[error("Failed to subscribe to {category} changes: {source}")]
    Subscribe {
        /// The change category whose subscription failed.
        category: Category,
        /// The underlying socket error.
        #[source]
        source: io::Error,
    },
}
