//! Service-state notifications over the systemd notification socket.
//!
//! [`Notifier`] is an explicit resource object around the datagram socket
//! named by `NOTIFY_SOCKET`: lazily connected, reconnected once on a failed
//! write, and silent (returning `false`) when no socket is configured.

use std::env;
use std::fmt;
use std::io;
use std::os::unix::net::UnixDatagram;

/// A service state understood by the service manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceState {
    /// Startup is finished.
    Ready,
    /// The service is reloading its configuration.
    Reloading,
    /// The service is shutting down.
    Stopping,
    /// Watchdog keep-alive ping.
    Watchdog,
    /// Free-form status text.
    Status(String),
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => f.write_str("READY=1"),
            Self::Reloading => f.write_str("RELOADING=1"),
            Self::Stopping => f.write_str("STOPPING=1"),
            Self::Watchdog => f.write_str("WATCHDOG=1"),
            Self::Status(text) => write!(f, "STATUS={text}"),
        }
    }
}

/// Connection to the service manager's notification socket.
#[derive(Debug)]
pub struct Notifier {
    socket: Option<UnixDatagram>,
    target: Option<String>,
}

impl Notifier {
    /// Creates a notifier for the socket named by `NOTIFY_SOCKET`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(env::var("NOTIFY_SOCKET").ok())
    }

    /// Creates a notifier for an explicit socket name; `None` disables
    /// notifications entirely.
    #[must_use]
    pub const fn new(target: Option<String>) -> Self {
        Self {
            socket: None,
            target,
        }
    }

    /// Sends one newline-terminated state message.
    ///
    /// Returns true when the message was handed to the socket. A failed
    /// write drops the connection and retries once over a fresh one.
    pub fn send(&mut self, state: &ServiceState) -> bool {
        let payload = format!("{state}\n");
        match self.try_send(payload.as_bytes()) {
            Ok(()) => true,
            Err(error) => {
                tracing::debug!("service notification failed, reconnecting: {error}");
                self.socket = None;
                self.try_send(payload.as_bytes()).is_ok()
            }
        }
    }

    fn try_send(&mut self, payload: &[u8]) -> io::Result<()> {
        if self.socket.is_none() {
            let target = self
                .target
                .as_deref()
                .ok_or(io::ErrorKind::NotFound)?;
            self.socket = Some(connect(target)?);
        }
        match self.socket.as_ref() {
            Some(socket) => {
                socket.send(payload)?;
                Ok(())
            }
            None => Err(io::ErrorKind::NotFound.into()),
        }
    }
}

/// Connects an unbound datagram socket to a notification socket name;
/// names starting with `@` refer to the abstract namespace.
fn connect(target: &str) -> io::Result<UnixDatagram> {
    let socket = UnixDatagram::unbound()?;
    if let Some(name) = target.strip_prefix('@') {
        use std::os::linux::net::SocketAddrExt;
        use std::os::unix::net::SocketAddr;

        let address = SocketAddr::from_abstract_name(name.as_bytes())?;
        socket.connect_addr(&address)?;
    } else {
        socket.connect(target)?;
    }
    Ok(socket)
}
