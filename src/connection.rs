//! A single persistent server connection.
//!
//! A [`Connection`] is created disconnected and connects lazily. Any I/O failure
//! drops the socket and arms a backoff window during which [`Connection::is_ready`]
//! reports false, so the pool skips the server instead of hammering it.
//!
//! ```text
//! Disconnected ──connect──▶ Connected
//!      ▲  ▲                     │
//!      │  └── backoff elapsed ──┤ I/O failure
//!      │                        ▼
//!      └──────────────── Disconnected (backoff until T)
//! ```
use std::{
    io::{self, Write},
    time::{Duration, Instant},
};

use log::{debug, warn};

use crate::{
    config::{PoolConfig, ServerEndpoint},
    error::{HsError, Result},
    protocol::{Transport, TransportError, read_line},
};

#[derive(Debug)]
pub struct Connection {
    endpoint: ServerEndpoint,
    transport: Option<Transport>,
    retry_at: Option<Instant>,
    retry_interval: Duration,
    debug: bool,
}

impl Connection {
    pub fn new(endpoint: ServerEndpoint, config: &PoolConfig) -> Self {
        Self {
            endpoint,
            transport: None,
            retry_at: None,
            retry_interval: config.retry_interval,
            debug: config.debug,
        }
    }

    pub fn endpoint(&self) -> &ServerEndpoint {
        &self.endpoint
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// False while a backoff window is armed. Clears the window once it has passed.
    pub fn is_ready(&mut self) -> bool {
        match self.retry_at {
            Some(at) if at > Instant::now() => false,
            _ => {
                self.retry_at = None;
                true
            }
        }
    }

    /// Opens the socket unless one is already open.
    pub fn connect(&mut self) -> Result<()> {
        if self.transport.is_some() {
            return Ok(());
        }

        match Transport::open(&self.endpoint) {
            Ok(transport) => {
                debug!("connected to {}", self.endpoint);
                self.transport = Some(transport);
                Ok(())
            }
            Err(e) => Err(self.die(e, "Connection error")),
        }
    }

    /// Drops the socket if there is one. Close errors are ignored.
    pub fn disconnect(&mut self) {
        if self.transport.take().is_some() {
            debug!("disconnected from {}", self.endpoint);
        }
    }

    /// Reads one response line.
    ///
    /// A clean close by the peer is reported as
    /// [`HsError::RecoverableConnection`] without arming backoff; any other
    /// failure is a plain connection error.
    pub fn readline(&mut self) -> Result<Vec<u8>> {
        let Some(transport) = self.transport.as_mut() else {
            return Err(HsError::Connection(format!(
                "Read error: not connected to {}",
                self.endpoint
            )));
        };

        match read_line(transport, self.debug) {
            Ok(line) => Ok(line),
            Err(TransportError::Closed) => {
                warn!("{} closed the connection", self.endpoint);
                self.disconnect();
                Err(HsError::RecoverableConnection(
                    TransportError::Closed.to_string(),
                ))
            }
            Err(TransportError::Io(e)) => Err(self.die(e, "Read error")),
        }
    }

    /// Writes the whole buffer.
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        let Some(transport) = self.transport.as_mut() else {
            return Err(HsError::Connection(format!(
                "Send error: not connected to {}",
                self.endpoint
            )));
        };

        let res = transport.write_all(data).and_then(|_| transport.flush());
        match res {
            Ok(()) => {
                if self.debug {
                    debug!("sent data: {}", data.escape_ascii());
                }
                Ok(())
            }
            Err(e) => Err(self.die(e, "Send error")),
        }
    }

    /// Disconnects, arms the backoff window and builds the error to return.
    fn die(&mut self, e: io::Error, msg: &str) -> HsError {
        warn!(
            "{msg} on {}: {e}; retrying in {:?}",
            self.endpoint, self.retry_interval
        );
        self.retry_at = Some(Instant::now() + self.retry_interval);
        self.disconnect();
        HsError::Connection(format!("{msg}: {e}"))
    }
}
