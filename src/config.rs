//! Client configuration.
//!
//! A pool is described by a list of [`ServerEndpoint`]s and a [`PoolConfig`]; the
//! [`Manager`](crate::Manager) takes one list per role through [`ManagerConfig`].
//!
//! Endpoints can be written as strings, which is how the CLI accepts them:
//!
//! ```rust
//! use hsclient::config::ServerEndpoint;
//!
//! let read: ServerEndpoint = "inet:localhost:9998".parse().unwrap();
//! let write: ServerEndpoint = "unix:/var/run/hs.sock:5".parse().unwrap();
//!
//! assert_eq!(read.to_string(), "inet:localhost:9998");
//! assert_eq!(write.timeout().as_secs(), 5);
//! ```
use std::{fmt, path::PathBuf, str::FromStr, time::Duration};

use crate::error::HsError;

/// Socket timeout applied to connect, send and receive.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
/// Connection attempts made by the pool before giving up.
pub const RETRY_LIMIT: usize = 5;
/// Cooldown after a connection failure.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(30);

pub const DEFAULT_READ_SERVER: &str = "inet:localhost:9998";
pub const DEFAULT_WRITE_SERVER: &str = "inet:localhost:9999";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Inet { host: String, port: u16 },
    Unix(PathBuf),
}

/// Where and how to reach a single server. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    address: Address,
    timeout: Duration,
}

impl ServerEndpoint {
    pub fn inet(host: impl Into<String>, port: u16) -> Self {
        Self {
            address: Address::Inet {
                host: host.into(),
                port,
            },
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Self {
            address: Address::Unix(path.into()),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the socket timeout. Zero means [`DEFAULT_TIMEOUT`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = if timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            timeout
        };
        self
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.address {
            Address::Inet { host, port } => write!(f, "inet:{host}:{port}"),
            Address::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

fn parse_timeout(s: &str) -> Result<Duration, HsError> {
    s.parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| HsError::Validation(format!("invalid timeout '{s}'")))
}

impl FromStr for ServerEndpoint {
    type Err = HsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (proto, rest) = s
            .split_once(':')
            .ok_or_else(|| HsError::Validation(format!("invalid server '{s}'")))?;

        match proto {
            "inet" => {
                let parts = rest.split(':').collect::<Vec<&str>>();
                if parts.len() < 2 || parts[1].is_empty() {
                    return Err(HsError::Validation(format!(
                        "port is not specified for inet server '{s}'"
                    )));
                }
                if parts[0].is_empty() || parts.len() > 3 {
                    return Err(HsError::Validation(format!("invalid server '{s}'")));
                }

                let port = parts[1]
                    .parse::<u16>()
                    .map_err(|_| HsError::Validation(format!("invalid port '{}'", parts[1])))?;
                let mut endpoint = ServerEndpoint::inet(parts[0], port);
                if let Some(timeout) = parts.get(2) {
                    endpoint = endpoint.with_timeout(parse_timeout(timeout)?);
                }
                Ok(endpoint)
            }
            "unix" => {
                // A trailing all-digit component is a timeout, anything else is path.
                let (path, timeout) = match rest.rsplit_once(':') {
                    Some((path, t)) if !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit()) => {
                        (path, Some(parse_timeout(t)?))
                    }
                    _ => (rest, None),
                };
                if path.is_empty() {
                    return Err(HsError::Validation(format!(
                        "socket path is not specified for unix server '{s}'"
                    )));
                }

                let endpoint = ServerEndpoint::unix(path);
                Ok(match timeout {
                    Some(t) => endpoint.with_timeout(t),
                    None => endpoint,
                })
            }
            other => Err(HsError::Validation(format!(
                "unsupported protocol '{other}'"
            ))),
        }
    }
}

/// Tunables shared by every connection of a pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub retry_limit: usize,
    pub retry_interval: Duration,
    /// Log raw bytes sent and received.
    pub debug: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            retry_limit: RETRY_LIMIT,
            retry_interval: RETRY_INTERVAL,
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ManagerConfig {
    pub read_servers: Vec<ServerEndpoint>,
    pub write_servers: Vec<ServerEndpoint>,
    pub pool: PoolConfig,
}

impl ManagerConfig {
    /// Server lists with the defaults filled in for any empty role.
    pub(crate) fn servers(&self) -> Result<(Vec<ServerEndpoint>, Vec<ServerEndpoint>), HsError> {
        let read = if self.read_servers.is_empty() {
            vec![DEFAULT_READ_SERVER.parse()?]
        } else {
            self.read_servers.clone()
        };
        let write = if self.write_servers.is_empty() {
            vec![DEFAULT_WRITE_SERVER.parse()?]
        } else {
            self.write_servers.clone()
        };
        Ok((read, write))
    }
}
