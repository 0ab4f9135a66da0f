use std::{
    io::{self, Read, Write},
    net::{TcpStream, ToSocketAddrs},
};

#[cfg(unix)]
use std::os::unix::net::UnixStream;

use log::debug;
use thiserror::Error;

use crate::config::{Address, ServerEndpoint};

use super::LINE_END;

const RECV_BUFFER_SIZE: usize = 4096;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection closed on the remote end.")]
    Closed,
    #[error("{0}")]
    Io(#[from] io::Error),
}

/// A connected stream socket of either supported family.
#[derive(Debug)]
pub enum Transport {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Transport {
    /// Opens a socket to `endpoint` with the endpoint timeout applied to reads
    /// and writes. TCP sockets have Nagle's algorithm disabled and time out on
    /// connect too; a unix socket connect has no timeout and blocks while the
    /// listener's backlog is full.
    pub fn open(endpoint: &ServerEndpoint) -> io::Result<Self> {
        let timeout = Some(endpoint.timeout());

        match endpoint.address() {
            Address::Inet { host, port } => {
                let mut last_err = None;
                for addr in (host.as_str(), *port).to_socket_addrs()? {
                    match TcpStream::connect_timeout(&addr, endpoint.timeout()) {
                        Ok(stream) => {
                            stream.set_nodelay(true)?;
                            stream.set_read_timeout(timeout)?;
                            stream.set_write_timeout(timeout)?;
                            return Ok(Transport::Tcp(stream));
                        }
                        Err(e) => last_err = Some(e),
                    }
                }
                Err(last_err.unwrap_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("could not resolve '{host}'"),
                    )
                }))
            }
            #[cfg(unix)]
            Address::Unix(path) => {
                let stream = UnixStream::connect(path)?;
                stream.set_read_timeout(timeout)?;
                stream.set_write_timeout(timeout)?;
                Ok(Transport::Unix(stream))
            }
            #[cfg(not(unix))]
            Address::Unix(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "unix sockets are not supported on this platform",
            )),
        }
    }
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Transport::Tcp(s) => s.read(buf),
            #[cfg(unix)]
            Transport::Unix(s) => s.read(buf),
        }
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Transport::Tcp(s) => s.write(buf),
            #[cfg(unix)]
            Transport::Unix(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Transport::Tcp(s) => s.flush(),
            #[cfg(unix)]
            Transport::Unix(s) => s.flush(),
        }
    }
}

/// Reads until the first line feed and returns what precedes it.
///
/// Only one response is ever outstanding, so anything received after the line
/// feed is dropped.
pub fn read_line<R: Read>(reader: &mut R, debug: bool) -> Result<Vec<u8>, TransportError> {
    let mut line = Vec::new();
    let mut buf = [0u8; RECV_BUFFER_SIZE];

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Err(TransportError::Closed),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        if debug {
            debug!("read data bucket: {}", buf[..n].escape_ascii());
        }

        if let Some(end) = buf[..n].iter().position(|b| *b == LINE_END) {
            line.extend_from_slice(&buf[..end]);
            return Ok(line);
        }
        line.extend_from_slice(&buf[..n]);
    }
}
