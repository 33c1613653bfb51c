//! Physical links to the brick.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use ev3explorer_file_ops::Connector;
use ev3explorer_transfer::{StreamConnection, TransferError};
use tracing::debug;

use crate::config::Config;

/// Where the brick is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// Serial or Bluetooth RFCOMM device node.
    Device(PathBuf),
    /// TCP bridge forwarding raw frames.
    Tcp(String),
}

impl LinkTarget {
    /// Picks the TCP bridge when an address is configured, the device node
    /// otherwise.
    pub fn from_config(config: &Config) -> Self {
        match &config.address {
            Some(addr) => Self::Tcp(addr.clone()),
            None => Self::Device(PathBuf::from(&config.device)),
        }
    }
}

/// An open link. Read and write timeouts only apply to TCP.
#[derive(Debug)]
pub enum Link {
    Device(File),
    Tcp(TcpStream),
}

impl Read for Link {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Device(f) => f.read(buf),
            Self::Tcp(s) => s.read(buf),
        }
    }
}

impl Write for Link {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Device(f) => f.write(buf),
            Self::Tcp(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Device(f) => f.flush(),
            Self::Tcp(s) => s.flush(),
        }
    }
}

/// Opens a fresh link for every explorer operation.
pub struct LinkConnector {
    target: LinkTarget,
    timeout: Duration,
}

impl LinkConnector {
    pub fn new(target: LinkTarget, timeout: Duration) -> Self {
        Self { target, timeout }
    }

    fn open(&self) -> io::Result<Link> {
        match &self.target {
            LinkTarget::Device(path) => {
                let file = OpenOptions::new().read(true).write(true).open(path)?;
                Ok(Link::Device(file))
            }
            LinkTarget::Tcp(addr) => {
                let mut last_err = None;
                for sock in addr.to_socket_addrs()? {
                    match TcpStream::connect_timeout(&sock, self.timeout) {
                        Ok(stream) => {
                            stream.set_read_timeout(Some(self.timeout))?;
                            stream.set_write_timeout(Some(self.timeout))?;
                            stream.set_nodelay(true)?;
                            return Ok(Link::Tcp(stream));
                        }
                        Err(e) => last_err = Some(e),
                    }
                }
                Err(last_err.unwrap_or_else(|| {
                    io::Error::new(io::ErrorKind::NotFound, format!("{addr} did not resolve"))
                }))
            }
        }
    }
}

impl Connector for LinkConnector {
    type Connection = StreamConnection<Link>;

    fn connect(&mut self) -> Result<Self::Connection, TransferError> {
        let link = self.open()?;
        debug!(target = ?self.target, "link opened");
        Ok(StreamConnection::new(link))
    }
}
