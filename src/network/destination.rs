//! Destination endpoint shared between configuration and the worker

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;

use crate::constants::DEFAULT_VBAN_PORT;

/// Where datagrams are sent.
///
/// An unspecified address (`0.0.0.0`) means no destination has been
/// configured yet; frames are still produced but not transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Destination {
    pub address: Ipv4Addr,
    pub port: u16,
}

impl Default for Destination {
    fn default() -> Self {
        Self {
            address: Ipv4Addr::UNSPECIFIED,
            port: DEFAULT_VBAN_PORT,
        }
    }
}

impl Destination {
    pub fn new(address: Ipv4Addr, port: u16) -> Self {
        Self { address, port }
    }

    /// Socket address to send to, or `None` if no address is configured
    pub fn socket_addr(&self) -> Option<SocketAddrV4> {
        if self.address.is_unspecified() {
            None
        } else {
            Some(SocketAddrV4::new(self.address, self.port))
        }
    }
}

impl From<SocketAddrV4> for Destination {
    fn from(addr: SocketAddrV4) -> Self {
        Self::new(*addr.ip(), addr.port())
    }
}

/// Destination guarded by its own lock, independent of the queue lock
pub type SharedDestination = Arc<Mutex<Destination>>;
