//! Network subsystem for the outbound datagram transport

pub mod destination;
pub mod udp;

pub use destination::{Destination, SharedDestination};
pub use udp::{create_socket, send_datagram, SendOutcome};
