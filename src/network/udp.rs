//! Connectionless datagram socket for the outbound stream

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use crate::error::NetworkError;
use crate::network::destination::Destination;

/// Open an IPv4 UDP socket bound to an ephemeral local port.
pub fn create_socket() -> Result<Socket, NetworkError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| NetworkError::SocketCreate(e.to_string()))?;

    let local = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));
    socket
        .bind(&SockAddr::from(local))
        .map_err(|e| NetworkError::SocketCreate(e.to_string()))?;

    Ok(socket)
}

/// What happened to a datagram handed to [`send_datagram`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent(usize),
    /// No destination address configured; nothing was sent
    NoDestination,
}

/// Send one datagram to `destination`.
///
/// A short count is reported as an error; the caller decides whether to drop.
pub fn send_datagram(
    socket: &Socket,
    datagram: &[u8],
    destination: Destination,
) -> Result<SendOutcome, NetworkError> {
    let Some(addr) = destination.socket_addr() else {
        return Ok(SendOutcome::NoDestination);
    };

    let sent = socket
        .send_to(datagram, &SockAddr::from(SocketAddr::V4(addr)))
        .map_err(|e| NetworkError::SendFailed(e.to_string()))?;

    if sent != datagram.len() {
        return Err(NetworkError::ShortSend {
            sent,
            expected: datagram.len(),
        });
    }

    Ok(SendOutcome::Sent(sent))
}
