//! A module which contains the definition of a struct which can be used to send or receive messages
//! using a UDP socket joined to a multicast group.

use std::fmt::Debug;
use std::marker::PhantomData;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use socket2::{Domain, Socket, Type};

use crate::error::TransportError;
use crate::message::Message;

/// Datagrams larger than this are never produced by this crate, but a misbehaving peer's datagram
/// exceeding it is simply dropped by the OS before `recv_from` returns, per the frame budget the
/// specification allows implementations to pick (at least 1024 bytes).
const MAX_DATAGRAM_BYTES: usize = 65536;

/// A struct which can be used to send to or receive from a UDP socket bound to a role's multicast
/// group. Sends go out a second, unbound socket, mirroring the fact that sends are effectively
/// non-blocking for UDP while the receive loop blocks.
pub struct NetNode<T> {
    udp_socket_sender: UdpSocket,

    udp_socket_receiver: UdpSocket,

    // Dummy data associated with the type of the value a client proposes.
    value: PhantomData<T>,
}

impl<T> NetNode<T>
where
    T: Serialize + DeserializeOwned + Clone + Debug,
{
    pub fn new(multicast_address_v4: &SocketAddrV4) -> Result<Self, TransportError> {
        let udp_socket_sender =
            UdpSocket::bind("0.0.0.0:0").map_err(|source| TransportError::Bind {
                address: *multicast_address_v4,
                source,
            })?;

        udp_socket_sender
            .set_multicast_loop_v4(true)
            .map_err(|source| TransportError::Bind {
                address: *multicast_address_v4,
                source,
            })?;

        // Multiple agents of the same role bind to the same (ip, port), so SO_REUSEADDR is
        // required; std's UdpSocket has no portable way to set it before bind, hence socket2.
        let receiver = Socket::new(Domain::IPV4, Type::DGRAM, None).map_err(|source| {
            TransportError::Bind {
                address: *multicast_address_v4,
                source,
            }
        })?;
        receiver
            .set_reuse_address(true)
            .map_err(|source| TransportError::Bind {
                address: *multicast_address_v4,
                source,
            })?;
        receiver
            .bind(&SocketAddr::V4(*multicast_address_v4).into())
            .map_err(|source| TransportError::Bind {
                address: *multicast_address_v4,
                source,
            })?;

        let udp_socket_receiver: UdpSocket = receiver.into();

        udp_socket_receiver
            .join_multicast_v4(multicast_address_v4.ip(), &Ipv4Addr::UNSPECIFIED)
            .map_err(|source| TransportError::JoinMulticast {
                group: *multicast_address_v4,
                source,
            })?;

        Ok(NetNode {
            udp_socket_sender,
            udp_socket_receiver,
            value: PhantomData,
        })
    }

    /// Sends the message `m` to `destination_address`.
    pub fn send(&self, m: &Message<T>, destination_address: &SocketAddrV4) -> Result<(), TransportError> {
        let encoded = serde_json::to_vec(m).expect("a Message always serializes to JSON");

        self.udp_socket_sender
            .send_to(&encoded[..], destination_address)
            .map_err(|source| TransportError::Send {
                destination: *destination_address,
                source,
            })?;

        Ok(())
    }

    /// Blocks until a datagram arrives on the receiver socket, then decodes it as a `Message<T>`.
    ///
    /// A datagram that fails to decode (malformed bytes, or a phase whose payload does not match
    /// this instantiation's `T`) is logged and dropped: `Ok(None)` is returned so the caller's
    /// receive loop simply continues, rather than treating every bad datagram as a fatal error.
    pub fn receive(&self) -> Result<Option<Message<T>>, TransportError> {
        let mut buf = vec![0u8; MAX_DATAGRAM_BYTES];

        let (num_bytes, _src_addr) = self
            .udp_socket_receiver
            .recv_from(&mut buf)
            .map_err(TransportError::Receive)?;

        match serde_json::from_slice(&buf[..num_bytes]) {
            Ok(message) => Ok(Some(message)),
            Err(err) => {
                warn!("dropping malformed datagram ({} bytes): {}", num_bytes, err);
                Ok(None)
            }
        }
    }
}
