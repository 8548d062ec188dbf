//! Error taxonomy for the crate: configuration and transport errors are fatal at startup and
//! propagate via `?` up to `main`; decode errors are recoverable and never leave the receive loop
//! (see `net_node::NetNode::receive`).

use std::io;
use std::net::SocketAddrV4;

/// Errors that can occur while loading and parsing the network configuration file.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not read config file {path:?}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("malformed config line {line_number}: {line:?} (expected \"role ip port\")")]
    MalformedLine { line_number: usize, line: String },

    #[error("unknown role {role:?} on line {line_number}")]
    UnknownRole { role: String, line_number: usize },

    #[error("invalid port {port:?} on line {line_number}")]
    InvalidPort { port: String, line_number: usize },

    #[error("invalid IPv4 multicast address {ip:?} on line {line_number}")]
    InvalidAddress { ip: String, line_number: usize },

    #[error("missing config record for role {role:?}")]
    MissingRole { role: &'static str },

    #[error("duplicate config record for role {role:?}")]
    DuplicateRole { role: &'static str },
}

/// Errors that can occur while setting up or using an agent's UDP transport.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("could not bind UDP socket to {address}: {source}")]
    Bind {
        address: SocketAddrV4,
        #[source]
        source: io::Error,
    },

    #[error("could not join multicast group {group}: {source}")]
    JoinMulticast {
        group: SocketAddrV4,
        #[source]
        source: io::Error,
    },

    #[error("could not send datagram to {destination}: {source}")]
    Send {
        destination: SocketAddrV4,
        #[source]
        source: io::Error,
    },

    #[error("could not receive datagram: {0}")]
    Receive(#[source] io::Error),
}
