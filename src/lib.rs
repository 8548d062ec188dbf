pub mod configurations;
pub mod error;
pub mod message;
pub mod multi_paxos;
mod net_node;
