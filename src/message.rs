//! A module which contains the definition of the messages used in the Multi-Paxos algorithm.
//!
//! Each message carries an `instance` and a phase-specific payload; the variant itself encodes the
//! phase. The acceptor identifier threaded through PHASE_1B/PHASE_2B is what lets a proposer
//! deduplicate votes by sender instead of by raw reply count.

use serde::{Deserialize, Serialize};

use crate::multi_paxos::AcceptorId;

/// All message types which nodes, in the Paxos algorithm, can exchange.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum Message<T> {
    Request(Request<T>),
    Phase1A(Preparation),
    Phase1B(Promise<T>),
    Phase2A(Proposal<T>),
    Phase2B(Acceptance<T>),
    Decision(Decision<T>),
}

/// In phase 0, a client sends a proposal to the proposer group, which starts the Paxos algorithm
/// for the given instance.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Request<T> {
    /// The value which nodes need to agree on.
    pub value: T,

    /// The instance the client assigned to this value.
    pub instance: u64,
}

/// In phase 1a, c_rnd is sent from one proposer to all acceptors.
#[derive(Serialize, Deserialize, Debug, Copy, Clone)]
pub struct Preparation {
    /// The round the proposer is trying to start.
    pub c_rnd: u64,

    pub instance: u64,
}

/// In phase 1b, rnd, v_rnd and v_val are sent from one acceptor to the proposer group.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Promise<T> {
    /// The highest round this acceptor has promised for this instance.
    pub rnd: u64,

    /// The highest round in which this acceptor has accepted a value for this instance, or 0.
    pub v_rnd: u64,

    /// The value accepted in round `v_rnd`, if any.
    pub v_val: Option<T>,

    /// Identifies the acceptor that sent this reply, so proposers can deduplicate votes.
    pub acceptor_id: AcceptorId,

    pub instance: u64,
}

/// In phase 2a, c_rnd and c_val are sent from one proposer to all acceptors.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Proposal<T> {
    pub c_rnd: u64,

    /// The value the proposer picked for round `c_rnd` — either the client's value or one carried
    /// over from a prior round's quorum.
    pub c_val: T,

    pub instance: u64,
}

/// In phase 2b, v_rnd and v_val are sent from one acceptor to the proposer group.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Acceptance<T> {
    pub v_rnd: u64,

    /// The value accepted in round `v_rnd`. `None` when this acceptor rejected the proposal (its
    /// `rnd` already exceeded `c_rnd`) and had never accepted a value for this instance before.
    pub v_val: Option<T>,

    /// Identifies the acceptor that sent this reply, so proposers can deduplicate votes.
    pub acceptor_id: AcceptorId,

    pub instance: u64,
}

/// In phase 3, a proposer sends the decided value to the learner group.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Decision<T> {
    pub v_val: T,

    pub instance: u64,
}
