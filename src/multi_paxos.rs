//! The module that contains the structs representing clients, proposers, acceptors and learners of
//! the Multi-Paxos algorithm, and the state machine logic that drives the PHASE_1A/1B/2A/2B/DECISION
//! handshake.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::net::SocketAddrV4;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use log::{info, trace, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::configurations::NetworkConfig;
use crate::error::TransportError;
use crate::message::{Acceptance, Decision, Message, Preparation, Promise, Proposal, Request};
use crate::net_node::NetNode;

/// Identifies an acceptor for the purpose of quorum deduplication. A process's `process_id`
/// (unique within its role, per the launcher CLI) is used directly rather than minting a fresh
/// UUID per run, since the launcher already guarantees that uniqueness.
pub type AcceptorId = usize;

/// Identifies a proposer. `ProposerId == 0` is the static leader (§4.3, §9).
pub type ProposerId = usize;

/// Implement this trait if you are a process which needs to run in an infinite loop, while
/// receiving and sending messages.
pub trait Runnable {
    fn run(&mut self) -> Result<(), TransportError>;
}

// ---------------------------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------------------------

/// The struct representing the client in the Paxos algorithm.
pub struct Client<T> {
    id: usize,

    // Process-local, monotonically increasing. Shared with the background listener thread so that
    // peer clients' broadcasts can advance it (§4.5's best-effort distributed counter).
    next_instance: Arc<AtomicU64>,

    node: Arc<NetNode<T>>,

    proposers_address: SocketAddrV4,

    clients_address: SocketAddrV4,
}

impl<T> Client<T>
where
    T: Serialize + DeserializeOwned + Clone + Debug + PartialEq + Send + Sync + 'static,
{
    pub fn new(
        id: usize,
        clients_address: SocketAddrV4,
        proposers_address: SocketAddrV4,
    ) -> Result<Self, TransportError> {
        let node = Arc::new(NetNode::new(&clients_address)?);
        let next_instance = Arc::new(AtomicU64::new(0));

        spawn_instance_sync_listener(id, Arc::clone(&node), Arc::clone(&next_instance));

        Ok(Client {
            id,
            next_instance,
            node,
            proposers_address,
            clients_address,
        })
    }

    /// Assigns the next instance number to `value`, sends a REQUEST to the proposer group, and
    /// re-broadcasts the same REQUEST to the client group so peers can advance their own counter.
    /// This re-broadcast is best-effort: a dropped datagram just means a peer may later reuse an
    /// instance number a concurrently running client already claimed (§4.5, §9 known limitation;
    /// the `receive_msg` logic that `original_source/core/utils.py`'s `Client` leaves commented
    /// out is implemented here instead, but the race it cannot close is unchanged).
    pub fn request(&self, value: T) -> Result<u64, TransportError> {
        let instance = self.next_instance.fetch_add(1, Ordering::SeqCst);

        let m = Message::Request(Request { value, instance });

        info!("[C={}] requesting instance {}: {:?}", self.id, instance, m);

        self.node.send(&m, &self.proposers_address)?;
        self.node.send(&m, &self.clients_address)?;

        Ok(instance)
    }
}

/// Listens on the client multicast group for REQUEST broadcasts from peer clients and advances
/// `next_instance` past any instance it observes, so concurrently running clients converge on
/// disjoint instance numbers on a best-effort basis.
fn spawn_instance_sync_listener<T>(id: usize, node: Arc<NetNode<T>>, next_instance: Arc<AtomicU64>)
where
    T: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static,
{
    thread::spawn(move || loop {
        match node.receive() {
            Ok(Some(Message::Request(request))) => {
                next_instance.fetch_max(request.instance + 1, Ordering::SeqCst);
            }
            Ok(Some(_)) => {
                // Clients only ever see REQUEST broadcasts on their own group; anything else
                // would be a misconfiguration. Drop it silently (§7, class 4).
            }
            Ok(None) => {}
            Err(err) => {
                warn!("[C={}] instance-sync listener stopped: {}", id, err);
                break;
            }
        }
    });
}

// ---------------------------------------------------------------------------------------------
// Proposer
// ---------------------------------------------------------------------------------------------

/// In the Multi-Paxos algorithm, a proposer can participate in several instances of the basic
/// Paxos algorithm at the same time. This struct contains the state of a single proposer which is
/// associated with one instance.
struct ProposerState<T> {
    /// The value the client asked this proposer to get decided.
    value: Option<T>,

    /// The round index this proposer has reached for this instance. `c_rnd` is derived from it as
    /// `round_index * num_proposers + proposer_id`, so that rounds are disjoint across proposers
    /// (§9) without ever handing out `c_rnd == 0`, which is reserved for "no round yet" in
    /// acceptor state.
    round_index: u64,

    /// The round currently in flight for this instance (0 until the first `prepare`).
    c_rnd: u64,

    /// The value proposed in round `c_rnd`: the client's value, or one carried over from a
    /// quorum reply (§3's invariant on `c_val`).
    c_val: Option<T>,

    /// Acceptors whose PHASE_1B reply for the current round has been counted.
    promises: HashSet<AcceptorId>,

    /// The highest `v_rnd` seen across the current round's PHASE_1B replies, and the value
    /// that came with it. Tracked across the whole quorum, not just the most recent reply,
    /// fixing the source bug noted in spec.md §9.
    best_v_rnd: u64,
    best_v_val: Option<T>,

    /// Whether PHASE_2A has already been sent for the current round (prevents a late, redundant
    /// PHASE_1B reply after the quorum has formed from triggering a second PHASE_2A; spec.md §8
    /// scenario 3).
    phase_2a_sent: bool,

    /// Acceptors whose PHASE_2B reply for the current round has been counted.
    accepted: HashSet<AcceptorId>,

    /// Whether DECISION has already been sent for this instance (spec.md §8 scenario 6: a late,
    /// stale PHASE_2B must not trigger a second DECISION).
    decided: bool,
}

impl<T> Default for ProposerState<T> {
    fn default() -> Self {
        ProposerState {
            value: None,
            round_index: 0,
            c_rnd: 0,
            c_val: None,
            promises: HashSet::new(),
            best_v_rnd: 0,
            best_v_val: None,
            phase_2a_sent: false,
            accepted: HashSet::new(),
            decided: false,
        }
    }
}

/// The struct representing the proposer in the Paxos algorithm.
pub struct Proposer<T> {
    id: ProposerId,

    num_proposers: u64,

    proposer_states: HashMap<u64, ProposerState<T>>,

    majority_of_acceptors: usize,

    node: NetNode<T>,

    proposers_address: SocketAddrV4,

    acceptors_address: SocketAddrV4,

    learners_address: SocketAddrV4,
}

impl<T> Proposer<T>
where
    T: Serialize + DeserializeOwned + Clone + Debug + PartialEq,
{
    pub fn new(id: ProposerId, config: &NetworkConfig) -> Result<Self, TransportError> {
        let node = NetNode::new(&config.proposers.address)?;

        Ok(Proposer {
            id,
            num_proposers: config.num_proposers.max(1) as u64,
            proposer_states: HashMap::new(),
            majority_of_acceptors: majority(config.num_acceptors),
            node,
            proposers_address: config.proposers.address,
            acceptors_address: config.acceptors.address,
            learners_address: config.learners.address,
        })
    }

    /// Only `id == 0` drives rounds; every other proposer is a silent follower (§4.3, §9).
    fn is_leader(&self) -> bool {
        self.id == 0
    }

    // Handlers

    fn handle_request(&mut self, request: Request<T>) -> Result<(), TransportError> {
        if !self.is_leader() {
            trace!("[P={}] not the leader, ignoring {:?}", self.id, request);
            return Ok(());
        }

        info!("[P={}] handling {:?}", self.id, request);
        self.prepare(request.instance, request.value)
    }

    fn handle_promise(&mut self, promise: Promise<T>) -> Result<(), TransportError> {
        if !self.is_leader() {
            return Ok(());
        }

        self.propose(promise)
    }

    fn handle_acceptance(&mut self, acceptance: Acceptance<T>) -> Result<(), TransportError> {
        if !self.is_leader() {
            return Ok(());
        }

        self.decide(acceptance)
    }

    // State transitions / senders

    /// Starts a fresh round for `instance`, carrying `value` as the client's requested value, and
    /// sends PHASE_1A to the acceptors.
    fn prepare(&mut self, instance: u64, value: T) -> Result<(), TransportError> {
        let state = self.proposer_states.entry(instance).or_default();

        state.value = Some(value);
        state.round_index += 1;
        state.c_rnd = state.round_index * self.num_proposers + self.id as u64;
        state.c_val = None;
        state.promises.clear();
        state.best_v_rnd = 0;
        state.best_v_val = None;
        state.phase_2a_sent = false;
        state.accepted.clear();
        state.decided = false;

        let m = Message::Phase1A(Preparation {
            c_rnd: state.c_rnd,
            instance,
        });

        info!("[P={}] sending {:?}", self.id, m);
        self.node.send(&m, &self.acceptors_address)
    }

    /// Folds one PHASE_1B reply into the quorum for its round, and sends PHASE_2A once a majority
    /// of distinct acceptors have promised the current round (spec.md §4.3, §8 quorum minimality
    /// and carry-over properties).
    fn propose(&mut self, promise: Promise<T>) -> Result<(), TransportError> {
        let instance = promise.instance;
        let state = self.proposer_states.entry(instance).or_default();

        if promise.rnd != state.c_rnd {
            trace!(
                "[P={}] ignoring stale {:?} for c_rnd {}",
                self.id,
                promise,
                state.c_rnd
            );
            return Ok(());
        }

        if !state.promises.insert(promise.acceptor_id) {
            // Already counted this acceptor's vote for this round.
            return Ok(());
        }

        if promise.v_rnd > state.best_v_rnd {
            state.best_v_rnd = promise.v_rnd;
            state.best_v_val = promise.v_val;
        }

        if state.promises.len() < self.majority_of_acceptors || state.phase_2a_sent {
            return Ok(());
        }

        state.phase_2a_sent = true;

        let c_val = if state.best_v_rnd == 0 {
            state
                .value
                .clone()
                .expect("a proposer always has a value on record before it reaches quorum")
        } else {
            state
                .best_v_val
                .clone()
                .expect("best_v_rnd > 0 implies a carried-over value was recorded")
        };
        state.c_val = Some(c_val.clone());

        let m = Message::Phase2A(Proposal {
            c_rnd: state.c_rnd,
            c_val,
            instance,
        });

        info!(
            "[P={}] majority of promises reached, sending {:?}",
            self.id, m
        );
        self.node.send(&m, &self.acceptors_address)
    }

    /// Folds one PHASE_2B reply into the quorum for its round, and sends DECISION once a majority
    /// of distinct acceptors have accepted the current round's value.
    fn decide(&mut self, acceptance: Acceptance<T>) -> Result<(), TransportError> {
        let instance = acceptance.instance;
        let state = self.proposer_states.entry(instance).or_default();

        if acceptance.v_rnd != state.c_rnd {
            trace!(
                "[P={}] ignoring stale {:?} for c_rnd {}",
                self.id,
                acceptance,
                state.c_rnd
            );
            return Ok(());
        }

        if !state.accepted.insert(acceptance.acceptor_id) {
            return Ok(());
        }

        if state.accepted.len() < self.majority_of_acceptors || state.decided {
            return Ok(());
        }

        state.decided = true;

        let v_val = acceptance
            .v_val
            .expect("an acceptance whose v_rnd matches our c_rnd always carries a value");

        let m = Message::Decision(Decision { v_val, instance });

        info!(
            "[P={}] majority of acceptances reached, sending {:?}",
            self.id, m
        );
        self.node.send(&m, &self.learners_address)
    }
}

impl<T> Runnable for Proposer<T>
where
    T: Serialize + DeserializeOwned + Clone + Debug + PartialEq,
{
    fn run(&mut self) -> Result<(), TransportError> {
        loop {
            trace!("[P={}] waiting...", self.id);

            match self.node.receive()? {
                Some(Message::Request(request)) => self.handle_request(request)?,
                Some(Message::Phase1B(promise)) => self.handle_promise(promise)?,
                Some(Message::Phase2B(acceptance)) => self.handle_acceptance(acceptance)?,
                Some(other) => trace!("[P={}] ignoring unexpected {:?}", self.id, other),
                None => {}
            }
        }
    }
}

// ---------------------------------------------------------------------------------------------
// Acceptor
// ---------------------------------------------------------------------------------------------

/// The per-instance state of a single acceptor. Invariant: `v_rnd <= rnd` always holds (spec.md
/// §3); see `handle_proposal` for where that invariant is preserved.
struct AcceptorState<T> {
    rnd: u64,
    v_rnd: u64,
    v_val: Option<T>,
}

impl<T> Default for AcceptorState<T> {
    fn default() -> Self {
        AcceptorState {
            rnd: 0,
            v_rnd: 0,
            v_val: None,
        }
    }
}

/// The struct representing the acceptor in the Paxos algorithm. Acceptors are stateless with
/// respect to network identity: all acceptors behave identically (spec.md §4.2).
pub struct Acceptor<T> {
    id: AcceptorId,

    acceptor_states: HashMap<u64, AcceptorState<T>>,

    node: NetNode<T>,

    proposers_address: SocketAddrV4,
}

impl<T> Acceptor<T>
where
    T: Serialize + DeserializeOwned + Clone + Debug + PartialEq,
{
    pub fn new(id: AcceptorId, config: &NetworkConfig) -> Result<Self, TransportError> {
        let node = NetNode::new(&config.acceptors.address)?;

        Ok(Acceptor {
            id,
            acceptor_states: HashMap::new(),
            node,
            proposers_address: config.proposers.address,
        })
    }

    fn handle_preparation(&mut self, preparation: Preparation) -> Result<(), TransportError> {
        let state = self
            .acceptor_states
            .entry(preparation.instance)
            .or_default();

        if preparation.c_rnd > state.rnd {
            state.rnd = preparation.c_rnd;
        }

        // Always reply, even when the promise was not granted, so a stale proposer learns the
        // current `rnd` and can tell its round was abandoned (spec.md §4.2).
        let m = Message::Phase1B(Promise {
            rnd: state.rnd,
            v_rnd: state.v_rnd,
            v_val: state.v_val.clone(),
            acceptor_id: self.id,
            instance: preparation.instance,
        });

        trace!("[A={}] replying {:?}", self.id, m);
        self.node.send(&m, &self.proposers_address)
    }

    fn handle_proposal(&mut self, proposal: Proposal<T>) -> Result<(), TransportError> {
        let state = match self.acceptor_states.entry(proposal.instance) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => e.insert(AcceptorState::default()),
        };

        if proposal.c_rnd >= state.rnd {
            // A successful accept also raises `rnd`, even when this acceptor never saw the
            // matching PHASE_1A: otherwise `v_rnd` could exceed `rnd`, breaking the invariant in
            // spec.md §3.
            state.rnd = state.rnd.max(proposal.c_rnd);
            state.v_rnd = proposal.c_rnd;
            state.v_val = Some(proposal.c_val);
        }

        let m = Message::Phase2B(Acceptance {
            v_rnd: state.v_rnd,
            v_val: state.v_val.clone(),
            acceptor_id: self.id,
            instance: proposal.instance,
        });

        trace!("[A={}] replying {:?}", self.id, m);
        self.node.send(&m, &self.proposers_address)
    }
}

impl<T> Runnable for Acceptor<T>
where
    T: Serialize + DeserializeOwned + Clone + Debug + PartialEq,
{
    fn run(&mut self) -> Result<(), TransportError> {
        loop {
            trace!("[A={}] waiting...", self.id);

            match self.node.receive()? {
                Some(Message::Phase1A(preparation)) => self.handle_preparation(preparation)?,
                Some(Message::Phase2A(proposal)) => self.handle_proposal(proposal)?,
                Some(other) => trace!("[A={}] ignoring unexpected {:?}", self.id, other),
                None => {}
            }
        }
    }
}

// ---------------------------------------------------------------------------------------------
// Learner
// ---------------------------------------------------------------------------------------------

/// The struct representing the learner in the Paxos algorithm.
pub struct Learner<T> {
    id: usize,

    // A map between instance numbers and the learned value during that instance.
    learned_values: HashMap<u64, T>,

    // The next instance number not yet printed, used to emit decisions in total order even
    // though they can arrive out of order (spec.md §4.4).
    next_to_emit: u64,

    node: NetNode<T>,
}

impl<T> Learner<T>
where
    T: Serialize + DeserializeOwned + Clone + Debug + PartialEq,
{
    pub fn new(id: usize, config: &NetworkConfig) -> Result<Self, TransportError> {
        let node = NetNode::new(&config.learners.address)?;

        Ok(Learner {
            id,
            learned_values: HashMap::new(),
            next_to_emit: 0,
            node,
        })
    }

    /// The decided value for `instance`, if this learner has recorded one. Exposed so embedders
    /// (and tests) can inspect the decided sequence without scraping stdout.
    pub fn decided_value(&self, instance: u64) -> Option<&T> {
        self.learned_values.get(&instance)
    }

    fn print_learned_values(&mut self) {
        while let Some(value) = self.learned_values.get(&self.next_to_emit) {
            println!("{:?}", value);
            self.next_to_emit += 1;
        }
    }

    fn handle_decision(&mut self, decision: Decision<T>) {
        info!("[L={}] received {:?}", self.id, decision);

        match self.learned_values.entry(decision.instance) {
            Entry::Occupied(e) => {
                assert_eq!(
                    e.get(),
                    &decision.v_val,
                    "safety violation: instance {} previously decided {:?}, now {:?}",
                    decision.instance,
                    e.get(),
                    decision.v_val
                );
            }
            Entry::Vacant(e) => {
                e.insert(decision.v_val);
            }
        }

        self.print_learned_values();
    }
}

impl<T> Runnable for Learner<T>
where
    T: Serialize + DeserializeOwned + Clone + Debug + PartialEq,
{
    fn run(&mut self) -> Result<(), TransportError> {
        loop {
            trace!("[L={}] waiting...", self.id);

            match self.node.receive()? {
                Some(Message::Decision(decision)) => self.handle_decision(decision),
                Some(other) => trace!("[L={}] ignoring unexpected {:?}", self.id, other),
                None => {}
            }
        }
    }
}

/// The majority threshold `⌈(A+1)/2⌉`, computed as integer division to avoid float rounding.
pub fn majority(num_acceptors: usize) -> usize {
    num_acceptors / 2 + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configurations::{NetworkConfig, RoleConfig};
    use socket2::{Domain, Socket, Type};
    use std::net::{Ipv4Addr, SocketAddr};
    use std::sync::atomic::AtomicU16;
    use std::time::{Duration, Instant};

    // Every loopback NetNode in these tests binds to a real (but harmless) multicast group;
    // a distinct port per test keeps parallel `cargo test` runs from treading on each other.
    static NEXT_TEST_PORT: AtomicU16 = AtomicU16::new(30000);

    fn next_test_address() -> SocketAddrV4 {
        let port = NEXT_TEST_PORT.fetch_add(1, Ordering::Relaxed);
        SocketAddrV4::new(Ipv4Addr::new(239, 255, 0, 1), port)
    }

    fn test_network_config(num_acceptors: usize, num_proposers: usize) -> NetworkConfig {
        NetworkConfig {
            clients: RoleConfig {
                address: next_test_address(),
            },
            proposers: RoleConfig {
                address: next_test_address(),
            },
            acceptors: RoleConfig {
                address: next_test_address(),
            },
            learners: RoleConfig {
                address: next_test_address(),
            },
            num_acceptors,
            num_proposers,
        }
    }

    fn test_proposer(id: ProposerId, num_acceptors: usize, num_proposers: usize) -> Proposer<String> {
        let config = test_network_config(num_acceptors, num_proposers);
        Proposer::new(id, &config).expect("loopback proposer socket should bind")
    }

    fn test_learner(id: usize) -> Learner<String> {
        let config = test_network_config(3, 1);
        Learner::new(id, &config).expect("loopback learner socket should bind")
    }

    fn test_acceptor(id: AcceptorId, config: &NetworkConfig) -> Acceptor<String> {
        Acceptor::new(id, config).expect("loopback acceptor socket should bind")
    }

    /// A bare `NetNode` bound to a role's multicast group, used in tests to observe what a real
    /// handler actually sent, the way a peer on that group would.
    fn tap(address: SocketAddrV4) -> NetNode<String> {
        NetNode::new(&address).expect("loopback tap socket should bind")
    }

    fn promise(
        rnd: u64,
        v_rnd: u64,
        v_val: Option<&str>,
        acceptor_id: AcceptorId,
        instance: u64,
    ) -> Promise<String> {
        Promise {
            rnd,
            v_rnd,
            v_val: v_val.map(String::from),
            acceptor_id,
            instance,
        }
    }

    fn acceptance(
        v_rnd: u64,
        v_val: Option<&str>,
        acceptor_id: AcceptorId,
        instance: u64,
    ) -> Acceptance<String> {
        Acceptance {
            v_rnd,
            v_val: v_val.map(String::from),
            acceptor_id,
            instance,
        }
    }

    #[test]
    fn majority_is_computed_for_odd_and_even_ensembles() {
        assert_eq!(majority(3), 2);
        assert_eq!(majority(5), 3);
        assert_eq!(majority(1), 1);
        assert_eq!(majority(4), 3);
    }

    #[test]
    fn acceptor_promises_a_higher_round_and_leaves_rnd_for_a_lower_one() {
        let config = test_network_config(3, 1);
        let mut acceptor = test_acceptor(0, &config);
        let proposers_tap = tap(config.proposers.address);

        acceptor
            .handle_preparation(Preparation {
                c_rnd: 5,
                instance: 0,
            })
            .unwrap();
        let reply = match proposers_tap.receive().unwrap() {
            Some(Message::Phase1B(promise)) => promise,
            other => panic!("expected a Phase1B reply, got {:?}", other),
        };
        assert_eq!(reply.rnd, 5);

        acceptor
            .handle_preparation(Preparation {
                c_rnd: 3,
                instance: 0,
            })
            .unwrap();
        let reply = match proposers_tap.receive().unwrap() {
            Some(Message::Phase1B(promise)) => promise,
            other => panic!("expected a Phase1B reply, got {:?}", other),
        };
        assert_eq!(reply.rnd, 5, "rnd must be non-decreasing");
    }

    #[test]
    fn acceptor_accept_preserves_v_rnd_le_rnd_invariant_even_without_prior_1a() {
        let config = test_network_config(3, 1);
        let mut acceptor = test_acceptor(0, &config);
        let proposers_tap = tap(config.proposers.address);

        // No Phase1A was ever handled for this instance, so rnd starts at 0; the accept must
        // still raise it to c_rnd so that v_rnd <= rnd keeps holding.
        acceptor
            .handle_proposal(Proposal {
                c_rnd: 7,
                c_val: "X".to_string(),
                instance: 0,
            })
            .unwrap();

        let reply = match proposers_tap.receive().unwrap() {
            Some(Message::Phase2B(acceptance)) => acceptance,
            other => panic!("expected a Phase2B reply, got {:?}", other),
        };
        assert_eq!(reply.v_rnd, 7);
        assert_eq!(reply.v_val.as_deref(), Some("X"));
        assert!(acceptor.acceptor_states[&0].v_rnd <= acceptor.acceptor_states[&0].rnd);
    }

    #[test]
    fn proposer_waits_for_majority_before_proposing() {
        let mut proposer = test_proposer(0, 3, 1);
        proposer.prepare(0, "X".to_string()).unwrap();
        let c_rnd = proposer.proposer_states[&0].c_rnd;

        proposer.propose(promise(c_rnd, 0, None, 1, 0)).unwrap();
        assert!(!proposer.proposer_states[&0].phase_2a_sent);

        proposer.propose(promise(c_rnd, 0, None, 2, 0)).unwrap();
        assert!(proposer.proposer_states[&0].phase_2a_sent);
        assert_eq!(proposer.proposer_states[&0].c_val.as_deref(), Some("X"));
    }

    #[test]
    fn proposer_deduplicates_repeated_promises_from_the_same_acceptor() {
        let mut proposer = test_proposer(0, 3, 1);
        proposer.prepare(0, "X".to_string()).unwrap();
        let c_rnd = proposer.proposer_states[&0].c_rnd;

        proposer.propose(promise(c_rnd, 0, None, 1, 0)).unwrap();
        proposer.propose(promise(c_rnd, 0, None, 1, 0)).unwrap();

        assert_eq!(proposer.proposer_states[&0].promises.len(), 1);
        assert!(!proposer.proposer_states[&0].phase_2a_sent);
    }

    #[test]
    fn proposer_carries_over_the_value_with_the_highest_v_rnd_in_the_quorum() {
        let mut proposer = test_proposer(0, 3, 1);
        proposer.prepare(0, "X".to_string()).unwrap();
        let c_rnd = proposer.proposer_states[&0].c_rnd;

        proposer
            .propose(promise(c_rnd, 2, Some("stale"), 1, 0))
            .unwrap();
        proposer
            .propose(promise(c_rnd, 5, Some("carried"), 2, 0))
            .unwrap();

        assert_eq!(
            proposer.proposer_states[&0].c_val.as_deref(),
            Some("carried")
        );
    }

    #[test]
    fn proposer_ignores_a_promise_from_an_abandoned_round() {
        let mut proposer = test_proposer(0, 3, 1);
        proposer.prepare(0, "X".to_string()).unwrap();
        let stale_rnd = proposer.proposer_states[&0].c_rnd;

        proposer.prepare(0, "X".to_string()).unwrap();

        proposer
            .propose(promise(stale_rnd, 0, None, 1, 0))
            .unwrap();
        assert!(proposer.proposer_states[&0].promises.is_empty());
    }

    #[test]
    fn proposer_sends_phase_2a_only_once_per_round() {
        let mut proposer = test_proposer(0, 3, 1);
        proposer.prepare(0, "X".to_string()).unwrap();
        let c_rnd = proposer.proposer_states[&0].c_rnd;

        proposer.propose(promise(c_rnd, 0, None, 1, 0)).unwrap();
        proposer.propose(promise(c_rnd, 0, None, 2, 0)).unwrap();
        assert!(proposer.proposer_states[&0].phase_2a_sent);

        proposer.propose(promise(c_rnd, 0, None, 3, 0)).unwrap();
        assert_eq!(proposer.proposer_states[&0].promises.len(), 3);
    }

    #[test]
    fn proposer_decides_once_a_majority_of_acceptances_agree_and_not_twice() {
        let mut proposer = test_proposer(0, 3, 1);
        proposer.prepare(0, "X".to_string()).unwrap();
        let c_rnd = proposer.proposer_states[&0].c_rnd;
        proposer.proposer_states.get_mut(&0).unwrap().c_val = Some("X".to_string());

        proposer
            .decide(acceptance(c_rnd, Some("X"), 1, 0))
            .unwrap();
        assert!(!proposer.proposer_states[&0].decided);

        proposer
            .decide(acceptance(c_rnd, Some("X"), 2, 0))
            .unwrap();
        assert!(proposer.proposer_states[&0].decided);

        proposer.decide(acceptance(0, Some("old"), 3, 0)).unwrap();
        assert_eq!(proposer.proposer_states[&0].accepted.len(), 2);
    }

    #[test]
    fn follower_proposer_ignores_requests() {
        let mut proposer = test_proposer(1, 3, 1);
        proposer
            .handle_request(Request {
                value: "X".to_string(),
                instance: 0,
            })
            .unwrap();
        assert!(proposer.proposer_states.is_empty());
    }

    #[test]
    fn learner_accepts_duplicate_decisions_idempotently() {
        let mut learner = test_learner(0);
        learner.handle_decision(Decision {
            v_val: "X".to_string(),
            instance: 0,
        });
        learner.handle_decision(Decision {
            v_val: "X".to_string(),
            instance: 0,
        });
        assert_eq!(learner.decided_value(0), Some(&"X".to_string()));
    }

    #[test]
    #[should_panic(expected = "safety violation")]
    fn learner_panics_on_diverging_decisions_for_the_same_instance() {
        let mut learner = test_learner(0);
        learner.handle_decision(Decision {
            v_val: "X".to_string(),
            instance: 0,
        });
        learner.handle_decision(Decision {
            v_val: "Y".to_string(),
            instance: 0,
        });
    }

    // -----------------------------------------------------------------------------------------
    // End-to-end scenarios (spec.md §8): real `Client`/`Proposer`/`Acceptor` agents, wired
    // together over real loopback multicast sockets exactly as the launcher would run them.
    // `recv_decision` independently joins the learners group, the way a real `Learner` (or any
    // other observer on that group) would, so a test can assert on the DECISION datagram a real
    // Proposer actually put on the wire without reaching into its private state.
    // -----------------------------------------------------------------------------------------

    /// Joins the given multicast group and waits up to `timeout` for a DECISION; any other
    /// message observed on the group is skipped rather than treated as a failure.
    fn recv_decision(address: SocketAddrV4, timeout: Duration) -> Option<Decision<String>> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, None).expect("create tap socket");
        socket.set_reuse_address(true).expect("set reuse address");
        socket
            .bind(&SocketAddr::V4(address).into())
            .expect("bind tap socket");

        let udp_socket: std::net::UdpSocket = socket.into();
        udp_socket
            .join_multicast_v4(address.ip(), &Ipv4Addr::UNSPECIFIED)
            .expect("join multicast group");

        let deadline = Instant::now() + timeout;
        let mut buf = vec![0u8; 65536];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            udp_socket
                .set_read_timeout(Some(remaining))
                .expect("set read timeout");

            match udp_socket.recv_from(&mut buf) {
                Ok((n, _)) => {
                    if let Ok(Message::Decision(decision)) =
                        serde_json::from_slice::<Message<String>>(&buf[..n])
                    {
                        return Some(decision);
                    }
                }
                Err(_) => return None,
            }
        }
    }

    /// Spawns a real `Proposer` and a real `Acceptor` per id on background threads, and a real
    /// `Client`, all wired to `config`. Returns the client so the test can drive requests.
    fn spawn_ensemble(config: &NetworkConfig, acceptor_ids: &[AcceptorId]) -> Client<String> {
        let proposer_config = config.clone();
        let mut proposer: Proposer<String> =
            Proposer::new(0, &proposer_config).expect("proposer socket should bind");
        thread::spawn(move || {
            let _ = proposer.run();
        });

        for &id in acceptor_ids {
            let acceptor_config = config.clone();
            let mut acceptor: Acceptor<String> =
                Acceptor::new(id, &acceptor_config).expect("acceptor socket should bind");
            thread::spawn(move || {
                let _ = acceptor.run();
            });
        }

        Client::new(0, config.clients.address, config.proposers.address)
            .expect("client socket should bind")
    }

    #[test]
    fn scenario_happy_path_reaches_decision_with_all_acceptors_responsive() {
        let config = test_network_config(3, 1);
        let client = spawn_ensemble(&config, &[0, 1, 2]);

        client.request("hello".to_string()).unwrap();

        let decision = recv_decision(config.learners.address, Duration::from_secs(5))
            .expect("a majority of 3 responsive acceptors should reach a decision");
        assert_eq!(decision.instance, 0);
        assert_eq!(decision.v_val, "hello");
    }

    #[test]
    fn scenario_reaches_decision_when_one_of_three_acceptors_is_silent() {
        let config = test_network_config(3, 1);
        // Acceptor 2 is never started: it is permanently silent, exercising that a majority of 2
        // out of 3 is still sufficient (spec.md §8).
        let client = spawn_ensemble(&config, &[0, 1]);

        client.request("partial-quorum".to_string()).unwrap();

        let decision = recv_decision(config.learners.address, Duration::from_secs(5))
            .expect("a majority of 2 out of 3 acceptors should still reach a decision");
        assert_eq!(decision.v_val, "partial-quorum");
    }

    #[test]
    fn scenario_two_sequential_instances_are_each_decided_correctly() {
        let config = test_network_config(3, 1);
        let client = spawn_ensemble(&config, &[0, 1, 2]);

        client.request("first".to_string()).unwrap();
        let first = recv_decision(config.learners.address, Duration::from_secs(5))
            .expect("first instance should be decided");
        assert_eq!(first.instance, 0);
        assert_eq!(first.v_val, "first");

        client.request("second".to_string()).unwrap();
        let second = recv_decision(config.learners.address, Duration::from_secs(5))
            .expect("second instance should be decided");
        assert_eq!(second.instance, 1);
        assert_eq!(second.v_val, "second");
    }
}
