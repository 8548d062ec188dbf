//! An example which simulates a full Multi-Paxos ensemble locally (on one machine), using a
//! fixed 3-acceptor/1-proposer/1-learner/1-client topology.
//!
//! Run this example as follows
//!     RUST_LOG=multi_paxos=info cargo run --example simulate -- network.conf

use std::env;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use log::info;

use multi_paxos::configurations::load_config;
use multi_paxos::multi_paxos::{Acceptor, Client, Learner, Proposer, Runnable};

const NUM_ACCEPTORS: usize = 3;
const NUM_PROPOSERS: usize = 1;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let config_path = args.get(1).map(String::as_str).unwrap_or("network.conf");

    let config = match load_config(config_path, NUM_ACCEPTORS, NUM_PROPOSERS) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            return;
        }
    };
    info!("configuration = {:?}", config);

    let mut all_threads = Vec::new();

    // Coordinates startup so requests are only sent once every socket is bound and joined to its
    // multicast group.
    let barrier = Arc::new(Barrier::new(NUM_PROPOSERS + NUM_ACCEPTORS + 1));

    for pid in 0..NUM_PROPOSERS {
        let c = Arc::clone(&barrier);
        let config = config.clone();
        all_threads.push(thread::spawn(move || {
            let mut proposer: Proposer<String> =
                Proposer::new(pid, &config).expect("proposer socket should bind");
            c.wait();
            if let Err(err) = proposer.run() {
                eprintln!("proposer {} stopped: {}", pid, err);
            }
        }));
    }

    for aid in 0..NUM_ACCEPTORS {
        let c = Arc::clone(&barrier);
        let config = config.clone();
        all_threads.push(thread::spawn(move || {
            let mut acceptor: Acceptor<String> =
                Acceptor::new(aid, &config).expect("acceptor socket should bind");
            c.wait();
            if let Err(err) = acceptor.run() {
                eprintln!("acceptor {} stopped: {}", aid, err);
            }
        }));
    }

    let learner_config = config.clone();
    let learner_thread = thread::spawn(move || {
        let mut learner: Learner<String> =
            Learner::new(0, &learner_config).expect("learner socket should bind");
        if let Err(err) = learner.run() {
            eprintln!("learner stopped: {}", err);
        }
    });

    barrier.wait();

    // Give the learner time to bind; it is not on the startup barrier since it never sends.
    thread::sleep(Duration::from_millis(200));

    let client = Client::new(0, config.clients.address, config.proposers.address)
        .expect("client socket should bind");

    for value in ["hello", "multi", "paxos"] {
        client.request(value.to_string()).expect("request should send");
    }

    info!(
        "sent 3 requests, number of long-running agent threads = {}",
        all_threads.len()
    );

    for handle in all_threads {
        handle.join().expect("agent thread panicked");
    }
    learner_thread.join().expect("learner thread panicked");
}
