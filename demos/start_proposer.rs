//! A script used to start one proposer, which will infinitely listen to incoming messages (either
//! from clients or acceptors).
//!
//! You can run this example as follows
//!     RUST_LOG=multi_paxos=info cargo run --example start_proposer -- <proposer_uid> network.conf <num_acceptors> <num_proposers>
//! where <proposer_uid> is a non-negative number which should be unique (among all proposers); only
//! proposer 0 is the static leader (spec.md §4.3, §9).

use std::env;

use log::info;

use multi_paxos::configurations::load_config;
use multi_paxos::multi_paxos::{Proposer, Runnable};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    info!("{:?}", args);

    match args.len() {
        5 => {
            let uid: usize = match args[1].parse() {
                Ok(n) => n,
                Err(_) => {
                    eprintln!("Error: second argument not a usize");
                    return;
                }
            };

            let num_acceptors: usize = match args[3].parse() {
                Ok(n) => n,
                Err(_) => {
                    eprintln!("Error: fourth argument not a usize");
                    return;
                }
            };

            let num_proposers: usize = match args[4].parse() {
                Ok(n) => n,
                Err(_) => {
                    eprintln!("Error: fifth argument not a usize");
                    return;
                }
            };

            let config = match load_config(&args[2], num_acceptors, num_proposers) {
                Ok(config) => config,
                Err(err) => {
                    eprintln!("{}", err);
                    return;
                }
            };

            let mut proposer: Proposer<String> = match Proposer::new(uid, &config) {
                Ok(proposer) => proposer,
                Err(err) => {
                    eprintln!("{}", err);
                    return;
                }
            };

            if let Err(err) = proposer.run() {
                eprintln!("{}", err);
            }
        }
        _ => {
            panic!(
                "Expected 4 arguments (excluding file name): <proposer_uid> <config_path> <num_acceptors> <num_proposers>"
            );
        }
    }
}
