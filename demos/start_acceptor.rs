//! A script used to start one acceptor, which will infinitely listen to incoming messages (from
//! proposers).
//!
//! You can run this example as follows
//!     RUST_LOG=multi_paxos=info cargo run --example start_acceptor -- <acceptor_uid> network.conf <num_acceptors>
//! where <acceptor_uid> is a non-negative number which should be unique (among all acceptors).

use std::env;

use log::info;

use multi_paxos::configurations::load_config;
use multi_paxos::multi_paxos::{Acceptor, Runnable};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    info!("{:?}", args);

    match args.len() {
        4 => {
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

            let config = match load_config(&args[2], num_acceptors, 1) {
                Ok(config) => config,
                Err(err) => {
                    eprintln!("{}", err);
                    return;
                }
            };

            let mut acceptor: Acceptor<String> = match Acceptor::new(uid, &config) {
                Ok(acceptor) => acceptor,
                Err(err) => {
                    eprintln!("{}", err);
                    return;
                }
            };

            if let Err(err) = acceptor.run() {
                eprintln!("{}", err);
            }
        }
        _ => {
            panic!("Expected 3 arguments (excluding file name): <acceptor_uid> <config_path> <num_acceptors>");
        }
    }
}
