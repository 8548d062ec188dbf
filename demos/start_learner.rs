//! A script used to start one learner, which will infinitely listen to incoming messages.
//!
//! You can run this example as follows
//!     RUST_LOG=multi_paxos=info cargo run --example start_learner -- <learner_uid> network.conf
//! where <learner_uid> is a non-negative number which should be unique (among all learners).

use std::env;

use log::info;

use multi_paxos::configurations::load_config;
use multi_paxos::multi_paxos::{Learner, Runnable};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    info!("{:?}", args);

    match args.len() {
        3 => {
            let uid: usize = match args[1].parse() {
                Ok(n) => n,
                Err(_) => {
                    eprintln!("Error: second argument not a usize");
                    return;
                }
            };

            let config = match load_config(&args[2], 3, 1) {
                Ok(config) => config,
                Err(err) => {
                    eprintln!("{}", err);
                    return;
                }
            };

            let mut learner: Learner<String> = match Learner::new(uid, &config) {
                Ok(learner) => learner,
                Err(err) => {
                    eprintln!("{}", err);
                    return;
                }
            };

            if let Err(err) = learner.run() {
                eprintln!("{}", err);
            }
        }
        _ => {
            panic!("Expected 2 arguments (excluding file name): <learner_uid> <config_path>");
        }
    }
}
