//! A script used to start one client, which infinitely reads from the standard input or, if more
//! than two command-line arguments are passed, it uses the 3rd, 4th, etc., arguments as the
//! proposal values.
//!
//! You can run this example as follows
//!     RUST_LOG=multi_paxos=info cargo run --example start_client -- <client_uid> network.conf
//! If you want to run this client interactively (i.e. provide one proposal at a time), or
//!     RUST_LOG=multi_paxos=info cargo run --example start_client -- <client_uid> network.conf p1 p2 ...
//! where p1, p2, etc., are the proposal values.

use std::env;
use std::io;
use std::io::prelude::*;

use log::info;
use text_io::read;

use multi_paxos::configurations::load_config;
use multi_paxos::multi_paxos::Client;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    info!("{:?}", args);

    match args.len() {
        len if len >= 3 => {
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

            let client = match Client::new(uid, config.clients.address, config.proposers.address)
            {
                Ok(client) => client,
                Err(err) => {
                    eprintln!("{}", err);
                    return;
                }
            };

            if len == 3 {
                loop {
                    print!("Enter the proposal: ");
                    io::stdout().flush().expect("could not flush stdout");
                    let value: String = read!("{}\n");
                    if let Err(err) = client.request(value) {
                        eprintln!("{}", err);
                        return;
                    }
                }
            } else {
                for proposal in args.iter().skip(3) {
                    if let Err(err) = client.request(proposal.clone()) {
                        eprintln!("{}", err);
                        return;
                    }
                }
            }
        }
        _ => {
            panic!("Expected 2 arguments (excluding file name): <client_uid> <config_path> [value ...]");
        }
    }
}
