//! The launcher binary: `paxos-agent <config_path> <role> <process_id>` starts a single agent of
//! one role against the multicast groups named in the config file.
//!
//! Run e.g.
//!     RUST_LOG=multi_paxos=info paxos-agent network.conf acceptor 0
//!     RUST_LOG=multi_paxos=info paxos-agent network.conf client 0 hello world
//! where the trailing arguments to a client are sent non-interactively, one per REQUEST; with none
//! given, the client reads one value per line from stdin until EOF instead.

use std::io::{self, BufRead};
use std::process;

use clap::{Parser, ValueEnum};
use log::error;

use multi_paxos::configurations::load_config;
use multi_paxos::multi_paxos::{Acceptor, Client, Learner, Proposer, Runnable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Role {
    Client,
    Proposer,
    Acceptor,
    Learner,
}

#[derive(Debug, Parser)]
#[command(name = "paxos-agent", about = "Start one Multi-Paxos agent")]
struct Cli {
    /// Path to the plain-text network configuration file (§6).
    config_path: String,

    /// Which role this process plays.
    role: Role,

    /// Identifier for this process, unique within its role.
    process_id: usize,

    /// Values to propose non-interactively (client role only); with none given, the client reads
    /// one value per line from stdin until EOF.
    values: Vec<String>,

    /// Number of acceptor processes in the ensemble (used to compute the quorum size).
    #[arg(long, default_value_t = 3)]
    num_acceptors: usize,

    /// Number of proposer processes in the ensemble (used to stride round numbers, §9).
    #[arg(long, default_value_t = 1)]
    num_proposers: usize,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        error!("{}", err);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&cli.config_path, cli.num_acceptors, cli.num_proposers)?;

    match cli.role {
        Role::Client => {
            let client = Client::new(
                cli.process_id,
                config.clients.address,
                config.proposers.address,
            )?;

            if cli.values.is_empty() {
                let stdin = io::stdin();
                for line in stdin.lock().lines() {
                    let line = line?;
                    if line.is_empty() {
                        continue;
                    }
                    client.request(line)?;
                }
            } else {
                for value in cli.values {
                    client.request(value)?;
                }
            }

            Ok(())
        }
        Role::Proposer => {
            let mut proposer: Proposer<String> = Proposer::new(cli.process_id, &config)?;
            proposer.run()?;
            Ok(())
        }
        Role::Acceptor => {
            let mut acceptor: Acceptor<String> = Acceptor::new(cli.process_id, &config)?;
            acceptor.run()?;
            Ok(())
        }
        Role::Learner => {
            let mut learner: Learner<String> = Learner::new(cli.process_id, &config)?;
            learner.run()?;
            Ok(())
        }
    }
}
