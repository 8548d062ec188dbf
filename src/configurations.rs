//! A module that contains functions required to read and parse the plain-text network
//! configuration file: one record per line, `role ip port`, one record per role.

use std::fmt;
use std::fs;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::str::FromStr;

use crate::error::ConfigError;

/// The four roles a record in the config file can name.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    Clients,
    Proposers,
    Acceptors,
    Learners,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Role::Clients => "clients",
            Role::Proposers => "proposers",
            Role::Acceptors => "acceptors",
            Role::Learners => "learners",
        }
    }

    fn from_field(s: &str) -> Option<Self> {
        match s {
            "clients" => Some(Role::Clients),
            "proposers" => Some(Role::Proposers),
            "acceptors" => Some(Role::Acceptors),
            "learners" => Some(Role::Learners),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The multicast group (ip:port) a role's agents all bind to, plus the declared member count of
/// that role (used by proposers to compute a majority).
#[derive(Debug, Copy, Clone)]
pub struct RoleConfig {
    pub address: SocketAddrV4,
}

/// The parsed network configuration: one multicast group per role.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub clients: RoleConfig,
    pub proposers: RoleConfig,
    pub acceptors: RoleConfig,
    pub learners: RoleConfig,

    /// The number of acceptor processes in the ensemble, used to compute the quorum size. Since the
    /// config format carries no per-role process count (only a shared multicast address), this is
    /// supplied separately by the launcher (see `bin/paxos_agent.rs`).
    pub num_acceptors: usize,
    pub num_proposers: usize,
}

/// Reads and parses the config file at `path`. `num_acceptors` and `num_proposers` are the ensemble
/// sizes, which the text format (§6 of the specification) does not carry per-record.
pub fn load_config(
    path: &str,
    num_acceptors: usize,
    num_proposers: usize,
) -> Result<NetworkConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })?;

    let mut clients = None;
    let mut proposers = None;
    let mut acceptors = None;
    let mut learners = None;

    for (idx, raw_line) in contents.lines().enumerate() {
        let line_number = idx + 1;
        let line = raw_line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 3 {
            return Err(ConfigError::MalformedLine {
                line_number,
                line: raw_line.to_string(),
            });
        }

        let (role_field, ip_field, port_field) = (fields[0], fields[1], fields[2]);

        let role = Role::from_field(role_field).ok_or_else(|| ConfigError::UnknownRole {
            role: role_field.to_string(),
            line_number,
        })?;

        let ip = Ipv4Addr::from_str(ip_field).map_err(|_| ConfigError::InvalidAddress {
            ip: ip_field.to_string(),
            line_number,
        })?;

        let port: u16 = port_field.parse().map_err(|_| ConfigError::InvalidPort {
            port: port_field.to_string(),
            line_number,
        })?;

        let config = RoleConfig {
            address: SocketAddrV4::new(ip, port),
        };

        let slot = match role {
            Role::Clients => &mut clients,
            Role::Proposers => &mut proposers,
            Role::Acceptors => &mut acceptors,
            Role::Learners => &mut learners,
        };

        if slot.is_some() {
            return Err(ConfigError::DuplicateRole {
                role: role.as_str(),
            });
        }
        *slot = Some(config);
    }

    Ok(NetworkConfig {
        clients: clients.ok_or(ConfigError::MissingRole { role: "clients" })?,
        proposers: proposers.ok_or(ConfigError::MissingRole { role: "proposers" })?,
        acceptors: acceptors.ok_or(ConfigError::MissingRole { role: "acceptors" })?,
        learners: learners.ok_or(ConfigError::MissingRole { role: "learners" })?,
        num_acceptors,
        num_proposers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp_config(contents: &str) -> tempfile_path::TempFile {
        tempfile_path::TempFile::new(contents)
    }

    // A tiny inline temp-file helper so the test module does not need a dev-dependency just to
    // write one throwaway file per test.
    mod tempfile_path {
        use std::fs;
        use std::io::Write;
        use std::path::PathBuf;

        pub struct TempFile {
            path: PathBuf,
        }

        impl TempFile {
            pub fn new(contents: &str) -> Self {
                use std::sync::atomic::{AtomicU64, Ordering};
                static COUNTER: AtomicU64 = AtomicU64::new(0);

                let mut path = std::env::temp_dir();
                path.push(format!(
                    "multi-paxos-config-test-{}-{}",
                    std::process::id(),
                    COUNTER.fetch_add(1, Ordering::Relaxed)
                ));
                let mut f = fs::File::create(&path).expect("create temp config");
                f.write_all(contents.as_bytes()).expect("write temp config");
                TempFile { path }
            }

            pub fn path(&self) -> &str {
                self.path.to_str().unwrap()
            }
        }

        impl Drop for TempFile {
            fn drop(&mut self) {
                let _ = fs::remove_file(&self.path);
            }
        }
    }

    #[test]
    fn parses_a_well_formed_config() {
        let f = write_temp_config(
            "clients 230.0.0.1 4000\nproposers 230.0.0.2 4001\nacceptors 230.0.0.3 4002\nlearners 230.0.0.4 4003\n",
        );

        let config = load_config(f.path(), 3, 1).expect("should parse");
        assert_eq!(config.clients.address.port(), 4000);
        assert_eq!(config.proposers.address.port(), 4001);
        assert_eq!(config.acceptors.address.port(), 4002);
        assert_eq!(config.learners.address.port(), 4003);
    }

    #[test]
    fn ignores_blank_lines_and_comments() {
        let f = write_temp_config(
            "# network\n\nclients 230.0.0.1 4000\nproposers 230.0.0.2 4001\n\nacceptors 230.0.0.3 4002\nlearners 230.0.0.4 4003\n",
        );

        assert!(load_config(f.path(), 3, 1).is_ok());
    }

    #[test]
    fn rejects_unknown_role() {
        let f = write_temp_config("observers 230.0.0.1 4000\n");
        let err = load_config(f.path(), 3, 1).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownRole { .. }));
    }

    #[test]
    fn rejects_malformed_line() {
        let f = write_temp_config("clients 230.0.0.1\n");
        let err = load_config(f.path(), 3, 1).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedLine { .. }));
    }

    #[test]
    fn rejects_missing_role() {
        let f = write_temp_config("clients 230.0.0.1 4000\n");
        let err = load_config(f.path(), 3, 1).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRole { .. }));
    }

    #[test]
    fn rejects_duplicate_role() {
        let f = write_temp_config("clients 230.0.0.1 4000\nclients 230.0.0.5 4009\n");
        let err = load_config(f.path(), 3, 1).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRole { .. }));
    }
}
