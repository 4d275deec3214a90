//! Command-line and environment configuration for the server binary.
//!
//! Every flag falls back to an environment variable, then to a default.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};

use gaugeline_core::duration::parse_duration;
use gaugeline_core::SigningKey;
use gaugeline_storage::StorageConfig;

/// gaugeline metrics server.
#[derive(Debug, Clone, Parser)]
#[command(name = "gaugeline-server", about = "Receives and stores pushed metrics")]
pub struct ServerConfig {
    /// Listen address.
    #[arg(short, long, env = "ADDRESS", default_value = "127.0.0.1:8080")]
    pub address: String,

    /// Snapshot period; 0 persists after every write.
    #[arg(
        short = 'i',
        long,
        env = "STORE_INTERVAL",
        default_value = "300s",
        value_parser = parse_duration
    )]
    pub store_interval: Duration,

    /// Snapshot file for the file backend; empty disables it.
    #[arg(
        short = 'f',
        long,
        env = "STORE_FILE",
        default_value = "/tmp/gaugeline-metrics.json"
    )]
    pub store_file: String,

    /// Restore the snapshot at startup.
    #[arg(
        short,
        long,
        env = "RESTORE",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub restore: bool,

    /// SQLite database path; selects the SQL backend when set.
    #[arg(short, long = "database", env = "DATABASE_DSN")]
    pub database: Option<PathBuf>,

    /// Drop and recreate the metrics table at startup.
    #[arg(long, env = "DROP_TABLE", default_value_t = false, action = ArgAction::Set)]
    pub drop_table: bool,

    /// Shared HMAC secret; integrity checks are off without it.
    #[arg(short, long, env = "KEY", hide_env_values = true)]
    pub key: Option<String>,
}

impl ServerConfig {
    /// Database beats snapshot file beats memory.
    pub fn storage(&self) -> StorageConfig {
        if let Some(path) = &self.database {
            StorageConfig::Sqlite {
                path: path.clone(),
                drop_table: self.drop_table,
            }
        } else if !self.store_file.trim().is_empty() {
            StorageConfig::File {
                path: PathBuf::from(self.store_file.trim()),
            }
        } else {
            StorageConfig::Memory
        }
    }

    pub fn signing_key(&self) -> Option<SigningKey> {
        self.key.as_deref().and_then(SigningKey::new)
    }

    /// With no snapshot interval every write is persisted immediately.
    pub fn persist_on_write(&self) -> bool {
        self.store_interval.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ServerConfig {
        let mut argv = vec!["gaugeline-server"];
        argv.extend_from_slice(args);
        ServerConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&["-a", "0.0.0.0:9000", "-i", "0", "-r", "false", "-k", "secret"]);
        assert_eq!(config.address, "0.0.0.0:9000");
        assert!(config.persist_on_write());
        assert!(!config.restore);
        assert!(config.signing_key().is_some());
    }

    #[test]
    fn backend_selection_order() {
        let sql = parse(&["-d", "/tmp/m.db", "-f", "/tmp/m.json", "--drop-table", "true"]);
        assert_eq!(
            sql.storage(),
            StorageConfig::Sqlite {
                path: PathBuf::from("/tmp/m.db"),
                drop_table: true
            }
        );

        let file = parse(&["-f", "/tmp/m.json"]);
        assert_eq!(
            file.storage(),
            StorageConfig::File {
                path: PathBuf::from("/tmp/m.json")
            }
        );

        let memory = parse(&["-f", ""]);
        assert_eq!(memory.storage(), StorageConfig::Memory);
    }

    #[test]
    fn empty_key_disables_signing() {
        assert!(parse(&["-k", ""]).signing_key().is_none());
    }

    #[test]
    fn bad_interval_is_rejected() {
        assert!(ServerConfig::try_parse_from(["gaugeline-server", "-i", "soon"]).is_err());
    }
}
