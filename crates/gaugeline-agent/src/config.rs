//! Command-line and environment configuration for the agent binary.

use std::time::Duration;

use clap::{ArgAction, Parser};

use gaugeline_core::duration::parse_duration;
use gaugeline_core::SigningKey;

use crate::scheduler::AgentSettings;
use crate::transport::ContentType;

/// gaugeline metrics agent.
#[derive(Debug, Clone, Parser)]
#[command(name = "gaugeline-agent", about = "Samples process metrics and pushes them to a server")]
pub struct AgentConfig {
    /// Server address, with or without a scheme.
    #[arg(short, long, env = "ADDRESS", default_value = "127.0.0.1:8080")]
    pub address: String,

    /// How often to sample.
    #[arg(
        short,
        long,
        env = "POLL_INTERVAL",
        default_value = "2s",
        value_parser = parse_period
    )]
    pub poll_interval: Duration,

    /// How often to push to the server.
    #[arg(
        short,
        long,
        env = "REPORT_INTERVAL",
        default_value = "10s",
        value_parser = parse_period
    )]
    pub report_interval: Duration,

    /// Shared HMAC secret; reports are unsigned without it.
    #[arg(short, long, env = "KEY", hide_env_values = true)]
    pub key: Option<String>,

    /// Send one batch per report instead of one request per metric.
    #[arg(short, long, env = "BATCH", default_value_t = true, action = ArgAction::Set)]
    pub batch: bool,

    /// Concurrent requests in per-metric mode.
    #[arg(
        short = 'l',
        long,
        env = "RATE_LIMIT",
        default_value_t = 4,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub rate_limit: u16,

    /// Encoding of per-metric requests.
    #[arg(
        short = 't',
        long,
        env = "CONTENT_TYPE",
        value_enum,
        default_value_t = ContentType::Json
    )]
    pub content_type: ContentType,

    /// Per-request HTTP timeout.
    #[arg(
        long,
        env = "REQUEST_TIMEOUT",
        default_value = "5s",
        value_parser = parse_duration
    )]
    pub timeout: Duration,
}

/// Timer periods must be non-zero.
fn parse_period(input: &str) -> Result<Duration, String> {
    let period = parse_duration(input)?;
    if period.is_zero() {
        return Err(format!("interval '{}' must be greater than zero", input));
    }
    Ok(period)
}

impl AgentConfig {
    pub fn settings(&self) -> AgentSettings {
        AgentSettings {
            poll_interval: self.poll_interval,
            report_interval: self.report_interval,
            batch: self.batch,
            rate_limit: usize::from(self.rate_limit),
            content_type: self.content_type,
            key: self.key.as_deref().and_then(SigningKey::new),
        }
    }
}
