//! Listener Config

use std::time::Duration;

use clap::Args;

/// Where the API listens and how long it drains on shutdown.
#[derive(Debug, Args)]
pub struct ListenerConfig {
    /// Interface to bind
    #[arg(short = 'H', long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind
    #[arg(short, long, env = "SERVER_PORT", default_value_t = 8698)]
    pub port: u16,

    /// Seconds in-flight requests get to finish after SIGTERM or Ctrl+C
    #[arg(long, env = "SHUTDOWN_DRAIN_SECONDS", default_value_t = 30)]
    pub shutdown_drain_seconds: u64,
}

impl ListenerConfig {
    #[must_use]
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[must_use]
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_drain_seconds)
    }
}
