//! Server configuration module

use std::time::Duration;

use clap::Parser;

use affiliates_app::payout_provider::StripeConfig;

use crate::config::{
    admin::AdminConfig,
    db::DatabaseConfig,
    observability::{LoggingConfig, TraceExportConfig},
    server::ListenerConfig,
};

pub(crate) mod admin;
pub(crate) mod db;
pub(crate) mod observability;
pub(crate) mod server;

/// Affiliates JSON API Server configuration
#[derive(Debug, Parser)]
#[command(name = "affiliates-json", about = "Affiliates JSON API Server", long_about = None)]
pub struct ServerConfig {
    /// Listener settings.
    #[command(flatten)]
    pub server: ListenerConfig,

    /// Logging output settings.
    #[command(flatten)]
    pub logging: LoggingConfig,

    /// Span export settings.
    #[command(flatten)]
    pub traces: TraceExportConfig,

    /// Application database settings.
    #[command(flatten)]
    pub database: DatabaseConfig,

    /// Payout provider settings.
    #[command(flatten)]
    pub stripe: StripeConfig,

    /// Admin route and public link settings.
    #[command(flatten)]
    pub admin: AdminConfig,
}

impl ServerConfig {
    /// Load configuration from environment and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, clap::Error> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::try_parse()
    }

    /// Get the socket address for binding
    #[must_use]
    pub fn socket_addr(&self) -> String {
        self.server.socket_addr()
    }

    /// How long shutdown waits for in-flight requests
    #[must_use]
    pub fn drain_timeout(&self) -> Duration {
        self.server.drain_timeout()
    }
}
