//! Affiliates JSON API Server

use std::process;

use salvo::prelude::*;
use tracing::{error, info};

use affiliates_app::context::AppContext;

use crate::{config::ServerConfig, observability::Observability, state::State};

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod affiliates;
mod auth;
mod billing;
mod config;
mod extensions;
mod healthcheck;
mod observability;
mod payouts;
mod referral_codes;
mod router;
mod shutdown;
mod state;
#[cfg(test)]
mod test_helpers;

/// Affiliates JSON API Server entry point
#[tokio::main]
pub async fn main() {
    let config = ServerConfig::load().unwrap_or_else(|e| {
        #[expect(
            clippy::print_stderr,
            reason = "logging not initialized yet, must use eprintln for config errors"
        )]
        {
            eprintln!("Configuration error: {e}");
        }

        process::exit(1);
    });

    let observability = Observability::init(&config.logging, &config.traces).unwrap_or_else(|e| {
        #[expect(
            clippy::print_stderr,
            reason = "logging failed to initialize, must use eprintln"
        )]
        {
            eprintln!("Observability error: {e}");
        }

        process::exit(1);
    });

    let addr = config.socket_addr();
    let drain_timeout = config.drain_timeout();

    let app = match AppContext::from_config(
        &config.database.database_url,
        config.database.database_max_connections,
        config.stripe,
    )
    .await
    {
        Ok(app) => app,
        Err(init_error) => {
            error!("failed to initialize app context: {init_error}");

            observability.shutdown();
            process::exit(1);
        }
    };

    let state = State::shared(
        app,
        config.admin.admin_api_token,
        config.admin.public_base_url,
    );

    info!("Starting server on {addr}");

    let listener = TcpListener::new(addr).bind().await;
    let server = Server::new(listener);
    let handle = server.handle();

    tokio::spawn(async move {
        if let Err(error) = shutdown::listen(handle, drain_timeout).await {
            error!("failed to listen for shutdown signal: {error}");
        }
    });

    server.serve(router::service_router(state)).await;

    observability.shutdown();
}
