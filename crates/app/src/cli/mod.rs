use affiliates_app::{
    context::AppContext,
    database::CLI_MAX_CONNECTIONS,
    payout_provider::StripeConfig,
};
use clap::{Args, Parser, Subcommand};

mod affiliates;
mod db;
mod payouts;

#[derive(Debug, Parser)]
#[command(name = "affiliates-app", about = "Affiliate ledger admin CLI", long_about = None)]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Db(db::DbCommand),
    Payouts(payouts::PayoutsCommand),
    Affiliates(affiliates::AffiliatesCommand),
}

impl Cli {
    pub(crate) async fn run(self) -> Result<(), String> {
        match self.command {
            Commands::Db(command) => db::run(command).await,
            Commands::Payouts(command) => payouts::run(command).await,
            Commands::Affiliates(command) => affiliates::run(command).await,
        }
    }
}

/// Database and payout provider settings shared by every service command.
#[derive(Debug, Args)]
pub(crate) struct ServiceArgs {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,

    #[command(flatten)]
    stripe: StripeConfig,
}

impl ServiceArgs {
    pub(crate) async fn connect(self) -> Result<AppContext, String> {
        AppContext::from_config(&self.database_url, CLI_MAX_CONNECTIONS, self.stripe)
            .await
            .map_err(|error| match std::error::Error::source(&error) {
                Some(source) => format!("{error}: {source}"),
                None => error.to_string(),
            })
    }
}
