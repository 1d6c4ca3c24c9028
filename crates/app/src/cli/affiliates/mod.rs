use clap::{Args, Subcommand};

mod deactivate;
mod reconcile;

#[derive(Debug, Args)]
pub(crate) struct AffiliatesCommand {
    #[command(subcommand)]
    command: AffiliatesSubcommand,
}

#[derive(Debug, Subcommand)]
enum AffiliatesSubcommand {
    /// Recompute cached totals from the ledger
    Reconcile(reconcile::ReconcileArgs),

    /// Stop an affiliate's code from attributing new referrals
    Deactivate(deactivate::DeactivateArgs),
}

pub(crate) async fn run(command: AffiliatesCommand) -> Result<(), String> {
    match command.command {
        AffiliatesSubcommand::Reconcile(args) => reconcile::run(args).await,
        AffiliatesSubcommand::Deactivate(args) => deactivate::run(args).await,
    }
}
