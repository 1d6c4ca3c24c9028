use affiliates_app::domain::payouts::{data::format_dollars, records::PayoutRequestRecord};
use clap::{Args, Subcommand};

mod approve;
mod list;
mod reject;

#[derive(Debug, Args)]
pub(crate) struct PayoutsCommand {
    #[command(subcommand)]
    command: PayoutsSubcommand,
}

#[derive(Debug, Subcommand)]
enum PayoutsSubcommand {
    /// List payout requests by status or by affiliate
    List(list::ListPayoutsArgs),

    /// Transfer a pending request's amount and settle it
    Approve(approve::ApprovePayoutArgs),

    /// Close a pending request without paying it
    Reject(reject::RejectPayoutArgs),
}

pub(crate) async fn run(command: PayoutsCommand) -> Result<(), String> {
    match command.command {
        PayoutsSubcommand::List(args) => list::run(args).await,
        PayoutsSubcommand::Approve(args) => approve::run(args).await,
        PayoutsSubcommand::Reject(args) => reject::run(args).await,
    }
}

fn print_request(request: &PayoutRequestRecord) {
    println!("payout_request_uuid: {}", request.uuid);
    println!("affiliate_uuid: {}", request.affiliate_uuid);
    println!("amount: {}", format_dollars(request.amount));
    println!("status: {}", request.status);
    println!("requested_at: {}", request.requested_at);

    if let Some(reference) = &request.transfer_reference {
        println!("transfer_reference: {reference}");
    }

    if let Some(settled_at) = request.settled_at {
        println!("settled_at: {settled_at}");
    }

    if let Some(reason) = &request.rejection_reason {
        println!("rejection_reason: {reason}");
    }

    println!();
}
