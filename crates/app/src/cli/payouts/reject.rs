use affiliates_app::domain::payouts::records::PayoutRequestUuid;
use clap::Args;
use jiff::Timestamp;
use uuid::Uuid;

use crate::cli::ServiceArgs;

#[derive(Debug, Args)]
pub(crate) struct RejectPayoutArgs {
    #[command(flatten)]
    service: ServiceArgs,

    /// Payout request to reject
    #[arg(long)]
    request_uuid: Uuid,

    /// Shown to the affiliate
    #[arg(long)]
    reason: String,
}

pub(crate) async fn run(args: RejectPayoutArgs) -> Result<(), String> {
    let context = args.service.connect().await?;

    let rejected = context
        .payouts
        .reject(
            PayoutRequestUuid::from_uuid(args.request_uuid),
            args.reason,
            Timestamp::now(),
        )
        .await
        .map_err(|error| format!("failed to reject payout request: {error}"))?;

    super::print_request(&rejected);

    Ok(())
}
