use affiliates_app::domain::payouts::records::PayoutRequestUuid;
use clap::Args;
use jiff::Timestamp;
use uuid::Uuid;

use crate::cli::ServiceArgs;

#[derive(Debug, Args)]
pub(crate) struct ApprovePayoutArgs {
    #[command(flatten)]
    service: ServiceArgs,

    /// Payout request to approve
    #[arg(long)]
    request_uuid: Uuid,
}

pub(crate) async fn run(args: ApprovePayoutArgs) -> Result<(), String> {
    let context = args.service.connect().await?;

    let settled = context
        .payouts
        .approve(PayoutRequestUuid::from_uuid(args.request_uuid), Timestamp::now())
        .await
        .map_err(|error| format!("failed to approve payout request: {error}"))?;

    super::print_request(&settled);

    Ok(())
}
