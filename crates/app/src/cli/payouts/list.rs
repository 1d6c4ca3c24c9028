use affiliates_app::domain::{
    affiliates::records::AffiliateUuid,
    payouts::{data::PayoutRequestFilter, records::PayoutStatus},
};
use clap::Args;
use uuid::Uuid;

use crate::cli::ServiceArgs;

#[derive(Debug, Args)]
pub(crate) struct ListPayoutsArgs {
    #[command(flatten)]
    service: ServiceArgs,

    /// Only requests in this state (pending, paid or rejected)
    #[arg(long, default_value = "pending", conflicts_with = "affiliate_uuid")]
    status: PayoutStatus,

    /// Only this affiliate's requests, newest first
    #[arg(long)]
    affiliate_uuid: Option<Uuid>,
}

pub(crate) async fn run(args: ListPayoutsArgs) -> Result<(), String> {
    let context = args.service.connect().await?;

    let filter = match args.affiliate_uuid {
        Some(affiliate) => PayoutRequestFilter::Affiliate(AffiliateUuid::from_uuid(affiliate)),
        None => PayoutRequestFilter::Status(args.status),
    };

    let requests = context
        .payouts
        .list_payout_requests(filter)
        .await
        .map_err(|error| format!("failed to list payout requests: {error}"))?;

    if requests.is_empty() {
        println!("no payout requests found");
        return Ok(());
    }

    for request in &requests {
        super::print_request(request);
    }

    Ok(())
}
