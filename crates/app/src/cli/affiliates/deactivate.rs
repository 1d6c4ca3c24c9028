use affiliates_app::domain::affiliates::records::AffiliateUuid;
use clap::Args;
use uuid::Uuid;

use crate::cli::ServiceArgs;

#[derive(Debug, Args)]
pub(crate) struct DeactivateArgs {
    #[command(flatten)]
    service: ServiceArgs,

    /// Affiliate to deactivate
    #[arg(long)]
    affiliate_uuid: Uuid,
}

pub(crate) async fn run(args: DeactivateArgs) -> Result<(), String> {
    let context = args.service.connect().await?;

    let affiliate = context
        .affiliates
        .deactivate(AffiliateUuid::from_uuid(args.affiliate_uuid))
        .await
        .map_err(|error| format!("failed to deactivate affiliate: {error}"))?;

    println!("affiliate_uuid: {}", affiliate.uuid);
    println!("referral_code: {}", affiliate.referral_code);
    println!("is_active: {}", affiliate.is_active);

    Ok(())
}
