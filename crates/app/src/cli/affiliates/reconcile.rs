use affiliates_app::domain::{affiliates::records::AffiliateUuid, payouts::data::format_dollars};
use clap::Args;
use uuid::Uuid;

use crate::cli::ServiceArgs;

#[derive(Debug, Args)]
pub(crate) struct ReconcileArgs {
    #[command(flatten)]
    service: ServiceArgs,

    /// Affiliate whose totals should be recomputed
    #[arg(long)]
    affiliate_uuid: Uuid,
}

pub(crate) async fn run(args: ReconcileArgs) -> Result<(), String> {
    let context = args.service.connect().await?;

    let reconciliation = context
        .referrals
        .reconcile_aggregates(AffiliateUuid::from_uuid(args.affiliate_uuid))
        .await
        .map_err(|error| format!("failed to reconcile affiliate: {error}"))?;

    let (cached, ledger) = (&reconciliation.cached, &reconciliation.ledger);

    println!("affiliate_uuid: {}", reconciliation.affiliate_uuid);
    println!(
        "total_earned: {} -> {}",
        format_dollars(cached.earned),
        format_dollars(ledger.earned)
    );
    println!(
        "total_paid: {} -> {}",
        format_dollars(cached.paid),
        format_dollars(ledger.paid)
    );
    println!(
        "referral_count: {} -> {}",
        cached.referral_count, ledger.referral_count
    );
    println!(
        "{}",
        if reconciliation.drifted() {
            "cached totals corrected"
        } else {
            "cached totals already matched the ledger"
        }
    );

    Ok(())
}
