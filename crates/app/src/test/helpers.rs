//! Test Helpers

use std::sync::Mutex;

use jiff::{SignedDuration, Timestamp};
use sqlx::query;

use crate::{
    domain::{
        affiliates::{
            AffiliatesService, AffiliatesServiceError,
            codes::ReferralCodeGenerator,
            records::{AffiliateRecord, AffiliateUuid},
        },
        referrals::{
            ReferralsService, ReferralsServiceError,
            data::NewReferral,
            records::{ReferralRecord, ReferralUuid},
        },
        users::UserUuid,
    },
    test::TestContext,
};

/// Hands out the given codes in order, then repeats the last one.
#[derive(Debug)]
pub(crate) struct FixedReferralCodes {
    codes: Mutex<Vec<String>>,
}

impl FixedReferralCodes {
    pub(crate) fn new<const N: usize>(codes: [&str; N]) -> Self {
        Self {
            codes: Mutex::new(codes.iter().rev().map(|code| (*code).to_string()).collect()),
        }
    }
}

impl ReferralCodeGenerator for FixedReferralCodes {
    fn generate(&self) -> String {
        let mut codes = self
            .codes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if codes.len() > 1 {
            codes.pop().unwrap_or_default()
        } else {
            codes.last().cloned().unwrap_or_default()
        }
    }
}

pub(crate) fn days_before(timestamp: Timestamp, days: i64) -> Timestamp {
    timestamp
        .checked_sub(SignedDuration::from_hours(days * 24))
        .unwrap_or(Timestamp::MIN)
}

pub(crate) fn days_after(timestamp: Timestamp, days: i64) -> Timestamp {
    timestamp
        .checked_add(SignedDuration::from_hours(days * 24))
        .unwrap_or(Timestamp::MAX)
}

pub(crate) async fn register_affiliate(
    ctx: &TestContext,
) -> Result<AffiliateRecord, AffiliatesServiceError> {
    Ok(ctx
        .affiliates
        .register(UserUuid::new())
        .await?
        .into_affiliate())
}

/// Mark the affiliate as fully onboarded without going through the provider.
pub(crate) async fn onboard(ctx: &TestContext, affiliate: AffiliateUuid) -> Result<(), sqlx::Error> {
    query(
        "UPDATE affiliates \
         SET payout_destination_id = 'acct_test', payout_onboarded = TRUE \
         WHERE uuid = $1",
    )
    .bind(affiliate)
    .execute(ctx.db.pool())
    .await?;

    Ok(())
}

pub(crate) fn new_referral(
    affiliate: AffiliateUuid,
    subscription_charge_id: &str,
    charge_amount: u64,
    recorded_at: Timestamp,
) -> NewReferral {
    NewReferral {
        uuid: ReferralUuid::new(),
        affiliate_uuid: affiliate,
        referred_user_uuid: UserUuid::new(),
        subscription_charge_id: subscription_charge_id.to_string(),
        charge_amount,
        recorded_at,
        charged_at: recorded_at,
    }
}

pub(crate) async fn record_referral(
    ctx: &TestContext,
    affiliate: AffiliateUuid,
    subscription_charge_id: &str,
    charge_amount: u64,
    recorded_at: Timestamp,
) -> Result<ReferralRecord, ReferralsServiceError> {
    ctx.referrals
        .append_referral(new_referral(
            affiliate,
            subscription_charge_id,
            charge_amount,
            recorded_at,
        ))
        .await
}
