//! Referrals Data

use jiff::Timestamp;

use crate::domain::{
    affiliates::records::{AffiliateRecord, AffiliateUuid},
    payouts::records::PayoutRequestUuid,
    referrals::records::{ReferralRecord, ReferralUuid},
    users::UserUuid,
};

/// Number of referrals shown on the affiliate dashboard.
pub const DASHBOARD_RECENT_REFERRALS: u32 = 50;

/// A commission event to append to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReferral {
    pub uuid: ReferralUuid,
    pub affiliate_uuid: AffiliateUuid,
    pub referred_user_uuid: UserUuid,
    pub subscription_charge_id: String,

    /// Gross charge, in cents.
    pub charge_amount: u64,

    /// Clearance anchor: when the commission entered the ledger.
    pub recorded_at: Timestamp,

    /// When billing says the charge happened. Kept for audit only.
    pub charged_at: Timestamp,
}

/// `floor(charge_amount * commission_rate / 100)`.
///
/// Returns `None` if the commission does not fit in `u64`, which cannot
/// happen for rates up to 100.
#[must_use]
pub fn commission_for(charge_amount: u64, commission_rate: u8) -> Option<u64> {
    let commission = u128::from(charge_amount) * u128::from(commission_rate) / 100;

    u64::try_from(commission).ok()
}

/// Pending commissions past their clearance date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearedBalance {
    /// Sum of the cleared commissions, in cents.
    pub amount: u64,

    pub referrals: Vec<ReferralUuid>,
}

impl ClearedBalance {
    /// Sum the cleared pending commissions among `referrals` as of `now`.
    ///
    /// Returns `None` on overflow.
    #[must_use]
    pub fn from_referrals<'a>(
        referrals: impl IntoIterator<Item = &'a ReferralRecord>,
        now: Timestamp,
    ) -> Option<Self> {
        let mut balance = Self::default();

        for referral in referrals {
            if referral.is_cleared_pending(now) {
                balance.amount = balance.amount.checked_add(referral.commission_amount)?;
                balance.referrals.push(referral.uuid);
            }
        }

        Some(balance)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.referrals.is_empty()
    }
}

/// Sum of pending commissions still inside their clearance window.
///
/// Returns `None` on overflow.
#[must_use]
pub fn processing_sum<'a>(
    referrals: impl IntoIterator<Item = &'a ReferralRecord>,
    now: Timestamp,
) -> Option<u64> {
    referrals
        .into_iter()
        .filter(|referral| referral.is_processing(now))
        .try_fold(0_u64, |sum, referral| {
            sum.checked_add(referral.commission_amount)
        })
}

/// Aggregates re-derived from the ledger rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerTotals {
    /// Sum of every commission, in cents.
    pub earned: u64,

    /// Sum of paid commissions, in cents.
    pub paid: u64,

    pub referral_count: u64,
}

impl LedgerTotals {
    /// The cached counters held on the affiliate row.
    #[must_use]
    pub fn cached(affiliate: &AffiliateRecord) -> Self {
        Self {
            earned: affiliate.total_earned,
            paid: affiliate.total_paid,
            referral_count: affiliate.referral_count,
        }
    }
}

/// An affiliate's money, split by where it sits in the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Balances {
    /// Pending and cleared: requestable now.
    pub cleared: u64,

    /// Pending and still clearing.
    pub processing: u64,

    /// Settled through payouts.
    pub paid: u64,

    /// Everything ever earned.
    pub earned: u64,
}

impl Balances {
    /// Split pending commissions by clearance and take paid/earned from the
    /// ledger totals.
    ///
    /// Returns `None` on overflow.
    #[must_use]
    pub fn from_ledger(
        pending: &[ReferralRecord],
        totals: LedgerTotals,
        now: Timestamp,
    ) -> Option<Self> {
        Some(Self {
            cleared: ClearedBalance::from_referrals(pending, now)?.amount,
            processing: processing_sum(pending, now)?,
            paid: totals.paid,
            earned: totals.earned,
        })
    }
}

/// Outcome of comparing the cached counters with the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub affiliate_uuid: AffiliateUuid,

    /// Counters as they were on the affiliate row.
    pub cached: LedgerTotals,

    /// Counters re-derived from the ledger, now stored on the affiliate row.
    pub ledger: LedgerTotals,
}

impl Reconciliation {
    #[must_use]
    pub fn drifted(&self) -> bool {
        self.cached != self.ledger
    }
}

/// Everything the affiliate screen shows.
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub affiliate: AffiliateRecord,
    pub balances: Balances,

    /// The affiliate's open payout request, if one is awaiting review.
    pub pending_payout_request: Option<PayoutRequestUuid>,

    /// Newest first.
    pub recent_referrals: Vec<ReferralRecord>,
}
