//! Test helpers.

use std::sync::Arc;

use jiff::Timestamp;
use salvo::{affix_state::inject, prelude::*};

use affiliates_app::{
    context::AppContext,
    domain::{
        affiliates::{
            MockAffiliatesService,
            records::{AffiliateRecord, AffiliateUuid},
        },
        attribution::MockAttributionService,
        payouts::{
            MockPayoutsService,
            records::{PayoutRequestRecord, PayoutRequestUuid, PayoutStatus},
        },
        referrals::MockReferralsService,
        users::UserUuid,
    },
};

use crate::state::State;

pub(crate) const TEST_ADMIN_TOKEN: &str = "test-admin-token";

const TEST_PUBLIC_BASE_URL: &str = "https://affiliates.test/";

/// Service mocks; any call without a matching expectation fails the test.
#[derive(Debug, Default)]
pub(crate) struct Mocks {
    pub(crate) affiliates: MockAffiliatesService,
    pub(crate) referrals: MockReferralsService,
    pub(crate) payouts: MockPayoutsService,
    pub(crate) attribution: MockAttributionService,
}

pub(crate) fn state(mocks: Mocks) -> Arc<State> {
    let app = AppContext {
        affiliates: Arc::new(mocks.affiliates),
        referrals: Arc::new(mocks.referrals),
        payouts: Arc::new(mocks.payouts),
        attribution: Arc::new(mocks.attribution),
    };

    State::shared(
        app,
        TEST_ADMIN_TOKEN.to_string(),
        TEST_PUBLIC_BASE_URL.to_string(),
    )
}

pub(crate) fn service(mocks: Mocks, route: Router) -> Service {
    Service::new(Router::new().hoop(inject(state(mocks))).push(route))
}

pub(crate) fn make_affiliate(user: UserUuid) -> AffiliateRecord {
    AffiliateRecord {
        uuid: AffiliateUuid::new(),
        user_uuid: user,
        referral_code: "PRO4X7K2".to_string(),
        commission_rate: 40,
        payout_destination_id: None,
        payout_onboarded: false,
        is_active: true,
        total_earned: 0,
        total_paid: 0,
        referral_count: 0,
        created_at: Timestamp::UNIX_EPOCH,
        updated_at: Timestamp::UNIX_EPOCH,
    }
}

pub(crate) fn make_payout_request(affiliate: &AffiliateRecord, amount: u64) -> PayoutRequestRecord {
    PayoutRequestRecord {
        uuid: PayoutRequestUuid::new(),
        affiliate_uuid: affiliate.uuid,
        amount,
        status: PayoutStatus::Pending,
        rejection_reason: None,
        transfer_reference: None,
        approval_started_at: None,
        requested_at: Timestamp::UNIX_EPOCH,
        settled_at: None,
        rejected_at: None,
    }
}
