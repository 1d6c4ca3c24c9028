//! Affiliate Handlers

pub(crate) mod dashboard;
pub(crate) mod deactivate;
pub(crate) mod payout_destination;
pub(crate) mod reconcile;
pub(crate) mod register;
