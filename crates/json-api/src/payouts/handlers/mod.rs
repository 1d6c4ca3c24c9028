//! Payout Handlers

pub(crate) mod admin_index;
pub(crate) mod affiliate_index;
pub(crate) mod approve;
pub(crate) mod create;
pub(crate) mod reject;
