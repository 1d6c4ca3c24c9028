//! Affiliate commission ledger, payout workflow and their Postgres persistence.

pub mod context;
pub mod database;
pub mod domain;
pub mod payout_provider;


mod uuids;
