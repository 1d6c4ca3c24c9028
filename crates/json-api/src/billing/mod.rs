//! Billing Events

pub(crate) mod subscription_activated;
