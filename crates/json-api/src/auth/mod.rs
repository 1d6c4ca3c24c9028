//! Admin Authentication

pub(crate) mod middleware;
