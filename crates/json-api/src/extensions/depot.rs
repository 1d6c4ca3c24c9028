//! Depot helper extensions.

use std::sync::Arc;

use salvo::prelude::{Depot, StatusError};

use crate::state::State;

/// Typed access to what the middleware stack leaves in the depot.
pub(crate) trait DepotExt {
    /// The shared server state, or a 500 if it was never injected.
    fn state_or_500(&self) -> Result<&Arc<State>, StatusError>;
}

impl DepotExt for Depot {
    fn state_or_500(&self) -> Result<&Arc<State>, StatusError> {
        self.obtain::<Arc<State>>()
            .map_err(|_ignored| StatusError::internal_server_error())
    }
}
