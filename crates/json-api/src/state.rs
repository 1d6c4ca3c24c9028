//! State

use std::sync::Arc;

use affiliates_app::context::AppContext;

#[derive(Clone)]
pub(crate) struct State {
    pub(crate) app: AppContext,

    /// Bearer token the `/admin` routes require.
    pub(crate) admin_token: String,

    /// Origin shareable referral links are built on.
    pub(crate) public_base_url: String,
}

impl State {
    #[must_use]
    pub(crate) fn new(app: AppContext, admin_token: String, public_base_url: String) -> Self {
        Self {
            app,
            admin_token,
            public_base_url,
        }
    }

    #[must_use]
    pub(crate) fn shared(app: AppContext, admin_token: String, public_base_url: String) -> Arc<Self> {
        Arc::new(Self::new(app, admin_token, public_base_url))
    }

    /// Link a prospective subscriber opens to sign up with `code`.
    pub(crate) fn referral_link(&self, code: &str) -> String {
        format!(
            "{}/signup?ref={code}",
            self.public_base_url.trim_end_matches('/')
        )
    }
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("public_base_url", &self.public_base_url)
            .finish_non_exhaustive()
    }
}
