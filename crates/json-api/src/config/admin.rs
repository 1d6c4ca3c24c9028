//! Admin Config

use clap::Args;

/// Admin access and link settings.
#[derive(Debug, Args)]
pub struct AdminConfig {
    /// Bearer token required on `/admin` routes
    #[arg(long, env = "ADMIN_API_TOKEN", hide_env_values = true)]
    pub admin_api_token: String,

    /// Base URL referral links are built on, e.g. `https://example.com/signup`
    #[arg(long, env = "PUBLIC_BASE_URL", default_value = "http://localhost:8698")]
    pub public_base_url: String,
}
