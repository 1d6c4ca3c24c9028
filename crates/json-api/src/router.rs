//! App Router

use std::sync::Arc;

use salvo::{
    affix_state::inject,
    oapi::{
        OpenApi,
        security::{Http, HttpAuthScheme, SecurityScheme},
        swagger_ui::SwaggerUi,
    },
    prelude::*,
    trailing_slash::remove_slash,
};

use crate::{
    affiliates, auth, billing, healthcheck,
    observability::{metrics_handler, request_logging},
    payouts, referral_codes,
    state::State,
};

/// Routes callers reach directly, identified by the `{user}` path segment.
fn affiliate_routes() -> Router {
    Router::with_path("affiliates")
        .post(affiliates::handlers::register::handler)
        .push(
            Router::with_path("{user}")
                .push(Router::with_path("dashboard").get(affiliates::handlers::dashboard::handler))
                .push(
                    Router::with_path("payout-destination")
                        .get(affiliates::handlers::payout_destination::status)
                        .post(affiliates::handlers::payout_destination::link),
                )
                .push(
                    Router::with_path("payouts")
                        .get(payouts::handlers::affiliate_index::handler)
                        .post(payouts::handlers::create::handler),
                ),
        )
}

/// Operator routes behind the admin bearer token.
fn admin_routes() -> Router {
    Router::with_path("admin")
        .hoop(auth::middleware::handler)
        .push(
            Router::with_path("payouts")
                .get(payouts::handlers::admin_index::handler)
                .push(
                    Router::with_path("{request}")
                        .push(Router::with_path("approve").post(payouts::handlers::approve::handler))
                        .push(Router::with_path("reject").post(payouts::handlers::reject::handler)),
                ),
        )
        .push(
            Router::with_path("affiliates/{affiliate}")
                .push(
                    Router::with_path("deactivate")
                        .post(affiliates::handlers::deactivate::handler),
                )
                .push(
                    Router::with_path("reconcile").post(affiliates::handlers::reconcile::handler),
                ),
        )
}

/// The API routes, without middleware or documentation.
pub(crate) fn app_router() -> Router {
    Router::new()
        .push(Router::with_path("healthcheck").get(healthcheck::handler))
        .push(affiliate_routes())
        .push(Router::with_path("referral-codes/{code}").get(referral_codes::handler))
        .push(
            Router::with_path("billing/subscription-activated")
                .post(billing::subscription_activated::handler),
        )
        .push(admin_routes())
}

/// The full service router: middleware, API routes, metrics and docs.
pub(crate) fn service_router(state: Arc<State>) -> Router {
    let router = Router::new()
        .hoop(CatchPanic::new())
        .hoop(remove_slash())
        .hoop(inject(state))
        .hoop(request_logging)
        .push(Router::with_path("metrics").get(metrics_handler))
        .push(app_router());

    let doc = OpenApi::new("Affiliates API", env!("CARGO_PKG_VERSION"))
        .add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        )
        .merge_router(&router);

    router
        .push(doc.into_router("/api-doc/openapi.json"))
        .push(SwaggerUi::new("/api-doc/openapi.json").into_router("docs"))
}
