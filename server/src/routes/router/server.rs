use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use http::HeaderValue;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::CorsLayer;

#[cfg(debug_assertions)]
use crate::routes::handlers::dev_only;
use crate::{
    request_tracing,
    routes::handlers::{knowledge, search},
    server_config::cfg,
    ServerState,
};

use super::handler_404;

// Email bodies can be long threads
const SUMMARIZE_BODY_LIMIT: usize = 2 * 1024 * 1024;

pub struct ServerRouter;

impl ServerRouter {
    pub fn create(state: ServerState) -> anyhow::Result<Router> {
        let origins = cfg
            .frontend
            .allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!("Ignoring invalid CORS origin {:?}: {}", origin, e);
                    None
                }
            })
            .collect::<Vec<_>>();

        let cors_layer = CorsLayer::new()
            .allow_origin(origins)
            .allow_credentials(true);

        let ip_limiter_conf = Arc::new(
            GovernorConfigBuilder::default()
                .finish()
                .context("Invalid ip rate limit config")?,
        );

        // Every call on these routes goes out to an LLM
        let strict_ip_limiter_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_second(2)
                .burst_size(5)
                .finish()
                .context("Invalid strict ip rate limit config")?,
        );

        let ip_limiter = ip_limiter_conf.limiter().clone();
        let strict_ip_limiter = strict_ip_limiter_conf.limiter().clone();
        let interval = Duration::from_secs(60);
        // a separate background task to clean up
        tokio::task::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                ip_limiter.retain_recent();
                strict_ip_limiter.retain_recent();
            }
        });

        let llm_routes = Router::new()
            .route("/ai/search_tree_knowledge", post(search::search_tree_knowledge))
            .route(
                "/knowledge/emails/:email_id/summarize",
                post(knowledge::summarize_email)
                    .layer(DefaultBodyLimit::max(SUMMARIZE_BODY_LIMIT)),
            )
            .layer(GovernorLayer {
                config: strict_ip_limiter_conf,
            });

        let router = Router::new()
            .route("/", get(|| async { "Aomail knowledge server" }))
            .route("/knowledge/categories", get(knowledge::get_categories))
            .route("/knowledge/tree", get(knowledge::get_tree))
            .route(
                "/knowledge/emails/:email_id",
                delete(knowledge::delete_email_keypoints),
            )
            .merge(llm_routes);

        #[cfg(debug_assertions)]
        let router = router.route("/dev/token", get(dev_only::dev_token));

        let router = router.layer(GovernorLayer {
            config: ip_limiter_conf,
        });
        let router = request_tracing::with_request_tracing(router)
            .layer(cors_layer)
            .with_state(state)
            .fallback(handler_404);

        Ok(router)
    }
}
