//! Read-only dashboard API over the latest crawl snapshot.
//!
//! ## Routes
//!
//! | Path | Handler |
//! |---|---|
//! | `/` | banner |
//! | `/health` | liveness |
//! | `/api/repositories` | filter, sort and paginate repositories |
//! | `/api/repositories/{owner}/{name}` | one repository with its contributors |
//! | `/api/contributors` | filter, sort and paginate contributors |
//! | `/api/contributors/multi-repo` | contributors across several repositories |
//! | `/api/contributors/by-location` | contributors grouped by location |
//! | `/api/contributors/{username}` | one contributor with their records |
//! | `/api/stats`, `/api/stats/extended` | dashboard aggregates |
//! | `/api/debug/files`, `/api/debug/sample` | raw file inspection |

mod error;
mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::error::Result;
use crate::models::Config;
use crate::query::QueryService;

pub use error::ApiError;
pub use handlers::AppState;

/// Build the router with CORS restricted to `cors_origins` (any origin when empty).
pub fn router(service: QueryService, cors_origins: &[String]) -> Router {
    let state: AppState = Arc::new(service);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/api/repositories", get(handlers::list_repositories))
        .route(
            "/api/repositories/{owner}/{name}",
            get(handlers::get_repository),
        )
        .route("/api/contributors", get(handlers::list_contributors))
        .route("/api/contributors/multi-repo", get(handlers::multi_repo))
        .route("/api/contributors/by-location", get(handlers::by_location))
        .route("/api/contributors/{username}", get(handlers::get_contributor))
        .route("/api/stats", get(handlers::stats))
        .route("/api/stats/extended", get(handlers::stats_extended))
        .route("/api/debug/files", get(handlers::debug_files))
        .route("/api/debug/sample", get(handlers::debug_sample))
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Bind the configured address and serve until the process exits.
pub async fn serve(config: &Config) -> Result<()> {
    let service = QueryService::new(&config.paths.data_dir);
    let app = router(service, &config.server.cors_origins);

    let addr = config.server.bind_address();
    let listener = TcpListener::bind(&addr).await?;
    log::info!(
        "Dashboard API listening on http://{} (data: {})",
        addr,
        config.paths.data_dir.display()
    );

    axum::serve(listener, app).await?;
    Ok(())
}
