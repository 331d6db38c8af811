//! HTTP routes.
//!
//! - `diffs`: the single `GET /` endpoint, serving either the aggregated diff
//!   (`Accept: text/x-diff`) or the embedded HTML viewer

pub mod diffs;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::aggregate::SharedAggregator;

pub fn create_router(aggregator: SharedAggregator) -> Router {
    Router::new()
        .merge(diffs::routes(aggregator))
        .layer(TraceLayer::new_for_http())
}
