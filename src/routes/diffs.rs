//! Diff endpoint.
//!
//! GET /
//!
//! Content negotiation on `Accept`:
//! - contains `text/x-diff`: the unified diff of every repository in the
//!   workspace, streamed as `text/x-diff; charset=utf-8`
//! - anything else: the embedded viewer page, which fetches the diff itself
//!
//! The diff status is decided by discovery alone: a workspace that cannot be
//! scanned is a 500, everything after that streams with 200.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use rust_embed::Embed;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use crate::aggregate::SharedAggregator;
use crate::error::{AppError, Result};
use crate::output::BoundedSink;

pub const DIFF_MEDIA_TYPE: &str = "text/x-diff";
pub const DIFF_CONTENT_TYPE: &str = "text/x-diff; charset=utf-8";
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

const VIEWER_PAGE: &str = "diffs.html";

/// Capacity of the pipe between the aggregation task and the response body.
const STREAM_BUFFER: usize = 64 * 1024;

/// Embedded viewer page
#[derive(Embed)]
#[folder = "assets/"]
struct Assets;

pub fn routes(aggregator: SharedAggregator) -> Router {
    Router::new()
        .route("/", get(get_diffs))
        .with_state(aggregator)
}

async fn get_diffs(
    State(aggregator): State<SharedAggregator>,
    headers: HeaderMap,
) -> Result<Response> {
    if wants_diff_text(&headers) {
        serve_diffs_text(aggregator).await
    } else {
        serve_diffs_html()
    }
}

fn wants_diff_text(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.contains(DIFF_MEDIA_TYPE))
}

fn serve_diffs_html() -> Result<Response> {
    let page = Assets::get(VIEWER_PAGE)
        .ok_or_else(|| AppError::Internal(format!("missing embedded asset {}", VIEWER_PAGE)))?;

    Ok((
        [(header::CONTENT_TYPE, HTML_CONTENT_TYPE)],
        Body::from(page.data.into_owned()),
    )
        .into_response())
}

async fn serve_diffs_text(aggregator: SharedAggregator) -> Result<Response> {
    let deadline = aggregator.deadline();
    let repos = aggregator.discover(deadline).await?;

    let (writer, reader) = tokio::io::duplex(STREAM_BUFFER);
    let mut sink = BoundedSink::new(writer, aggregator.config().max_output_bytes);

    tokio::spawn(async move {
        let summary = aggregator.stream(&repos, &mut sink, deadline).await;
        if let Err(e) = sink.shutdown().await {
            tracing::debug!("Closing diff stream: {}", e);
        }
        tracing::info!(
            "Served diffs for {}/{} repositories ({} bytes, {} failed, truncated: {}, timed out: {}, client gone: {})",
            summary.repos_visited,
            summary.repos_found,
            summary.bytes_written,
            summary.repos_failed,
            summary.truncated,
            summary.timed_out,
            summary.client_gone
        );
    });

    Ok((
        [(header::CONTENT_TYPE, DIFF_CONTENT_TYPE)],
        Body::from_stream(ReaderStream::new(reader)),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn accept_header_is_matched_by_substring() {
        let mut headers = HeaderMap::new();
        assert!(!wants_diff_text(&headers));

        headers.insert(header::ACCEPT, HeaderValue::from_static("text/html"));
        assert!(!wants_diff_text(&headers));

        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/x-diff;q=0.9, */*;q=0.1"),
        );
        assert!(wants_diff_text(&headers));
    }

    #[test]
    fn viewer_page_is_embedded() {
        let page = Assets::get(VIEWER_PAGE).unwrap();
        assert!(page.data.starts_with(b"<!DOCTYPE html>"));
    }
}
