//! Prometheus metrics for discussion-service.
//!
//! Collectors for the vote ledger, score aggregator and feed ranker, plus the
//! HTTP handler for the `/metrics` endpoint.

use actix_web::HttpResponse;
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    /// Votes cast, segmented by outcome (created, removed, changed, rejected, failed).
    pub static ref VOTE_CAST_TOTAL: IntCounterVec = register_int_counter_vec!(
        "vote_cast_total",
        "Votes cast segmented by ledger outcome",
        &["outcome"]
    )
    .expect("failed to register vote_cast_total");

    /// Denormalized counter recomputes, segmented by result (ok, not_found, error).
    pub static ref SCORE_RECOMPUTE_TOTAL: IntCounterVec = register_int_counter_vec!(
        "score_recompute_total",
        "Score and comment-count recomputes segmented by result",
        &["counter", "result"]
    )
    .expect("failed to register score_recompute_total");

    /// Time spent ordering a feed.
    pub static ref FEED_RANK_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "feed_rank_duration_seconds",
        "Feed build duration segmented by sort strategy",
        &["strategy"]
    )
    .expect("failed to register feed_rank_duration_seconds");
}

/// Actix handler that renders Prometheus metrics in text format.
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
