//! Counters emitted by the router.
//!
//! # Metrics
//! - `router_dispatch_total` (counter): dispatch outcomes by `outcome`
//!   (`matched`, `not_found`, `method_not_allowed`)
//! - `router_pipeline_errors_total` (counter): translated failures by `link`
//! - `router_signed_url_total` (counter): verification outcomes by `outcome`
//! - `router_signed_url_purged_total` (counter): records removed by GC
//!
//! # Design Decisions
//! - Label values are bounded sets, except `link` which is a middleware id

/// Record one dispatch outcome.
pub fn record_dispatch(outcome: &'static str) {
    ::metrics::counter!("router_dispatch_total", "outcome" => outcome).increment(1);
}

/// Record a failure translated at a pipeline link.
pub fn record_pipeline_error(link: &str) {
    ::metrics::counter!("router_pipeline_errors_total", "link" => link.to_string()).increment(1);
}

/// Record one signed URL verification outcome.
pub fn record_signed_url(outcome: &'static str) {
    ::metrics::counter!("router_signed_url_total", "outcome" => outcome).increment(1);
}

pub fn record_signed_urls_purged(count: usize) {
    ::metrics::counter!("router_signed_url_purged_total").increment(count as u64);
}
