use tracing::trace;

// Lightweight metrics helpers that are safe in demo builds.
// These intentionally avoid pulling in metrics macros to keep deps stable.

pub fn inc_requests(route: &'static str) {
    trace!(
        target = "porter.metrics",
        route = route,
        "requests_total_inc"
    );
}

pub fn upload_elapsed(kind: &'static str, elapsed_ms: u128) {
    trace!(
        target = "porter.metrics",
        kind = kind,
        elapsed_ms = elapsed_ms as u64,
        "upload_elapsed"
    );
}

pub fn import_batch_size(count: usize) {
    trace!(
        target = "porter.metrics",
        count = count,
        "import_batch_size"
    );
}
