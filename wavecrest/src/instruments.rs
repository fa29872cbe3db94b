//! `metrics` facade mirrors of the connection counters and latency samples.
use std::time::Duration;

pub(crate) fn connection_attempted() {
    metrics::counter!("wavecrest_connections_attempted").increment(1);
}

pub(crate) fn connection_succeeded() {
    metrics::counter!("wavecrest_connections_succeeded").increment(1);
    metrics::gauge!("wavecrest_connections_alive").increment(1.0);
}

pub(crate) fn connection_failed() {
    metrics::counter!("wavecrest_connections_failed").increment(1);
}

pub(crate) fn connection_disconnected() {
    metrics::counter!("wavecrest_connections_disconnected").increment(1);
    metrics::gauge!("wavecrest_connections_alive").decrement(1.0);
}

pub(crate) fn latency_sample(latency: Duration) {
    metrics::describe_histogram!("wavecrest_latency", metrics::Unit::Nanoseconds, "");
    metrics::histogram!("wavecrest_latency").record(latency.as_nanos() as f64);
}
