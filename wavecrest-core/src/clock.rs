use std::sync::OnceLock;
use std::time::Instant;

static ORIGIN: OnceLock<Instant> = OnceLock::new();

/// Nanoseconds elapsed on the process-local monotonic clock.
///
/// The origin is fixed the first time this is called, so values are only
/// comparable within one process. Sender and receiver of a synthetic event
/// live in the same process, which is what makes the one-way measurement
/// possible without wall-clock synchronisation.
pub fn monotonic_nanos() -> u64 {
    let origin = ORIGIN.get_or_init(Instant::now);
    u64::try_from(origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
}

/// Signed difference `received - sent`, in nanoseconds.
pub fn elapsed_between(sent_nanos: u64, received_nanos: u64) -> i128 {
    received_nanos as i128 - sent_nanos as i128
}
