use std::time::{Duration, Instant};

/// Runs `f`, logging its name and wall-clock duration at debug level.
#[inline]
pub fn timed<R>(name: &str, f: impl FnOnce() -> R) -> R {
    log::debug!("{} ...", name);
    let (r, elapsed) = measure(f);
    log::debug!("... {} took {:?}", name, elapsed);
    r
}

/// Runs `f` and returns its result together with the elapsed wall-clock time.
#[inline]
pub fn measure<R>(f: impl FnOnce() -> R) -> (R, Duration) {
    let t = Instant::now();
    let r = f();
    (r, t.elapsed())
}

pub fn as_millis_f64(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1_000.0
}
