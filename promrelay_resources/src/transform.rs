//! Stateless binary transforms over consecutive datapoints.
//!
//! These operate on adjacent samples of a single series and are unrelated to
//! the forwarding pipeline. All of them assume timestamps are monotonically
//! increasing and values non-decreasing; when either assumption is violated
//! they return `None`.

use crate::query::Datapoint;

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Computes the per-second rate between consecutive datapoints, taking the
/// time interval between them into account. NaN values are skipped.
pub fn per_second(prev: Datapoint, curr: Datapoint) -> Option<Datapoint> {
    if prev.timestamp_nanos >= curr.timestamp_nanos || prev.value.is_nan() || curr.value.is_nan() {
        return None;
    }
    let diff = curr.value - prev.value;
    if diff < 0.0 {
        return None;
    }
    let rate = diff * NANOS_PER_SECOND / (curr.timestamp_nanos - prev.timestamp_nanos) as f64;
    Some(Datapoint {
        timestamp_nanos: curr.timestamp_nanos,
        value: rate,
    })
}

/// Computes the difference between consecutive datapoints. Unlike
/// [`per_second`] it does not account for the time interval between the
/// values. A NaN previous value is treated as 0.
pub fn increase(mut prev: Datapoint, curr: Datapoint) -> Option<Datapoint> {
    if prev.timestamp_nanos >= curr.timestamp_nanos {
        return None;
    }
    if curr.value.is_nan() {
        return None;
    }
    if prev.value.is_nan() {
        prev.value = 0.0;
    }
    let diff = curr.value - prev.value;
    if diff < 0.0 {
        return None;
    }
    Some(Datapoint {
        timestamp_nanos: curr.timestamp_nanos,
        value: diff,
    })
}

/// Like [`increase`], except a NaN previous value is treated as the current
/// value, yielding an increase of zero instead of the full counter value.
pub fn increase_v2(mut prev: Datapoint, curr: Datapoint) -> Option<Datapoint> {
    if prev.value.is_nan() {
        prev.value = curr.value;
    }
    increase(prev, curr)
}
