//! Workload driver metrics.

use metriken::{AtomicHistogram, Counter, metric};

#[metric(name = "bench_frames", description = "Frames completed")]
pub static FRAMES: Counter = Counter::new();

#[metric(name = "bench_lookups", description = "Tags looked up")]
pub static LOOKUPS: Counter = Counter::new();

#[metric(name = "bench_hits", description = "Lookups that found a cached item")]
pub static HITS: Counter = Counter::new();

#[metric(name = "bench_misses", description = "Lookups that had to create the item")]
pub static MISSES: Counter = Counter::new();

#[metric(name = "bench_create_errors", description = "Failed creates")]
pub static CREATE_ERRORS: Counter = Counter::new();

#[metric(
    name = "bench_evicted_in_frame",
    description = "Handles that went stale between find and get"
)]
pub static STALE: Counter = Counter::new();

#[metric(
    name = "bench_frame_latency",
    description = "Frame latency histogram (nanoseconds)"
)]
pub static FRAME_LATENCY: AtomicHistogram = AtomicHistogram::new(7, 64);

#[metric(
    name = "bench_lookup_latency",
    description = "Find-or-create latency histogram (nanoseconds)"
)]
pub static LOOKUP_LATENCY: AtomicHistogram = AtomicHistogram::new(7, 64);
