//! In-process datacache workload driver. Worker threads render frames
//! against configured sections without any I/O in the way.

mod config;
mod metrics;
mod worker;

use crate::config::Config;
use crate::worker::{Blobs, Phase, SharedState, Target};

use clap::Parser;
use datacache::DataCache;
use metriken::{AtomicHistogram, histogram::Histogram};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Parser)]
#[command(name = "datacache-bench")]
#[command(about = "In-process frame-driven datacache benchmark")]
struct Args {
    /// Path to configuration file
    config: PathBuf,
}

fn main() {
    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config.general.log_level);

    if let Err(e) = run(config) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// RUST_LOG takes precedence over the configured level.
fn init_logging(level: &str) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::from_default_env()
    } else {
        tracing_subscriber::EnvFilter::new(level)
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .init();
}

fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    print_config(&config);

    let cache = DataCache::from_config(&config.cache);
    let mut targets = Vec::with_capacity(config.workload.sections.len());
    for workload in &config.workload.sections {
        let section = cache.add_section(&workload.name, Blobs)?;
        info!(section = %workload.name, limits = ?section.limits(), "section ready");
        targets.push(Target { section, workload });
    }

    let shared = SharedState::new();
    let warmup = config.general.warmup;
    let duration = config.general.duration;

    thread::scope(|scope| -> Result<(), Box<dyn std::error::Error>> {
        let mut handles = Vec::with_capacity(config.general.threads);
        for id in 0..config.general.threads {
            let config = &config;
            let targets = &targets;
            let shared = &shared;
            let spawned = thread::Builder::new()
                .name(format!("worker-{id}"))
                .spawn_scoped(scope, move || {
                    worker::run_worker(id, config, targets, shared);
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    // workers already running would keep the scope open
                    shared.set_phase(Phase::Stop);
                    return Err(e.into());
                }
            }
        }

        if warmup.is_zero() {
            shared.set_phase(Phase::Running);
            print_header();
        } else {
            eprintln!("warming up for {warmup:?}...");
        }

        report_loop(&cache, &shared, warmup, duration);

        for handle in handles {
            let _ = handle.join();
        }
        Ok(())
    })?;

    print_summary(&config, &cache);

    if let Some(detail) = config.general.report.detail() {
        cache.output_report(detail);
    }

    Ok(())
}

/// Drive the phase transitions and print one line per second while running.
fn report_loop(cache: &DataCache, shared: &SharedState, warmup: Duration, duration: Duration) {
    let start = Instant::now();
    let report_interval = Duration::from_secs(1);
    let mut current_phase = shared.phase();
    let mut last_report = Instant::now();
    let mut last_frames = 0u64;
    let mut last_lookups = 0u64;
    let mut last_hits = 0u64;
    let mut last_histogram: Option<Histogram> = None;

    loop {
        thread::sleep(Duration::from_millis(100));

        let elapsed = start.elapsed();
        if elapsed >= warmup + duration {
            shared.set_phase(Phase::Stop);
            break;
        }

        if current_phase == Phase::Warmup && elapsed >= warmup {
            shared.set_phase(Phase::Running);
            current_phase = Phase::Running;
            eprintln!("running for {duration:?}...");
            print_header();
            last_report = Instant::now();
            last_frames = metrics::FRAMES.value();
            last_lookups = metrics::LOOKUPS.value();
            last_hits = metrics::HITS.value();
            last_histogram = metrics::FRAME_LATENCY.load();
        }

        if current_phase != Phase::Running || last_report.elapsed() < report_interval {
            continue;
        }

        let elapsed_secs = last_report.elapsed().as_secs_f64();
        let frames = metrics::FRAMES.value();
        let lookups = metrics::LOOKUPS.value();
        let hits = metrics::HITS.value();

        let frame_rate = (frames - last_frames) as f64 / elapsed_secs;
        let lookup_rate = (lookups - last_lookups) as f64 / elapsed_secs;
        let delta_lookups = lookups - last_lookups;
        let hit_pct = if delta_lookups > 0 {
            ((hits - last_hits) as f64 / delta_lookups as f64) * 100.0
        } else {
            0.0
        };
        last_frames = frames;
        last_lookups = lookups;
        last_hits = hits;

        // interval percentiles via wrapping_sub
        let current_histogram = metrics::FRAME_LATENCY.load();
        let (p50, p99) = match (&current_histogram, &last_histogram) {
            (Some(current), Some(previous)) => match current.wrapping_sub(previous) {
                Ok(delta) => (
                    percentile_from_histogram(&delta, 50.0) / 1000.0,
                    percentile_from_histogram(&delta, 99.0) / 1000.0,
                ),
                Err(_) => (0.0, 0.0),
            },
            (Some(current), None) => (
                percentile_from_histogram(current, 50.0) / 1000.0,
                percentile_from_histogram(current, 99.0) / 1000.0,
            ),
            _ => (0.0, 0.0),
        };
        last_histogram = current_histogram;

        let status = cache.status();
        println!(
            "{:>10.0} {:>12.0} {:>7.1}% {:>10.1} {:>10.1} {:>10} {:>12}",
            frame_rate, lookup_rate, hit_pct, p50, p99, status.items, status.bytes,
        );

        last_report = Instant::now();
    }
}

fn print_config(config: &Config) {
    eprintln!("datacache-bench configuration:");
    eprintln!("  threads:    {}", config.general.threads);
    eprintln!("  duration:   {:?}", config.general.duration);
    eprintln!("  warmup:     {:?}", config.general.warmup);
    eprintln!("  max_bytes:  {}", format_limit(config.cache.max_bytes));
    eprintln!("  max_items:  {}", format_limit(config.cache.max_items));
    eprintln!("  per frame:  {} lookups", config.workload.lookups_per_frame);
    for section in &config.workload.sections {
        let settings = config.cache.section(&section.name);
        eprintln!(
            "  section:    {} keyspace={} weight={} size={}..={} max_bytes={} index={:?}",
            section.name,
            section.keyspace,
            section.weight,
            section.min_size,
            section.max_size,
            format_limit(settings.limits.max_bytes),
            settings.index,
        );
    }
    eprintln!();
}

fn format_limit(value: usize) -> String {
    if value == usize::MAX {
        "unlimited".to_string()
    } else {
        value.to_string()
    }
}

fn print_header() {
    println!(
        "{:>10} {:>12} {:>8} {:>10} {:>10} {:>10} {:>12}",
        "frames/s", "lookups/s", "hit%", "p50(us)", "p99(us)", "items", "bytes",
    );
    println!("{}", "-".repeat(78));
}

fn print_summary(config: &Config, cache: &DataCache) {
    let frames = metrics::FRAMES.value();
    let lookups = metrics::LOOKUPS.value();
    let hits = metrics::HITS.value();
    let misses = metrics::MISSES.value();
    let stale = metrics::STALE.value();
    let errors = metrics::CREATE_ERRORS.value();

    let hit_pct = if lookups > 0 {
        (hits as f64 / lookups as f64) * 100.0
    } else {
        0.0
    };

    let elapsed = config.general.duration.as_secs_f64();
    let (frame_rate, lookup_rate) = if elapsed > 0.0 {
        (frames as f64 / elapsed, lookups as f64 / elapsed)
    } else {
        (0.0, 0.0)
    };

    let status = cache.status();

    eprintln!();
    eprintln!("=== Final Summary ===");
    eprintln!("  frames:         {frames} ({frame_rate:.0}/s)");
    eprintln!("  lookups:        {lookups} ({lookup_rate:.0}/s)");
    eprintln!("  hit rate:       {hit_pct:.1}% (misses: {misses})");
    eprintln!("  create errors:  {errors}");
    eprintln!("  stale handles:  {stale}");
    eprintln!(
        "  cached:         {} items / {} bytes (locked {} items)",
        status.items, status.bytes, status.locked_items,
    );
    eprintln!();

    print_latency_summary("FRAME", &metrics::FRAME_LATENCY);
    print_latency_summary("LOOKUP", &metrics::LOOKUP_LATENCY);
}

fn print_latency_summary(label: &str, hist: &AtomicHistogram) {
    let Some(snapshot) = hist.load() else {
        return;
    };
    let p50 = percentile_from_histogram(&snapshot, 50.0) / 1000.0;
    let p90 = percentile_from_histogram(&snapshot, 90.0) / 1000.0;
    let p99 = percentile_from_histogram(&snapshot, 99.0) / 1000.0;
    let p999 = percentile_from_histogram(&snapshot, 99.9) / 1000.0;
    let max = percentile_from_histogram(&snapshot, 100.0) / 1000.0;

    eprintln!(
        "  {label:<6} latency (us): p50={p50:.1}  p90={p90:.1}  p99={p99:.1}  p999={p999:.1}  max={max:.1}",
    );
}

fn percentile_from_histogram(hist: &Histogram, p: f64) -> f64 {
    if let Ok(Some(results)) = hist.percentiles(&[p])
        && let Some((_pct, bucket)) = results.first()
    {
        return bucket.end() as f64;
    }
    0.0
}
