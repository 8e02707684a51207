//! Worker thread: renders "frames" against the cache.
//!
//! Each frame opens frame locking on every section, looks up a batch of
//! tags (creating the item on a miss), reads each one through `get` so it
//! stays pinned for the rest of the frame, and then closes the frame.

use crate::config::{Config, SectionWorkload};
use crate::metrics;

use datacache::{AddFlags, CacheClient, ClientTag, FrameScope, Section};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

/// Test phase, controlled by main thread and read by workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    /// Run the workload but don't record metrics.
    Warmup = 0,
    /// Main measurement phase.
    Running = 1,
    /// Workers should exit.
    Stop = 2,
}

impl Phase {
    #[inline]
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Phase::Warmup,
            1 => Phase::Running,
            _ => Phase::Stop,
        }
    }
}

/// Shared state between main thread and workers.
pub struct SharedState {
    phase: AtomicU8,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(Phase::Warmup as u8),
        }
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn set_phase(&self, phase: Phase) {
        self.phase.store(phase as u8, Ordering::Release);
    }
}

/// Synthetic resource: a zeroed byte buffer of the requested length.
pub struct Blobs;

impl CacheClient for Blobs {
    type Item = Box<[u8]>;
    type Data = usize;

    fn create(&self, tag: ClientTag, len: usize) -> Option<Box<[u8]>> {
        let mut blob = vec![0u8; len].into_boxed_slice();
        if let Some(first) = blob.first_mut() {
            *first = tag.as_raw() as u8;
        }
        Some(blob)
    }

    fn estimated_size(&self, len: &usize) -> usize {
        *len
    }

    fn item_name(&self, tag: ClientTag, item: &Box<[u8]>) -> Option<String> {
        Some(format!("blob {:#x} ({} bytes)", tag.as_raw(), item.len()))
    }
}

/// A section together with its share of the workload.
pub struct Target<'a> {
    pub section: Section<Blobs>,
    pub workload: &'a SectionWorkload,
}

/// Run a single worker thread until the phase becomes `Stop`.
pub fn run_worker(id: usize, config: &Config, targets: &[Target<'_>], shared: &SharedState) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.workload.seed + id as u64);

    // cumulative weights for picking a section per lookup
    let mut thresholds = Vec::with_capacity(targets.len());
    let mut total = 0u32;
    for target in targets {
        total += target.workload.weight;
        thresholds.push(total);
    }

    loop {
        let phase = shared.phase();
        if phase == Phase::Stop {
            break;
        }
        let recording = phase == Phase::Running;

        let start = Instant::now();
        let frames: Vec<FrameScope<'_, Blobs>> =
            targets.iter().map(|t| t.section.frame_scope()).collect();

        for _ in 0..config.workload.lookups_per_frame {
            let roll = rng.random_range(0..total);
            let index = thresholds.partition_point(|&t| t <= roll);
            let Some(target) = targets.get(index) else {
                continue;
            };
            lookup(&mut rng, target, recording);
        }

        drop(frames);

        if recording {
            metrics::FRAMES.increment();
            let _ = metrics::FRAME_LATENCY.increment(start.elapsed().as_nanos() as u64);
        }
    }
}

/// Find-or-create one random tag and read it inside the open frame.
fn lookup(rng: &mut Xoshiro256PlusPlus, target: &Target<'_>, recording: bool) {
    let workload = target.workload;
    let tag = ClientTag::new(rng.random_range(0..workload.keyspace));

    let start = Instant::now();
    let (handle, hit) = match target.section.find(tag) {
        Some(handle) => (Some(handle), true),
        None => {
            let len = rng.random_range(workload.min_size..=workload.max_size);
            match target.section.find_or_create(tag, len, AddFlags::empty()) {
                Ok(handle) => (Some(handle), false),
                Err(_) => {
                    if recording {
                        metrics::CREATE_ERRORS.increment();
                    }
                    (None, false)
                }
            }
        }
    };

    let read = handle.and_then(|handle| target.section.get(handle));
    let elapsed_ns = start.elapsed().as_nanos() as u64;

    if recording {
        metrics::LOOKUPS.increment();
        if hit {
            metrics::HITS.increment();
        } else {
            metrics::MISSES.increment();
        }
        if handle.is_some() && read.is_none() {
            metrics::STALE.increment();
        }
        let _ = metrics::LOOKUP_LATENCY.increment(elapsed_ns);
    }
}
