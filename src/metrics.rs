//! Stage timings for the check pipeline. The stages are fixed, so the
//! registry is a flat array of sample rings rather than a keyed map;
//! summaries report p50/p95/p99 in microseconds per stage.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

const RING_CAPACITY: usize = 1024;

/// The timed stages of a check sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Capture,
    Recognition,
    Correction,
    Search,
    CheckTotal,
}

impl Stage {
    const ALL: [Stage; 5] = [
        Stage::Capture,
        Stage::Recognition,
        Stage::Correction,
        Stage::Search,
        Stage::CheckTotal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Capture => "t_capture_done",
            Stage::Recognition => "t_ocr_done",
            Stage::Correction => "t_correct_done",
            Stage::Search => "t_search_done",
            Stage::CheckTotal => "t_check_total",
        }
    }
}

/// A span measuring one stage from creation to explicit finish.
pub struct TimingSpan {
    stage: Stage,
    start: Instant,
    registry: Arc<MetricsRegistry>,
}

impl TimingSpan {
    /// End the span, recording the elapsed duration.
    pub fn finish(self) {
        let elapsed_us = self.start.elapsed().as_micros() as f64;
        self.registry.record(self.stage, elapsed_us);
    }
}

/// Keeps the most recent `RING_CAPACITY` samples for one stage.
struct SampleRing {
    samples: Vec<f64>,
    next: usize,
    filled: bool,
}

impl SampleRing {
    fn new() -> Self {
        Self {
            samples: Vec::with_capacity(RING_CAPACITY),
            next: 0,
            filled: false,
        }
    }

    fn push(&mut self, value: f64) {
        if self.filled {
            self.samples[self.next] = value;
        } else {
            self.samples.push(value);
            self.filled = self.samples.len() == RING_CAPACITY;
        }
        self.next = (self.next + 1) % RING_CAPACITY;
    }

    fn len(&self) -> usize {
        self.samples.len()
    }

    fn percentile(&self, p: f64) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let mut sorted = self.samples.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let idx = ((p / 100.0) * (sorted.len() as f64 - 1.0)).round() as usize;
        sorted[idx.min(sorted.len() - 1)]
    }
}

/// One sample ring per pipeline stage.
pub struct MetricsRegistry {
    rings: [Mutex<SampleRing>; 5],
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            rings: std::array::from_fn(|_| Mutex::new(SampleRing::new())),
        }
    }

    /// Record one sample (in microseconds) for a stage.
    pub fn record(&self, stage: Stage, value_us: f64) {
        self.rings[stage as usize].lock().push(value_us);
        tracing::debug!(metric = stage.as_str(), value_us = value_us, "metric_recorded");
    }

    /// Start a timing span that records on finish.
    pub fn span(self: &Arc<Self>, stage: Stage) -> TimingSpan {
        TimingSpan {
            stage,
            start: Instant::now(),
            registry: Arc::clone(self),
        }
    }

    /// Per-stage p50/p95/p99 for every stage with at least one sample.
    pub fn summary(&self) -> BTreeMap<&'static str, StageSummary> {
        let mut out = BTreeMap::new();
        for stage in Stage::ALL {
            let ring = self.rings[stage as usize].lock();
            if ring.len() == 0 {
                continue;
            }
            out.insert(
                stage.as_str(),
                StageSummary {
                    p50_us: ring.percentile(50.0),
                    p95_us: ring.percentile(95.0),
                    p99_us: ring.percentile(99.0),
                    count: ring.len(),
                },
            );
        }
        out
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StageSummary {
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub count: usize,
}
