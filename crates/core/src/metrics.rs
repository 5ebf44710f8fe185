//! Per-Turn Latency Correlation
//!
//! The voice runtime reports three latency measurements for every user turn,
//! each on its own schedule and in no particular order: end-of-utterance delay,
//! LLM time-to-first-token and TTS time-to-first-byte. `MetricsCorrelator`
//! joins them by speech id and hands each completed turn to a `MetricsSink`
//! exactly once.

use crate::metrics_log::MetricsLogError;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Which of the three per-turn latencies a sample carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// End-of-utterance detection delay.
    Eou,
    /// LLM time-to-first-token.
    Ttft,
    /// TTS time-to-first-byte.
    Ttfb,
}

impl MetricKind {
    pub const ALL: [MetricKind; 3] = [MetricKind::Eou, MetricKind::Ttft, MetricKind::Ttfb];
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Eou => write!(f, "eou"),
            MetricKind::Ttft => write!(f, "ttft"),
            MetricKind::Ttfb => write!(f, "ttfb"),
        }
    }
}

/// One partial latency observation, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub speech_id: String,
    pub kind: MetricKind,
    pub value: f64,
}

impl MetricSample {
    pub fn new(speech_id: impl Into<String>, kind: MetricKind, value: f64) -> Self {
        Self {
            speech_id: speech_id.into(),
            kind,
            value,
        }
    }
}

/// The partial measurements collected so far for one turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnMetrics {
    pub eou_delay: Option<f64>,
    pub ttft: Option<f64>,
    pub ttfb: Option<f64>,
}

impl TurnMetrics {
    fn set(&mut self, kind: MetricKind, value: f64) -> Option<f64> {
        let slot = match kind {
            MetricKind::Eou => &mut self.eou_delay,
            MetricKind::Ttft => &mut self.ttft,
            MetricKind::Ttfb => &mut self.ttfb,
        };
        slot.replace(value)
    }

    /// Returns `(eou, ttft, ttfb)` once every measurement has arrived.
    pub fn complete(&self) -> Option<(f64, f64, f64)> {
        Some((self.eou_delay?, self.ttft?, self.ttfb?))
    }

    pub fn missing(&self) -> Vec<MetricKind> {
        MetricKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                MetricKind::Eou => self.eou_delay.is_none(),
                MetricKind::Ttft => self.ttft.is_none(),
                MetricKind::Ttfb => self.ttfb.is_none(),
            })
            .collect()
    }
}

/// A completed turn, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyRow {
    pub timestamp: DateTime<Local>,
    pub speech_id: String,
    pub eou_delay: f64,
    pub ttft: f64,
    pub ttfb: f64,
    pub total_latency: f64,
}

impl LatencyRow {
    pub fn new(speech_id: String, eou_delay: f64, ttft: f64, ttfb: f64) -> Self {
        Self {
            timestamp: Local::now(),
            speech_id,
            eou_delay,
            ttft,
            ttfb,
            total_latency: eou_delay + ttft + ttfb,
        }
    }

    /// The CSV cells for this row; latencies use three decimals.
    pub fn to_record(&self) -> [String; 6] {
        [
            self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            self.speech_id.clone(),
            format!("{:.3}", self.eou_delay),
            format!("{:.3}", self.ttft),
            format!("{:.3}", self.ttfb),
            format!("{:.3}", self.total_latency),
        ]
    }
}

/// Destination for completed turns.
pub trait MetricsSink: Send + Sync {
    fn append(&self, row: &LatencyRow) -> Result<(), MetricsLogError>;
}

impl<S: MetricsSink + ?Sized> MetricsSink for Arc<S> {
    fn append(&self, row: &LatencyRow) -> Result<(), MetricsLogError> {
        (**self).append(row)
    }
}

/// Bounds on the pending-turn table.
#[derive(Debug, Clone)]
pub struct CorrelatorConfig {
    /// Most turns kept pending at once; the oldest is evicted beyond this.
    pub max_pending: usize,
    /// Pending turns older than this are evicted by `evict_expired`.
    pub max_age: Duration,
    /// How many flushed speech ids are remembered to drop late duplicates.
    pub flushed_memory: usize,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            max_pending: 256,
            max_age: Duration::from_secs(120),
            flushed_memory: 1024,
        }
    }
}

/// What a single `observe` call did.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// Stored; the turn is still waiting on other measurements.
    Pending,
    /// The turn completed and this row was written.
    Completed(LatencyRow),
    /// The turn was already flushed; the sample was dropped.
    Duplicate,
}

#[derive(Debug)]
struct PendingTurn {
    metrics: TurnMetrics,
    first_seen: Instant,
}

/// Joins partial latency samples by speech id.
///
/// Owned by a single consumer (the session loop); it does no locking of its own.
pub struct MetricsCorrelator<S: MetricsSink> {
    sink: S,
    config: CorrelatorConfig,
    pending: HashMap<String, PendingTurn>,
    flushed: HashSet<String>,
    flushed_order: VecDeque<String>,
}

impl<S: MetricsSink> MetricsCorrelator<S> {
    pub fn new(sink: S) -> Self {
        Self::with_config(sink, CorrelatorConfig::default())
    }

    pub fn with_config(sink: S, config: CorrelatorConfig) -> Self {
        Self {
            sink,
            config,
            pending: HashMap::new(),
            flushed: HashSet::new(),
            flushed_order: VecDeque::new(),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, speech_id: &str) -> bool {
        self.pending.contains_key(speech_id)
    }

    pub fn pending(&self, speech_id: &str) -> Option<&TurnMetrics> {
        self.pending.get(speech_id).map(|turn| &turn.metrics)
    }

    pub fn observe(&mut self, sample: MetricSample) -> Result<Observation, MetricsLogError> {
        self.observe_at(sample, Instant::now())
    }

    /// Records `sample` as of `now` and flushes the turn if it is complete.
    ///
    /// A completed turn is removed before the sink is called, so a sink error
    /// never causes the row to be written twice.
    pub fn observe_at(
        &mut self,
        sample: MetricSample,
        now: Instant,
    ) -> Result<Observation, MetricsLogError> {
        let MetricSample {
            speech_id,
            kind,
            value,
        } = sample;

        if self.flushed.contains(&speech_id) {
            warn!(%speech_id, %kind, value, "Dropping metric for an already flushed turn");
            return Ok(Observation::Duplicate);
        }

        self.evict_expired(now);
        if !self.pending.contains_key(&speech_id) && self.pending.len() >= self.config.max_pending {
            self.evict_oldest();
        }

        let turn = self
            .pending
            .entry(speech_id.clone())
            .or_insert_with(|| PendingTurn {
                metrics: TurnMetrics::default(),
                first_seen: now,
            });
        if let Some(previous) = turn.metrics.set(kind, value) {
            debug!(%speech_id, %kind, previous, value, "Metric overwritten");
        }

        let Some((eou, ttft, ttfb)) = turn.metrics.complete() else {
            debug!(%speech_id, %kind, value, "Metric recorded; turn pending");
            return Ok(Observation::Pending);
        };

        self.pending.remove(&speech_id);
        self.remember_flushed(speech_id.clone());

        let row = LatencyRow::new(speech_id, eou, ttft, ttfb);
        self.sink.append(&row)?;
        info!(
            speech_id = %row.speech_id,
            eou_delay = row.eou_delay,
            ttft = row.ttft,
            ttfb = row.ttfb,
            total_latency = row.total_latency,
            "Turn latency logged"
        );
        Ok(Observation::Completed(row))
    }

    /// Drops pending turns first seen more than `max_age` before `now`.
    pub fn evict_expired(&mut self, now: Instant) -> Vec<String> {
        let max_age = self.config.max_age;
        let expired: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, turn)| now.saturating_duration_since(turn.first_seen) > max_age)
            .map(|(id, _)| id.clone())
            .collect();

        for speech_id in &expired {
            if let Some(turn) = self.pending.remove(speech_id) {
                warn!(
                    %speech_id,
                    missing = ?turn.metrics.missing(),
                    "Evicting incomplete turn after max age"
                );
            }
        }
        expired
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .pending
            .iter()
            .min_by_key(|(_, turn)| turn.first_seen)
            .map(|(id, _)| id.clone());

        if let Some(speech_id) = oldest {
            if let Some(turn) = self.pending.remove(&speech_id) {
                warn!(
                    %speech_id,
                    missing = ?turn.metrics.missing(),
                    max_pending = self.config.max_pending,
                    "Pending turn table full; evicting oldest turn"
                );
            }
        }
    }

    fn remember_flushed(&mut self, speech_id: String) {
        if self.config.flushed_memory == 0 {
            return;
        }
        if self.flushed_order.len() >= self.config.flushed_memory {
            if let Some(old) = self.flushed_order.pop_front() {
                self.flushed.remove(&old);
            }
        }
        self.flushed.insert(speech_id.clone());
        self.flushed_order.push_back(speech_id);
    }
}
