// src/streaming.rs
//! Streaming prediction bookkeeping.
//!
//! Each material keeps one [`StreamingPredictionZone`] per update kind. Within
//! a streaming round the zone only tightens its minimum mip factor; the first
//! request of a new round flushes one precache request to the backend and
//! starts accumulating again. That caps backend precache calls at one per
//! material, per kind, per round.

use std::sync::atomic::{AtomicI32, Ordering};

/// Number of prediction zones a texture tracks residency for.
pub const MAX_STREAM_PREDICTION_ZONES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    /// Regular per-frame traversal.
    Incremental,
    /// Forced full-scene update.
    Full,
}

impl UpdateKind {
    #[inline]
    pub fn from_full_update(full_update: bool) -> Self {
        if full_update {
            UpdateKind::Full
        } else {
            UpdateKind::Incremental
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        match self {
            UpdateKind::Incremental => 0,
            UpdateKind::Full => 1,
        }
    }
}

/// What the backend should be asked to precache at a round boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrecacheFlush {
    pub mip_factor: f32,
    pub high_priority: bool,
    /// The value was accumulated over the whole previous round rather than
    /// taken from the single request that crossed the boundary.
    pub accumulated: bool,
}

/// Per-material, per-kind accumulation state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamingPredictionZone {
    /// Smaller means higher resolution is needed.
    pub min_mip_factor: f32,
    pub high_priority: bool,
    /// `None` until the first request.
    pub round_id: Option<i32>,
}

impl Default for StreamingPredictionZone {
    fn default() -> Self {
        Self {
            min_mip_factor: f32::INFINITY,
            high_priority: false,
            round_id: None,
        }
    }
}

impl StreamingPredictionZone {
    /// Fold one request into the zone. Returns the request to send when
    /// `current_round` differs from the zone's round.
    pub fn record(
        &mut self,
        mip_factor: f32,
        high_priority: bool,
        current_round: i32,
    ) -> Option<PrecacheFlush> {
        self.min_mip_factor = self.min_mip_factor.min(mip_factor);
        self.high_priority |= high_priority;

        if self.round_id == Some(current_round) {
            return None;
        }

        let flush = if self.round_id == Some(current_round.wrapping_sub(1)) {
            PrecacheFlush {
                mip_factor: self.min_mip_factor,
                high_priority: self.high_priority,
                accumulated: true,
            }
        } else {
            // no valid history for the previous round
            PrecacheFlush {
                mip_factor,
                high_priority,
                accumulated: false,
            }
        };

        self.round_id = Some(current_round);
        self.min_mip_factor = mip_factor;
        self.high_priority = high_priority;
        Some(flush)
    }
}

/// Read side of the object manager's streaming round counters.
pub trait StreamingRounds: Send + Sync {
    fn round_id(&self, kind: UpdateKind) -> i32;
}

/// Atomic round counters, advanced by whoever drives streaming updates.
#[derive(Debug, Default)]
pub struct RoundCounters {
    incremental: AtomicI32,
    full: AtomicI32,
}

impl RoundCounters {
    pub fn new(incremental: i32, full: i32) -> Self {
        Self {
            incremental: AtomicI32::new(incremental),
            full: AtomicI32::new(full),
        }
    }

    fn counter(&self, kind: UpdateKind) -> &AtomicI32 {
        match kind {
            UpdateKind::Incremental => &self.incremental,
            UpdateKind::Full => &self.full,
        }
    }

    /// Start the next round; returns the new id.
    pub fn advance(&self, kind: UpdateKind) -> i32 {
        self.counter(kind).fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn set(&self, kind: UpdateKind, round: i32) {
        self.counter(kind).store(round, Ordering::Release);
    }
}

impl StreamingRounds for RoundCounters {
    fn round_id(&self, kind: UpdateKind) -> i32 {
        self.counter(kind).load(Ordering::Acquire)
    }
}
