// src/frame.rs
//! Frame clock and world sector notifications.

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

/// Terrain or vis-area system whose precompiled sectors depend on material
/// render flags.
pub trait WorldSectors: Send + Sync {
    fn mark_all_sectors_uncompiled(&self);
}

/// Current frame id plus the "once per frame" latch for sector invalidation.
#[derive(Debug)]
pub struct FrameClock {
    frame: AtomicU32,
    last_invalidation: AtomicI64,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self {
            frame: AtomicU32::new(0),
            last_invalidation: AtomicI64::new(-1),
        }
    }
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn begin_frame(&self, frame_id: u32) {
        self.frame.store(frame_id, Ordering::Release);
    }

    #[inline]
    pub fn current_frame(&self) -> u32 {
        self.frame.load(Ordering::Acquire)
    }

    /// True for exactly one caller per frame.
    pub fn claim_sector_invalidation(&self) -> bool {
        let frame = i64::from(self.current_frame());
        self.last_invalidation.swap(frame, Ordering::AcqRel) != frame
    }
}
