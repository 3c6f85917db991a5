//! Hits-threshold checker and the lock-free min-competitive-score
//! accumulator (C9).

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

/// Non-exhaustive in the host engine's actual enum; this crate only needs
/// the one collection mode the hybrid collectors (C10) use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreMode {
    TopScores,
}

/// Tracks how many hits have been collected and exposes whether the
/// configured threshold has been crossed.
pub struct HitsThresholdChecker {
    threshold: usize,
    count: AtomicUsize,
}

impl HitsThresholdChecker {
    /// `threshold` must satisfy `0 <= threshold < i32::MAX`.
    pub fn new(threshold: usize) -> Self {
        assert!(threshold < i32::MAX as usize, "threshold out of range");
        Self {
            threshold,
            count: AtomicUsize::new(0),
        }
    }

    pub fn increment_hit_count(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hit_count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    pub fn is_threshold_reached(&self) -> bool {
        self.hit_count() > self.threshold
    }

    pub fn score_mode(&self) -> ScoreMode {
        ScoreMode::TopScores
    }
}

/// Periodic sampling interval collectors use to decide when to lift the
/// scorer's minimum competitive score: every `SAMPLE_MASK + 1` collected
/// hits.
pub const SAMPLE_MASK: usize = (1 << 10) - 1;

/// Packs `(score, doc_base)` into one `i64` so the running maximum can be
/// maintained lock-free via compare-and-swap: score bits in the high 32
/// bits, `u32::MAX - doc_base` in the low 32 bits. The accumulator keeps
/// whichever packed value is numerically larger, so storing the doc base
/// inverted makes a tie break toward the smaller `doc_base`.
fn pack(score: f32, doc_base: u32) -> i64 {
    let score_bits = score.to_bits() as i64;
    let doc_key = (u32::MAX - doc_base) as i64;
    (score_bits << 32) | (doc_key & 0xFFFF_FFFF)
}

fn unpack(packed: i64) -> (f32, u32) {
    let score_bits = ((packed >> 32) & 0xFFFF_FFFF) as u32;
    let doc_key = (packed & 0xFFFF_FFFF) as u32;
    (f32::from_bits(score_bits), u32::MAX - doc_key)
}

/// Shared across all segments of one query; a rising floor that scorers
/// consult to decide whether a candidate can possibly make the current
/// top-k.
pub struct MinCompetitiveScore {
    packed: AtomicI64,
}

impl Default for MinCompetitiveScore {
    fn default() -> Self {
        Self::new()
    }
}

impl MinCompetitiveScore {
    pub fn new() -> Self {
        Self {
            packed: AtomicI64::new(pack(0.0, u32::MAX)),
        }
    }

    /// Lock-free maximum update: compare-and-swap loop that retains the
    /// larger packed value (higher score, or equal score with smaller
    /// `doc_base`).
    pub fn update(&self, score: f32, doc_base: u32) {
        let candidate = pack(score, doc_base);
        let mut current = self.packed.load(Ordering::Acquire);
        loop {
            if candidate <= current {
                return;
            }
            match self.packed.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    pub fn current(&self) -> (f32, u32) {
        unpack(self.packed.load(Ordering::Acquire))
    }

    pub fn score(&self) -> f32 {
        self.current().0
    }
}
