//! Adaptive grain control for the special-leaves sieve.
//!
//! Most special leaves live in the first segments, so the orchestrator
//! starts with a small segment size and one segment per thread, then grows
//! both between iterations based on the measured per-thread wall times:
//! balanced-and-fast iterations coarsen the grain, imbalanced ones shrink
//! the segments-per-thread count so the scheduler can even the load out.

/// Segment sizes are bounded by the cache: below the floor the per-segment
/// overhead dominates, above the ceiling the bit sieve and counters fall
/// out of L2.
const MAX_SEGMENT_SIZE: i64 = 1 << 22;

/// Per-iteration wall time the controller steers toward, in seconds.
const TARGET_SECONDS: f64 = 0.5;

/// Relative standard deviation below which an iteration counts as
/// balanced, and above which the grain is too coarse.
const RSD_BALANCED: f64 = 0.10;
const RSD_IMBALANCED: f64 = 0.25;

pub struct S2LoadBalancer {
    min_segment_size: i64,
    limit: i64,
    rsd: f64,
}

impl S2LoadBalancer {
    pub fn new(limit: i64) -> S2LoadBalancer {
        let sqrt_limit = num_integer::Roots::sqrt(&limit.max(1));
        let min_segment_size = ((sqrt_limit as u64).next_power_of_two() as i64 / 4).max(1 << 9);
        S2LoadBalancer {
            min_segment_size: min_segment_size.min(MAX_SEGMENT_SIZE),
            limit,
            rsd: 0.0,
        }
    }

    pub fn min_segment_size(&self) -> i64 {
        self.min_segment_size
    }

    /// Relative standard deviation of the last iteration's thread times.
    pub fn rsd(&self) -> f64 {
        self.rsd
    }

    /// Adjust (segment_size, segments_per_thread) from the measured
    /// per-thread timings. Never shrinks the segment size below the
    /// largest value it has reached.
    pub fn update(
        &mut self,
        low: i64,
        segment_size: &mut i64,
        segments_per_thread: &mut i64,
        timings: &[f64],
    ) {
        let mean = timings.iter().sum::<f64>() / timings.len().max(1) as f64;
        self.rsd = if mean > 0.0 {
            let var = timings
                .iter()
                .map(|t| (t - mean) * (t - mean))
                .sum::<f64>()
                / timings.len() as f64;
            var.sqrt() / mean
        } else {
            0.0
        };

        let progress = low as f64 / self.limit as f64;
        log::debug!(
            "s2_sieve balancer: progress {:.1}%, mean {:.3}s, rsd {:.3}",
            progress * 100.0,
            mean,
            self.rsd
        );

        if self.rsd < RSD_BALANCED && mean < TARGET_SECONDS {
            // Evenly loaded and cheap: coarsen.
            if *segment_size < MAX_SEGMENT_SIZE {
                *segment_size = (*segment_size * 2).min(MAX_SEGMENT_SIZE);
            } else {
                *segments_per_thread *= 2;
            }
        } else if self.rsd > RSD_IMBALANCED && *segments_per_thread > 1 {
            // Uneven: smaller work units rebalance the tail.
            *segments_per_thread /= 2;
        }

        debug_assert!(*segment_size >= self.min_segment_size);
    }
}
