// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 snapscribe contributors

//! Write-completion detection by size plateau
//!
//! Filesystem notifications fire when a file appears, not when its last byte
//! lands, so completion is inferred by sampling the size on a fixed interval
//! until two consecutive samples agree on a positive value. The state machine
//! here is pure; the pipeline owns the clock and feeds it samples.

/// Why a poll cycle ended without the file becoming stable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The file no longer exists
    Disappeared,
    /// Reading file metadata failed
    Io,
    /// The size never settled within the attempt budget
    Timeout,
}

/// Outcome of one size observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStep {
    /// Not settled yet, take another sample after the interval
    Reschedule,
    /// Two consecutive positive samples agreed; the write is treated as done
    Stable,
    /// Terminal, no `ready` will be emitted for this cycle
    Aborted(AbortReason),
}

/// A size sample, or why one could not be taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeSample {
    Bytes(u64),
    Missing,
    Unreadable,
}

/// Per-path poll cycle: bounded attempt counter plus the last observed size.
///
/// One cycle exists per path at most; restarting a path replaces the whole
/// value, which is what resets the bookkeeping.
#[derive(Debug)]
pub struct PollCycle {
    last_size: Option<u64>,
    attempt: u32,
    max_attempts: u32,
}

impl PollCycle {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            last_size: None,
            attempt: 0,
            max_attempts,
        }
    }

    /// Record one size sample and decide what happens next.
    ///
    /// An empty file is never stable: writers commonly create the entry first
    /// and stream content in afterwards, so `0 == 0` only means the write has
    /// not started.
    pub fn observe(&mut self, sample: SizeSample) -> PollStep {
        self.attempt += 1;

        let size = match sample {
            SizeSample::Missing => return PollStep::Aborted(AbortReason::Disappeared),
            SizeSample::Unreadable => return PollStep::Aborted(AbortReason::Io),
            SizeSample::Bytes(size) => size,
        };

        if size > 0 && self.last_size == Some(size) {
            return PollStep::Stable;
        }

        self.last_size = Some(size);

        if self.attempt >= self.max_attempts {
            PollStep::Aborted(AbortReason::Timeout)
        } else {
            PollStep::Reschedule
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_then_plateau_becomes_stable_on_second_positive_sample() {
        let mut cycle = PollCycle::new(12);
        assert_eq!(cycle.observe(SizeSample::Bytes(0)), PollStep::Reschedule);
        assert_eq!(cycle.observe(SizeSample::Bytes(500)), PollStep::Reschedule);
        assert_eq!(cycle.observe(SizeSample::Bytes(500)), PollStep::Stable);
        assert_eq!(cycle.attempt(), 3);
    }

    #[test]
    fn empty_file_is_never_stable() {
        let mut cycle = PollCycle::new(3);
        assert_eq!(cycle.observe(SizeSample::Bytes(0)), PollStep::Reschedule);
        assert_eq!(cycle.observe(SizeSample::Bytes(0)), PollStep::Reschedule);
        assert_eq!(
            cycle.observe(SizeSample::Bytes(0)),
            PollStep::Aborted(AbortReason::Timeout)
        );
    }

    #[test]
    fn ever_growing_file_times_out_without_stabilizing() {
        let mut cycle = PollCycle::new(12);
        let mut last = PollStep::Reschedule;
        for i in 1..=12u64 {
            last = cycle.observe(SizeSample::Bytes(i * 1000));
        }
        assert_eq!(last, PollStep::Aborted(AbortReason::Timeout));
    }

    #[test]
    fn missing_file_aborts_immediately() {
        let mut cycle = PollCycle::new(12);
        assert_eq!(cycle.observe(SizeSample::Bytes(100)), PollStep::Reschedule);
        assert_eq!(
            cycle.observe(SizeSample::Missing),
            PollStep::Aborted(AbortReason::Disappeared)
        );
    }

    #[test]
    fn metadata_error_aborts_immediately() {
        let mut cycle = PollCycle::new(12);
        assert_eq!(
            cycle.observe(SizeSample::Unreadable),
            PollStep::Aborted(AbortReason::Io)
        );
    }

    #[test]
    fn stable_wins_on_the_final_allowed_attempt() {
        let mut cycle = PollCycle::new(2);
        assert_eq!(cycle.observe(SizeSample::Bytes(42)), PollStep::Reschedule);
        assert_eq!(cycle.observe(SizeSample::Bytes(42)), PollStep::Stable);
    }

    #[test]
    fn attempt_counter_is_monotone() {
        let mut cycle = PollCycle::new(12);
        for i in 1..=5 {
            cycle.observe(SizeSample::Bytes(i * 10));
            assert_eq!(cycle.attempt(), i as u32);
        }
    }
}
