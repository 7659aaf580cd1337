/// Append-only playback timeline for gapless scheduling of streamed audio
///
/// Incoming audio fragments must play back to back, in arrival order, without
/// gaps or overlap, even though they arrive at irregular network intervals.
/// The timeline keeps a monotonic cursor: each accepted fragment starts at
/// max(playback clock, cursor) and advances the cursor by its own duration.
/// An interruption cancels every pending fragment and rewinds the cursor to
/// zero in one step.

use std::collections::HashSet;

/// A fragment accepted onto the timeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledFragment {
    pub id: u64,
    /// Seconds on the playback clock at which this fragment starts
    pub start: f64,
    /// Fragment length in seconds
    pub duration: f64,
}

pub struct Timeline {
    /// End time of the last scheduled fragment
    next_start: f64,
    /// Fragments scheduled but not yet finished playing
    pending: HashSet<u64>,
    next_id: u64,
}

impl Timeline {
    pub fn new() -> Self {
        Timeline {
            next_start: 0.0,
            pending: HashSet::new(),
            next_id: 1,
        }
    }

    /// Accept a fragment of `duration` seconds, given the current playback
    /// clock, and return when it should start.
    ///
    /// The clock only matters when it has run past the cursor (playback went
    /// idle); otherwise fragments chain gaplessly off the previous one.
    pub fn schedule(&mut self, clock: f64, duration: f64) -> ScheduledFragment {
        let start = self.next_start.max(clock);
        self.next_start = start + duration;

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.pending.insert(id);

        ScheduledFragment { id, start, duration }
    }

    /// Mark a fragment as finished playing
    pub fn complete(&mut self, id: u64) {
        self.pending.remove(&id);
    }

    /// Cancel everything: returns the fragments that must be stopped, clears
    /// the pending set and rewinds the cursor to zero.
    pub fn interrupt(&mut self) -> Vec<u64> {
        let cancelled: Vec<u64> = self.pending.drain().collect();
        self.next_start = 0.0;
        cancelled
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// End time of the last scheduled fragment (zero after an interruption)
    pub fn cursor(&self) -> f64 {
        self.next_start
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragments_chain_gaplessly() {
        let mut timeline = Timeline::new();

        let a = timeline.schedule(0.0, 0.5);
        let b = timeline.schedule(0.0, 0.25);
        let c = timeline.schedule(0.0, 1.0);

        assert_eq!(a.start, 0.0);
        assert_eq!(b.start, 0.5);
        assert_eq!(c.start, 0.75);
        assert_eq!(timeline.cursor(), 1.75);
    }

    #[test]
    fn test_nth_start_is_sum_of_prior_durations() {
        let durations = [0.1, 0.3, 0.2, 0.05, 0.4];
        let mut timeline = Timeline::new();

        let mut expected = 0.0;
        for d in durations {
            let frag = timeline.schedule(0.0, d);
            assert!((frag.start - expected).abs() < 1e-9);
            expected += d;
        }
    }

    #[test]
    fn test_clock_past_cursor_restarts_at_clock() {
        let mut timeline = Timeline::new();

        timeline.schedule(0.0, 0.5);
        // Playback went idle: the clock ran past the end of the last fragment
        let frag = timeline.schedule(2.0, 0.5);

        assert_eq!(frag.start, 2.0);
        assert_eq!(timeline.cursor(), 2.5);
    }

    #[test]
    fn test_interrupt_clears_pending_and_rewinds_cursor() {
        let mut timeline = Timeline::new();

        let a = timeline.schedule(0.0, 0.5);
        let b = timeline.schedule(0.0, 0.5);
        assert_eq!(timeline.pending_count(), 2);

        let mut cancelled = timeline.interrupt();
        cancelled.sort_unstable();

        assert_eq!(cancelled, vec![a.id, b.id]);
        assert_eq!(timeline.pending_count(), 0);
        assert_eq!(timeline.cursor(), 0.0);
    }

    #[test]
    fn test_scheduling_resumes_from_zero_after_interrupt() {
        let mut timeline = Timeline::new();

        timeline.schedule(0.0, 1.0);
        timeline.interrupt();

        let frag = timeline.schedule(0.0, 0.5);
        assert_eq!(frag.start, 0.0);
    }

    #[test]
    fn test_completed_fragments_leave_pending_set() {
        let mut timeline = Timeline::new();

        let a = timeline.schedule(0.0, 0.5);
        let b = timeline.schedule(0.0, 0.5);

        timeline.complete(a.id);
        assert_eq!(timeline.pending_count(), 1);

        // Interruption only cancels what is still pending
        assert_eq!(timeline.interrupt(), vec![b.id]);
    }
}
