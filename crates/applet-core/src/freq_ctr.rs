//! Sliding-period frequency counter
//!
//! Counts events in the current period and keeps the previous period's
//! total. Reading the rate weighs the previous period by the fraction of the
//! current period still remaining, which gives a smooth estimate without
//! storing per-event timestamps.

/// Per-appctx invocation counter
///
/// All fields are zero for a freshly created appctx. `curr_tick` is the
/// millisecond tick at which the current period started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallRate {
    pub curr_tick: u32,
    pub curr_ctr: u32,
    pub prev_ctr: u32,
}

impl CallRate {
    pub const fn new() -> Self {
        Self {
            curr_tick: 0,
            curr_ctr: 0,
            prev_ctr: 0,
        }
    }

    #[inline]
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.curr_tick == 0 && self.curr_ctr == 0 && self.prev_ctr == 0
    }

    /// Account `inc` events at `now_ms` and return the current period count
    ///
    /// When one or more periods have elapsed the counters rotate; if more than
    /// a whole period went by without any event the previous count is zero.
    pub fn update(&mut self, now_ms: u32, period_ms: u32, inc: u32) -> u32 {
        let period = period_ms.max(1);
        let elapsed = now_ms.wrapping_sub(self.curr_tick);

        if elapsed >= period {
            self.prev_ctr = if elapsed / period >= 2 { 0 } else { self.curr_ctr };
            self.curr_ctr = 0;
            self.curr_tick = now_ms.wrapping_sub(elapsed % period);
        }

        self.curr_ctr = self.curr_ctr.saturating_add(inc);
        self.curr_ctr
    }

    /// Estimated number of events over the last period ending at `now_ms`
    pub fn read(&self, now_ms: u32, period_ms: u32) -> u32 {
        let period = period_ms.max(1);
        let elapsed = now_ms.wrapping_sub(self.curr_tick);

        let (curr, prev, into) = match elapsed / period {
            0 => (self.curr_ctr, self.prev_ctr, elapsed),
            1 => (0, self.curr_ctr, elapsed - period),
            _ => return 0,
        };

        let remain = (period - into) as u64;
        let weighted = (prev as u64 * remain) / period as u64;
        curr.saturating_add(weighted as u32)
    }
}
