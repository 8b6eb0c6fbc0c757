//! Livelock detection
//!
//! An applet that keeps asking to run while its call rate sits at the limit
//! for more than one period is almost certainly spinning without making
//! progress. The watchdog only decides; the dispatcher reports and, under
//! `LivelockPolicy::Kill`, tears the appctx down.

use applet_core::CallRate;

use crate::applet::AppletStatus;
use crate::config::{AppletConfig, LivelockPolicy};

#[derive(Debug, Clone, Copy)]
pub struct Watchdog {
    limit: u32,
    period_ms: u32,
    policy: LivelockPolicy,
}

impl Watchdog {
    pub fn new(limit: u32, period_ms: u32, policy: LivelockPolicy) -> Self {
        Self {
            limit,
            period_ms: period_ms.max(1),
            policy,
        }
    }

    pub fn from_config(config: &AppletConfig) -> Self {
        Self::new(
            config.call_rate_limit,
            config.call_rate_period_ms,
            config.livelock_policy,
        )
    }

    #[inline]
    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }

    #[inline]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    #[inline]
    pub fn policy(&self) -> LivelockPolicy {
        self.policy
    }

    /// Check a run that just completed
    ///
    /// `calls` is the current-period count returned by `CallRate::update`.
    /// Returns true when the applet looks stuck: it hit the limit, the
    /// previous period was busy as well, and it still claims more work.
    pub fn is_looping(&self, calls: u32, rate: &CallRate, status: AppletStatus) -> bool {
        calls >= self.limit && rate.prev_ctr != 0 && status.wants_more()
    }

    /// Calls over the last full period ending at `now_ms`, for reports
    #[inline]
    pub fn rate(&self, rate: &CallRate, now_ms: u32) -> u32 {
        rate.read(now_ms, self.period_ms)
    }
}
