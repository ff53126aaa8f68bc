//! Recording countdown.
//!
//! The timer's countdown is the authoritative clip duration. It ticks once a
//! second for display, but expiry is driven by a separate deadline so the
//! recording ends exactly at the budget boundary regardless of tick drift.

use std::time::Duration;

use gifnew_clip_model::clip::MIN_CLIP_SECS;
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};

/// What the timer reports while recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// One second passed; `remaining` is the new countdown value.
    Tick { remaining: u32 },
    /// The budget is spent. No further events follow.
    Expired,
}

/// Duration for a recording stopped with `countdown_at_stop` seconds left.
pub fn elapsed_secs(budget_secs: u32, countdown_at_stop: u32) -> f64 {
    let budget = budget_secs as f64;
    let elapsed = budget_secs.saturating_sub(countdown_at_stop) as f64;
    elapsed.clamp(MIN_CLIP_SECS, budget.max(MIN_CLIP_SECS))
}

/// A running recording countdown.
#[derive(Debug)]
pub struct RecordingTimer {
    budget_secs: u32,
    countdown: u32,
    deadline: Instant,
    ticker: Interval,
    expired: bool,
}

impl RecordingTimer {
    /// Start counting down from `budget_secs`.
    pub fn start(budget_secs: u32) -> Self {
        let now = Instant::now();
        let period = Duration::from_secs(1);
        let mut ticker = interval_at(now + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::debug!(budget_secs, "Recording timer started");
        Self {
            budget_secs,
            countdown: budget_secs,
            deadline: now + Duration::from_secs(budget_secs as u64),
            ticker,
            expired: budget_secs == 0,
        }
    }

    pub fn budget_secs(&self) -> u32 {
        self.budget_secs
    }

    /// Current countdown value.
    pub fn remaining(&self) -> u32 {
        self.countdown
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Wait for the next tick or for expiry. Returns `None` once expired.
    pub async fn next_event(&mut self) -> Option<TimerEvent> {
        if self.expired {
            return None;
        }
        tokio::select! {
            biased;
            _ = sleep_until(self.deadline) => {
                self.countdown = 0;
                self.expired = true;
                tracing::debug!(budget_secs = self.budget_secs, "Recording budget exhausted");
                Some(TimerEvent::Expired)
            }
            _ = self.ticker.tick() => {
                self.countdown = self.countdown.saturating_sub(1);
                if self.countdown == 0 {
                    self.expired = true;
                    Some(TimerEvent::Expired)
                } else {
                    Some(TimerEvent::Tick { remaining: self.countdown })
                }
            }
        }
    }

    /// Stop and return the elapsed duration, `budget − countdown` clamped.
    pub fn stop(self) -> f64 {
        let elapsed = elapsed_secs(self.budget_secs, self.countdown);
        tracing::debug!(
            budget_secs = self.budget_secs,
            countdown = self.countdown,
            elapsed,
            "Recording timer stopped"
        );
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test(start_paused = true)]
    async fn test_full_budget_yields_ten_seconds() {
        let started = Instant::now();
        let mut timer = RecordingTimer::start(10);
        let mut ticks = Vec::new();
        while let Some(event) = timer.next_event().await {
            match event {
                TimerEvent::Tick { remaining } => ticks.push(remaining),
                TimerEvent::Expired => break,
            }
        }
        assert_eq!(ticks, (1..=9).rev().collect::<Vec<_>>());
        assert_eq!(started.elapsed(), Duration::from_secs(10));
        assert!(timer.next_event().await.is_none());
        assert_eq!(timer.stop(), 10.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_stop_at_seven() {
        let mut timer = RecordingTimer::start(10);
        for _ in 0..3 {
            timer.next_event().await;
        }
        assert_eq!(timer.remaining(), 7);
        assert_eq!(timer.stop(), 3.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_stop_is_clamped_to_minimum() {
        let timer = RecordingTimer::start(10);
        assert_eq!(timer.stop(), 0.1);
    }

    proptest! {
        #[test]
        fn prop_elapsed_is_clamped(countdown in 0u32..=10) {
            let elapsed = elapsed_secs(10, countdown);
            let expected = (10.0 - countdown as f64).clamp(0.1, 10.0);
            prop_assert_eq!(elapsed, expected);
        }
    }
}
