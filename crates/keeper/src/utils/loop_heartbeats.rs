use serde::Serialize;
use std::sync::atomic::{AtomicI64, Ordering};

/// A loop is considered stuck after missing this many seconds of beats.
const STALE_AFTER_SECS: i64 = 300;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub pool_checker_last_run_seconds_ago: i64,
    pub event_monitor_last_run_seconds_ago: i64,
}

/// Last iteration timestamps of the background loops, `-1` until the first
/// iteration.
#[derive(Debug)]
pub struct LoopHeartbeats {
    last_pool_check: AtomicI64,
    last_event_poll: AtomicI64,
    event_monitor_enabled: bool,
}

impl LoopHeartbeats {
    pub fn new(event_monitor_enabled: bool) -> Self {
        Self {
            last_pool_check: AtomicI64::new(-1),
            last_event_poll: AtomicI64::new(-1),
            event_monitor_enabled,
        }
    }

    pub fn update_pool_checker(&self) {
        self.last_pool_check.store(now(), Ordering::SeqCst);
    }

    pub fn update_event_monitor(&self) {
        self.last_event_poll.store(now(), Ordering::SeqCst);
    }

    pub fn health_status(&self) -> HealthStatus {
        self.health_status_at(now())
    }

    fn health_status_at(&self, now: i64) -> HealthStatus {
        let seconds_ago = |last: i64| if last > 0 { now - last } else { -1 };

        let pool_checker = seconds_ago(self.last_pool_check.load(Ordering::SeqCst));
        let event_monitor = seconds_ago(self.last_event_poll.load(Ordering::SeqCst));

        let fresh = |ago: i64| ago >= 0 && ago <= STALE_AFTER_SECS;
        let healthy =
            fresh(pool_checker) && (!self.event_monitor_enabled || fresh(event_monitor));

        HealthStatus {
            healthy,
            pool_checker_last_run_seconds_ago: pool_checker,
            event_monitor_last_run_seconds_ago: event_monitor,
        }
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
