use chrono::{DateTime, Timelike, Utc};
use std::time::Duration;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use super::config::Schedule;

/// Resolution of the polling loop.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Polling scheduler for one periodic task.
///
/// Callers alternate `tick().await` with the tick body, so a body never
/// overlaps itself. The next due time is computed when `tick()` is entered,
/// i.e. after the previous body finished: ticks that fell due while a slow
/// body was running are skipped, never queued or replayed.
pub struct Ticker {
    name: String,
    schedule: Schedule,
    poll: Interval,
    next_due: Option<Instant>,
}

impl Ticker {
    pub fn new(name: impl Into<String>, schedule: Schedule) -> Self {
        Self::with_poll_interval(name, schedule, POLL_INTERVAL)
    }

    pub fn with_poll_interval(name: impl Into<String>, schedule: Schedule, poll: Duration) -> Self {
        let mut poll = time::interval(poll);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let name = name.into();
        tracing::info!("⏰ Scheduler '{}' started ({:?})", name, schedule);
        Self {
            name,
            schedule,
            poll,
            next_due: None,
        }
    }

    /// Waits until the task is due.
    pub async fn tick(&mut self) {
        let due = match self.next_due {
            Some(due) => due,
            None => {
                let due = next_due(self.schedule, Instant::now(), Utc::now());
                self.next_due = Some(due);
                due
            }
        };

        loop {
            self.poll.tick().await;
            if Instant::now() >= due {
                break;
            }
        }

        self.next_due = None;
        tracing::debug!("⏰ Running '{}' tick", self.name);
    }
}

fn next_due(schedule: Schedule, now: Instant, wall: DateTime<Utc>) -> Instant {
    match schedule {
        Schedule::EveryInterval(period) => now + period,
        Schedule::MinuteAligned => now + until_next_minute(wall),
    }
}

/// Time left until second `:00` of the next wall-clock minute.
pub fn until_next_minute(wall: DateTime<Utc>) -> Duration {
    let into_minute = Duration::from_secs(u64::from(wall.second()))
        + Duration::from_nanos(u64::from(wall.nanosecond() % 1_000_000_000));
    Duration::from_secs(60).saturating_sub(into_minute)
}
