//! Countdown to the ceremony

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Shown once the target has passed
pub const COMPLETION_MESSAGE: &str = "🎉 Hari Bahagia Telah Tiba! 🎉";

const MS_PER_SECOND: i64 = 1000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// Remaining time, clamped to zero once the target is reached
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimeLeft {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl TimeLeft {
    /// Split the distance from `now` to `target` into whole units
    pub fn until<Tz: TimeZone>(target: &DateTime<Tz>, now: DateTime<Utc>) -> Self {
        let distance = target.with_timezone(&Utc) - now;
        let ms = distance.num_milliseconds();
        if ms <= 0 {
            return Self::default();
        }

        Self {
            days: ms / MS_PER_DAY,
            hours: (ms % MS_PER_DAY) / MS_PER_HOUR,
            minutes: (ms % MS_PER_HOUR) / MS_PER_MINUTE,
            seconds: (ms % MS_PER_MINUTE) / MS_PER_SECOND,
        }
    }

    pub fn is_over(&self) -> bool {
        *self == Self::default()
    }

    /// Status line under the counters
    pub fn headline(&self) -> String {
        if self.is_over() {
            COMPLETION_MESSAGE.to_string()
        } else if self.days > 0 {
            format!("{} hari lagi menuju hari bahagia kami", self.days)
        } else if self.hours > 0 {
            format!("{} jam lagi!", self.hours)
        } else if self.minutes > 0 {
            format!("{} menit lagi!", self.minutes)
        } else {
            "Kurang dari 1 menit lagi!".to_string()
        }
    }
}

/// Ticker recomputing [`TimeLeft`] on a fixed period
///
/// The ticker task lives as long as the `Countdown`; `stop()` or dropping it
/// cancels the task.
pub struct Countdown {
    rx: watch::Receiver<TimeLeft>,
    task: Option<JoinHandle<()>>,
}

impl Countdown {
    /// Start ticking against the system clock
    pub fn start<Tz>(target: DateTime<Tz>, period: Duration) -> Self
    where
        Tz: TimeZone + Send + 'static,
        Tz::Offset: Send,
    {
        Self::with_clock(target, period, Utc::now)
    }

    /// Start ticking against `clock`
    pub fn with_clock<Tz, C>(target: DateTime<Tz>, period: Duration, clock: C) -> Self
    where
        Tz: TimeZone + Send + 'static,
        Tz::Offset: Send,
        C: Fn() -> DateTime<Utc> + Send + 'static,
    {
        let (tx, rx) = watch::channel(TimeLeft::until(&target, clock()));

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let left = TimeLeft::until(&target, clock());
                // All receivers gone: nobody is watching any more
                if tx.send(left).is_err() {
                    break;
                }
            }
        });

        Self {
            rx,
            task: Some(task),
        }
    }

    /// Latest value
    pub fn current(&self) -> TimeLeft {
        *self.rx.borrow()
    }

    /// Receiver notified on every tick
    pub fn watch(&self) -> watch::Receiver<TimeLeft> {
        self.rx.clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Cancel the ticker
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn target() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 6, 26, 10, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_at_target_is_zero() {
        let now = target().with_timezone(&Utc);
        let left = TimeLeft::until(&target(), now);

        assert_eq!(left, TimeLeft::default());
        assert!(left.is_over());
        assert_eq!(left.headline(), COMPLETION_MESSAGE);
    }

    #[test]
    fn test_one_second_before() {
        let now = target().with_timezone(&Utc) - chrono::Duration::seconds(1);
        let left = TimeLeft::until(&target(), now);

        assert_eq!(
            left,
            TimeLeft {
                days: 0,
                hours: 0,
                minutes: 0,
                seconds: 1
            }
        );
        assert_eq!(left.headline(), "Kurang dari 1 menit lagi!");
    }

    #[test]
    fn test_past_target_clamps() {
        let now = target().with_timezone(&Utc) + chrono::Duration::days(3);
        assert!(TimeLeft::until(&target(), now).is_over());
    }

    #[test]
    fn test_unit_split_and_headlines() {
        let base = target().with_timezone(&Utc);

        let left = TimeLeft::until(
            &target(),
            base - chrono::Duration::milliseconds(
                2 * MS_PER_DAY + 3 * MS_PER_HOUR + 4 * MS_PER_MINUTE + 5 * MS_PER_SECOND + 999,
            ),
        );
        assert_eq!(
            left,
            TimeLeft {
                days: 2,
                hours: 3,
                minutes: 4,
                seconds: 5
            }
        );
        assert_eq!(left.headline(), "2 hari lagi menuju hari bahagia kami");

        let left = TimeLeft::until(&target(), base - chrono::Duration::minutes(90));
        assert_eq!(left.headline(), "1 jam lagi!");

        let left = TimeLeft::until(&target(), base - chrono::Duration::seconds(125));
        assert_eq!(left.headline(), "2 menit lagi!");
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_ticks_and_stops() {
        let start = target().with_timezone(&Utc) - chrono::Duration::seconds(3);
        let origin = tokio::time::Instant::now();
        let clock = move || start + chrono::Duration::from_std(origin.elapsed()).unwrap();

        let mut countdown = Countdown::with_clock(target(), Duration::from_secs(1), clock);
        assert_eq!(countdown.current().seconds, 3);

        let mut rx = countdown.watch();
        tokio::time::sleep(Duration::from_millis(3500)).await;
        rx.changed().await.unwrap();
        assert!(countdown.current().is_over());

        assert!(countdown.is_running());
        countdown.stop();
        assert!(!countdown.is_running());
    }
}
