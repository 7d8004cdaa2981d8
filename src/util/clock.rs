use chrono::{Local, NaiveDate, NaiveDateTime};

/// Source of "today" and the current timestamp.
pub trait Clock {
    fn today(&self) -> NaiveDate;
    /// Milliseconds since the Unix epoch
    fn now_ms(&self) -> i64;
}

/// The local wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn now_ms(&self) -> i64 {
        Local::now().timestamp_millis()
    }
}

/// A clock pinned to one instant, for tests and replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: NaiveDateTime,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        FixedClock { now }
    }

    /// Noon on `date`
    pub fn on(date: NaiveDate) -> Self {
        FixedClock {
            now: date.and_hms_opt(12, 0, 0).unwrap_or_default(),
        }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.now.date()
    }

    fn now_ms(&self) -> i64 {
        self.now.and_utc().timestamp_millis()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn today(&self) -> NaiveDate {
        (**self).today()
    }

    fn now_ms(&self) -> i64 {
        (**self).now_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_reports_its_date() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let clock = FixedClock::on(date);
        assert_eq!(clock.today(), date);
        assert_eq!(clock.now_ms(), 1_748_779_200_000);
    }
}
