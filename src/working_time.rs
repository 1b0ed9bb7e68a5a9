//! Elapsed business time between two instants.
//!
//! Only time inside the configured opening hours counts: nights, weekends
//! and any weekday without an entry in the schedule contribute nothing.

use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Utc, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Computes working hours between two instants.
pub trait WorkingTime: Send + Sync {
    /// Business hours elapsed from `start` to `end`. Never negative.
    fn elapsed_hours(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Decimal;
}

/// One opening window on a given weekday, in local wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningHours {
    pub weekday: Weekday,
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl OpeningHours {
    pub fn new(weekday: Weekday, open: NaiveTime, close: NaiveTime) -> Self {
        Self {
            weekday,
            open,
            close,
        }
    }
}

/// All opening windows of a week. A weekday may have several windows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeeklySchedule(Vec<OpeningHours>);

impl WeeklySchedule {
    pub fn new(windows: Vec<OpeningHours>) -> Self {
        Self(windows)
    }

    /// Windows open on `weekday`.
    pub fn windows_on(&self, weekday: Weekday) -> impl Iterator<Item = &OpeningHours> {
        self.0.iter().filter(move |w| w.weekday == weekday)
    }
}

impl Default for WeeklySchedule {
    /// Mon–Fri 08:00–18:00, Sat 08:00–12:00.
    fn default() -> Self {
        let hm = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN);
        let mut windows: Vec<OpeningHours> = [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
        ]
        .into_iter()
        .map(|day| OpeningHours::new(day, hm(8, 0), hm(18, 0)))
        .collect();
        windows.push(OpeningHours::new(Weekday::Sat, hm(8, 0), hm(12, 0)));
        Self(windows)
    }
}

/// Opening-hours calendar evaluated in the business's local offset.
#[derive(Debug, Clone)]
pub struct BusinessCalendar {
    offset: FixedOffset,
    schedule: WeeklySchedule,
}

impl BusinessCalendar {
    pub fn new(offset: FixedOffset, schedule: WeeklySchedule) -> Self {
        Self { offset, schedule }
    }
}

impl WorkingTime for BusinessCalendar {
    fn elapsed_hours(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Decimal {
        if end <= start {
            return Decimal::ZERO;
        }

        let start_local = start.with_timezone(&self.offset).naive_local();
        let end_local = end.with_timezone(&self.offset).naive_local();

        let mut seconds: i64 = 0;
        let mut day = start_local.date();
        let last_day = end_local.date();

        while day <= last_day {
            for window in self.schedule.windows_on(day.weekday()) {
                let from = day.and_time(window.open).max(start_local);
                let to = day.and_time(window.close).min(end_local);
                if to > from {
                    seconds += (to - from).num_seconds();
                }
            }
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }

        Decimal::from(seconds) / Decimal::from(3600)
    }
}
