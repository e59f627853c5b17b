use chrono::{DateTime, FixedOffset, NaiveDate, Timelike, Utc};

/// Source of "now" in the patients' local day.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// Minutes since local midnight.
    fn minutes_of_day(&self) -> u32 {
        minutes_of_day(&self.now())
    }
}

pub fn minutes_of_day(at: &DateTime<FixedOffset>) -> u32 {
    at.hour() * 60 + at.minute()
}

/// Wall clock shifted to a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}


#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::testing::ManualClock;
    use super::*;

    #[test]
    fn test_minutes_of_day() {
        let clock = ManualClock::at(NaiveDate::from_ymd_opt(2026, 3, 4).unwrap(), 13, 30);
        assert_eq!(clock.minutes_of_day(), 810);
    }

    #[test]
    fn test_offset_moves_the_local_day() {
        let offset = FixedOffset::east_opt(-5 * 3600).unwrap();
        let utc = Utc.with_ymd_and_hms(2026, 3, 4, 2, 0, 0).unwrap();
        let local = utc.with_timezone(&offset);
        assert_eq!(local.date_naive(), NaiveDate::from_ymd_opt(2026, 3, 3).unwrap());
        assert_eq!(minutes_of_day(&local), 21 * 60);
    }
}
