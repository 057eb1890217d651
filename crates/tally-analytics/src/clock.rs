//! Where "today" comes from.

use chrono::FixedOffset;
use tally_core::ReportCalendar;

/// Produces the reporting calendar on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportClock {
    /// Wall-clock date at a fixed UTC offset.
    Live(FixedOffset),
    /// Always the same calendar (replays, tests).
    Fixed(ReportCalendar),
}

impl ReportClock {
    pub fn calendar(&self) -> ReportCalendar {
        match self {
            ReportClock::Live(offset) => ReportCalendar::now(*offset),
            ReportClock::Fixed(calendar) => *calendar,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_fixed_clock_never_moves() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let clock = ReportClock::Fixed(ReportCalendar::utc(today));
        assert_eq!(clock.calendar().today(), today);
    }
}
