//! Property-based tests for calendar-day keys and their continuous
//! period indices.
//!
//! Uses proptest to verify:
//! 1. The week index advances by exactly 1 every 7 days, across any
//!    year boundary.
//! 2. Day keys survive a Display → FromStr round trip.
//! 3. All three indices are monotone as days advance.
//! 4. Every day of a Monday-anchored week shares one week index.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use proptest::prelude::*;

use tandem_types::DayKey;

/// Strategy for arbitrary days between roughly 1917 and 2190.
fn arb_day() -> impl Strategy<Value = DayKey> {
    (700_000i32..800_000).prop_map(|n| {
        DayKey::new(NaiveDate::from_num_days_from_ce_opt(n).expect("in-range day number"))
    })
}

proptest! {
    #[test]
    fn week_index_advances_by_one_every_seven_days(day in arb_day()) {
        let next_week = DayKey::new(day.date() + Days::new(7));
        prop_assert_eq!(next_week.week_index(), day.week_index() + 1);
    }

    #[test]
    fn display_from_str_round_trip(day in arb_day()) {
        let parsed: DayKey = day.to_string().parse().expect("well-formed key");
        prop_assert_eq!(parsed, day);
    }

    #[test]
    fn indices_are_monotone(day in arb_day(), step in 1u64..400) {
        let later = DayKey::new(day.date() + Days::new(step));
        prop_assert!(later.day_index() > day.day_index());
        prop_assert!(later.week_index() >= day.week_index());
        prop_assert!(later.month_index() >= day.month_index());
    }

    #[test]
    fn whole_week_shares_one_index(day in arb_day()) {
        let monday = DayKey::new(
            day.date() - Days::new(u64::from(day.date().weekday().num_days_from_monday())),
        );
        prop_assert_eq!(monday.date().weekday(), Weekday::Mon);
        for offset in 0..7 {
            let weekday = DayKey::new(monday.date() + Days::new(offset));
            prop_assert_eq!(weekday.week_index(), monday.week_index());
        }
        let next_monday = DayKey::new(monday.date() + Days::new(7));
        prop_assert_eq!(next_monday.week_index(), monday.week_index() + 1);
    }

    #[test]
    fn month_index_changes_exactly_at_month_starts(day in arb_day()) {
        let next = DayKey::new(day.date() + Days::new(1));
        if next.date().day() == 1 {
            prop_assert_eq!(next.month_index(), day.month_index() + 1);
        } else {
            prop_assert_eq!(next.month_index(), day.month_index());
        }
    }
}
