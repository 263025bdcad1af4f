use schedule_interchange::duration::{Duration, DurationParseError, TimeUnit, TimeUnitDefaults, convert_units};
use std::cmp::Ordering;

fn defaults() -> TimeUnitDefaults {
    TimeUnitDefaults::default()
}

fn assert_amount(duration: Duration, expected: f64, unit: TimeUnit) {
    assert_eq!(duration.unit(), unit);
    assert!(
        (duration.amount() - expected).abs() < 1e-9,
        "expected {expected} {unit}, got {duration}"
    );
}

#[test]
fn working_units_use_calendar_lengths() {
    assert_amount(Duration::days(1.0).convert_units(TimeUnit::Hours, &defaults()), 8.0, TimeUnit::Hours);
    assert_amount(
        Duration::new(1.0, TimeUnit::Weeks).convert_units(TimeUnit::Days, &defaults()),
        5.0,
        TimeUnit::Days,
    );
    assert_amount(
        Duration::new(1.0, TimeUnit::Months).convert_units(TimeUnit::Days, &defaults()),
        20.0,
        TimeUnit::Days,
    );
    assert_amount(
        Duration::new(1.0, TimeUnit::Years).convert_units(TimeUnit::Hours, &defaults()),
        2080.0,
        TimeUnit::Hours,
    );
}

#[test]
fn elapsed_units_use_wall_clock_lengths() {
    assert_amount(
        Duration::new(1.0, TimeUnit::ElapsedDays).convert_units(TimeUnit::ElapsedHours, &defaults()),
        24.0,
        TimeUnit::ElapsedHours,
    );
    assert_amount(
        Duration::new(1.0, TimeUnit::ElapsedMonths).convert_units(TimeUnit::ElapsedDays, &defaults()),
        30.0,
        TimeUnit::ElapsedDays,
    );
    assert_amount(
        Duration::new(2.0, TimeUnit::ElapsedWeeks).convert_units(TimeUnit::ElapsedMinutes, &defaults()),
        20160.0,
        TimeUnit::ElapsedMinutes,
    );
}

#[test]
fn custom_calendar_lengths_change_conversion() {
    let short_days = TimeUnitDefaults {
        minutes_per_day: 420.0,
        minutes_per_week: 2100.0,
        days_per_month: 20.0,
    };
    assert_amount(Duration::days(2.0).convert_units(TimeUnit::Hours, &short_days), 14.0, TimeUnit::Hours);
}

#[test]
fn zero_divisor_converts_to_zero() {
    let broken = TimeUnitDefaults {
        minutes_per_day: 0.0,
        minutes_per_week: 0.0,
        days_per_month: 0.0,
    };
    assert_amount(convert_units(90.0, TimeUnit::Minutes, TimeUnit::Days, &broken), 0.0, TimeUnit::Days);
    assert_amount(convert_units(90.0, TimeUnit::Minutes, TimeUnit::Months, &broken), 0.0, TimeUnit::Months);
}

#[test]
fn percent_is_not_converted() {
    let percent = Duration::new(50.0, TimeUnit::Percent);
    let converted = percent.convert_units(TimeUnit::Hours, &defaults());
    assert_amount(converted, 50.0, TimeUnit::Percent);
}

#[test]
fn equality_uses_unit_and_tolerance() {
    assert_eq!(Duration::hours(1.0), Duration::hours(1.000001));
    assert_ne!(Duration::hours(1.0), Duration::hours(1.01));
    assert_ne!(Duration::hours(1.0), Duration::minutes(60.0));
}

#[test]
fn compare_converts_between_units() {
    assert_eq!(Duration::hours(8.0).compare(&Duration::days(1.0)), Ordering::Equal);
    assert_eq!(Duration::hours(4.0).compare(&Duration::days(1.0)), Ordering::Less);
    assert_eq!(Duration::days(2.0).compare(&Duration::hours(9.0)), Ordering::Greater);
}

#[test]
fn add_and_negate() {
    let sum = Duration::hours(4.0).add(&Duration::days(1.0), &defaults());
    assert_eq!(sum, Duration::hours(12.0));
    assert_eq!(Duration::hours(3.0).negate(), Duration::hours(-3.0));
    assert!(Duration::zero(TimeUnit::Days).negate().is_zero());
}

#[test]
fn display_and_parse_compact_notation() {
    assert_eq!(Duration::days(1.5).to_string(), "1.5d");
    assert_eq!(Duration::new(3.0, TimeUnit::ElapsedWeeks).to_string(), "3ew");

    assert_eq!("1.5d".parse::<Duration>(), Ok(Duration::days(1.5)));
    assert_eq!("8 hours".parse::<Duration>(), Ok(Duration::hours(8.0)));
    assert_eq!("-2wk".parse::<Duration>(), Ok(Duration::new(-2.0, TimeUnit::Weeks)));
    assert_eq!("3emon".parse::<Duration>(), Ok(Duration::new(3.0, TimeUnit::ElapsedMonths)));
}

#[test]
fn parse_rejects_malformed_values() {
    assert_eq!("".parse::<Duration>(), Err(DurationParseError::Empty));
    assert_eq!("abc".parse::<Duration>(), Err(DurationParseError::InvalidAmount(String::new())));
    assert_eq!("5q".parse::<Duration>(), Err(DurationParseError::UnknownUnit("q".to_string())));
}

#[test]
fn abbreviations_cover_every_unit() {
    for unit in TimeUnit::ALL {
        assert_eq!(TimeUnit::from_abbreviation(unit.abbreviation()), Some(unit));
    }
    assert_eq!(TimeUnit::from_abbreviation("mins"), Some(TimeUnit::Minutes));
    assert_eq!(TimeUnit::from_abbreviation("wk"), Some(TimeUnit::Weeks));
    assert_eq!(TimeUnit::from_abbreviation("fortnight"), None);
}

#[test]
fn format_codes() {
    assert_eq!(TimeUnit::from_format_code(3), Some(TimeUnit::Minutes));
    assert_eq!(TimeUnit::from_format_code(7), Some(TimeUnit::Days));
    assert_eq!(TimeUnit::from_format_code(39), Some(TimeUnit::Days));
    assert_eq!(TimeUnit::from_format_code(53), Some(TimeUnit::Days));
    assert_eq!(TimeUnit::from_format_code(20), Some(TimeUnit::ElapsedPercent));
    assert_eq!(TimeUnit::from_format_code(99), None);

    assert_eq!(TimeUnit::Days.to_format_code(false), 7);
    assert_eq!(TimeUnit::Days.to_format_code(true), 39);
    assert_eq!(TimeUnit::ElapsedWeeks.to_format_code(false), 10);
    assert_eq!(TimeUnit::Years.to_format_code(false), 5);
}

#[test]
fn elapsed_flag() {
    assert!(TimeUnit::ElapsedHours.is_elapsed());
    assert!(!TimeUnit::Hours.is_elapsed());
    assert!(TimeUnit::ElapsedPercent.is_percent());
}
