use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use schedule_interchange::calendar::{Calendar, CalendarException, CalendarSet, DayType, TimeRange};
use schedule_interchange::duration::{Duration, TimeUnit, TimeUnitDefaults};
use schedule_interchange::timephased::{
    PeriodUnit, TimephasedCost, TimephasedNormaliser, TimephasedSegment, TimephasedWork,
    coalesce_equal_days, has_splits, normalise_batch,
};

// 2024-03-04 is a Monday.
fn dt(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

fn work(start: NaiveDateTime, finish: NaiveDateTime, minutes: f64) -> TimephasedWork {
    TimephasedSegment::new(start, finish, Duration::minutes(minutes))
}

fn minutes(duration: Duration) -> f64 {
    duration
        .convert_units(TimeUnit::Minutes, &TimeUnitDefaults::default())
        .amount()
}

fn assert_minutes(duration: Duration, expected: f64) {
    let actual = minutes(duration);
    assert!((actual - expected).abs() < 0.01, "expected {expected} minutes, got {actual}");
}

fn same_day(segment: &TimephasedWork) -> bool {
    segment.start.date() == segment.finish.date()
        || (segment.finish.time() == NaiveTime::MIN
            && segment.finish.date().pred_opt() == Some(segment.start.date()))
}

#[test]
fn splits_segment_across_days() {
    let (set, id) = CalendarSet::single(Calendar::standard()).unwrap();
    let normaliser = TimephasedNormaliser::new(set.get(id).unwrap());

    let result = normaliser.execute(&[work(dt(4, 6, 0), dt(5, 10, 0), 500.0)]);

    assert_eq!(result.len(), 2);
    assert_eq!((result[0].start, result[0].finish), (dt(4, 8, 0), dt(4, 17, 0)));
    assert_minutes(result[0].total_amount, 400.0);
    assert_eq!((result[1].start, result[1].finish), (dt(5, 8, 0), dt(5, 10, 0)));
    assert_minutes(result[1].total_amount, 100.0);
}

#[test]
fn work_is_reported_in_hours() {
    let (set, id) = CalendarSet::single(Calendar::standard()).unwrap();
    let normaliser = TimephasedNormaliser::new(set.get(id).unwrap());

    let result = normaliser.execute(&[work(dt(4, 8, 0), dt(4, 17, 0), 480.0)]);

    assert_eq!(result.len(), 1);
    assert_eq!(result[0].total_amount, Duration::hours(8.0));
    assert_eq!(result[0].amount_per_day, Duration::hours(8.0));
}

#[test]
fn total_work_is_conserved() {
    let (set, id) = CalendarSet::single(Calendar::standard()).unwrap();
    let normaliser = TimephasedNormaliser::new(set.get(id).unwrap());

    let even = normaliser.execute(&[work(dt(4, 8, 0), dt(8, 17, 0), 2000.0)]);
    assert_eq!(even.len(), 5);
    for segment in &even {
        assert_minutes(segment.total_amount, 400.0);
    }

    let uneven = normaliser.execute(&[work(dt(4, 8, 0), dt(6, 17, 0), 1000.0)]);
    assert_eq!(uneven.len(), 3);
    let total: f64 = uneven.iter().map(|segment| minutes(segment.total_amount)).sum();
    assert!((total - 1000.0).abs() < 0.01);
}

#[test]
fn no_segment_crosses_a_day() {
    let (set, id) = CalendarSet::single(Calendar::standard()).unwrap();
    let normaliser = TimephasedNormaliser::new(set.get(id).unwrap());

    let result = normaliser.execute(&[
        work(dt(4, 10, 0), dt(6, 15, 0), 1200.0),
        work(dt(7, 8, 0), dt(12, 12, 0), 1600.0),
    ]);
    assert!(!result.is_empty());
    assert!(result.iter().all(same_day));
}

#[test]
fn weekend_is_skipped() {
    let (set, id) = CalendarSet::single(Calendar::standard()).unwrap();
    let normaliser = TimephasedNormaliser::new(set.get(id).unwrap());

    let result = normaliser.execute(&[work(dt(8, 13, 0), dt(11, 12, 0), 480.0)]);

    assert_eq!(result.len(), 2);
    assert_eq!((result[0].start, result[0].finish), (dt(8, 13, 0), dt(8, 17, 0)));
    assert_minutes(result[0].total_amount, 240.0);
    assert_eq!((result[1].start, result[1].finish), (dt(11, 8, 0), dt(11, 12, 0)));
    assert_minutes(result[1].total_amount, 240.0);
}

#[test]
fn segment_starting_on_weekend_moves_to_next_working_day() {
    let (set, id) = CalendarSet::single(Calendar::standard()).unwrap();
    let normaliser = TimephasedNormaliser::new(set.get(id).unwrap());

    let result = normaliser.execute(&[work(dt(9, 10, 0), dt(11, 12, 0), 240.0)]);

    assert_eq!(result.len(), 1);
    assert_eq!((result[0].start, result[0].finish), (dt(11, 8, 0), dt(11, 12, 0)));
    assert_minutes(result[0].total_amount, 240.0);
}

#[test]
fn normalising_twice_changes_nothing() {
    let (set, id) = CalendarSet::single(Calendar::standard()).unwrap();
    let normaliser = TimephasedNormaliser::new(set.get(id).unwrap());

    let once = normaliser.execute(&[
        work(dt(4, 6, 0), dt(5, 10, 0), 500.0),
        work(dt(6, 8, 0), dt(6, 12, 0), 0.0),
        work(dt(7, 9, 0), dt(8, 11, 0), 300.0),
    ]);
    let twice = normaliser.execute(&once);
    assert_eq!(once, twice);
}

#[test]
fn same_day_work_is_merged() {
    let (set, id) = CalendarSet::single(Calendar::standard()).unwrap();
    let normaliser = TimephasedNormaliser::new(set.get(id).unwrap());

    let result = normaliser.execute(&[
        work(dt(4, 8, 0), dt(4, 10, 0), 120.0),
        work(dt(4, 10, 0), dt(4, 12, 0), 120.0),
    ]);

    assert_eq!(result.len(), 1);
    assert_eq!((result[0].start, result[0].finish), (dt(4, 8, 0), dt(4, 12, 0)));
    assert_eq!(result[0].total_amount, Duration::hours(4.0));
    assert_eq!(result[0].amount_per_day, Duration::hours(4.0));
}

#[test]
fn trailing_zero_extends_the_work() {
    let (set, id) = CalendarSet::single(Calendar::standard()).unwrap();
    let normaliser = TimephasedNormaliser::new(set.get(id).unwrap());

    let result = normaliser.execute(&[
        work(dt(4, 8, 0), dt(4, 12, 0), 240.0),
        work(dt(4, 13, 0), dt(4, 17, 0), 0.0),
    ]);

    assert_eq!(result.len(), 1);
    assert_eq!((result[0].start, result[0].finish), (dt(4, 8, 0), dt(4, 17, 0)));
    assert_eq!(result[0].total_amount, Duration::hours(4.0));
}

#[test]
fn leading_zero_is_replaced_by_the_work() {
    let (set, id) = CalendarSet::single(Calendar::standard()).unwrap();
    let normaliser = TimephasedNormaliser::new(set.get(id).unwrap());

    let result = normaliser.execute(&[
        work(dt(4, 8, 0), dt(4, 10, 0), 0.0),
        work(dt(4, 10, 0), dt(4, 12, 0), 120.0),
    ]);

    assert_eq!(result.len(), 1);
    assert_eq!((result[0].start, result[0].finish), (dt(4, 10, 0), dt(4, 12, 0)));
    assert_eq!(result[0].total_amount, Duration::hours(2.0));
}

#[test]
fn zero_segment_on_working_day_spans_the_day() {
    let (set, id) = CalendarSet::single(Calendar::standard()).unwrap();
    let normaliser = TimephasedNormaliser::new(set.get(id).unwrap());

    let result = normaliser.execute(&[work(dt(4, 9, 0), dt(4, 12, 0), 0.0)]);

    assert_eq!(result.len(), 1);
    assert_eq!((result[0].start, result[0].finish), (dt(4, 8, 0), dt(4, 17, 0)));
    assert!(result[0].is_zero());
}

#[test]
fn zero_segment_without_working_time_is_dropped() {
    let (set, id) = CalendarSet::single(Calendar::standard()).unwrap();
    let normaliser = TimephasedNormaliser::new(set.get(id).unwrap());

    let result = normaliser.execute(&[work(dt(9, 8, 0), dt(9, 17, 0), 0.0)]);
    assert!(result.is_empty());
}

#[test]
fn finish_at_midnight_stays_on_previous_day() {
    let (set, id) = CalendarSet::single(Calendar::standard()).unwrap();
    let normaliser = TimephasedNormaliser::new(set.get(id).unwrap());

    let result = normaliser.execute(&[work(dt(4, 8, 0), dt(5, 0, 0), 480.0)]);

    assert_eq!(result.len(), 1);
    assert_eq!((result[0].start, result[0].finish), (dt(4, 8, 0), dt(5, 0, 0)));
    assert_eq!(result[0].total_amount, Duration::hours(8.0));
}

/// Weekdays 16:00 until midnight.
fn late_shift() -> Calendar {
    let mut late = Calendar::new("Late");
    for day in [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri] {
        late.set_day_type(day, DayType::Working);
        late.set_hours(day, vec![TimeRange::new(NaiveTime::from_hms_opt(16, 0, 0).unwrap(), NaiveTime::MIN)]);
    }
    late
}

#[test]
fn midnight_finish_does_not_clamp_work() {
    let (set, id) = CalendarSet::single(late_shift()).unwrap();
    let normaliser = TimephasedNormaliser::new(set.get(id).unwrap());

    let result = normaliser.execute(&[work(dt(4, 18, 0), dt(4, 22, 0), 240.0)]);

    assert_eq!(result.len(), 1);
    assert_eq!((result[0].start, result[0].finish), (dt(4, 18, 0), dt(4, 22, 0)));
    assert_minutes(result[0].total_amount, 240.0);
}

#[test]
fn zero_segment_runs_to_midnight() {
    let (set, id) = CalendarSet::single(late_shift()).unwrap();
    let normaliser = TimephasedNormaliser::new(set.get(id).unwrap());

    let result = normaliser.execute(&[work(dt(4, 18, 0), dt(4, 20, 0), 0.0)]);

    assert_eq!(result.len(), 1);
    assert_eq!((result[0].start, result[0].finish), (dt(4, 16, 0), dt(5, 0, 0)));
    assert!(result[0].is_zero());
}

#[test]
fn remainder_in_midnight_day_keeps_its_finish() {
    let (set, id) = CalendarSet::single(late_shift()).unwrap();
    let normaliser = TimephasedNormaliser::new(set.get(id).unwrap());

    let result = normaliser.execute(&[work(dt(4, 16, 0), dt(5, 20, 0), 720.0)]);

    assert_eq!(result.len(), 2);
    assert_eq!((result[0].start, result[0].finish), (dt(4, 16, 0), dt(5, 0, 0)));
    assert_minutes(result[0].total_amount, 480.0);
    assert_eq!((result[1].start, result[1].finish), (dt(5, 16, 0), dt(5, 20, 0)));
    assert_minutes(result[1].total_amount, 240.0);
}

#[test]
fn cost_is_split_without_unit_conversion() {
    let (set, id) = CalendarSet::single(Calendar::standard()).unwrap();
    let normaliser = TimephasedNormaliser::new(set.get(id).unwrap());

    let cost: TimephasedCost = TimephasedSegment::new(dt(4, 6, 0), dt(5, 10, 0), 500.0);
    let result = normaliser.execute(&[cost]);

    assert_eq!(result.len(), 2);
    assert!((result[0].total_amount - 400.0).abs() < 0.01);
    assert!((result[1].total_amount - 100.0).abs() < 0.01);
}

#[test]
fn batch_matches_individual_runs() {
    let mut builder = CalendarSet::builder();
    let standard = builder.add(Calendar::standard());
    let mut short = Calendar::standard();
    short.name = "Short".to_string();
    short.add_exception(CalendarException::single_day(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()));
    let short = builder.add(short);
    let set = builder.build().unwrap();

    let list = vec![work(dt(4, 8, 0), dt(6, 17, 0), 960.0)];
    let batch = vec![(standard, list.clone()), (short, list.clone())];
    let results = normalise_batch(&set, &batch).unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0], TimephasedNormaliser::new(set.get(standard).unwrap()).execute(&list));
    assert_eq!(results[1], TimephasedNormaliser::new(set.get(short).unwrap()).execute(&list));
    // the holiday leaves two working days
    assert_eq!(results[1].len(), 2);
}

#[test]
fn splits_are_detected() {
    let (set, id) = CalendarSet::single(Calendar::standard()).unwrap();
    let cal = set.get(id).unwrap();

    let interrupted = vec![
        work(dt(4, 8, 0), dt(4, 17, 0), 480.0),
        work(dt(5, 8, 0), dt(5, 17, 0), 0.0),
        work(dt(6, 8, 0), dt(6, 17, 0), 480.0),
    ];
    assert!(has_splits(&cal, &interrupted));

    let weekend_gap = vec![
        work(dt(8, 8, 0), dt(8, 17, 0), 480.0),
        work(dt(9, 8, 0), dt(10, 17, 0), 0.0),
    ];
    assert!(!has_splits(&cal, &weekend_gap));
}

#[test]
fn equal_days_coalesce() {
    let (set, id) = CalendarSet::single(Calendar::standard()).unwrap();
    let cal = set.get(id).unwrap();

    let days = vec![
        work(dt(4, 8, 0), dt(4, 17, 0), 480.0),
        work(dt(5, 8, 0), dt(5, 17, 0), 480.0),
        work(dt(6, 8, 0), dt(6, 12, 0), 240.0),
    ];
    let result = coalesce_equal_days(&cal, &days);

    assert_eq!(result.len(), 2);
    assert_eq!((result[0].start, result[0].finish), (dt(4, 8, 0), dt(5, 17, 0)));
    assert_eq!(result[0].total_amount, Duration::minutes(960.0));
    assert_eq!(result[0].amount_per_day, Duration::minutes(480.0));
}

#[test]
fn period_units_by_span() {
    assert_eq!(PeriodUnit::for_span(dt(4, 8, 0), dt(4, 8, 30)), PeriodUnit::Minutes);
    assert_eq!(PeriodUnit::for_span(dt(4, 8, 0), dt(4, 17, 0)), PeriodUnit::Hours);
    assert_eq!(PeriodUnit::for_span(dt(4, 8, 0), dt(5, 8, 0)), PeriodUnit::Days);
    assert_eq!(PeriodUnit::for_span(dt(4, 0, 0), dt(14, 0, 0)), PeriodUnit::Weeks);
    assert_eq!(PeriodUnit::Hours.code(), 1);
    assert_eq!(PeriodUnit::from_code(8), Some(PeriodUnit::Years));
    assert_eq!(PeriodUnit::from_code(4), None);
}
