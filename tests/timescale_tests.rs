use chrono::{NaiveDate, NaiveDateTime};
use schedule_interchange::calendar::{Calendar, CalendarSet};
use schedule_interchange::duration::{Duration, TimeUnit};
use schedule_interchange::timephased::{
    TimephasedCost, TimephasedError, TimephasedSegment, TimephasedWork, TimescaleRange,
    segment_cost, segment_work,
};

// 2024-03-04 is a Monday.
fn dt(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

fn days(first: u32, count: u32) -> Vec<TimescaleRange> {
    (first..first + count)
        .map(|day| TimescaleRange::new(dt(day, 0, 0), dt(day + 1, 0, 0)))
        .collect()
}

fn week_of_work() -> Vec<TimephasedWork> {
    vec![
        TimephasedSegment::new(dt(4, 8, 0), dt(4, 17, 0), Duration::hours(8.0)),
        TimephasedSegment::new(dt(5, 8, 0), dt(5, 17, 0), Duration::hours(4.0)),
    ]
}

#[test]
fn work_is_bucketed_by_day() {
    let (set, id) = CalendarSet::single(Calendar::standard()).unwrap();
    let cal = set.get(id).unwrap();

    let result = segment_work(&cal, &week_of_work(), &days(4, 3), TimeUnit::Hours).unwrap();
    assert_eq!(result, vec![Some(Duration::hours(8.0)), Some(Duration::hours(4.0)), None]);
}

#[test]
fn partial_ranges_take_their_share() {
    let (set, id) = CalendarSet::single(Calendar::standard()).unwrap();
    let cal = set.get(id).unwrap();

    let ranges = [
        TimescaleRange::new(dt(4, 0, 0), dt(4, 12, 0)),
        TimescaleRange::new(dt(4, 12, 0), dt(5, 0, 0)),
    ];
    let result = segment_work(&cal, &week_of_work(), &ranges, TimeUnit::Minutes).unwrap();
    assert_eq!(result, vec![Some(Duration::minutes(240.0)), Some(Duration::minutes(240.0))]);
}

#[test]
fn one_range_covering_everything() {
    let (set, id) = CalendarSet::single(Calendar::standard()).unwrap();
    let cal = set.get(id).unwrap();

    let ranges = [TimescaleRange::new(dt(4, 0, 0), dt(11, 0, 0))];
    let result = segment_work(&cal, &week_of_work(), &ranges, TimeUnit::Days).unwrap();
    assert_eq!(result, vec![Some(Duration::days(1.5))]);
}

#[test]
fn no_work_gives_empty_buckets() {
    let (set, id) = CalendarSet::single(Calendar::standard()).unwrap();
    let cal = set.get(id).unwrap();

    let result = segment_work(&cal, &[], &days(4, 2), TimeUnit::Hours).unwrap();
    assert_eq!(result, vec![None, None]);
}

#[test]
fn cost_over_non_working_time_uses_elapsed_hours() {
    let (set, id) = CalendarSet::single(Calendar::standard()).unwrap();
    let cal = set.get(id).unwrap();

    let cost: TimephasedCost = TimephasedSegment::new(dt(9, 0, 0), dt(10, 0, 0), 240.0);
    let ranges = [
        TimescaleRange::new(dt(9, 0, 0), dt(9, 12, 0)),
        TimescaleRange::new(dt(9, 12, 0), dt(10, 0, 0)),
    ];
    let result = segment_cost(&cal, &[cost], &ranges).unwrap();
    assert_eq!(result, vec![Some(120.0), Some(120.0)]);
}

#[test]
fn cost_follows_working_hours() {
    let (set, id) = CalendarSet::single(Calendar::standard()).unwrap();
    let cal = set.get(id).unwrap();

    let cost: TimephasedCost = TimephasedSegment::new(dt(4, 8, 0), dt(5, 17, 0), 160.0);
    let result = segment_cost(&cal, &[cost], &days(4, 2)).unwrap();
    assert_eq!(result, vec![Some(80.0), Some(80.0)]);
}

#[test]
fn invalid_ranges_are_rejected() {
    let (set, id) = CalendarSet::single(Calendar::standard()).unwrap();
    let cal = set.get(id).unwrap();

    let backwards = [TimescaleRange::new(dt(4, 12, 0), dt(4, 8, 0))];
    assert_eq!(
        segment_work(&cal, &week_of_work(), &backwards, TimeUnit::Hours),
        Err(TimephasedError::InvalidRange {
            start: dt(4, 12, 0),
            end: dt(4, 8, 0),
        })
    );

    let overlapping = [
        TimescaleRange::new(dt(4, 0, 0), dt(4, 12, 0)),
        TimescaleRange::new(dt(4, 10, 0), dt(4, 14, 0)),
    ];
    assert_eq!(
        segment_work(&cal, &week_of_work(), &overlapping, TimeUnit::Hours),
        Err(TimephasedError::RangesOutOfOrder { index: 1 })
    );
}

#[test]
fn invalid_segments_are_rejected() {
    let (set, id) = CalendarSet::single(Calendar::standard()).unwrap();
    let cal = set.get(id).unwrap();

    let overlapping = vec![
        TimephasedSegment::new(dt(4, 8, 0), dt(4, 17, 0), Duration::hours(8.0)),
        TimephasedSegment::new(dt(4, 12, 0), dt(4, 17, 0), Duration::hours(4.0)),
    ];
    assert_eq!(
        segment_work(&cal, &overlapping, &days(4, 1), TimeUnit::Hours),
        Err(TimephasedError::SegmentsOutOfOrder { index: 1 })
    );

    let empty_span = vec![TimephasedSegment::new(dt(4, 8, 0), dt(4, 8, 0), Duration::hours(1.0))];
    assert!(matches!(
        segment_work(&cal, &empty_span, &days(4, 1), TimeUnit::Hours),
        Err(TimephasedError::InvalidSegment { .. })
    ));

    let mixed = vec![
        TimephasedSegment::new(dt(4, 8, 0), dt(4, 17, 0), Duration::hours(8.0)),
        TimephasedSegment::new(dt(5, 8, 0), dt(5, 17, 0), Duration::minutes(480.0)),
    ];
    assert_eq!(
        segment_work(&cal, &mixed, &days(4, 2), TimeUnit::Hours),
        Err(TimephasedError::MixedUnits {
            expected: TimeUnit::Hours,
            found: TimeUnit::Minutes,
        })
    );
}
