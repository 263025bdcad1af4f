use super::{TimephasedAmount, TimephasedCost, TimephasedSegment, TimephasedWork};
use crate::calendar::ProjectCalendar;
use crate::duration::{Duration, TimeUnit};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimephasedError {
    #[error("timescale range must start before it ends: {start} - {end}")]
    InvalidRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    #[error("timescale range {index} overlaps or precedes the range before it")]
    RangesOutOfOrder { index: usize },
    #[error("timephased segment must start before it finishes: {start} - {finish}")]
    InvalidSegment {
        start: NaiveDateTime,
        finish: NaiveDateTime,
    },
    #[error("timephased segment {index} overlaps or precedes the segment before it")]
    SegmentsOutOfOrder { index: usize },
    #[error("timephased work expressed in {found} where {expected} was expected")]
    MixedUnits { expected: TimeUnit, found: TimeUnit },
}

/// One bucket of a timescale, e.g. a day or a week column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimescaleRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimescaleRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }
}

/// Distributes work over the timescale ranges, in `unit`. Ranges that no
/// segment touches are `None`.
pub fn segment_work(
    calendar: &ProjectCalendar<'_>,
    work: &[TimephasedWork],
    ranges: &[TimescaleRange],
    unit: TimeUnit,
) -> Result<Vec<Option<Duration>>, TimephasedError> {
    validate_ranges(ranges)?;
    validate_segments(work)?;

    let Some(work_unit) = work.first().map(|segment| segment.total_amount.unit()) else {
        return Ok(vec![None; ranges.len()]);
    };
    if let Some(segment) = work.iter().find(|segment| segment.total_amount.unit() != work_unit) {
        return Err(TimephasedError::MixedUnits {
            expected: work_unit,
            found: segment.total_amount.unit(),
        });
    }

    let defaults = calendar.time_unit_defaults();
    Ok(distribute(calendar, work, ranges)
        .into_iter()
        .map(|amount| amount.map(|amount| Duration::new(amount, work_unit).convert_units(unit, &defaults)))
        .collect())
}

/// Distributes cost over the timescale ranges.
pub fn segment_cost(
    calendar: &ProjectCalendar<'_>,
    cost: &[TimephasedCost],
    ranges: &[TimescaleRange],
) -> Result<Vec<Option<f64>>, TimephasedError> {
    validate_ranges(ranges)?;
    validate_segments(cost)?;
    Ok(distribute(calendar, cost, ranges))
}

/// Amount in each range: the segment's hourly rate times the working hours
/// the range shares with it. Segments over non-working time are spread over
/// elapsed hours instead.
fn distribute<A: TimephasedAmount>(
    calendar: &ProjectCalendar<'_>,
    segments: &[TimephasedSegment<A>],
    ranges: &[TimescaleRange],
) -> Vec<Option<f64>> {
    let rates: Vec<(bool, f64)> = segments
        .iter()
        .map(|segment| {
            let working = calendar.working_millis(segment.start, segment.finish) as f64 / MILLIS_PER_HOUR;
            if working == 0.0 {
                let elapsed = elapsed_hours(segment.start, segment.finish);
                let rate = if elapsed == 0.0 { 0.0 } else { segment.total_amount.value() / elapsed };
                (true, rate)
            } else {
                (false, segment.total_amount.value() / working)
            }
        })
        .collect();

    let mut result = vec![None; ranges.len()];
    let mut first = 0;
    for (index, range) in ranges.iter().enumerate() {
        while first < segments.len() && segments[first].finish <= range.start {
            first += 1;
        }

        for (segment, (non_working, rate)) in segments[first..].iter().zip(&rates[first..]) {
            if segment.start >= range.end {
                break;
            }

            let start = range.start.max(segment.start);
            let finish = range.end.min(segment.finish);
            let hours = if *non_working {
                elapsed_hours(start, finish)
            } else {
                calendar.working_millis(start, finish) as f64 / MILLIS_PER_HOUR
            };

            if hours != 0.0 {
                *result[index].get_or_insert(0.0) += rate * hours;
            }
        }
    }
    result
}

fn elapsed_hours(start: NaiveDateTime, finish: NaiveDateTime) -> f64 {
    (finish - start).num_milliseconds() as f64 / MILLIS_PER_HOUR
}

fn validate_ranges(ranges: &[TimescaleRange]) -> Result<(), TimephasedError> {
    for (index, range) in ranges.iter().enumerate() {
        if range.start >= range.end {
            return Err(TimephasedError::InvalidRange {
                start: range.start,
                end: range.end,
            });
        }
        if index > 0 && ranges[index - 1].end > range.start {
            return Err(TimephasedError::RangesOutOfOrder { index });
        }
    }
    Ok(())
}

fn validate_segments<A: TimephasedAmount>(segments: &[TimephasedSegment<A>]) -> Result<(), TimephasedError> {
    for (index, segment) in segments.iter().enumerate() {
        if segment.start >= segment.finish {
            return Err(TimephasedError::InvalidSegment {
                start: segment.start,
                finish: segment.finish,
            });
        }
        if index > 0 && segments[index - 1].finish > segment.start {
            return Err(TimephasedError::SegmentsOutOfOrder { index });
        }
    }
    Ok(())
}
