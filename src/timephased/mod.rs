//! Timephased work and cost: amounts spread over spans of time.
//!
//! Readers produce raw segments that may cross days or repeat; the
//! [`TimephasedNormaliser`] turns them into one segment per calendar day.
//! Writers that need day granularity go the other way with the
//! [`TimephasedAssembler`].

mod assemble;
mod normalise;
mod timescale;

pub use assemble::{AssignmentProgress, TimephasedAssembler, generate_complete_work, generate_planned_work};
pub use normalise::{TimephasedNormaliser, normalise_batch};
pub use timescale::{TimephasedError, TimescaleRange, segment_cost, segment_work};

use crate::calendar::ProjectCalendar;
use crate::duration::{Duration, TimeUnit, TimeUnitDefaults};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Quantity carried by a timephased segment.
pub trait TimephasedAmount: Copy + Debug + PartialEq + Send + Sync {
    fn value(&self) -> f64;

    /// Same kind of amount with a different magnitude.
    fn with_value(&self, value: f64) -> Self;

    fn is_zero(&self) -> bool {
        self.value() == 0.0
    }

    /// Form in which the normaliser does its arithmetic.
    fn to_working_form(&self, _defaults: &TimeUnitDefaults) -> Self {
        *self
    }

    /// Form in which normalised segments are handed back.
    fn to_output_form(&self, _defaults: &TimeUnitDefaults) -> Self {
        *self
    }
}

/// Work is split in minutes and reported in hours.
impl TimephasedAmount for Duration {
    fn value(&self) -> f64 {
        self.amount()
    }

    fn with_value(&self, value: f64) -> Self {
        Duration::new(value, self.unit())
    }

    fn to_working_form(&self, defaults: &TimeUnitDefaults) -> Self {
        self.convert_units(TimeUnit::Minutes, defaults)
    }

    fn to_output_form(&self, defaults: &TimeUnitDefaults) -> Self {
        self.convert_units(TimeUnit::Hours, defaults)
    }
}

/// Cost is a plain currency amount.
impl TimephasedAmount for f64 {
    fn value(&self) -> f64 {
        *self
    }

    fn with_value(&self, value: f64) -> Self {
        value
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimephasedSegment<A> {
    pub start: NaiveDateTime,
    pub finish: NaiveDateTime,
    pub total_amount: A,
    pub amount_per_day: A,
}

pub type TimephasedWork = TimephasedSegment<Duration>;
pub type TimephasedCost = TimephasedSegment<f64>;

impl<A: TimephasedAmount> TimephasedSegment<A> {
    /// A segment whose per-day amount equals its total.
    pub fn new(start: NaiveDateTime, finish: NaiveDateTime, total_amount: A) -> Self {
        Self {
            start,
            finish,
            total_amount,
            amount_per_day: total_amount,
        }
    }

    pub fn with_amount_per_day(mut self, amount_per_day: A) -> Self {
        self.amount_per_day = amount_per_day;
        self
    }

    pub fn is_zero(&self) -> bool {
        self.total_amount.is_zero()
    }

    /// Padding segment with a zero amount of the same kind as `like`.
    pub(crate) fn zero(start: NaiveDateTime, finish: NaiveDateTime, like: A) -> Self {
        Self::new(start, finish, like.with_value(0.0))
    }

    pub fn period_unit(&self) -> PeriodUnit {
        PeriodUnit::for_span(self.start, self.finish)
    }
}

/// Length class of the period a segment covers, with its XML code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodUnit {
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

impl PeriodUnit {
    pub fn for_span(start: NaiveDateTime, finish: NaiveDateTime) -> Self {
        let span = finish - start;
        match span.num_days() {
            days if days >= 364 => PeriodUnit::Years,
            days if days >= 28 => PeriodUnit::Months,
            days if days >= 7 => PeriodUnit::Weeks,
            days if days >= 1 => PeriodUnit::Days,
            _ if span.num_minutes() >= 60 => PeriodUnit::Hours,
            _ => PeriodUnit::Minutes,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            PeriodUnit::Minutes => 0,
            PeriodUnit::Hours => 1,
            PeriodUnit::Days => 2,
            PeriodUnit::Weeks => 3,
            PeriodUnit::Months => 5,
            PeriodUnit::Years => 8,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(PeriodUnit::Minutes),
            1 => Some(PeriodUnit::Hours),
            2 => Some(PeriodUnit::Days),
            3 => Some(PeriodUnit::Weeks),
            5 => Some(PeriodUnit::Months),
            8 => Some(PeriodUnit::Years),
            _ => None,
        }
    }
}

/// True when some zero-amount segment covers working time, i.e. the work
/// was interrupted.
pub fn has_splits<A: TimephasedAmount>(calendar: &ProjectCalendar<'_>, list: &[TimephasedSegment<A>]) -> bool {
    list.iter()
        .any(|segment| segment.is_zero() && calendar.working_millis(segment.start, segment.finish) != 0)
}

/// Joins runs of consecutive segments with the same per-day amount that
/// follow each other without a gap in working time.
pub fn coalesce_equal_days<A: TimephasedAmount>(
    calendar: &ProjectCalendar<'_>,
    list: &[TimephasedSegment<A>],
) -> Vec<TimephasedSegment<A>> {
    let mut result: Vec<TimephasedSegment<A>> = Vec::with_capacity(list.len());
    for segment in list {
        if let Some(previous) = result.last_mut() {
            let contiguous = segment.start >= previous.finish
                && segment.start <= calendar.next_work_start(previous.finish);
            if contiguous && previous.amount_per_day == segment.amount_per_day {
                previous.finish = segment.finish;
                previous.total_amount = previous
                    .total_amount
                    .with_value(previous.total_amount.value() + segment.total_amount.value());
                continue;
            }
        }
        result.push(*segment);
    }
    result
}
