use super::{TimephasedAmount, TimephasedSegment, TimephasedWork};
use crate::calendar::{ProjectCalendar, set_end_time};
use crate::duration::Duration;
use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

/// Re-expands normalised segments to one segment per working day for
/// writers that expect every working day to be covered.
pub struct TimephasedAssembler<'a> {
    calendar: ProjectCalendar<'a>,
}

impl<'a> TimephasedAssembler<'a> {
    pub fn new(calendar: ProjectCalendar<'a>) -> Self {
        Self { calendar }
    }

    /// Multi-day segments become one segment per working day carrying the
    /// per-day amount. Single-day segments are padded with zero segments up
    /// to the day's start and finish. `last` is the segment that precedes the
    /// list and `first` the one that follows it: padding that would run into
    /// either is suppressed when they touch and shortened when they share
    /// the day.
    pub fn split_days<A: TimephasedAmount>(
        &self,
        list: &[TimephasedSegment<A>],
        first: Option<&TimephasedSegment<A>>,
        last: Option<&TimephasedSegment<A>>,
    ) -> Vec<TimephasedSegment<A>> {
        let mut result = Vec::with_capacity(list.len());

        for segment in list {
            if segment.start.date() == segment.finish.date() {
                self.pad_single_day(segment, first, last, &mut result);
            } else {
                self.split_multi_day(segment, &mut result);
            }
        }

        tracing::debug!(
            calendar = self.calendar.name(),
            input = list.len(),
            output = result.len(),
            "assembled day segments"
        );
        result
    }

    /// Splits actual and planned work together so that no padding is
    /// inserted where the actual work ends and the planned work begins.
    pub fn assemble(
        &self,
        complete: &[TimephasedWork],
        planned: &[TimephasedWork],
    ) -> (Vec<TimephasedWork>, Vec<TimephasedWork>) {
        let complete = self.split_days(complete, planned.first(), None);
        let planned = self.split_days(planned, None, complete.last());
        (complete, planned)
    }

    /// Cost segments have no neighbours to take into account.
    pub fn split_cost_days<A: TimephasedAmount>(&self, list: &[TimephasedSegment<A>]) -> Vec<TimephasedSegment<A>> {
        self.split_days(list, None, None)
    }

    fn pad_single_day<A: TimephasedAmount>(
        &self,
        segment: &TimephasedSegment<A>,
        first: Option<&TimephasedSegment<A>>,
        last: Option<&TimephasedSegment<A>>,
        result: &mut Vec<TimephasedSegment<A>>,
    ) {
        let date = segment.start.date();

        if let Some(start_time) = self.calendar.start_time(date) {
            let mut day_start = date.and_time(start_time);
            if segment.start > day_start {
                let mut padding_required = true;
                if let Some(last) = last {
                    if last.finish == segment.start {
                        padding_required = false;
                    } else if last.finish.date() == date {
                        day_start = last.finish;
                    }
                }
                if padding_required {
                    result.push(TimephasedSegment::zero(day_start, segment.start, segment.total_amount));
                }
            }
        }

        result.push(*segment);

        if let Some(finish_time) = self.calendar.finish_time(date) {
            let mut day_finish = set_end_time(segment.start, finish_time);
            if segment.finish < day_finish {
                let mut padding_required = true;
                if let Some(first) = first {
                    if first.start == segment.finish {
                        padding_required = false;
                    } else if first.start.date() == date {
                        day_finish = first.start;
                    }
                }
                if padding_required {
                    result.push(TimephasedSegment::zero(segment.finish, day_finish, segment.total_amount));
                }
            }
        }
    }

    fn split_multi_day<A: TimephasedAmount>(
        &self,
        segment: &TimephasedSegment<A>,
        result: &mut Vec<TimephasedSegment<A>>,
    ) {
        let mut current = segment.start;
        let mut working = self.calendar.is_working_date(current.date());

        while current < segment.finish {
            if working {
                if let Some(finish_time) = self.calendar.finish_time(current.date()) {
                    let day_finish = set_end_time(current, finish_time).min(segment.finish);
                    if day_finish > current {
                        result.push(TimephasedSegment {
                            start: current,
                            finish: day_finish,
                            total_amount: segment.amount_per_day,
                            amount_per_day: segment.amount_per_day,
                        });
                    }
                }
            }

            current += TimeDelta::days(1);
            working = self.calendar.is_working_date(current.date());
            if working {
                if let Some(start_time) = self.calendar.start_time(current.date()) {
                    current = current.date().and_time(start_time);
                }
            }
        }
    }
}

/// Progress of a resource assignment, used to synthesise timephased work
/// when a source file carries none.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssignmentProgress {
    pub start: NaiveDateTime,
    pub finish: NaiveDateTime,
    pub actual_start: Option<NaiveDateTime>,
    pub actual_finish: Option<NaiveDateTime>,
    pub actual_work: Duration,
    pub remaining_work: Duration,
}

/// A single segment of remaining work, starting where the actual work ends.
/// Absent once the assignment has finished.
pub fn generate_planned_work(
    calendar: &ProjectCalendar<'_>,
    progress: &AssignmentProgress,
) -> Option<TimephasedWork> {
    if progress.actual_finish.is_some() {
        return None;
    }

    let start = match progress.actual_start {
        None => progress.start,
        Some(actual_start) => {
            calendar.next_work_start(calendar.add_work(actual_start, &progress.actual_work))
        }
    };

    Some(
        TimephasedSegment::new(start, progress.finish, progress.remaining_work)
            .with_amount_per_day(minutes_per_day(calendar)),
    )
}

/// A single segment of actual work. Absent until the assignment has started.
pub fn generate_complete_work(
    calendar: &ProjectCalendar<'_>,
    progress: &AssignmentProgress,
) -> Option<TimephasedWork> {
    let actual_start = progress.actual_start?;
    let finish = progress
        .actual_finish
        .unwrap_or_else(|| calendar.add_work(actual_start, &progress.actual_work));

    Some(
        TimephasedSegment::new(actual_start, finish, progress.actual_work)
            .with_amount_per_day(minutes_per_day(calendar)),
    )
}

fn minutes_per_day(calendar: &ProjectCalendar<'_>) -> Duration {
    Duration::minutes(calendar.time_unit_defaults().minutes_per_day.trunc())
}
