use super::{TimephasedAmount, TimephasedSegment};
use crate::calendar::{CalendarError, CalendarId, CalendarSet, ProjectCalendar, set_end_time, set_time};
use crate::duration::{TimeUnitDefaults, round_to};
use chrono::NaiveTime;
use rayon::prelude::*;

/// Rewrites raw segments so each one covers a single calendar day.
///
/// The steps always run in the same order: split across days, merge
/// segments sharing a day, clamp to the day's working hours, then convert
/// work to hours.
pub struct TimephasedNormaliser<'a> {
    calendar: ProjectCalendar<'a>,
    defaults: TimeUnitDefaults,
}

impl<'a> TimephasedNormaliser<'a> {
    pub fn new(calendar: ProjectCalendar<'a>) -> Self {
        Self {
            defaults: calendar.time_unit_defaults(),
            calendar,
        }
    }

    pub fn execute<A: TimephasedAmount>(&self, list: &[TimephasedSegment<A>]) -> Vec<TimephasedSegment<A>> {
        let working: Vec<TimephasedSegment<A>> = list
            .iter()
            .map(|segment| TimephasedSegment {
                total_amount: segment.total_amount.to_working_form(&self.defaults),
                amount_per_day: segment.amount_per_day.to_working_form(&self.defaults),
                ..*segment
            })
            .collect();

        let split = self.split_days(&working);
        let mut merged = self.merge_same_day(split);
        self.validate_same_day(&mut merged);

        tracing::debug!(
            calendar = self.calendar.name(),
            input = list.len(),
            output = merged.len(),
            "normalised timephased segments"
        );

        merged
            .into_iter()
            .map(|segment| TimephasedSegment {
                total_amount: segment.total_amount.to_output_form(&self.defaults),
                amount_per_day: segment.amount_per_day.to_output_form(&self.defaults),
                ..segment
            })
            .collect()
    }

    fn split_days<A: TimephasedAmount>(&self, list: &[TimephasedSegment<A>]) -> Vec<TimephasedSegment<A>> {
        let mut result = Vec::with_capacity(list.len());

        for segment in list {
            let mut calendar_work = self.calendar_minutes(segment);
            let mut current = Some(*segment);

            while let Some(item) = current {
                let start_day = item.start.date();
                // A finish at exactly midnight belongs to the previous day.
                let finish_day = if item.finish.time() == NaiveTime::MIN {
                    item.finish.date().pred_opt().unwrap_or(item.finish.date())
                } else {
                    item.finish.date()
                };

                if start_day >= finish_day {
                    result.push(item);
                    break;
                }

                let (first, rest) = self.split_first_day(&item, calendar_work);
                if let Some(first) = first {
                    tracing::trace!(
                        start = %first.start,
                        finish = %first.finish,
                        amount = first.total_amount.value(),
                        "split first day"
                    );
                    calendar_work -= self.calendar_minutes(&first);
                    result.push(first);
                }

                current = match rest {
                    Some(rest) if rest.start <= item.start => {
                        tracing::warn!(
                            start = %item.start,
                            finish = %item.finish,
                            "no working time found to carry the remainder forward"
                        );
                        result.push(rest);
                        None
                    }
                    rest => rest,
                };
            }
        }

        result
    }

    /// Splits off the part of `item` on its start day. `calendar_work` is the
    /// working time of the whole remaining span; when it is zero nothing can
    /// be apportioned and both halves are absent.
    fn split_first_day<A: TimephasedAmount>(
        &self,
        item: &TimephasedSegment<A>,
        calendar_work: f64,
    ) -> (Option<TimephasedSegment<A>>, Option<TimephasedSegment<A>>) {
        if calendar_work == 0.0 {
            return (None, None);
        }

        let total = item.total_amount.value();
        let date = item.start.date();
        let (split_finish, split_amount, first) = match self.calendar.finish_time(date) {
            Some(finish_time) => {
                let split_finish = set_end_time(item.start, finish_time);
                let minutes = self.calendar.working_minutes(item.start, split_finish).amount();
                let amount = round_to(minutes * total / calendar_work, 2);
                let first = TimephasedSegment::new(item.start, split_finish, item.total_amount.with_value(amount));
                (split_finish, amount, Some(first))
            }
            None => (item.start, 0.0, None),
        };

        let rest_start = self.calendar.next_work_start(split_finish);
        let rest = (rest_start <= item.finish).then(|| {
            TimephasedSegment::new(
                rest_start,
                item.finish,
                item.total_amount.with_value(total - split_amount),
            )
        });

        (first, rest)
    }

    fn merge_same_day<A: TimephasedAmount>(&self, list: Vec<TimephasedSegment<A>>) -> Vec<TimephasedSegment<A>> {
        let mut result: Vec<TimephasedSegment<A>> = Vec::with_capacity(list.len());
        let mut previous: Option<TimephasedSegment<A>> = None;

        for mut item in list {
            if let Some(prev) = previous.filter(|prev| prev.start.date() == item.start.date()) {
                if !prev.is_zero() && item.is_zero() {
                    if let Some(last) = result.last_mut() {
                        last.finish = last.finish.max(item.finish);
                        previous = Some(*last);
                    }
                    continue;
                }

                result.pop();

                if !prev.is_zero() && !item.is_zero() {
                    let amount = prev.total_amount.value() + item.total_amount.value();
                    item = TimephasedSegment::new(prev.start, item.finish, item.total_amount.with_value(amount));
                } else if item.is_zero() {
                    item = prev;
                } else {
                    item.finish = item.finish.max(prev.finish);
                }
            }

            item.amount_per_day = item.total_amount;

            if self.calendar.working_millis(item.start, item.finish) == 0 && item.is_zero() {
                continue;
            }
            result.push(item);
            previous = Some(item);
        }

        result
    }

    fn validate_same_day<A: TimephasedAmount>(&self, list: &mut [TimephasedSegment<A>]) {
        for item in list.iter_mut() {
            let zero = item.is_zero();

            if let Some(calendar_start) = self.calendar.start_time(item.start.date()) {
                let start = item.start.time();
                if (zero && start != calendar_start) || start < calendar_start {
                    item.start = set_time(item.start, calendar_start);
                }
            }

            let finish = item.finish.time();
            if finish == NaiveTime::MIN {
                continue;
            }
            if let Some(calendar_finish) = self.calendar.finish_time(item.finish.date()) {
                let unbounded = calendar_finish == NaiveTime::MIN;
                if (zero && finish != calendar_finish) || (!unbounded && finish > calendar_finish) {
                    item.finish = set_end_time(item.finish, calendar_finish);
                }
            }
        }
    }

    fn calendar_minutes<A: TimephasedAmount>(&self, segment: &TimephasedSegment<A>) -> f64 {
        self.calendar
            .working_minutes(segment.start, segment.finish)
            .amount()
    }
}

/// Normalises independent segment lists, each against its own calendar, in
/// parallel.
pub fn normalise_batch<A: TimephasedAmount>(
    calendars: &CalendarSet,
    batch: &[(CalendarId, Vec<TimephasedSegment<A>>)],
) -> Result<Vec<Vec<TimephasedSegment<A>>>, CalendarError> {
    batch
        .par_iter()
        .map(|(id, list)| {
            let calendar = calendars.get(*id)?;
            Ok(TimephasedNormaliser::new(calendar).execute(list))
        })
        .collect()
}
