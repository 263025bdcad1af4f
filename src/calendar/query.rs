use super::{
    Calendar, CalendarException, CalendarId, CalendarSet, DayType, MILLIS_PER_DAY, TimeRange,
    day_start, millis_in_range, millis_of_day, same_day, set_end_time, set_time,
};
use crate::duration::{Duration, TimeUnit, TimeUnitDefaults, round_to};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike, Weekday};

/// Upper bound on consecutive non-working days searched before giving up.
const MAX_NONWORKING_DAYS: u32 = 1000;

/// Read-only view of one calendar inside its [`CalendarSet`], resolving
/// exceptions and default days through the parent chain.
#[derive(Debug, Clone, Copy)]
pub struct ProjectCalendar<'a> {
    set: &'a CalendarSet,
    id: CalendarId,
}

impl<'a> ProjectCalendar<'a> {
    pub(crate) fn new(set: &'a CalendarSet, id: CalendarId) -> Self {
        Self { set, id }
    }

    pub fn id(&self) -> CalendarId {
        self.id
    }

    pub fn calendar(&self) -> &'a Calendar {
        self.set.entry(self.id)
    }

    pub fn name(&self) -> &'a str {
        &self.calendar().name
    }

    pub fn parent(&self) -> Option<ProjectCalendar<'a>> {
        self.calendar()
            .parent()
            .map(|parent| ProjectCalendar::new(self.set, parent))
    }

    pub fn derived_calendars(&self) -> Vec<ProjectCalendar<'a>> {
        self.set
            .derived_calendars(self.id)
            .into_iter()
            .map(|id| ProjectCalendar::new(self.set, id))
            .collect()
    }

    /// The exception covering `date`, looking at this calendar first and
    /// then its ancestors.
    pub fn exception(&self, date: NaiveDate) -> Option<&'a CalendarException> {
        let expanded = self.calendar().expanded_exceptions();
        let index = expanded.partition_point(|exception| exception.from <= date);
        if index > 0 && expanded[index - 1].contains(date) {
            return Some(&expanded[index - 1]);
        }
        self.parent().and_then(|parent| parent.exception(date))
    }

    /// Weekday type with `Default` resolved through the parent chain. A base
    /// calendar's default days are non-working.
    pub fn day_type(&self, day: Weekday) -> DayType {
        match self.calendar().day_type(day) {
            DayType::Default => self
                .parent()
                .map_or(DayType::NonWorking, |parent| parent.day_type(day)),
            day_type => day_type,
        }
    }

    /// Working hours of the weekly pattern, ignoring exceptions.
    pub fn weekday_hours(&self, day: Weekday) -> &'a [TimeRange] {
        let calendar = self.calendar();
        match calendar.day_type(day) {
            DayType::NonWorking => &[],
            DayType::Working => calendar.hours(day),
            DayType::Default => self
                .parent()
                .map_or(&[][..], |parent| parent.weekday_hours(day)),
        }
    }

    pub fn hours(&self, date: NaiveDate) -> &'a [TimeRange] {
        match self.exception(date) {
            Some(exception) => &exception.hours,
            None => self.weekday_hours(date.weekday()),
        }
    }

    pub fn is_working_date(&self, date: NaiveDate) -> bool {
        !self.hours(date).is_empty()
    }

    pub fn start_time(&self, date: NaiveDate) -> Option<NaiveTime> {
        self.hours(date).first().map(|range| range.start)
    }

    /// Finish of the last range on `date`; 00:00 means the end of the day.
    pub fn finish_time(&self, date: NaiveDate) -> Option<NaiveTime> {
        self.hours(date).last().map(|range| range.end)
    }

    /// Minutes per day and week from this calendar or its nearest ancestor
    /// that sets them, falling back to the set defaults.
    pub fn time_unit_defaults(&self) -> TimeUnitDefaults {
        let base = self.set.defaults();
        TimeUnitDefaults {
            minutes_per_day: self
                .inherited(|calendar| calendar.minutes_per_day)
                .unwrap_or(base.minutes_per_day),
            minutes_per_week: self
                .inherited(|calendar| calendar.minutes_per_week)
                .unwrap_or(base.minutes_per_week),
            days_per_month: base.days_per_month,
        }
    }

    fn inherited<T>(&self, value: impl Fn(&Calendar) -> Option<T> + Copy) -> Option<T> {
        value(self.calendar()).or_else(|| self.parent().and_then(|parent| parent.inherited(value)))
    }

    /// Working time between two instants in minutes. Reversed instants give
    /// a negative amount.
    pub fn working_minutes(&self, start: NaiveDateTime, finish: NaiveDateTime) -> Duration {
        Duration::minutes(self.working_millis(start, finish) as f64 / 60_000.0)
    }

    pub fn work(&self, start: NaiveDateTime, finish: NaiveDateTime, unit: TimeUnit) -> Duration {
        self.working_minutes(start, finish)
            .convert_units(unit, &self.time_unit_defaults())
    }

    pub(crate) fn working_millis(&self, start: NaiveDateTime, finish: NaiveDateTime) -> i64 {
        let (start, finish, invert) = if start > finish {
            (finish, start, true)
        } else {
            (start, finish, false)
        };

        let total = if same_day(start, finish) {
            total_between(self.hours(start.date()), start.time(), finish.time())
        } else {
            self.multi_day_millis(start, finish)
        };

        if invert { -total } else { total }
    }

    fn multi_day_millis(&self, start: NaiveDateTime, finish: NaiveDateTime) -> i64 {
        let canonical_end = day_start(finish);
        let mut total = 0;

        let mut current = start;
        while !self.is_working_date(current.date()) && current < canonical_end {
            current += TimeDelta::days(1);
        }

        if current < canonical_end {
            // Keep the start time only if the first working day is the start day.
            let target = if current == start { start.time() } else { NaiveTime::MIN };
            total += total_from(self.hours(current.date()), target);

            loop {
                current += TimeDelta::days(1);
                if current >= canonical_end {
                    break;
                }
                total += self
                    .hours(current.date())
                    .iter()
                    .map(TimeRange::duration_millis)
                    .sum::<i64>();
            }
        }

        total + total_between(self.hours(finish.date()), NaiveTime::MIN, finish.time())
    }

    pub fn working_days_between(&self, start: NaiveDate, end: NaiveDate) -> i64 {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        start
            .iter_days()
            .take_while(|date| *date <= end)
            .filter(|date| self.is_working_date(*date))
            .count() as i64
    }

    /// Earliest working instant at or after `instant`.
    pub fn next_work_start(&self, instant: NaiveDateTime) -> NaiveDateTime {
        let time = instant.time();
        let today = self
            .hours(instant.date())
            .iter()
            .find(|range| range.ends_at_midnight() || time < range.end)
            .map(|range| if time > range.start { time } else { range.start });

        if let Some(start) = today {
            return set_time(instant, start);
        }

        let Some(date) = self.find_working_day(instant, TimeDelta::days(1)) else {
            return instant;
        };
        match self.start_time(date.date()) {
            Some(start) => set_time(date, start),
            None => instant,
        }
    }

    /// Latest working instant at or before `instant`.
    pub fn previous_work_finish(&self, instant: NaiveDateTime) -> NaiveDateTime {
        let time = millis_of_day(instant.time());
        let today = self.hours(instant.date()).iter().rev().find_map(|range| {
            let end = if range.ends_at_midnight() {
                MILLIS_PER_DAY
            } else {
                millis_of_day(range.end)
            };
            if end <= time {
                Some(range.end)
            } else if millis_of_day(range.start) < time {
                Some(instant.time())
            } else {
                None
            }
        });

        if let Some(finish) = today {
            return set_end_time(instant, finish);
        }

        let Some(date) = self.find_working_day(instant, TimeDelta::days(-1)) else {
            return instant;
        };
        match self.finish_time(date.date()) {
            Some(finish) => set_end_time(date, finish),
            None => instant,
        }
    }

    fn find_working_day(&self, from: NaiveDateTime, step: TimeDelta) -> Option<NaiveDateTime> {
        let mut date = from;
        for _ in 0..MAX_NONWORKING_DAYS {
            date = date.checked_add_signed(step)?;
            if self.is_working_date(date.date()) {
                return Some(date);
            }
        }
        None
    }

    /// The instant reached by working `duration` from `instant`. Elapsed
    /// units add wall-clock time; negative durations walk backwards.
    pub fn add_work(&self, instant: NaiveDateTime, duration: &Duration) -> NaiveDateTime {
        let defaults = self.time_unit_defaults();
        if duration.unit().is_elapsed() {
            let minutes = duration
                .convert_units(TimeUnit::ElapsedMinutes, &defaults)
                .amount();
            return instant + TimeDelta::milliseconds((minutes * 60_000.0).round() as i64);
        }

        let minutes = duration.convert_units(TimeUnit::Minutes, &defaults).amount();
        let millis = (round_to(minutes, 2) * 60_000.0).round() as i64;
        let result = if millis < 0 {
            self.subtract_working_millis(instant, -millis)
        } else {
            self.add_working_millis(instant, millis)
        };
        result.with_nanosecond(0).unwrap_or(result)
    }

    fn add_working_millis(&self, start: NaiveDateTime, mut remaining: i64) -> NaiveDateTime {
        if remaining == 0 {
            return start;
        }

        let mut day_begin = start;
        let mut day_end = day_start(start) + TimeDelta::days(1);

        while remaining > 0 {
            let available = self.working_millis(day_begin, day_end);

            if remaining == available {
                if let Some(finish) = self.finish_time(day_begin.date()) {
                    day_end = set_end_time(day_begin, finish);
                }
                break;
            }

            if remaining > available {
                remaining -= available;
                let Some(next) = self.find_working_day(day_begin, TimeDelta::days(1)) else {
                    return day_begin + TimeDelta::days(1);
                };
                let date = next.date();
                day_begin = set_time(next, self.start_time(date).unwrap_or(NaiveTime::MIN));
                day_end = set_end_time(day_begin, self.finish_time(date).unwrap_or(NaiveTime::MIN));
                continue;
            }

            let begin_time = day_begin.time();
            let mut first_range = true;
            for range in self.hours(day_begin.date()) {
                if first_range && !range.ends_at_midnight() && range.end < begin_time {
                    continue;
                }
                let range_start = if first_range && range.start < begin_time {
                    begin_time
                } else {
                    range.start
                };
                first_range = false;

                let length = millis_in_range(range_start, range.end);
                if remaining > length {
                    remaining -= length;
                    continue;
                }

                day_end = if remaining == length {
                    set_end_time(day_begin, range.end)
                } else {
                    set_time(day_begin, range_start + TimeDelta::milliseconds(remaining))
                };
                break;
            }
            remaining = 0;
        }

        day_end
    }

    fn subtract_working_millis(&self, end: NaiveDateTime, mut remaining: i64) -> NaiveDateTime {
        let mut day_end = end;
        let mut day_begin = if end.time() == NaiveTime::MIN {
            day_start(end - TimeDelta::days(1))
        } else {
            day_start(end)
        };

        while remaining > 0 {
            let available = self.working_millis(day_begin, day_end);

            if remaining == available {
                if let Some(start) = self.start_time(day_begin.date()) {
                    day_begin = set_time(day_begin, start);
                }
                break;
            }

            if remaining > available {
                remaining -= available;
                let Some(previous) = self.find_working_day(day_begin, TimeDelta::days(-1)) else {
                    return day_begin - TimeDelta::days(1);
                };
                day_begin = day_start(previous);
                let finish = self.finish_time(previous.date()).unwrap_or(NaiveTime::MIN);
                day_end = set_end_time(day_begin, finish);
                continue;
            }

            // A day end of 00:00 on the following date leaves every range whole.
            let end_time = if same_day(day_begin, day_end) {
                Some(day_end.time())
            } else {
                None
            };
            let mut last_range = true;
            for range in self.hours(day_begin.date()).iter().rev() {
                if let Some(end_time) = end_time {
                    if end_time < range.start {
                        continue;
                    }
                }
                let range_end = match end_time {
                    Some(end_time)
                        if last_range && (range.ends_at_midnight() || range.end > end_time) =>
                    {
                        end_time
                    }
                    _ => range.end,
                };
                last_range = false;

                let length = millis_in_range(range.start, range_end);
                if remaining > length {
                    remaining -= length;
                    continue;
                }

                let range_start = if remaining == length {
                    range.start
                } else {
                    range_end - TimeDelta::milliseconds(remaining)
                };
                day_begin = set_time(day_begin, range_start);
                break;
            }
            remaining = 0;
        }

        day_begin
    }
}

fn total_from(hours: &[TimeRange], target: NaiveTime) -> i64 {
    hours
        .iter()
        .filter(|range| range.ends_at_midnight() || target <= range.end)
        .map(|range| overlap(range.start, range.end, target, range.end))
        .sum()
}

fn total_between(hours: &[TimeRange], start: NaiveTime, end: NaiveTime) -> i64 {
    if start == end {
        return 0;
    }
    hours
        .iter()
        .map(|range| overlap(start, end, range.start, range.end))
        .sum()
}

/// Length of the intersection of two ranges, either of which may end at midnight.
fn overlap(start1: NaiveTime, end1: NaiveTime, start2: NaiveTime, end2: NaiveTime) -> i64 {
    let max_start = start1.max(start2);
    let min_end = match (end1 == NaiveTime::MIN, end2 == NaiveTime::MIN) {
        (true, false) => end2,
        (false, true) => end1,
        _ => end1.min(end2),
    };

    if min_end == NaiveTime::MIN || max_start < min_end {
        millis_in_range(max_start, min_end)
    } else {
        0
    }
}
