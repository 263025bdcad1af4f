//! Recurring calendar exceptions: "every second Monday", "the last Friday of
//! each month", "15 December every year".

use crate::calendar::{CalendarException, TimeRange};
use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

const WEEKDAYS_FROM_SUNDAY: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceType {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl RecurrenceType {
    /// Decodes the recurrence type stored in binary schedule files, returning
    /// the type and whether it is relative ("2nd Tuesday") or absolute.
    pub fn from_binary_code(code: i32) -> Option<(RecurrenceType, bool)> {
        match code {
            1 | 7 => Some((RecurrenceType::Daily, false)),
            2 => Some((RecurrenceType::Yearly, false)),
            3 => Some((RecurrenceType::Yearly, true)),
            4 => Some((RecurrenceType::Monthly, false)),
            5 => Some((RecurrenceType::Monthly, true)),
            6 => Some((RecurrenceType::Weekly, false)),
            _ => None,
        }
    }

    pub fn from_text_code(code: i32) -> Option<RecurrenceType> {
        match code {
            1 => Some(RecurrenceType::Daily),
            4 => Some(RecurrenceType::Weekly),
            8 => Some(RecurrenceType::Monthly),
            16 => Some(RecurrenceType::Yearly),
            _ => None,
        }
    }

    pub fn to_text_code(self) -> i32 {
        match self {
            RecurrenceType::Daily => 1,
            RecurrenceType::Weekly => 4,
            RecurrenceType::Monthly => 8,
            RecurrenceType::Yearly => 16,
        }
    }

    /// Position when overlaying expanded exceptions; later types win.
    pub(crate) fn overlay_rank(self) -> u8 {
        match self {
            RecurrenceType::Weekly => 0,
            RecurrenceType::Monthly => 1,
            RecurrenceType::Yearly => 2,
            RecurrenceType::Daily => 3,
        }
    }
}

impl fmt::Display for RecurrenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecurrenceType::Daily => "Daily",
            RecurrenceType::Weekly => "Weekly",
            RecurrenceType::Monthly => "Monthly",
            RecurrenceType::Yearly => "Yearly",
        };
        f.write_str(name)
    }
}

/// Set of weekdays stored as a bitmask, Sunday = 0x01 through Saturday = 0x40.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub const EMPTY: WeekdaySet = WeekdaySet(0);

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & 0x7F)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, day: Weekday) -> bool {
        self.0 & Self::mask(day) != 0
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= Self::mask(day);
    }

    pub fn remove(&mut self, day: Weekday) {
        self.0 &= !Self::mask(day);
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Days in the set, Sunday first.
    pub fn iter(self) -> impl Iterator<Item = Weekday> {
        WEEKDAYS_FROM_SUNDAY
            .into_iter()
            .filter(move |day| self.contains(*day))
    }

    fn mask(day: Weekday) -> u8 {
        1 << day.num_days_from_sunday()
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<T: IntoIterator<Item = Weekday>>(iter: T) -> Self {
        let mut set = WeekdaySet::EMPTY;
        for day in iter {
            set.insert(day);
        }
        set
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringData {
    pub recurrence_type: RecurrenceType,
    #[serde(default)]
    pub relative: bool,
    #[serde(default = "default_frequency")]
    pub frequency: u32,
    #[serde(default)]
    pub weekly_days: WeekdaySet,
    #[serde(default)]
    pub day_of_week: Option<Weekday>,
    #[serde(default)]
    pub day_number: Option<u32>,
    #[serde(default)]
    pub month_number: Option<u32>,
    #[serde(default)]
    pub occurrences: Option<u32>,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub finish_date: Option<NaiveDate>,
}

fn default_frequency() -> u32 {
    1
}

impl RecurringData {
    pub fn new(recurrence_type: RecurrenceType, start_date: NaiveDate) -> Self {
        Self {
            recurrence_type,
            relative: false,
            frequency: 1,
            weekly_days: WeekdaySet::EMPTY,
            day_of_week: None,
            day_number: None,
            month_number: None,
            occurrences: None,
            start_date,
            finish_date: None,
        }
    }

    pub fn daily(start_date: NaiveDate, frequency: u32) -> Self {
        Self {
            frequency,
            ..Self::new(RecurrenceType::Daily, start_date)
        }
    }

    pub fn weekly(start_date: NaiveDate, frequency: u32, days: WeekdaySet) -> Self {
        Self {
            frequency,
            weekly_days: days,
            ..Self::new(RecurrenceType::Weekly, start_date)
        }
    }

    /// The `day_number`th `day_of_week` of the month; numbers above 4 mean the last one.
    pub fn monthly_relative(
        start_date: NaiveDate,
        frequency: u32,
        day_number: u32,
        day_of_week: Weekday,
    ) -> Self {
        Self {
            relative: true,
            frequency,
            day_number: Some(day_number),
            day_of_week: Some(day_of_week),
            ..Self::new(RecurrenceType::Monthly, start_date)
        }
    }

    pub fn monthly_absolute(start_date: NaiveDate, frequency: u32, day_number: u32) -> Self {
        Self {
            frequency,
            day_number: Some(day_number),
            ..Self::new(RecurrenceType::Monthly, start_date)
        }
    }

    pub fn yearly_relative(
        start_date: NaiveDate,
        month_number: u32,
        day_number: u32,
        day_of_week: Weekday,
    ) -> Self {
        Self {
            relative: true,
            month_number: Some(month_number),
            day_number: Some(day_number),
            day_of_week: Some(day_of_week),
            ..Self::new(RecurrenceType::Yearly, start_date)
        }
    }

    pub fn yearly_absolute(start_date: NaiveDate, month_number: u32, day_number: u32) -> Self {
        Self {
            month_number: Some(month_number),
            day_number: Some(day_number),
            ..Self::new(RecurrenceType::Yearly, start_date)
        }
    }

    pub fn with_occurrences(mut self, occurrences: u32) -> Self {
        self.occurrences = Some(occurrences);
        self
    }

    pub fn with_finish_date(mut self, finish_date: NaiveDate) -> Self {
        self.finish_date = Some(finish_date);
        self
    }

    /// All dates on which the recurrence falls, in ascending order.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let frequency = self.frequency.max(1);
        let mut dates = Vec::new();
        match (self.recurrence_type, self.relative) {
            (RecurrenceType::Daily, _) => self.daily_dates(frequency, &mut dates),
            (RecurrenceType::Weekly, _) => self.weekly_dates(frequency, &mut dates),
            (RecurrenceType::Monthly, true) => self.monthly_relative_dates(frequency, &mut dates),
            (RecurrenceType::Monthly, false) => self.monthly_absolute_dates(frequency, &mut dates),
            (RecurrenceType::Yearly, true) => self.yearly_relative_dates(&mut dates),
            (RecurrenceType::Yearly, false) => self.yearly_absolute_dates(&mut dates),
        }
        dates
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates().first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates().last().copied()
    }

    pub fn is_valid(&self) -> bool {
        !self.dates().is_empty()
    }

    /// One single-day exception per recurrence date.
    pub fn expand(&self, hours: &[TimeRange], name: Option<&str>) -> Vec<CalendarException> {
        self.dates()
            .into_iter()
            .map(|date| {
                let mut exception = CalendarException::new(date, date);
                exception.name = name.map(str::to_string);
                exception.hours = hours.to_vec();
                exception
            })
            .collect()
    }

    /// A daily recurrence with frequency one is just a date range; returns
    /// `None` in that case so callers store a plain exception instead.
    pub fn simplify(&self) -> Option<RecurringData> {
        if self.recurrence_type == RecurrenceType::Daily && self.frequency <= 1 {
            None
        } else {
            Some(self.clone())
        }
    }

    /// Stops at whichever comes first: `occurrences` dates or `finish_date`.
    fn more_dates(&self, date: NaiveDate, dates: &[NaiveDate]) -> bool {
        let limit = match (self.occurrences, self.finish_date) {
            (Some(occurrences), _) => occurrences.max(1) as usize,
            (None, Some(_)) => usize::MAX,
            (None, None) => 1,
        };
        dates.len() < limit && self.finish_date.is_none_or(|finish| date <= finish)
    }

    fn daily_dates(&self, frequency: u32, dates: &mut Vec<NaiveDate>) {
        let mut date = self.start_date;
        while self.more_dates(date, dates) {
            dates.push(date);
            let Some(next) = date.checked_add_days(Days::new(u64::from(frequency))) else {
                break;
            };
            date = next;
        }
    }

    fn weekly_dates(&self, frequency: u32, dates: &mut Vec<NaiveDate>) {
        if self.weekly_days.is_empty() {
            return;
        }

        // Work from the Sunday that starts the week containing the start date.
        let rewind = u64::from(self.start_date.weekday().num_days_from_sunday());
        let Some(mut date) = self.start_date.checked_sub_days(Days::new(rewind)) else {
            return;
        };

        while self.more_dates(date, dates) {
            let mut offset: u64 = 0;
            for day in WEEKDAYS_FROM_SUNDAY {
                if self.weekly_days.contains(day) {
                    if offset != 0 {
                        date = date + Days::new(offset);
                        offset = 0;
                    }
                    if !self.more_dates(date, dates) {
                        break;
                    }
                    if date >= self.start_date {
                        dates.push(date);
                    }
                }
                offset += 1;
            }

            if frequency > 1 {
                offset += 7 * u64::from(frequency - 1);
            }
            date = date + Days::new(offset);
        }
    }

    fn monthly_relative_dates(&self, frequency: u32, dates: &mut Vec<NaiveDate>) {
        let Some(day_of_week) = self.day_of_week else {
            return;
        };
        let day_number = self.day_number.unwrap_or(1);
        let Some(mut month) = first_of_month(self.start_date.year(), self.start_date.month()) else {
            return;
        };

        while self.more_dates(month, dates) {
            let date = relative_day(month, day_number, day_of_week);
            if date >= self.start_date {
                if !self.more_dates(date, dates) {
                    break;
                }
                dates.push(date);
            }
            let Some(next) = month.checked_add_months(Months::new(frequency)) else {
                break;
            };
            month = next;
        }
    }

    fn monthly_absolute_dates(&self, frequency: u32, dates: &mut Vec<NaiveDate>) {
        let required = self.day_number.unwrap_or(1).max(1);
        let Some(mut month) = first_of_month(self.start_date.year(), self.start_date.month()) else {
            return;
        };
        if required < self.start_date.day() {
            month = month + Months::new(1);
        }

        while self.more_dates(month, dates) {
            let date = clamped_day(month, required);
            if !self.more_dates(date, dates) {
                break;
            }
            dates.push(date);
            let Some(next) = month.checked_add_months(Months::new(frequency)) else {
                break;
            };
            month = next;
        }
    }

    fn yearly_relative_dates(&self, dates: &mut Vec<NaiveDate>) {
        let Some(day_of_week) = self.day_of_week else {
            return;
        };
        let day_number = self.day_number.unwrap_or(1);
        let Some(mut month) = self.anchor_month() else {
            return;
        };

        while self.more_dates(month, dates) {
            let date = relative_day(month, day_number, day_of_week);
            if date >= self.start_date {
                if !self.more_dates(date, dates) {
                    break;
                }
                dates.push(date);
            }
            let Some(next) = month.checked_add_months(Months::new(12)) else {
                break;
            };
            month = next;
        }
    }

    fn yearly_absolute_dates(&self, dates: &mut Vec<NaiveDate>) {
        let required = self.day_number.unwrap_or(1).max(1);
        let Some(mut month) = self.anchor_month() else {
            return;
        };

        while self.more_dates(month, dates) {
            let mut date = clamped_day(month, required);
            if date < self.start_date {
                let Some(next_year) = date.checked_add_months(Months::new(12)) else {
                    break;
                };
                date = next_year;
            }
            if !self.more_dates(date, dates) {
                break;
            }
            dates.push(date);
            let Some(next) =
                first_of_month(date.year(), date.month()).and_then(|m| m.checked_add_months(Months::new(12)))
            else {
                break;
            };
            month = next;
        }
    }

    fn anchor_month(&self) -> Option<NaiveDate> {
        first_of_month(self.start_date.year(), self.month_number?)
    }
}

fn first_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn last_of_month(month: NaiveDate) -> NaiveDate {
    let next = month + Months::new(1);
    next.pred_opt().unwrap_or(month)
}

fn clamped_day(month: NaiveDate, day: u32) -> NaiveDate {
    let last = last_of_month(month);
    month.with_day(day.min(last.day())).unwrap_or(last)
}

/// The `day_number`th `weekday` counted from the first of `month`, or the
/// last such weekday when `day_number` is greater than four.
fn relative_day(month: NaiveDate, day_number: u32, weekday: Weekday) -> NaiveDate {
    if day_number > 4 {
        let last = last_of_month(month);
        let back = (7 + last.weekday().num_days_from_sunday() - weekday.num_days_from_sunday()) % 7;
        return last - Days::new(u64::from(back));
    }

    let forward = (7 + weekday.num_days_from_sunday() - month.weekday().num_days_from_sunday()) % 7;
    let weeks = u64::from(day_number.max(1) - 1) * 7;
    month + Days::new(u64::from(forward) + weeks)
}

impl fmt::Display for RecurringData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[RecurringData {}", self.recurrence_type)?;
        match self.recurrence_type {
            RecurrenceType::Daily => write!(f, " every {} day(s)", self.frequency.max(1))?,
            RecurrenceType::Weekly => {
                write!(f, " every {} week(s) on", self.frequency.max(1))?;
                for day in self.weekly_days.iter() {
                    write!(f, " {day}")?;
                }
            }
            RecurrenceType::Monthly | RecurrenceType::Yearly => {
                if self.relative {
                    if let Some(day) = self.day_of_week {
                        match self.day_number.unwrap_or(1) {
                            n if n > 4 => write!(f, " last {day}")?,
                            n => write!(f, " #{n} {day}")?,
                        }
                    }
                } else if let Some(day) = self.day_number {
                    write!(f, " day {day}")?;
                }
                if self.recurrence_type == RecurrenceType::Monthly {
                    write!(f, " every {} month(s)", self.frequency.max(1))?;
                } else if let Some(month) = self.month_number {
                    write!(f, " of month {month}")?;
                }
            }
        }
        write!(f, " from {}", self.start_date)?;
        match (self.finish_date, self.occurrences) {
            (Some(finish), _) => write!(f, " to {finish}")?,
            (None, Some(occurrences)) => write!(f, " for {occurrences} occurrence(s)")?,
            (None, None) => {}
        }
        write!(f, "]")
    }
}
