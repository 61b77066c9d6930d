//! Day-type keys and their resolution against the calendar.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Weekday};

use crate::error::SetupError;

/// Calendar facts about one simulated day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayContext {
    pub date: NaiveDate,
    pub holiday: bool,
}

impl DayContext {
    pub fn new(date: NaiveDate, holiday: bool) -> Self {
        Self { date, holiday }
    }

    pub fn weekday(&self) -> Weekday {
        self.date.weekday()
    }

    pub fn is_weekend(&self) -> bool {
        matches!(self.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// A weekday that is not a holiday.
    pub fn is_working(&self) -> bool {
        !self.is_weekend() && !self.holiday
    }
}

/// Key selecting which parameter set of an activity applies on a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DayType {
    /// A fixed calendar day, written `D/M`.
    Date { day: u32, month: u32 },
    /// One day of the week, written `mon` .. `sun`.
    Weekday(Weekday),
    Weekdays,
    Weekends,
    Working,
    NonWorking,
    Any,
}

impl FromStr for DayType {
    type Err = SetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        let invalid = || SetupError::InvalidDayType(s.to_string());
        match key.as_str() {
            "any" => Ok(Self::Any),
            "weekdays" => Ok(Self::Weekdays),
            "weekends" => Ok(Self::Weekends),
            "working" => Ok(Self::Working),
            "nonworking" => Ok(Self::NonWorking),
            _ => {
                if let Some((day, month)) = key.split_once('/') {
                    let day: u32 = day.parse().map_err(|_| invalid())?;
                    let month: u32 = month.parse().map_err(|_| invalid())?;
                    // 2024 is a leap year, so 29/2 is accepted.
                    NaiveDate::from_ymd_opt(2024, month, day).ok_or_else(invalid)?;
                    Ok(Self::Date { day, month })
                } else {
                    key.parse::<Weekday>().map(Self::Weekday).map_err(|_| invalid())
                }
            }
        }
    }
}

impl fmt::Display for DayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date { day, month } => write!(f, "{day}/{month}"),
            Self::Weekday(w) => write!(f, "{}", w.to_string().to_ascii_lowercase()),
            Self::Weekdays => f.write_str("weekdays"),
            Self::Weekends => f.write_str("weekends"),
            Self::Working => f.write_str("working"),
            Self::NonWorking => f.write_str("nonworking"),
            Self::Any => f.write_str("any"),
        }
    }
}

/// Maps a day to the key of one resolution tier.
pub type Resolver = fn(&DayContext) -> DayType;

fn exact_date(ctx: &DayContext) -> DayType {
    DayType::Date {
        day: ctx.date.day(),
        month: ctx.date.month(),
    }
}

fn weekday(ctx: &DayContext) -> DayType {
    DayType::Weekday(ctx.weekday())
}

fn week_part(ctx: &DayContext) -> DayType {
    if ctx.is_weekend() {
        DayType::Weekends
    } else {
        DayType::Weekdays
    }
}

fn working_status(ctx: &DayContext) -> DayType {
    if ctx.is_working() {
        DayType::Working
    } else {
        DayType::NonWorking
    }
}

fn any(_: &DayContext) -> DayType {
    DayType::Any
}

/// Resolution tiers, most specific first.
pub const RESOLVERS: [Resolver; 5] = [exact_date, weekday, week_part, working_status, any];

/// Candidate keys for `ctx` in resolution order.
pub fn tiers(ctx: &DayContext) -> impl Iterator<Item = DayType> + '_ {
    RESOLVERS.iter().map(move |resolve| resolve(ctx))
}
