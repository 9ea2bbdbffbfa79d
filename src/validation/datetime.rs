//! Calendar dates, times of day, and the two combined.
//!
//! Dates are parsed rather than pattern-matched so that month lengths and leap
//! years are exact. Four-digit years are limited to 1600..=9999 and follow the
//! Gregorian rule; a two-digit year is leap when divisible by four, except `00`.

use crate::validation::patterns::{Pattern, builtin};
use regex::Regex;
use std::sync::LazyLock;

static TIME: LazyLock<Regex> = LazyLock::new(|| {
    builtin(r"^(?:(?:0?[1-9]|1[012])(?::[0-5]\d){0,2} ?(?:[AP]M|[ap]m)|(?:[01]\d|2[0-3])(?::[0-5]\d){0,2})$")
});

const NUMERIC_SEPARATORS: &[char] = &['/', '-', '.', ' '];

const MONTH_NAMES: &[(&str, u32)] = &[
    ("Jan", 1),
    ("January", 1),
    ("Feb", 2),
    ("February", 2),
    ("Mar", 3),
    ("March", 3),
    ("Apr", 4),
    ("April", 4),
    ("May", 5),
    ("Jun", 6),
    ("June", 6),
    ("Jul", 7),
    ("July", 7),
    ("Aug", 8),
    ("August", 8),
    ("Sep", 9),
    ("Sept", 9),
    ("September", 9),
    ("Oct", 10),
    ("October", 10),
    ("Nov", 11),
    ("November", 11),
    ("Dec", 12),
    ("December", 12),
];

/// Date layouts. Keys are case-sensitive: `dMy` is not `dmy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateFormat {
    /// `27-12-2006`, `27/12/06`
    Dmy,
    /// `12-27-2006`
    Mdy,
    /// `2006-12-27`, `06.12.27`
    Ymd,
    /// `27 December 2006`, `27 Dec 2006`
    DayMonthNameYear,
    /// `December 27, 2006`, `Dec 27 2006`
    MonthNameDayYear,
    /// `December 2006`, `Dec/2006`
    MonthNameYear,
    /// `12/2006`
    MonthYear,
}

impl DateFormat {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "dmy" => Some(Self::Dmy),
            "mdy" => Some(Self::Mdy),
            "ymd" => Some(Self::Ymd),
            "dMy" => Some(Self::DayMonthNameYear),
            "Mdy" => Some(Self::MonthNameDayYear),
            "My" => Some(Self::MonthNameYear),
            "my" => Some(Self::MonthYear),
            _ => None,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::Dmy => "dmy",
            Self::Mdy => "mdy",
            Self::Ymd => "ymd",
            Self::DayMonthNameYear => "dMy",
            Self::MonthNameDayYear => "Mdy",
            Self::MonthNameYear => "My",
            Self::MonthYear => "my",
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::Dmy => numeric_date(value, |[d, m, y]| (d, m, y)),
            Self::Mdy => numeric_date(value, |[m, d, y]| (d, m, y)),
            Self::Ymd => numeric_date(value, |[y, m, d]| (d, m, y)),
            Self::DayMonthNameYear => day_month_name_year(value),
            Self::MonthNameDayYear => month_name_day_year(value),
            Self::MonthNameYear => month_name_year(value),
            Self::MonthYear => month_year(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DateOptions {
    /// Accepted layouts; any match passes.
    pub formats: Vec<DateFormat>,
    /// Replaces the layouts entirely.
    pub regex: Option<Pattern>,
}

impl Default for DateOptions {
    fn default() -> Self {
        Self {
            formats: vec![DateFormat::Ymd],
            regex: None,
        }
    }
}

pub fn date(value: &str, options: &DateOptions) -> bool {
    if let Some(regex) = &options.regex {
        return regex.is_match(value);
    }
    options.formats.iter().any(|format| format.matches(value))
}

/// 24-hour `HH[:MM[:SS]]` or 12-hour `H[:MM[:SS]][ ]AM`.
pub fn time(value: &str) -> bool {
    TIME.is_match(value)
}

/// A date, a space, then a time. The split is at the last space.
pub fn datetime(value: &str, options: &DateOptions) -> bool {
    match value.rsplit_once(' ') {
        Some((date_part, time_part)) => date(date_part, options) && time(time_part),
        None => false,
    }
}

fn numeric_date(value: &str, order: impl Fn([&str; 3]) -> (&str, &str, &str)) -> bool {
    let Some(separator) = value.chars().find(|c| NUMERIC_SEPARATORS.contains(c)) else {
        return false;
    };
    let parts: Vec<&str> = value.split(separator).collect();
    let [a, b, c] = parts[..] else {
        return false;
    };
    let (day, month, year) = order([a, b, c]);
    if !(is_digits(year, 2..=2) || is_four_digit_year(year)) {
        return false;
    }
    let (Some(day), Some(month)) = (day_number(day), month_number(month)) else {
        return false;
    };
    valid_day(day, month, year)
}

fn day_month_name_year(value: &str) -> bool {
    let parts: Vec<&str> = value.split(' ').collect();
    let [day, month, year] = parts[..] else {
        return false;
    };
    let (Some(day), Some(month)) = (day_number(day), month_from_name(month)) else {
        return false;
    };
    is_four_digit_year(year) && valid_day(day, month, year)
}

fn month_name_day_year(value: &str) -> bool {
    let parts: Vec<&str> = value.split(' ').collect();
    let [month, day, year] = parts[..] else {
        return false;
    };
    let day = day.strip_suffix(',').unwrap_or(day);
    let (Some(day), Some(month)) = (day_number(day), month_from_name(month)) else {
        return false;
    };
    is_four_digit_year(year) && valid_day(day, month, year)
}

fn month_name_year(value: &str) -> bool {
    let Some((month, year)) = value.split_once([' ', '/']) else {
        return false;
    };
    month_from_name(month).is_some() && is_four_digit_year(year)
}

fn month_year(value: &str) -> bool {
    let Some((month, year)) = value.split_once(['-', ' ', '/', '.']) else {
        return false;
    };
    let month_ok = is_digits(month, 2..=2) && month_number(month).is_some();
    let year_ok = is_digits(year, 4..=4) && matches!(year.as_bytes()[0], b'1' | b'2')
        && (year.as_bytes()[0] == b'2' || year.as_bytes()[1] == b'9');
    month_ok && year_ok
}

fn is_digits(s: &str, len: std::ops::RangeInclusive<usize>) -> bool {
    len.contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_four_digit_year(s: &str) -> bool {
    is_digits(s, 4..=4) && s.parse::<u32>().is_ok_and(|year| year >= 1600)
}

fn day_number(s: &str) -> Option<u32> {
    if !is_digits(s, 1..=2) {
        return None;
    }
    s.parse().ok().filter(|d| (1..=31).contains(d))
}

fn month_number(s: &str) -> Option<u32> {
    if !is_digits(s, 1..=2) {
        return None;
    }
    s.parse().ok().filter(|m| (1..=12).contains(m))
}

fn month_from_name(name: &str) -> Option<u32> {
    MONTH_NAMES
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, month)| *month)
}

fn is_leap(year: &str) -> bool {
    let Ok(n) = year.parse::<u32>() else {
        return false;
    };
    if year.len() == 2 {
        n % 4 == 0 && n != 0
    } else {
        (n % 4 == 0 && n % 100 != 0) || n % 400 == 0
    }
}

fn valid_day(day: u32, month: u32, year: &str) -> bool {
    let days = match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap(year) => 29,
        2 => 28,
        _ => return false,
    };
    day <= days
}
