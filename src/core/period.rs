use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Errors arising from parsing calendar values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodParseError {
    #[error("expected YYYY-MM or YYYY-MM-DD, got '{0}'")]
    Malformed(String),
    #[error("month out of range in '{0}'")]
    MonthOutOfRange(String),
    #[error("'{0}' is not a calendar date")]
    InvalidDate(String),
    #[error("unknown granularity '{0}'")]
    UnknownGranularity(String),
}

/// A calendar month, the finest time unit of the flow dataset.
///
/// Serialized as `"YYYY-MM"`.
///
/// # Examples
///
/// ```
/// use flow_atlas::core::period::CalendarMonth;
///
/// let feb = CalendarMonth::new(2024, 2).unwrap();
/// assert_eq!(feb.last_day().to_string(), "2024-02-29");
/// assert_eq!(feb.to_string(), "2024-02");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CalendarMonth {
    year: i32,
    month: u32,
}

impl CalendarMonth {
    /// Returns `None` when `month` is outside 1..=12.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// `month` must be in 1..=12.
    pub(crate) const fn from_valid(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Quarter of the year, 1..=4.
    pub fn quarter(&self) -> u32 {
        (self.month - 1) / 3 + 1
    }

    pub fn first_day(&self) -> NaiveDate {
        // Year and month are validated on construction.
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Last calendar day of the month, leap years included.
    pub fn last_day(&self) -> NaiveDate {
        let (year, month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(year, month, 1)
            .and_then(|d| d.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    /// The following month.
    pub fn succ(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Bucket this month into a period of the given granularity.
    pub fn bucket(&self, granularity: Granularity) -> PeriodKey {
        match granularity {
            Granularity::Monthly => PeriodKey::Month(*self),
            Granularity::Quarterly => PeriodKey::Quarter {
                year: self.year,
                quarter: self.quarter(),
            },
            Granularity::Yearly => PeriodKey::Year(self.year),
        }
    }
}

impl FromStr for CalendarMonth {
    type Err = PeriodParseError;

    /// Accepts `YYYY-MM` and `YYYY-MM-DD`. The day, when present, must exist.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parts: Vec<&str> = trimmed.split('-').collect();
        if parts.len() == 3 {
            let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .map_err(|_| PeriodParseError::InvalidDate(s.to_string()))?;
            return Ok(Self::from_date(date));
        }
        if parts.len() != 2 || parts[0].len() != 4 || parts[1].is_empty() || parts[1].len() > 2 {
            return Err(PeriodParseError::Malformed(s.to_string()));
        }
        let year: i32 = parts[0]
            .parse()
            .map_err(|_| PeriodParseError::Malformed(s.to_string()))?;
        let month: u32 = parts[1]
            .parse()
            .map_err(|_| PeriodParseError::Malformed(s.to_string()))?;
        Self::new(year, month).ok_or_else(|| PeriodParseError::MonthOutOfRange(s.to_string()))
    }
}

impl TryFrom<String> for CalendarMonth {
    type Error = PeriodParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CalendarMonth> for String {
    fn from(month: CalendarMonth) -> Self {
        month.to_string()
    }
}

impl fmt::Display for CalendarMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Time-bucket size used to roll up period totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Monthly,
    Quarterly,
    Yearly,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Monthly => "monthly",
            Granularity::Quarterly => "quarterly",
            Granularity::Yearly => "yearly",
        }
    }
}

impl FromStr for Granularity {
    type Err = PeriodParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" | "month" => Ok(Granularity::Monthly),
            "quarterly" | "quarter" => Ok(Granularity::Quarterly),
            "yearly" | "year" | "annual" => Ok(Granularity::Yearly),
            _ => Err(PeriodParseError::UnknownGranularity(s.to_string())),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A period bucket at some granularity.
///
/// Keys of the same granularity order chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "String")]
pub enum PeriodKey {
    Month(CalendarMonth),
    Quarter { year: i32, quarter: u32 },
    Year(i32),
}

impl PeriodKey {
    pub fn year(&self) -> i32 {
        match self {
            PeriodKey::Month(m) => m.year(),
            PeriodKey::Quarter { year, .. } => *year,
            PeriodKey::Year(year) => *year,
        }
    }

    /// Label of the sub-year slot this period occupies, used to line up
    /// the same slot across years ("Mar", "Q2"). Yearly periods have no
    /// sub-year slot, so their label is the year itself.
    pub fn season_label(&self) -> String {
        match self {
            PeriodKey::Month(m) => MONTH_LABELS[(m.month() - 1) as usize].to_string(),
            PeriodKey::Quarter { quarter, .. } => format!("Q{}", quarter),
            PeriodKey::Year(year) => year.to_string(),
        }
    }

    /// Sort position of the season label within a year.
    pub fn season_index(&self) -> i64 {
        match self {
            PeriodKey::Month(m) => m.month() as i64,
            PeriodKey::Quarter { quarter, .. } => *quarter as i64,
            PeriodKey::Year(year) => *year as i64,
        }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodKey::Month(m) => write!(f, "{}", m),
            PeriodKey::Quarter { year, quarter } => write!(f, "{:04}-Q{}", year, quarter),
            PeriodKey::Year(year) => write!(f, "{:04}", year),
        }
    }
}

impl From<PeriodKey> for String {
    fn from(key: PeriodKey) -> Self {
        key.to_string()
    }
}
