use std::fmt;

use crate::error::{ConfigurationError, Result};

const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

// Index is the cron value: 0 = Sunday.
const WEEKDAY_NAMES: [&str; 7] = [
    "sunday",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
];

/// Normalized "when does this task run" value.
///
/// Two descriptors with equal fields are the same schedule and must map to a
/// single persisted schedule row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScheduleDescriptor {
    /// Run repeatedly with a fixed interval in seconds.
    Interval { seconds: i64 },

    /// Run according to a five-field cron expression.
    Crontab(CrontabFields),
}

impl ScheduleDescriptor {
    /// Build an interval descriptor, rejecting anything below one second.
    pub fn interval(seconds: i64) -> Result<Self> {
        if seconds <= 0 {
            return Err(ConfigurationError::NonPositiveInterval { seconds });
        }
        Ok(Self::Interval { seconds })
    }

    /// Parse a `"*/5 * * * *"` style expression.
    pub fn crontab(expression: &str) -> Result<Self> {
        Ok(Self::Crontab(CrontabFields::parse(expression)?))
    }

    /// Re-check and normalize the descriptor. Returns the canonical form that
    /// persisted rows are matched against.
    pub fn normalized(&self) -> Result<Self> {
        match self {
            Self::Interval { seconds } => Self::interval(*seconds),
            Self::Crontab(fields) => Ok(Self::Crontab(fields.normalized()?)),
        }
    }
}

impl fmt::Display for ScheduleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interval { seconds } => write!(f, "every {seconds}s"),
            Self::Crontab(fields) => write!(f, "cron '{fields}'"),
        }
    }
}

/// One of the five crontab positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CronField {
    Minute,
    Hour,
    DayOfMonth,
    MonthOfYear,
    DayOfWeek,
}

impl CronField {
    pub const ALL: [CronField; 5] = [
        CronField::Minute,
        CronField::Hour,
        CronField::DayOfMonth,
        CronField::MonthOfYear,
        CronField::DayOfWeek,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CronField::Minute => "minute",
            CronField::Hour => "hour",
            CronField::DayOfMonth => "day_of_month",
            CronField::MonthOfYear => "month_of_year",
            CronField::DayOfWeek => "day_of_week",
        }
    }

    /// Inclusive value range.
    fn bounds(self) -> (u32, u32) {
        match self {
            CronField::Minute => (0, 59),
            CronField::Hour => (0, 23),
            CronField::DayOfMonth => (1, 31),
            CronField::MonthOfYear => (1, 12),
            CronField::DayOfWeek => (0, 6),
        }
    }

    /// Resolve a numeric or named token to its cron value.
    fn value(self, token: &str) -> std::result::Result<u32, String> {
        if token.is_empty() {
            return Err("empty value".to_string());
        }
        let value = if token.bytes().all(|b| b.is_ascii_digit()) {
            token
                .parse::<u32>()
                .map_err(|_| format!("'{token}' is not a number"))?
        } else {
            self.named_value(token)
                .ok_or_else(|| format!("unknown {} name '{token}'", self.name()))?
        };
        let (lo, hi) = self.bounds();
        if value < lo || value > hi {
            return Err(format!("{value} is outside {lo}-{hi}"));
        }
        Ok(value)
    }

    /// Full names and three-letter abbreviations are accepted.
    fn named_value(self, token: &str) -> Option<u32> {
        let (names, offset): (&[&str], u32) = match self {
            CronField::MonthOfYear => (&MONTH_NAMES[..], 1),
            CronField::DayOfWeek => (&WEEKDAY_NAMES[..], 0),
            _ => return None,
        };
        names
            .iter()
            .position(|full| token == *full || (token.len() == 3 && full.starts_with(token)))
            .map(|idx| idx as u32 + offset)
    }

    /// Validate one comma-separated element: `*`, `n`, `a-b`, each optionally `/step`.
    fn check_part(self, part: &str) -> std::result::Result<(), String> {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => (range, Some(step)),
            None => (part, None),
        };
        if let Some(step) = step {
            let step: u32 = step
                .parse()
                .map_err(|_| format!("step '{step}' is not a number"))?;
            if step == 0 {
                return Err("step must be positive".to_string());
            }
        }
        if range == "*" {
            return Ok(());
        }
        match range.split_once('-') {
            Some((lo, hi)) => {
                let (lo, hi) = (self.value(lo)?, self.value(hi)?);
                if lo > hi {
                    return Err(format!("range {lo}-{hi} is reversed"));
                }
            }
            None => {
                self.value(range)?;
            }
        }
        Ok(())
    }

    /// Validate a whole field and return its normalized form (trimmed, lowercase).
    pub fn normalize(self, raw: &str) -> Result<String> {
        let normalized = raw.trim().to_ascii_lowercase();
        let invalid = |reason: String| ConfigurationError::InvalidCrontabField {
            field: self.name(),
            value: raw.to_string(),
            reason,
        };
        if normalized.is_empty() {
            return Err(invalid("empty field".to_string()));
        }
        if normalized.chars().any(char::is_whitespace) {
            return Err(invalid("whitespace inside field".to_string()));
        }
        for part in normalized.split(',') {
            self.check_part(part).map_err(invalid)?;
        }
        Ok(normalized)
    }
}

/// The five crontab fields, each defaulting to `"*"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CrontabFields {
    pub minute: String,
    pub hour: String,
    pub day_of_month: String,
    pub month_of_year: String,
    pub day_of_week: String,
}

impl Default for CrontabFields {
    fn default() -> Self {
        Self {
            minute: "*".to_string(),
            hour: "*".to_string(),
            day_of_month: "*".to_string(),
            month_of_year: "*".to_string(),
            day_of_week: "*".to_string(),
        }
    }
}

impl CrontabFields {
    /// Parse a five-field expression (`minute hour day_of_month month_of_year day_of_week`).
    pub fn parse(expression: &str) -> Result<Self> {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(ConfigurationError::CrontabArity {
                expression: expression.to_string(),
                found: parts.len(),
            });
        }
        Self {
            minute: parts[0].to_string(),
            hour: parts[1].to_string(),
            day_of_month: parts[2].to_string(),
            month_of_year: parts[3].to_string(),
            day_of_week: parts[4].to_string(),
        }
        .normalized()
    }

    /// Set a single field, leaving the others untouched.
    pub fn with(mut self, field: CronField, value: impl Into<String>) -> Self {
        let value = value.into();
        match field {
            CronField::Minute => self.minute = value,
            CronField::Hour => self.hour = value,
            CronField::DayOfMonth => self.day_of_month = value,
            CronField::MonthOfYear => self.month_of_year = value,
            CronField::DayOfWeek => self.day_of_week = value,
        }
        self
    }

    pub fn get(&self, field: CronField) -> &str {
        match field {
            CronField::Minute => &self.minute,
            CronField::Hour => &self.hour,
            CronField::DayOfMonth => &self.day_of_month,
            CronField::MonthOfYear => &self.month_of_year,
            CronField::DayOfWeek => &self.day_of_week,
        }
    }

    /// Validate every field and return the canonical copy.
    pub fn normalized(&self) -> Result<Self> {
        let mut out = Self::default();
        for field in CronField::ALL {
            out = out.with(field, field.normalize(self.get(field))?);
        }
        Ok(out)
    }
}

impl fmt::Display for CrontabFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.minute, self.hour, self.day_of_month, self.month_of_year, self.day_of_week
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_five_field_expression() {
        let fields = CrontabFields::parse("0 */2 * * *").unwrap();
        assert_eq!(fields.minute, "0");
        assert_eq!(fields.hour, "*/2");
        assert_eq!(fields.day_of_month, "*");
        assert_eq!(fields.to_string(), "0 */2 * * *");
    }

    #[test]
    fn wrong_field_count_is_rejected() {
        let err = CrontabFields::parse("*/5 * * *").unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::CrontabArity {
                expression: "*/5 * * *".to_string(),
                found: 4
            }
        );
    }

    #[test]
    fn accepts_lists_ranges_and_steps() {
        assert!(CrontabFields::parse("0,15,30,45 9-17 1-15/2 */3 1-5").is_ok());
    }

    #[test]
    fn accepts_month_and_weekday_names() {
        let fields = CrontabFields::parse("0 3 * Jan-Mar Monday").unwrap();
        assert_eq!(fields.month_of_year, "jan-mar");
        assert_eq!(fields.day_of_week, "monday");
        assert!(CrontabFields::parse("0 3 * * sat,sun").is_ok());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        for expr in ["60 * * * *", "* 24 * * *", "* * 0 * *", "* * * 13 *", "* * * * 7"] {
            let err = CrontabFields::parse(expr).unwrap_err();
            assert!(
                matches!(err, ConfigurationError::InvalidCrontabField { .. }),
                "{expr}: {err:?}"
            );
        }
    }

    #[test]
    fn malformed_parts_are_rejected() {
        for expr in ["*/0 * * * *", "1-x * * * *", "5-1 * * * *", "1,,2 * * * *", "* * * * funday"] {
            assert!(CrontabFields::parse(expr).is_err(), "{expr} should fail");
        }
    }

    #[test]
    fn names_only_apply_to_month_and_weekday() {
        let err = CrontabFields::parse("mon * * * *").unwrap_err();
        match err {
            ConfigurationError::InvalidCrontabField { field, .. } => assert_eq!(field, "minute"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let fields = CrontabFields::default()
            .with(CronField::Minute, "0")
            .with(CronField::Hour, "3")
            .with(CronField::DayOfWeek, "monday")
            .normalized()
            .unwrap();
        assert_eq!(fields.to_string(), "0 3 * * monday");
    }

    #[test]
    fn normalization_makes_equivalent_descriptors_equal() {
        let a = ScheduleDescriptor::Crontab(CrontabFields::default().with(CronField::DayOfWeek, " MON "));
        let b = ScheduleDescriptor::crontab("* * * * mon").unwrap();
        assert_eq!(a.normalized().unwrap(), b);
    }

    #[test]
    fn interval_must_be_positive() {
        assert!(ScheduleDescriptor::interval(1).is_ok());
        assert_eq!(
            ScheduleDescriptor::interval(0).unwrap_err(),
            ConfigurationError::NonPositiveInterval { seconds: 0 }
        );
        assert!(ScheduleDescriptor::Interval { seconds: -5 }.normalized().is_err());
    }
}
