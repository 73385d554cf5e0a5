//! Subject-relative time coordinates.
//!
//! Every timestamp on a timeline is expressed as fractional days since a
//! per-subject day-zero. When that reference date is missing the
//! coordinate is absent and callers leave the record out of the view.

use std::{fmt, str::FromStr};

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{data::model::Subject, error::TimelineError};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Which reference date anchors day zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum DayZero {
    #[default]
    FirstDose,
    Randomization,
    FirstDoseOf(String),
}

impl DayZero {
    /// Resolve the reference date for `subject`, if recorded.
    pub fn reference(&self, subject: &Subject) -> Option<NaiveDateTime> {
        match self {
            Self::FirstDose => subject.first_dose,
            Self::Randomization => subject.randomization,
            Self::FirstDoseOf(drug) => subject.first_dose_of(drug),
        }
    }
}

impl FromStr for DayZero {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some((head, drug)) = trimmed.split_once(':') {
            let head = head.trim().to_ascii_lowercase();
            let drug = drug.trim();
            if (head == "first-dose" || head == "first-dose-of") && !drug.is_empty() {
                return Ok(Self::FirstDoseOf(drug.to_string()));
            }
            return Err(TimelineError::UnknownDayZero(s.to_string()));
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "first-dose" | "first-dose-overall" => Ok(Self::FirstDose),
            "randomization" | "randomisation" => Ok(Self::Randomization),
            _ => Err(TimelineError::UnknownDayZero(s.to_string())),
        }
    }
}

impl TryFrom<String> for DayZero {
    type Error = TimelineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for DayZero {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstDose => f.write_str("first-dose"),
            Self::Randomization => f.write_str("randomization"),
            Self::FirstDoseOf(drug) => write!(f, "first-dose:{drug}"),
        }
    }
}

impl From<DayZero> for String {
    fn from(value: DayZero) -> Self {
        value.to_string()
    }
}

/// A normalized coordinate with its display forms.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayHour {
    /// Fractional days since day zero; negative before it.
    pub value: f64,
    /// Calendar day offset, `floor(value)`.
    pub day: i64,
    /// Study-day convention: no day 0, so non-negative days shift by one.
    pub study_day: i64,
    pub study_day_hour: f64,
    pub label: String,
    pub day_label: String,
    /// Same instant measured from the first dose of the record's drug.
    pub dose_relative: Option<f64>,
}

impl DayHour {
    pub fn from_value(value: f64, dose_relative: Option<f64>) -> Self {
        let day = value.floor() as i64;
        let study_day = if day >= 0 { day + 1 } else { day };
        let study_day_hour = study_day_hour(value);
        Self {
            value,
            day,
            study_day,
            study_day_hour,
            label: format!("{study_day_hour:.2}"),
            day_label: study_day.to_string(),
            dose_relative,
        }
    }
}

/// Shift a non-negative coordinate by one day; negatives pass through.
pub fn study_day_hour(value: f64) -> f64 {
    if value >= 0.0 {
        value + 1.0
    } else {
        value
    }
}

/// Exact elapsed days from `reference` to `timestamp`.
pub fn elapsed_days(timestamp: NaiveDateTime, reference: NaiveDateTime) -> f64 {
    (timestamp - reference).num_milliseconds() as f64 / MILLIS_PER_DAY
}

/// Normalize `timestamp` for `subject`, or `None` if either date is absent.
pub fn normalize(
    day_zero: &DayZero,
    subject: &Subject,
    timestamp: Option<NaiveDateTime>,
) -> Option<DayHour> {
    Normalizer::new(day_zero, subject)?.normalize_opt(timestamp, None)
}

/// Converts timestamps for one subject against a resolved day zero.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer<'a> {
    subject: &'a Subject,
    reference: NaiveDateTime,
}

impl<'a> Normalizer<'a> {
    /// `None` when the subject lacks the selected reference date.
    pub fn new(day_zero: &DayZero, subject: &'a Subject) -> Option<Self> {
        let reference = day_zero.reference(subject)?;
        Some(Self { subject, reference })
    }

    pub fn reference(&self) -> NaiveDateTime {
        self.reference
    }

    pub fn normalize(&self, timestamp: NaiveDateTime, drug: Option<&str>) -> DayHour {
        let dose_reference = drug
            .and_then(|name| self.subject.first_dose_of(name))
            .or(self.subject.first_dose);
        let dose_relative = dose_reference.map(|reference| elapsed_days(timestamp, reference));
        DayHour::from_value(elapsed_days(timestamp, self.reference), dose_relative)
    }

    pub fn normalize_opt(
        &self,
        timestamp: Option<NaiveDateTime>,
        drug: Option<&str>,
    ) -> Option<DayHour> {
        timestamp.map(|ts| self.normalize(ts, drug))
    }

    /// Map a coordinate back to an absolute timestamp, to the millisecond.
    pub fn denormalize(&self, value: f64) -> Option<NaiveDateTime> {
        let millis = (value * MILLIS_PER_DAY).round();
        if !millis.is_finite() || millis.abs() > i64::MAX as f64 {
            return None;
        }
        self.reference
            .checked_add_signed(Duration::milliseconds(millis as i64))
    }
}
