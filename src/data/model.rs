//! Raw records and subject reference data as handed over by the loader.

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{
    error::TimelineError,
    timeline::interval::{Interval, Spanned},
};

/// Well-known attribute keys.
pub mod attr {
    pub const DRUG: &str = "drug";
    pub const DOSE: &str = "dose";
    pub const UNIT: &str = "unit";
    pub const TERM: &str = "term";
    pub const SEVERITY: &str = "severity";
    pub const VISIT: &str = "visit";
    pub const CLASS: &str = "class";
    pub const NAME: &str = "name";
    pub const VALUE: &str = "value";
}

/// Source domain of a raw record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventDomain {
    Dose,
    AdverseEvent,
    Conmed,
    Measurement,
    Discontinuation,
}

impl FromStr for EventDomain {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "dose" | "ex" | "exposure" => Ok(Self::Dose),
            "adverse_event" | "ae" => Ok(Self::AdverseEvent),
            "conmed" | "cm" => Ok(Self::Conmed),
            "measurement" | "lab" | "lb" | "vital" | "vs" => Ok(Self::Measurement),
            "discontinuation" | "ds" => Ok(Self::Discontinuation),
            other => Err(TimelineError::UnknownDomain(other.to_string())),
        }
    }
}

/// Scalar attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Number(f64),
    Text(String),
}

impl AttrValue {
    /// Numbers for anything that looks numeric, text otherwise.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => Self::Number(value),
            _ => Self::Text(trimmed.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(text) => text
                .trim()
                .parse()
                .ok()
                .filter(|value: &f64| value.is_finite()),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                write!(f, "{}", *value as i64)
            }
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// One source row: a dose, adverse event, conmed, measurement or
/// discontinuation record for a subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub subject_id: String,
    pub domain: EventDomain,
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttrValue>,
}

impl RawEvent {
    pub fn new(subject_id: impl Into<String>, domain: EventDomain, start: NaiveDateTime) -> Self {
        Self {
            subject_id: subject_id.into(),
            domain,
            start,
            end: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_end(mut self, end: Option<NaiveDateTime>) -> Self {
        self.end = end;
        self
    }

    pub fn with_attr(mut self, key: &str, value: AttrValue) -> Self {
        self.attributes.insert(key.to_string(), value);
        self
    }

    pub fn text(&self, key: &str) -> Option<String> {
        self.attributes
            .get(key)
            .map(ToString::to_string)
            .filter(|value| !value.is_empty())
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.attributes.get(key).and_then(AttrValue::as_number)
    }

    /// Name of the entity this record belongs to, by domain.
    pub fn entity(&self) -> Option<String> {
        let key = match self.domain {
            EventDomain::Dose | EventDomain::Discontinuation => attr::DRUG,
            EventDomain::AdverseEvent => attr::TERM,
            EventDomain::Conmed => attr::CLASS,
            EventDomain::Measurement => attr::NAME,
        };
        self.text(key)
    }

    /// The record's span, or `None` when its end precedes its start.
    pub fn interval(&self) -> Option<Interval<NaiveDateTime>> {
        Interval::new(self.start, self.end)
    }

    pub fn is_well_formed(&self) -> bool {
        self.interval().is_some()
    }
}

impl Spanned<NaiveDateTime> for RawEvent {
    fn start(&self) -> NaiveDateTime {
        self.start
    }

    fn end(&self) -> Option<NaiveDateTime> {
        self.end
    }
}

/// Subject identity and the reference dates timelines are anchored on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub code: String,
    pub first_dose: Option<NaiveDateTime>,
    #[serde(default)]
    pub first_dose_by_drug: BTreeMap<String, NaiveDateTime>,
    pub randomization: Option<NaiveDateTime>,
    pub withdrawal: Option<NaiveDateTime>,
    pub death: Option<NaiveDateTime>,
    pub last_known_data: Option<NaiveDateTime>,
}

impl Subject {
    pub fn new(id: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
            ..Self::default()
        }
    }

    pub fn first_dose_of(&self, drug: &str) -> Option<NaiveDateTime> {
        self.first_dose_by_drug.get(drug).copied().or_else(|| {
            self.first_dose_by_drug
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(drug))
                .map(|(_, date)| *date)
        })
    }

    /// Earliest of death, withdrawal and last-known data, else `cutoff`.
    pub fn last_known(&self, cutoff: NaiveDateTime) -> NaiveDateTime {
        [self.death, self.withdrawal, self.last_known_data]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(cutoff)
    }

    /// Latest reference date recorded for this subject.
    pub fn latest_reference(&self) -> Option<NaiveDateTime> {
        [
            self.first_dose,
            self.randomization,
            self.withdrawal,
            self.death,
            self.last_known_data,
        ]
        .into_iter()
        .flatten()
        .chain(self.first_dose_by_drug.values().copied())
        .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid date")
    }

    #[test]
    fn domain_aliases_parse() {
        assert_eq!("AE".parse::<EventDomain>().ok(), Some(EventDomain::AdverseEvent));
        assert_eq!("vital".parse::<EventDomain>().ok(), Some(EventDomain::Measurement));
        assert!("bogus".parse::<EventDomain>().is_err());
    }

    #[test]
    fn numeric_attributes_render_without_trailing_zero() {
        assert_eq!(AttrValue::parse("3").to_string(), "3");
        assert_eq!(AttrValue::parse("2.5").to_string(), "2.5");
        assert_eq!(AttrValue::parse(" mild ").to_string(), "mild");
    }

    #[test]
    fn non_finite_text_is_not_a_number() {
        assert_eq!(AttrValue::Text("NaN".into()).as_number(), None);
        assert_eq!(AttrValue::Text("inf".into()).as_number(), None);
        assert_eq!(AttrValue::Text(" 12.5 ".into()).as_number(), Some(12.5));
    }

    #[test]
    fn inverted_event_has_no_interval() {
        let event = RawEvent::new("S1", EventDomain::AdverseEvent, at(10)).with_end(Some(at(3)));
        assert!(!event.is_well_formed());
    }

    #[test]
    fn last_known_prefers_earliest_terminal_date() {
        let mut subject = Subject::new("S1", "001");
        subject.last_known_data = Some(at(20));
        subject.withdrawal = Some(at(15));
        assert_eq!(subject.last_known(at(31)), at(15));
        assert_eq!(Subject::new("S2", "002").last_known(at(31)), at(31));
    }
}
