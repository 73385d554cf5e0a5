//! CSV-backed dataset loader.
//!
//! A dataset is a directory under the data root holding `subjects.csv`
//! and `events.csv`. Event columns beyond the fixed ones become record
//! attributes.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use csv::StringRecord;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::error::{Result, TimelineError};

use super::{
    model::{attr, AttrValue, EventDomain, RawEvent, Subject},
    DataSource, EntityFilter, PopulationFilter,
};

const EVENT_COLUMNS: &[&str] = &["subject_id", "domain", "start", "end"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO-8601 date or date-time; blank input is absent.
pub fn parse_timestamp(value: &str, context: &str) -> Result<Option<NaiveDateTime>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Some(parsed));
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(|date| Some(date.and_time(NaiveTime::MIN)))
        .map_err(|_| TimelineError::InvalidTimestamp {
            value: trimmed.to_string(),
            context: context.to_string(),
        })
}

#[derive(Debug, Deserialize)]
struct SubjectRow {
    subject_id: String,
    #[serde(default)]
    subject_code: String,
    #[serde(default)]
    first_dose: String,
    #[serde(default)]
    randomization: String,
    #[serde(default)]
    withdrawal: String,
    #[serde(default)]
    death: String,
    #[serde(default)]
    last_known_data: String,
}

impl SubjectRow {
    fn into_subject(self) -> Result<Subject> {
        let context = format!("subjects.csv subject {}", self.subject_id);
        let code = if self.subject_code.trim().is_empty() {
            self.subject_id.clone()
        } else {
            self.subject_code.trim().to_string()
        };
        Ok(Subject {
            first_dose: parse_timestamp(&self.first_dose, &context)?,
            randomization: parse_timestamp(&self.randomization, &context)?,
            withdrawal: parse_timestamp(&self.withdrawal, &context)?,
            death: parse_timestamp(&self.death, &context)?,
            last_known_data: parse_timestamp(&self.last_known_data, &context)?,
            first_dose_by_drug: BTreeMap::new(),
            id: self.subject_id.trim().to_string(),
            code,
        })
    }
}

/// Loads datasets from `<root>/<dataset>/{subjects,events}.csv`.
#[derive(Debug, Clone)]
pub struct CsvSource {
    root: PathBuf,
}

impl CsvSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn dataset_dir(&self, dataset: &str) -> Result<PathBuf> {
        let dir = self.root.join(dataset);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(TimelineError::DatasetNotFound(dir))
        }
    }

    fn read_events(&self, dataset: &str, population: &PopulationFilter) -> Result<Vec<RawEvent>> {
        let path = self.dataset_dir(dataset)?.join("events.csv");
        if !path.exists() {
            warn!(path = %path.display(), "events.csv missing; dataset has no events");
            return Ok(Vec::new());
        }
        read_event_file(&path, population)
    }
}

fn read_event_file(path: &Path, population: &PopulationFilter) -> Result<Vec<RawEvent>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_ascii_lowercase())
        .collect();

    let mut events = Vec::new();
    let mut skipped = 0usize;
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        let row = idx + 2;
        match parse_event(&headers, &record, row)? {
            Some(event) if population.admits(&event.subject_id) => events.push(event),
            Some(_) => {}
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(skipped, path = %path.display(), "skipped event rows without subject or start");
    }
    Ok(events)
}

fn parse_event(headers: &[String], record: &StringRecord, row: usize) -> Result<Option<RawEvent>> {
    let field = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .and_then(|pos| record.get(pos))
            .unwrap_or("")
    };
    let context = format!("events.csv row {row}");

    let subject_id = field("subject_id");
    let Some(start) = parse_timestamp(field("start"), &context)? else {
        return Ok(None);
    };
    if subject_id.is_empty() {
        return Ok(None);
    }
    let domain: EventDomain = field("domain").parse()?;
    let end = parse_timestamp(field("end"), &context)?;

    let mut event = RawEvent::new(subject_id, domain, start).with_end(end);
    for (header, value) in headers.iter().zip(record.iter()) {
        if EVENT_COLUMNS.contains(&header.as_str()) || value.is_empty() {
            continue;
        }
        event = event.with_attr(header, AttrValue::parse(value));
    }
    Ok(Some(event))
}

/// Fill first-dose dates the subjects file left blank from dose records.
fn derive_first_doses(subjects: &mut [Subject], events: &[RawEvent]) {
    let mut by_subject: BTreeMap<&str, BTreeMap<String, NaiveDateTime>> = BTreeMap::new();
    for event in events.iter().filter(|e| e.domain == EventDomain::Dose) {
        if !event.number(attr::DOSE).map_or(true, |dose| dose > 0.0) {
            continue;
        }
        let Some(drug) = event.text(attr::DRUG) else {
            continue;
        };
        let first = by_subject
            .entry(event.subject_id.as_str())
            .or_default()
            .entry(drug)
            .or_insert(event.start);
        *first = (*first).min(event.start);
    }

    for subject in subjects.iter_mut() {
        let Some(per_drug) = by_subject.get(subject.id.as_str()) else {
            continue;
        };
        for (drug, date) in per_drug {
            subject
                .first_dose_by_drug
                .entry(drug.clone())
                .or_insert(*date);
        }
        if subject.first_dose.is_none() {
            subject.first_dose = per_drug.values().min().copied();
        }
    }
}

impl DataSource for CsvSource {
    #[instrument(skip(self, entities, population))]
    fn load_filtered_events(
        &self,
        dataset: &str,
        entities: &EntityFilter,
        population: &PopulationFilter,
    ) -> Result<Vec<RawEvent>> {
        let mut events = self.read_events(dataset, population)?;
        events.retain(|event| entities.admits(event));
        info!(rows = events.len(), "loaded filtered events");
        Ok(events)
    }

    #[instrument(skip(self, population))]
    fn load_subjects(&self, dataset: &str, population: &PopulationFilter) -> Result<Vec<Subject>> {
        let path = self.dataset_dir(dataset)?.join("subjects.csv");
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&path)?;
        let mut subjects = Vec::new();
        for result in reader.deserialize() {
            let row: SubjectRow = result?;
            let subject = row.into_subject()?;
            if population.admits(&subject.id) {
                subjects.push(subject);
            }
        }

        let doses = self.read_events(dataset, population)?;
        derive_first_doses(&mut subjects, &doses);
        info!(subjects = subjects.len(), "loaded subjects");
        Ok(subjects)
    }
}
