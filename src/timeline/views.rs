//! Per-domain timeline views.
//!
//! Dosing, adverse events, conmeds and measurements share the same
//! bucket/gap/overlap primitives. What differs is how records are grouped
//! into lanes, which records count as one continuous run, and how a record
//! is ranked. Those choices live in [`LaneStrategy`] values rather than in
//! per-domain types.

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{
    data::model::{attr, AttrValue, EventDomain, RawEvent},
    error::TimelineError,
};

use super::{
    bucket::{bucket_events, Bucket, MergeMode},
    dayhour::{DayHour, Normalizer},
    gaps::{fill_gaps, ActiveInterval, PeriodState},
    interval::Spanned,
    overlap::aggregate_overlaps,
};

/// Views a caller can request per subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewKind {
    Dosing,
    AdverseEvents,
    Severity,
    Conmeds,
    Measurements,
}

impl ViewKind {
    pub const ALL: [ViewKind; 5] = [
        ViewKind::Dosing,
        ViewKind::AdverseEvents,
        ViewKind::Severity,
        ViewKind::Conmeds,
        ViewKind::Measurements,
    ];
}

impl FromStr for ViewKind {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "dosing" | "dose" => Ok(Self::Dosing),
            "adverse-events" | "ae" => Ok(Self::AdverseEvents),
            "severity" | "ae-severity" => Ok(Self::Severity),
            "conmeds" | "conmed" => Ok(Self::Conmeds),
            "measurements" | "labs" | "vitals" => Ok(Self::Measurements),
            _ => Err(TimelineError::UnknownView(s.to_string())),
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dosing => "dosing",
            Self::AdverseEvents => "adverse-events",
            Self::Severity => "severity",
            Self::Conmeds => "conmeds",
            Self::Measurements => "measurements",
        };
        f.write_str(name)
    }
}

/// Population over which the reference maximum dose is taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaxDoseScope {
    #[default]
    PerStudy,
    PerSubject,
}

impl FromStr for MaxDoseScope {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "per-study" | "study" => Ok(Self::PerStudy),
            "per-subject" | "subject" => Ok(Self::PerSubject),
            _ => Err(TimelineError::UnknownDoseScope(s.to_string())),
        }
    }
}

/// How one domain is split into lanes and runs.
#[derive(Debug, Clone, Copy)]
pub struct LaneStrategy {
    pub domain: EventDomain,
    /// Lane a record is drawn in; records without one are skipped.
    pub lane_key: fn(&RawEvent) -> Option<String>,
    /// Records within a lane merge into one run while this key matches.
    pub run_key: fn(&RawEvent) -> Option<String>,
    pub mode: MergeMode,
}

pub const DOSING: LaneStrategy = LaneStrategy {
    domain: EventDomain::Dose,
    lane_key: drug_name,
    run_key: dose_key,
    mode: MergeMode::AdjacentOnly,
};

pub const ADVERSE_EVENTS: LaneStrategy = LaneStrategy {
    domain: EventDomain::AdverseEvent,
    lane_key: ae_term,
    run_key: no_key,
    mode: MergeMode::AdjacentOnly,
};

pub const CONMEDS: LaneStrategy = LaneStrategy {
    domain: EventDomain::Conmed,
    lane_key: conmed_class,
    run_key: medication_name,
    mode: MergeMode::AnyEqual,
};

fn drug_name(event: &RawEvent) -> Option<String> {
    event.text(attr::DRUG)
}

fn dose_key(event: &RawEvent) -> Option<String> {
    event.number(attr::DOSE).map(|dose| format!("{dose}"))
}

fn ae_term(event: &RawEvent) -> Option<String> {
    event.text(attr::TERM)
}

fn no_key(_: &RawEvent) -> Option<String> {
    None
}

fn conmed_class(event: &RawEvent) -> Option<String> {
    event
        .text(attr::CLASS)
        .or_else(|| Some("Unclassified".to_string()))
}

fn medication_name(event: &RawEvent) -> Option<String> {
    event
        .text(attr::DRUG)
        .or_else(|| event.text(attr::TERM))
        .or_else(|| event.text(attr::CLASS))
}

/// Severity grade on a 1..=5 scale from a numeric or textual attribute.
pub fn severity_grade(event: &RawEvent) -> Option<u8> {
    let value = event.attributes.get(attr::SEVERITY)?;
    if let Some(number) = value.as_number() {
        return Some(number.round().clamp(1.0, 5.0) as u8);
    }
    let text = value.to_string().to_ascii_lowercase();
    let text = text.trim_start_matches("grade").trim();
    if let Ok(number) = text.parse::<u8>() {
        return Some(number.clamp(1, 5));
    }
    match text {
        "mild" => Some(1),
        "moderate" => Some(2),
        "severe" => Some(3),
        "life-threatening" | "life threatening" => Some(4),
        "fatal" | "death" => Some(5),
        _ => None,
    }
}

/// Split a subject's records of one domain into lanes sorted by start.
///
/// Malformed records are expected to be filtered out already; any that
/// slip through are skipped here as well.
pub fn partition_lanes<'e>(
    events: &'e [RawEvent],
    strategy: &LaneStrategy,
) -> BTreeMap<String, Vec<&'e RawEvent>> {
    let mut lanes: BTreeMap<String, Vec<&RawEvent>> = BTreeMap::new();
    for event in events
        .iter()
        .filter(|event| event.domain == strategy.domain && event.is_well_formed())
    {
        if let Some(key) = (strategy.lane_key)(event) {
            lanes.entry(key).or_default().push(event);
        }
    }
    for records in lanes.values_mut() {
        records.sort_by_key(|event| event.start);
    }
    lanes
}

/// Bucket one lane's records according to `strategy`.
pub fn lane_buckets<'e>(
    records: Vec<&'e RawEvent>,
    strategy: &LaneStrategy,
) -> Vec<Bucket<NaiveDateTime, &'e RawEvent>> {
    let run_key = strategy.run_key;
    bucket_events(
        records,
        |a: &&RawEvent, b: &&RawEvent| run_key(a) == run_key(b),
        strategy.mode,
    )
}

/// Maximum recorded dose per drug over `events`.
pub fn max_doses(events: &[RawEvent]) -> BTreeMap<String, f64> {
    let mut maxima: BTreeMap<String, f64> = BTreeMap::new();
    for event in events.iter().filter(|e| e.domain == EventDomain::Dose) {
        if let (Some(drug), Some(dose)) = (drug_name(event), event.number(attr::DOSE)) {
            let entry = maxima.entry(drug).or_insert(dose);
            *entry = entry.max(dose);
        }
    }
    maxima
}

/// Per-subject inputs shared by every view builder.
#[derive(Debug, Clone, Copy)]
pub struct SubjectContext<'a> {
    pub normalizer: Normalizer<'a>,
    pub last_known: NaiveDateTime,
    pub max_doses: &'a BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DosePeriod {
    pub start: DayHour,
    pub end: Option<DayHour>,
    pub state: PeriodState,
    pub ongoing: bool,
    pub ends_in_discontinuation: bool,
    pub dose: f64,
    pub unit: Option<String>,
    /// `dose` over the reference maximum for this drug.
    pub dose_fraction: Option<f64>,
    pub record_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoseLane {
    pub drug: String,
    pub periods: Vec<DosePeriod>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSpan {
    pub label: String,
    pub start: DayHour,
    pub end: Option<DayHour>,
    pub ongoing: bool,
    pub imputed_end: bool,
    pub max_severity: Option<u8>,
    pub last_visit: Option<String>,
    pub record_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventLane {
    pub key: String,
    pub spans: Vec<EventSpan>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeveritySegment {
    pub start: DayHour,
    pub end: DayHour,
    pub severity: u8,
    pub term: Option<String>,
    pub visit: Option<String>,
    pub covering: usize,
    pub ongoing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementPoint {
    pub name: String,
    pub at: DayHour,
    pub value: Option<AttrValue>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
struct DosePayload {
    dose: f64,
    unit: Option<String>,
    records: usize,
}

/// Active, inactive and discontinued periods per drug.
pub fn dosing_lanes(ctx: &SubjectContext<'_>, events: &[RawEvent]) -> Vec<DoseLane> {
    let mut stops: BTreeMap<String, Vec<NaiveDateTime>> = BTreeMap::new();
    for event in events
        .iter()
        .filter(|e| e.domain == EventDomain::Discontinuation)
    {
        if let Some(drug) = drug_name(event) {
            stops.entry(drug).or_default().push(event.start);
        }
    }

    let mut lanes = Vec::new();
    for (drug, records) in partition_lanes(events, &DOSING) {
        let active_records: Vec<&RawEvent> = records
            .into_iter()
            .filter(|e| e.number(attr::DOSE).map_or(false, |dose| dose > 0.0))
            .collect();
        if active_records.is_empty() {
            continue;
        }

        let active: Vec<ActiveInterval<NaiveDateTime, DosePayload>> =
            lane_buckets(active_records, &DOSING)
                .into_iter()
                .map(|bucket| {
                    let first = bucket.members.first().copied();
                    let payload = DosePayload {
                        dose: first.and_then(|e| e.number(attr::DOSE)).unwrap_or(0.0),
                        unit: first.and_then(|e| e.text(attr::UNIT)),
                        records: bucket.members.len(),
                    };
                    ActiveInterval::new(bucket.interval(), payload)
                })
                .collect();

        let drug_stops = stops.get(&drug).map(Vec::as_slice).unwrap_or(&[]);
        let unit = active.first().and_then(|a| a.payload.unit.clone());
        let max_dose = ctx.max_doses.get(&drug).copied().filter(|max| *max > 0.0);

        let periods = fill_gaps(active, drug_stops, Some(ctx.last_known))
            .into_iter()
            .map(|period| {
                let (dose, period_unit, records) = match period.source {
                    Some(payload) => (payload.dose, payload.unit, payload.records),
                    None => (0.0, unit.clone(), 0),
                };
                DosePeriod {
                    start: ctx.normalizer.normalize(period.start, Some(&drug)),
                    end: ctx.normalizer.normalize_opt(period.end, Some(&drug)),
                    state: period.state,
                    ongoing: period.ongoing,
                    ends_in_discontinuation: period.ends_in_discontinuation,
                    dose,
                    unit: period_unit,
                    dose_fraction: max_dose.map(|max| dose / max),
                    record_count: records,
                }
            })
            .collect();

        lanes.push(DoseLane { drug, periods });
    }
    lanes
}

/// Merged adverse-event spans per term.
pub fn adverse_event_lanes(ctx: &SubjectContext<'_>, events: &[RawEvent]) -> Vec<EventLane> {
    event_lanes(ctx, events, &ADVERSE_EVENTS)
}

/// Medication runs grouped by conmed class.
pub fn conmed_lanes(ctx: &SubjectContext<'_>, events: &[RawEvent]) -> Vec<EventLane> {
    event_lanes(ctx, events, &CONMEDS)
}

fn event_lanes(
    ctx: &SubjectContext<'_>,
    events: &[RawEvent],
    strategy: &LaneStrategy,
) -> Vec<EventLane> {
    partition_lanes(events, strategy)
        .into_iter()
        .map(|(key, records)| {
            let mut spans: Vec<EventSpan> = lane_buckets(records, strategy)
                .into_iter()
                .map(|bucket| bucket.close_at(ctx.last_known))
                .map(|bucket| event_span(ctx, &key, strategy, bucket))
                .collect();
            spans.sort_by(|a, b| a.start.value.total_cmp(&b.start.value));
            EventLane { key, spans }
        })
        .collect()
}

fn event_span(
    ctx: &SubjectContext<'_>,
    lane: &str,
    strategy: &LaneStrategy,
    bucket: Bucket<NaiveDateTime, &RawEvent>,
) -> EventSpan {
    let label = bucket
        .members
        .first()
        .and_then(|first| (strategy.run_key)(first))
        .unwrap_or_else(|| lane.to_string());
    let drug = bucket.members.first().and_then(|first| first.text(attr::DRUG));
    let last_visit = bucket
        .members
        .iter()
        .filter_map(|e| e.text(attr::VISIT).map(|visit| (e.start, visit)))
        .max_by_key(|(start, _)| *start)
        .map(|(_, visit)| visit);
    EventSpan {
        label,
        start: ctx.normalizer.normalize(bucket.start, drug.as_deref()),
        end: ctx.normalizer.normalize_opt(bucket.end, drug.as_deref()),
        ongoing: bucket.ongoing,
        imputed_end: bucket.imputed_end,
        max_severity: bucket.members.iter().filter_map(|e| severity_grade(e)).max(),
        last_visit,
        record_count: bucket.members.len(),
    }
}

/// An adverse event with its end imputed from the last-known date.
struct GradedEvent<'e> {
    event: &'e RawEvent,
    end: NaiveDateTime,
    grade: u8,
}

impl Spanned<NaiveDateTime> for GradedEvent<'_> {
    fn start(&self) -> NaiveDateTime {
        self.event.start
    }

    fn end(&self) -> Option<NaiveDateTime> {
        Some(self.end)
    }

    fn is_ongoing(&self) -> bool {
        self.event.end.is_none()
    }
}

/// Maximum-severity segments over all adverse events of a subject.
pub fn severity_segments(ctx: &SubjectContext<'_>, events: &[RawEvent]) -> Vec<SeveritySegment> {
    let mut graded: Vec<GradedEvent<'_>> = events
        .iter()
        .filter(|e| e.domain == EventDomain::AdverseEvent && e.is_well_formed())
        .filter_map(|event| {
            let grade = severity_grade(event)?;
            let end = event.end.unwrap_or_else(|| ctx.last_known.max(event.start));
            Some(GradedEvent { event, end, grade })
        })
        .collect();
    graded.sort_by_key(|g| g.event.start);

    aggregate_overlaps(&graded, |g| g.grade)
        .into_iter()
        .map(|segment| {
            let representative = graded[segment.representative].event;
            SeveritySegment {
                start: ctx.normalizer.normalize(segment.start, None),
                end: ctx.normalizer.normalize(segment.end, None),
                severity: segment.rank,
                term: representative.text(attr::TERM),
                visit: representative.text(attr::VISIT),
                covering: segment.covering.len(),
                ongoing: segment.ongoing,
            }
        })
        .collect()
}

/// Lab and vital-sign points sorted by name, then time.
pub fn measurement_points(ctx: &SubjectContext<'_>, events: &[RawEvent]) -> Vec<MeasurementPoint> {
    let mut records: Vec<(String, &RawEvent)> = events
        .iter()
        .filter(|e| e.domain == EventDomain::Measurement)
        .filter_map(|e| e.entity().map(|name| (name, e)))
        .collect();
    records.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.start.cmp(&b.1.start)));
    records
        .into_iter()
        .map(|(name, event)| MeasurementPoint {
            name,
            at: ctx.normalizer.normalize(event.start, None),
            value: event.attributes.get(attr::VALUE).cloned(),
            unit: event.text(attr::UNIT),
        })
        .collect()
}
