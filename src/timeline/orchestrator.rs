//! Per-subject driver for the timeline views.

use std::{collections::BTreeMap, sync::Arc};

use chrono::NaiveDateTime;
use futures::stream::{self, StreamExt};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::{
    data::{
        model::{RawEvent, Subject},
        DataSource, EntityFilter, PopulationFilter,
    },
    error::Result,
};

use super::{
    dayhour::{DayZero, Normalizer},
    views::{
        self, DoseLane, EventLane, MaxDoseScope, MeasurementPoint, SeveritySegment,
        SubjectContext, ViewKind,
    },
};

/// What to build and how to anchor it.
#[derive(Debug, Clone)]
pub struct TimelineRequest {
    pub dataset: String,
    pub views: Vec<ViewKind>,
    pub entity_filter: EntityFilter,
    pub population_filter: PopulationFilter,
    pub day_zero: DayZero,
    pub max_dose_scope: MaxDoseScope,
    /// Dataset cutoff; derived from the data when absent.
    pub cutoff: Option<NaiveDateTime>,
}

impl TimelineRequest {
    pub fn new(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            views: ViewKind::ALL.to_vec(),
            entity_filter: EntityFilter::all(),
            population_filter: PopulationFilter::all(),
            day_zero: DayZero::default(),
            max_dose_scope: MaxDoseScope::default(),
            cutoff: None,
        }
    }

    fn wants(&self, view: ViewKind) -> bool {
        self.views.contains(&view)
    }
}

/// All requested views for one subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectTimeline {
    pub subject_id: String,
    pub subject_code: String,
    pub reference: NaiveDateTime,
    pub last_known: NaiveDateTime,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dosing: Vec<DoseLane>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub adverse_events: Vec<EventLane>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub severity: Vec<SeveritySegment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conmeds: Vec<EventLane>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub measurements: Vec<MeasurementPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineReport {
    pub dataset: String,
    pub day_zero: DayZero,
    pub cutoff: Option<NaiveDateTime>,
    /// Sorted by subject code, then id.
    pub subjects: Vec<SubjectTimeline>,
    /// Subjects without the selected day-zero date, sorted by id.
    pub excluded: Vec<String>,
}

enum SubjectOutcome {
    Built(Box<SubjectTimeline>),
    Excluded(String),
}

/// Request settings shared read-only by every subject task.
struct ViewPlan {
    views: Vec<ViewKind>,
    day_zero: DayZero,
    max_dose_scope: MaxDoseScope,
    cutoff: NaiveDateTime,
    study_max_doses: BTreeMap<String, f64>,
}

impl ViewPlan {
    fn wants(&self, view: ViewKind) -> bool {
        self.views.contains(&view)
    }

    fn build_subject(&self, subject: Subject, events: Vec<RawEvent>) -> SubjectOutcome {
        let Some(normalizer) = Normalizer::new(&self.day_zero, &subject) else {
            debug!(subject = %subject.id, day_zero = %self.day_zero, "no day-zero reference; excluded");
            return SubjectOutcome::Excluded(subject.id.clone());
        };

        let subject_max_doses;
        let max_doses = match self.max_dose_scope {
            MaxDoseScope::PerStudy => &self.study_max_doses,
            MaxDoseScope::PerSubject => {
                subject_max_doses = views::max_doses(&events);
                &subject_max_doses
            }
        };
        let ctx = SubjectContext {
            normalizer,
            last_known: subject.last_known(self.cutoff),
            max_doses,
        };

        let timeline = SubjectTimeline {
            subject_id: subject.id.clone(),
            subject_code: subject.code.clone(),
            reference: normalizer.reference(),
            last_known: ctx.last_known,
            dosing: self.build(ViewKind::Dosing, || views::dosing_lanes(&ctx, &events)),
            adverse_events: self.build(ViewKind::AdverseEvents, || {
                views::adverse_event_lanes(&ctx, &events)
            }),
            severity: self.build(ViewKind::Severity, || views::severity_segments(&ctx, &events)),
            conmeds: self.build(ViewKind::Conmeds, || views::conmed_lanes(&ctx, &events)),
            measurements: self.build(ViewKind::Measurements, || {
                views::measurement_points(&ctx, &events)
            }),
        };
        SubjectOutcome::Built(Box::new(timeline))
    }

    fn build<T>(&self, view: ViewKind, f: impl FnOnce() -> Vec<T>) -> Vec<T> {
        if self.wants(view) {
            f()
        } else {
            Vec::new()
        }
    }
}

/// Latest timestamp seen anywhere in the loaded snapshot.
pub fn observed_cutoff(events: &[RawEvent], subjects: &[Subject]) -> Option<NaiveDateTime> {
    let event_max = events
        .iter()
        .flat_map(|event| std::iter::once(event.start).chain(event.end))
        .max();
    let subject_max = subjects.iter().filter_map(Subject::latest_reference).max();
    event_max.max(subject_max)
}

/// Builds timelines for every subject a [`DataSource`] returns.
pub struct Orchestrator<S> {
    source: S,
    concurrency: usize,
}

impl<S: DataSource> Orchestrator<S> {
    pub fn new(source: S, concurrency: usize) -> Self {
        Self {
            source,
            concurrency: concurrency.max(1),
        }
    }

    /// Load, fan out per subject, and return a deterministically sorted report.
    #[instrument(skip(self, request), fields(dataset = %request.dataset, day_zero = %request.day_zero))]
    pub async fn build(&self, request: &TimelineRequest) -> Result<TimelineReport> {
        let loaded = self.source.load_filtered_events(
            &request.dataset,
            &request.entity_filter,
            &request.population_filter,
        )?;
        let subjects = self
            .source
            .load_subjects(&request.dataset, &request.population_filter)?;

        let total = loaded.len();
        let events: Vec<RawEvent> = loaded.into_iter().filter(RawEvent::is_well_formed).collect();
        if events.len() < total {
            warn!(dropped = total - events.len(), "dropped records ending before they start");
        }

        let cutoff = request.cutoff.or_else(|| observed_cutoff(&events, &subjects));
        let Some(cutoff) = cutoff else {
            info!("no events or subjects loaded; nothing to build");
            return Ok(TimelineReport {
                dataset: request.dataset.clone(),
                day_zero: request.day_zero.clone(),
                cutoff: None,
                subjects: Vec::new(),
                excluded: Vec::new(),
            });
        };

        let study_max_doses = if request.wants(ViewKind::Dosing) {
            views::max_doses(&events)
        } else {
            BTreeMap::new()
        };

        let mut by_subject: IndexMap<String, Vec<RawEvent>> = IndexMap::new();
        for event in events {
            by_subject
                .entry(event.subject_id.clone())
                .or_default()
                .push(event);
        }
        let jobs: Vec<(Subject, Vec<RawEvent>)> = subjects
            .into_iter()
            .map(|subject| {
                let events = by_subject.swap_remove(&subject.id).unwrap_or_default();
                (subject, events)
            })
            .collect();
        if !by_subject.is_empty() {
            warn!(orphans = by_subject.len(), "events reference subjects that were not loaded");
        }

        let plan = Arc::new(ViewPlan {
            views: request.views.clone(),
            day_zero: request.day_zero.clone(),
            max_dose_scope: request.max_dose_scope,
            cutoff,
            study_max_doses,
        });

        let outcomes = stream::iter(jobs)
            .map(|(subject, events)| {
                let plan = Arc::clone(&plan);
                tokio::task::spawn_blocking(move || plan.build_subject(subject, events))
            })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        let mut timelines = Vec::new();
        let mut excluded = Vec::new();
        for outcome in outcomes {
            match outcome? {
                SubjectOutcome::Built(timeline) => timelines.push(*timeline),
                SubjectOutcome::Excluded(id) => excluded.push(id),
            }
        }
        timelines.sort_by(|a, b| {
            a.subject_code
                .cmp(&b.subject_code)
                .then_with(|| a.subject_id.cmp(&b.subject_id))
        });
        excluded.sort();

        info!(
            subjects = timelines.len(),
            excluded = excluded.len(),
            %cutoff,
            "built timelines"
        );
        Ok(TimelineReport {
            dataset: request.dataset.clone(),
            day_zero: request.day_zero.clone(),
            cutoff: Some(cutoff),
            subjects: timelines,
            excluded,
        })
    }
}
