//! Data access boundary: raw records in, flattened timeline tables out.

pub mod csv_source;
pub mod export;
pub mod model;

use std::collections::BTreeSet;

use crate::error::Result;

use model::{RawEvent, Subject};

/// Restricts records to a set of entity names (drug, term, class, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityFilter {
    names: Option<BTreeSet<String>>,
}

impl EntityFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: BTreeSet<String> = names
            .into_iter()
            .map(|name| name.as_ref().trim().to_ascii_lowercase())
            .filter(|name| !name.is_empty())
            .collect();
        Self {
            names: (!names.is_empty()).then_some(names),
        }
    }

    pub fn admits(&self, event: &RawEvent) -> bool {
        match &self.names {
            None => true,
            Some(names) => event
                .entity()
                .map_or(false, |entity| names.contains(&entity.to_ascii_lowercase())),
        }
    }
}

/// Restricts records to a set of subject ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulationFilter {
    subject_ids: Option<BTreeSet<String>>,
}

impl PopulationFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn only<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids: BTreeSet<String> = ids
            .into_iter()
            .map(|id| id.as_ref().trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        Self {
            subject_ids: (!ids.is_empty()).then_some(ids),
        }
    }

    pub fn admits(&self, subject_id: &str) -> bool {
        self.subject_ids
            .as_ref()
            .map_or(true, |ids| ids.contains(subject_id))
    }
}

/// Loader the orchestrator pulls its inputs from.
///
/// Implementations own all I/O and any caching keyed by dataset and
/// filters; the timeline engine only sees the returned snapshots.
pub trait DataSource: Send + Sync {
    fn load_filtered_events(
        &self,
        dataset: &str,
        entities: &EntityFilter,
        population: &PopulationFilter,
    ) -> Result<Vec<RawEvent>>;

    fn load_subjects(&self, dataset: &str, population: &PopulationFilter) -> Result<Vec<Subject>>;
}

/// In-memory source, mostly useful for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pub events: Vec<RawEvent>,
    pub subjects: Vec<Subject>,
}

impl DataSource for MemorySource {
    fn load_filtered_events(
        &self,
        _dataset: &str,
        entities: &EntityFilter,
        population: &PopulationFilter,
    ) -> Result<Vec<RawEvent>> {
        Ok(self
            .events
            .iter()
            .filter(|e| population.admits(&e.subject_id) && entities.admits(e))
            .cloned()
            .collect())
    }

    fn load_subjects(&self, _dataset: &str, population: &PopulationFilter) -> Result<Vec<Subject>> {
        Ok(self
            .subjects
            .iter()
            .filter(|s| population.admits(&s.id))
            .cloned()
            .collect())
    }
}
