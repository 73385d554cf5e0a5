//! Interval timeline engine.
//!
//! The leaf modules are pure and synchronous: [`dayhour`] normalizes
//! timestamps, [`bucket`] merges contiguous runs, [`gaps`] reconstructs
//! inactive periods and [`overlap`] partitions overlapping spans.
//! [`orchestrator`] composes them per subject.

pub mod bucket;
pub mod dayhour;
pub mod gaps;
pub mod interval;
pub mod orchestrator;
pub mod overlap;
pub mod views;

pub use bucket::{bucket_events, Bucket, MergeMode};
pub use dayhour::{normalize, DayHour, DayZero, Normalizer};
pub use gaps::{fill_gaps, ActiveInterval, Period, PeriodState};
pub use interval::{Interval, Spanned};
pub use orchestrator::{Orchestrator, SubjectTimeline, TimelineReport, TimelineRequest};
pub use overlap::{aggregate_overlaps, Segment};
pub use views::{MaxDoseScope, ViewKind};
