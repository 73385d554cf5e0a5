//! Flattened, one-row-per-segment export of timeline reports.

use std::{fs::File, path::Path};

use polars::prelude::{CsvWriter, DataFrame, NamedFrom, ParquetWriter, SerWriter, Series};
use tracing::info;

use crate::{
    error::Result,
    timeline::{dayhour::DayHour, gaps::PeriodState, TimelineReport},
};

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRow {
    pub subject_id: String,
    pub subject_code: String,
    pub view: &'static str,
    pub lane: String,
    pub label: String,
    pub start_day: f64,
    pub end_day: Option<f64>,
    pub start_study_day: i64,
    pub end_study_day: Option<i64>,
    pub state: Option<&'static str>,
    /// Dose for dosing rows, severity grade for AE rows.
    pub value: Option<f64>,
    pub ongoing: bool,
    pub imputed_end: bool,
}

impl SegmentRow {
    #[allow(clippy::too_many_arguments)]
    fn new(
        subject: (&str, &str),
        view: &'static str,
        lane: &str,
        label: &str,
        start: &DayHour,
        end: Option<&DayHour>,
        value: Option<f64>,
        ongoing: bool,
    ) -> Self {
        Self {
            subject_id: subject.0.to_string(),
            subject_code: subject.1.to_string(),
            view,
            lane: lane.to_string(),
            label: label.to_string(),
            start_day: start.value,
            end_day: end.map(|e| e.value),
            start_study_day: start.study_day,
            end_study_day: end.map(|e| e.study_day),
            state: None,
            value,
            ongoing,
            imputed_end: false,
        }
    }
}

fn state_name(state: PeriodState) -> &'static str {
    match state {
        PeriodState::Active => "active",
        PeriodState::Inactive => "inactive",
        PeriodState::Discontinued => "discontinued",
    }
}

/// One row per period, span, segment or point, in report order.
pub fn flatten(report: &TimelineReport) -> Vec<SegmentRow> {
    let mut rows = Vec::new();
    for subject in &report.subjects {
        let who = (subject.subject_id.as_str(), subject.subject_code.as_str());
        for lane in &subject.dosing {
            for period in &lane.periods {
                let mut row = SegmentRow::new(
                    who,
                    "dosing",
                    &lane.drug,
                    &lane.drug,
                    &period.start,
                    period.end.as_ref(),
                    Some(period.dose),
                    period.ongoing,
                );
                row.state = Some(state_name(period.state));
                rows.push(row);
            }
        }
        for (view, lanes) in [
            ("adverse-events", &subject.adverse_events),
            ("conmeds", &subject.conmeds),
        ] {
            for lane in lanes {
                for span in &lane.spans {
                    let mut row = SegmentRow::new(
                        who,
                        view,
                        &lane.key,
                        &span.label,
                        &span.start,
                        span.end.as_ref(),
                        span.max_severity.map(f64::from),
                        span.ongoing,
                    );
                    row.imputed_end = span.imputed_end;
                    rows.push(row);
                }
            }
        }
        for segment in &subject.severity {
            let term = segment.term.as_deref().unwrap_or_default();
            rows.push(SegmentRow::new(
                who,
                "severity",
                "severity",
                term,
                &segment.start,
                Some(&segment.end),
                Some(f64::from(segment.severity)),
                segment.ongoing,
            ));
        }
        for point in &subject.measurements {
            rows.push(SegmentRow::new(
                who,
                "measurements",
                &point.name,
                &point.name,
                &point.at,
                None,
                point.value.as_ref().and_then(|v| v.as_number()),
                false,
            ));
        }
    }
    rows
}

fn to_frame(rows: &[SegmentRow]) -> Result<DataFrame> {
    let df = DataFrame::new(vec![
        Series::new(
            "subject_id".into(),
            rows.iter().map(|r| r.subject_id.clone()).collect::<Vec<_>>(),
        ),
        Series::new(
            "subject_code".into(),
            rows.iter().map(|r| r.subject_code.clone()).collect::<Vec<_>>(),
        ),
        Series::new("view".into(), rows.iter().map(|r| r.view).collect::<Vec<_>>()),
        Series::new(
            "lane".into(),
            rows.iter().map(|r| r.lane.clone()).collect::<Vec<_>>(),
        ),
        Series::new(
            "label".into(),
            rows.iter().map(|r| r.label.clone()).collect::<Vec<_>>(),
        ),
        Series::new(
            "start_day".into(),
            rows.iter().map(|r| r.start_day).collect::<Vec<_>>(),
        ),
        Series::new(
            "end_day".into(),
            rows.iter().map(|r| r.end_day).collect::<Vec<_>>(),
        ),
        Series::new(
            "start_study_day".into(),
            rows.iter().map(|r| r.start_study_day).collect::<Vec<_>>(),
        ),
        Series::new(
            "end_study_day".into(),
            rows.iter().map(|r| r.end_study_day).collect::<Vec<_>>(),
        ),
        Series::new("state".into(), rows.iter().map(|r| r.state).collect::<Vec<_>>()),
        Series::new("value".into(), rows.iter().map(|r| r.value).collect::<Vec<_>>()),
        Series::new(
            "ongoing".into(),
            rows.iter().map(|r| r.ongoing).collect::<Vec<_>>(),
        ),
        Series::new(
            "imputed_end".into(),
            rows.iter().map(|r| r.imputed_end).collect::<Vec<_>>(),
        ),
    ])?;
    Ok(df)
}

fn prepare(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(File::create(path)?)
}

pub fn write_parquet(rows: &[SegmentRow], path: &Path) -> Result<()> {
    let mut df = to_frame(rows)?;
    ParquetWriter::new(prepare(path)?).finish(&mut df)?;
    info!(path = %path.display(), rows = rows.len(), "wrote timeline parquet");
    Ok(())
}

pub fn write_csv(rows: &[SegmentRow], path: &Path) -> Result<()> {
    let mut df = to_frame(rows)?;
    let mut file = prepare(path)?;
    CsvWriter::new(&mut file).finish(&mut df)?;
    info!(path = %path.display(), rows = rows.len(), "wrote timeline csv");
    Ok(())
}
