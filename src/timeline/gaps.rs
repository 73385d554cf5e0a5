//! Reconstruction of inactive and discontinued periods between known
//! active intervals.
//!
//! Dosing data only records when an entity was active. The drug-free
//! stretches in between, and the tail after a permanent stop, are
//! synthesized here so every entity lane is covered end to end.

use serde::Serialize;

use super::interval::Interval;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodState {
    Active,
    Inactive,
    Discontinued,
}

/// One active interval and the payload it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveInterval<T, P> {
    pub interval: Interval<T>,
    pub payload: P,
}

impl<T, P> ActiveInterval<T, P> {
    pub fn new(interval: Interval<T>, payload: P) -> Self {
        Self { interval, payload }
    }
}

/// A resolved period; synthesized periods carry no `source`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Period<T, P> {
    pub start: T,
    pub end: Option<T>,
    pub state: PeriodState,
    pub ongoing: bool,
    /// The period stops exactly on a discontinuation date.
    pub ends_in_discontinuation: bool,
    pub source: Option<P>,
}

/// Interleave active intervals with synthesized inactive periods.
///
/// `active` must be sorted by start. `discontinuations` are the dates on
/// which therapy for this entity was permanently stopped, and `last_known`
/// is the subject's last-known-data date.
pub fn fill_gaps<T, P>(
    active: Vec<ActiveInterval<T, P>>,
    discontinuations: &[T],
    last_known: Option<T>,
) -> Vec<Period<T, P>>
where
    T: Ord + Copy,
{
    let mut stops = discontinuations.to_vec();
    stops.sort();
    stops.dedup();

    let mut periods = Vec::with_capacity(active.len() * 2);
    let mut intervals = active.into_iter().peekable();

    while let Some(current) = intervals.next() {
        let next_start = intervals.peek().map(|next| next.interval.start);
        let Interval { start, end: own_end } = current.interval;

        let nearest_stop = stops.iter().copied().find(|stop| *stop > start);
        let effective_end = [own_end, next_start, nearest_stop, last_known]
            .into_iter()
            .flatten()
            .filter(|candidate| *candidate > start)
            .min()
            .or(own_end);

        let mut active_period = Period {
            start,
            end: effective_end,
            state: PeriodState::Active,
            ongoing: own_end.is_none()
                && next_start.is_none()
                && (effective_end.is_none() || effective_end == last_known),
            ends_in_discontinuation: false,
            source: Some(current.payload),
        };

        let gap = effective_end.and_then(|gap_start| {
            trailing_gap(gap_start, next_start, &stops, last_known).map(|gap| (gap_start, gap))
        });

        match gap {
            Some((gap_start, (gap_end, state, ongoing))) if gap_end > gap_start => {
                periods.push(active_period);
                periods.push(Period {
                    start: gap_start,
                    end: Some(gap_end),
                    state,
                    ongoing,
                    ends_in_discontinuation: state == PeriodState::Discontinued,
                    source: None,
                });
            }
            Some((gap_start, (gap_end, PeriodState::Discontinued, _))) if gap_end == gap_start => {
                active_period.ends_in_discontinuation = true;
                active_period.ongoing = false;
                periods.push(active_period);
            }
            _ => periods.push(active_period),
        }
    }

    periods
}

/// End, state and ongoing flag of the period following an active interval.
fn trailing_gap<T: Ord + Copy>(
    gap_start: T,
    next_start: Option<T>,
    stops: &[T],
    last_known: Option<T>,
) -> Option<(T, PeriodState, bool)> {
    if let Some(next) = next_start {
        // A resumed entity is never retroactively discontinued.
        return Some((next, PeriodState::Inactive, false));
    }
    let stop = stops
        .iter()
        .copied()
        .find(|stop| *stop >= gap_start)
        .filter(|stop| last_known.map_or(true, |last| *stop < last));
    match stop {
        Some(stop) => Some((stop, PeriodState::Discontinued, false)),
        None => last_known.map(|last| (last, PeriodState::Inactive, true)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active(start: i64, end: Option<i64>, dose: u32) -> ActiveInterval<i64, u32> {
        let interval = Interval::new(start, end).expect("well formed");
        ActiveInterval::new(interval, dose)
    }

    #[test]
    fn empty_input_yields_nothing() {
        let periods = fill_gaps(Vec::<ActiveInterval<i64, u32>>::new(), &[5], Some(10));
        assert!(periods.is_empty());
    }

    #[test]
    fn trailing_gap_runs_to_last_known_date() {
        let periods = fill_gaps(vec![active(0, Some(10), 50)], &[], Some(40));
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[1].start, 10);
        assert_eq!(periods[1].end, Some(40));
        assert_eq!(periods[1].state, PeriodState::Inactive);
        assert!(periods[1].ongoing);
    }

    #[test]
    fn discontinuation_on_stored_end_terminates_directly() {
        let periods = fill_gaps(vec![active(0, Some(10), 50)], &[10], Some(40));
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].end, Some(10));
        assert!(periods[0].ends_in_discontinuation);
    }

    #[test]
    fn discontinuation_truncates_active_interval() {
        let periods = fill_gaps(vec![active(0, Some(30), 50)], &[12], Some(40));
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].end, Some(12));
        assert!(periods[0].ends_in_discontinuation);
    }

    #[test]
    fn resumed_entity_is_not_discontinued() {
        let periods = fill_gaps(
            vec![active(0, Some(10), 50), active(20, Some(30), 25)],
            &[15],
            Some(40),
        );
        let gap = &periods[1];
        assert_eq!(gap.start, 10);
        assert_eq!(gap.end, Some(20));
        assert_eq!(gap.state, PeriodState::Inactive);
    }

    #[test]
    fn open_interval_stays_active_through_last_known() {
        let periods = fill_gaps(vec![active(5, None, 10)], &[], Some(40));
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].end, Some(40));
        assert!(periods[0].ongoing);
    }

    #[test]
    fn unresolvable_open_interval_remains_open() {
        let periods = fill_gaps(vec![active(5, None, 10)], &[], None);
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].end, None);
        assert!(periods[0].ongoing);
    }
}
