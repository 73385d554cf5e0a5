use proptest::prelude::*;
use subject_timeline::timeline::{fill_gaps, ActiveInterval, Interval, PeriodState};

fn active(start: i64, end: Option<i64>, dose: u32) -> ActiveInterval<i64, u32> {
    ActiveInterval::new(Interval::new(start, end).expect("well formed"), dose)
}

#[test]
fn drug_free_interval_between_active_periods() {
    let periods = fill_gaps(
        vec![active(0, Some(10), 50), active(20, Some(30), 25)],
        &[],
        Some(40),
    );
    let gap = periods
        .iter()
        .find(|p| p.start == 10)
        .expect("synthesized gap");
    assert_eq!(gap.end, Some(20));
    assert_eq!(gap.state, PeriodState::Inactive);
    assert_eq!(gap.source, None);
    assert_eq!(periods[0].source, Some(50));
    assert_eq!(periods[2].source, Some(25));
}

#[test]
fn discontinuation_before_last_known_date_ends_the_lane() {
    let periods = fill_gaps(vec![active(0, Some(10), 50)], &[12], Some(40));
    assert_eq!(periods.len(), 2);
    let tail = &periods[1];
    assert_eq!((tail.start, tail.end), (10, Some(12)));
    assert_eq!(tail.state, PeriodState::Discontinued);
    assert!(!tail.ongoing);
}

#[test]
fn discontinuation_on_last_known_date_is_treated_as_ongoing() {
    let periods = fill_gaps(vec![active(0, Some(10), 50)], &[40], Some(40));
    let tail = periods.last().expect("tail");
    assert_eq!(tail.state, PeriodState::Inactive);
    assert!(tail.ongoing);
    assert_eq!(tail.end, Some(40));
}

#[test]
fn stop_on_interval_start_does_not_hide_later_stop() {
    let periods = fill_gaps(vec![active(10, Some(20), 50)], &[10, 15], Some(40));
    assert_eq!(periods.len(), 1);
    assert_eq!(periods[0].end, Some(15));
    assert_eq!(periods[0].state, PeriodState::Active);
    assert!(periods[0].ends_in_discontinuation);
    assert!(!periods[0].ongoing);
}

#[test]
fn last_known_date_truncates_active_interval() {
    let periods = fill_gaps(vec![active(0, Some(60), 50)], &[], Some(40));
    assert_eq!(periods.len(), 1);
    assert_eq!(periods[0].end, Some(40));
}

fn sorted_actives() -> impl Strategy<Value = Vec<ActiveInterval<i64, u32>>> {
    prop::collection::vec((0i64..100, prop::option::weighted(0.85, 0i64..30)), 1..12).prop_map(
        |raw| {
            let mut intervals: Vec<_> = raw
                .into_iter()
                .map(|(start, len)| active(start, len.map(|len| start + len), 1))
                .collect();
            intervals.sort_by_key(|a| a.interval.start);
            intervals
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn periods_cover_the_lane_without_holes(
        actives in sorted_actives(),
        stops in prop::collection::vec(0i64..160, 0..3),
        last_known in 100i64..160,
    ) {
        let first_start = actives[0].interval.start;
        let periods = fill_gaps(actives, &stops, Some(last_known));

        prop_assert_eq!(periods[0].start, first_start);
        for pair in periods.windows(2) {
            let reach = pair[0].end.unwrap_or(i64::MAX);
            prop_assert!(pair[1].start <= reach, "hole between {:?} and {:?}", pair[0], pair[1]);
        }
        for period in &periods {
            if period.state != PeriodState::Active {
                let end = period.end.expect("synthesized periods are closed");
                prop_assert!(end > period.start);
                prop_assert!(period.source.is_none());
            }
        }
    }
}
