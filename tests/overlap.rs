use proptest::prelude::*;
use subject_timeline::timeline::{aggregate_overlaps, Interval, Spanned};

#[derive(Debug, Clone)]
struct Ae {
    span: Interval<i64>,
    grade: u8,
}

impl Spanned<i64> for Ae {
    fn start(&self) -> i64 {
        self.span.start
    }
    fn end(&self) -> Option<i64> {
        self.span.end
    }
}

fn ae(start: i64, end: i64, grade: u8) -> Ae {
    Ae {
        span: Interval::closed(start, end).expect("well formed"),
        grade,
    }
}

#[test]
fn overlapping_severities_decompose_into_max_segments() {
    let items = vec![ae(0, 5, 2), ae(2, 8, 3), ae(6, 10, 1)];
    let segments = aggregate_overlaps(&items, |a| a.grade);
    let summary: Vec<_> = segments.iter().map(|s| (s.start, s.end, s.rank)).collect();
    assert_eq!(
        summary,
        vec![(0, 2, 2), (2, 5, 3), (5, 6, 3), (6, 8, 3), (8, 10, 1)]
    );
    assert_eq!(segments[1].covering, vec![0, 1]);
    assert_eq!(segments[3].covering, vec![1, 2]);
    assert!(segments.iter().all(|s| !s.ongoing));
}

#[test]
fn zero_length_input_produces_no_segment() {
    let segments = aggregate_overlaps(&[ae(4, 4, 3)], |a| a.grade);
    assert!(segments.is_empty());
}

#[test]
fn zero_length_input_does_not_split_surrounding_segment() {
    let items = vec![ae(0, 10, 2), ae(4, 4, 5)];
    let segments = aggregate_overlaps(&items, |a| a.grade);
    let summary: Vec<_> = segments
        .iter()
        .map(|s| (s.start, s.end, s.rank, s.covering.clone()))
        .collect();
    assert_eq!(summary, vec![(0, 10, 2, vec![0])]);
}

fn graded_items() -> impl Strategy<Value = Vec<Ae>> {
    prop::collection::vec((0i64..50, 0i64..20, 1u8..=5), 0..15).prop_map(|raw| {
        raw.into_iter()
            .map(|(start, len, grade)| ae(start, start + len, grade))
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn segments_partition_the_covered_timeline(items in graded_items()) {
        let segments = aggregate_overlaps(&items, |a| a.grade);

        for segment in &segments {
            prop_assert!(segment.start < segment.end);
        }
        for pair in segments.windows(2) {
            prop_assert!(pair[0].end <= pair[1].start);
            prop_assert!(pair[0].end < pair[1].start || pair[0].covering != pair[1].covering);
        }

        // Probe half-unit points so each lies strictly inside one breakpoint pair.
        for t in 0..75i64 {
            let covering: Vec<u8> = items
                .iter()
                .filter(|a| a.span.start <= t && a.span.end.map_or(false, |end| end >= t + 1))
                .map(|a| a.grade)
                .collect();
            let segment = segments.iter().find(|s| s.start <= t && s.end >= t + 1);
            match (covering.iter().max(), segment) {
                (None, None) => {}
                (Some(max), Some(segment)) => prop_assert_eq!(*max, segment.rank),
                (expected, found) => prop_assert!(false, "t={} expected {:?} found {:?}", t, expected, found),
            }
        }
    }
}
