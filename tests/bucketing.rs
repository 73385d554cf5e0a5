use proptest::prelude::*;
use subject_timeline::timeline::{bucket_events, Bucket, MergeMode, Spanned};

#[derive(Debug, Clone, PartialEq)]
struct Dose {
    drug: u8,
    start: i64,
    end: Option<i64>,
}

impl Spanned<i64> for Dose {
    fn start(&self) -> i64 {
        self.start
    }
    fn end(&self) -> Option<i64> {
        self.end
    }
}

fn same_drug(a: &Dose, b: &Dose) -> bool {
    a.drug == b.drug
}

fn as_events(buckets: &[Bucket<i64, Dose>]) -> Vec<Dose> {
    buckets
        .iter()
        .map(|bucket| Dose {
            drug: bucket.members[0].drug,
            start: bucket.start,
            end: bucket.end,
        })
        .collect()
}

fn sorted_doses() -> impl Strategy<Value = Vec<Dose>> {
    prop::collection::vec((0u8..3, 0i64..100, prop::option::weighted(0.9, 0i64..15)), 0..25)
        .prop_map(|raw| {
            let mut doses: Vec<Dose> = raw
                .into_iter()
                .map(|(drug, start, len)| Dose {
                    drug,
                    start,
                    end: len.map(|len| start + len),
                })
                .collect();
            doses.sort_by_key(|d| d.start);
            doses
        })
}

#[test]
fn consecutive_same_drug_records_merge_into_one_span() {
    let doses = vec![
        Dose { drug: 1, start: 0, end: Some(7) },
        Dose { drug: 1, start: 7, end: Some(14) },
        Dose { drug: 2, start: 14, end: Some(21) },
        Dose { drug: 2, start: 30, end: None },
    ];
    let buckets = bucket_events(doses, same_drug, MergeMode::AdjacentOnly);
    let spans: Vec<_> = buckets.iter().map(|b| (b.start, b.end, b.ongoing)).collect();
    assert_eq!(
        spans,
        vec![(0, Some(14), false), (14, Some(21), false), (30, None, true)]
    );
}

#[test]
fn members_keep_arrival_order() {
    let doses = vec![
        Dose { drug: 1, start: 0, end: Some(10) },
        Dose { drug: 1, start: 0, end: Some(3) },
        Dose { drug: 1, start: 2, end: Some(4) },
    ];
    let buckets = bucket_events(doses.clone(), same_drug, MergeMode::AdjacentOnly);
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].members, doses);
    assert_eq!(buckets[0].end, Some(10));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn rebucketing_is_idempotent(doses in sorted_doses()) {
        for mode in [MergeMode::AdjacentOnly, MergeMode::AnyEqual] {
            let first = bucket_events(doses.clone(), same_drug, mode);
            let second = bucket_events(as_events(&first), same_drug, mode);
            let spans = |buckets: &[Bucket<i64, Dose>]| {
                buckets
                    .iter()
                    .map(|b| (b.members[0].drug, b.start, b.end, b.ongoing))
                    .collect::<Vec<_>>()
            };
            prop_assert_eq!(spans(&first), spans(&second));
            prop_assert!(second.iter().all(|b| b.members.len() == 1));
        }
    }

    #[test]
    fn ongoing_iff_any_member_is_open(doses in sorted_doses()) {
        for bucket in bucket_events(doses, same_drug, MergeMode::AnyEqual) {
            let any_open = bucket.members.iter().any(|d| d.end.is_none());
            prop_assert_eq!(bucket.ongoing, any_open);
            prop_assert_eq!(bucket.end.is_none(), any_open);
        }
    }
}
