use chrono::{Duration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use subject_timeline::{
    data::model::Subject,
    timeline::{normalize, DayZero, Normalizer},
};

fn at(month: u32, day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, month, day)
        .and_then(|d| d.and_hms_opt(hour, 0, 0))
        .expect("valid date")
}

fn subject() -> Subject {
    let mut subject = Subject::new("S1", "001");
    subject.first_dose = Some(at(3, 5, 0));
    subject.randomization = Some(at(3, 1, 0));
    subject.first_dose_by_drug.insert("Drug B".into(), at(3, 8, 0));
    subject
}

#[test]
fn study_day_labels_skip_day_zero() {
    let subject = subject();
    let normalizer = Normalizer::new(&DayZero::FirstDose, &subject).expect("first dose");
    let labels: Vec<String> = [at(3, 4, 12), at(3, 5, 0), at(3, 5, 6), at(3, 7, 18)]
        .into_iter()
        .map(|ts| {
            let coord = normalizer.normalize(ts, None);
            format!("{} / {}", coord.label, coord.day_label)
        })
        .collect();
    insta::assert_json_snapshot!(labels, @r###"
    [
      "-0.50 / -1",
      "1.00 / 1",
      "1.25 / 1",
      "3.75 / 3"
    ]
    "###);
}

#[test]
fn selector_changes_the_anchor() {
    let subject = subject();
    let ts = Some(at(3, 10, 0));
    let by_dose = normalize(&DayZero::FirstDose, &subject, ts).expect("first dose");
    let by_rand = normalize(&DayZero::Randomization, &subject, ts).expect("randomization");
    let by_drug = normalize(&DayZero::FirstDoseOf("Drug B".into()), &subject, ts).expect("drug");
    assert_eq!(by_dose.value, 5.0);
    assert_eq!(by_rand.value, 9.0);
    assert_eq!(by_drug.value, 2.0);
}

#[test]
fn subject_without_the_selected_drug_has_no_coordinate() {
    let subject = subject();
    let selector: DayZero = "first-dose:Drug Z".parse().expect("selector");
    assert!(normalize(&selector, &subject, Some(at(3, 10, 0))).is_none());
}

proptest! {
    #[test]
    fn normalizing_then_denormalizing_recovers_the_date(offset in -400i64 * 86_400..400 * 86_400) {
        let subject = subject();
        let normalizer = Normalizer::new(&DayZero::FirstDose, &subject).expect("first dose");
        let ts = normalizer.reference() + Duration::seconds(offset);
        let coord = normalizer.normalize(ts, None);
        let back = normalizer.denormalize(coord.value).expect("in range");
        prop_assert_eq!(back.date(), ts.date());
        prop_assert_eq!(coord.day, (ts.date() - normalizer.reference().date()).num_days());
    }
}
