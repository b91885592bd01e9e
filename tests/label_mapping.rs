// tests/label_mapping.rs
use rand::{rngs::StdRng, Rng, SeedableRng};
use sentiment_backend::sentiment::{
    map_label, reconcile, Id2Label, Label, MappedLabel, RawScore, LABELS,
};

fn canon(raw: &str, m: Option<&Id2Label>) -> Label {
    map_label(raw, m)
        .canonical()
        .unwrap_or_else(|| panic!("{raw} should map to a canonical label"))
}

#[test]
fn shorthand_and_exact_names() {
    assert_eq!(canon("POS", None), Label::Positive);
    assert_eq!(canon("+", None), Label::Positive);
    assert_eq!(canon(" neg ", None), Label::Negative);
    assert_eq!(canon("-", None), Label::Negative);
    assert_eq!(canon("Neutral", None), Label::Neutral);
    assert_eq!(canon("NEGATIVE", None), Label::Negative);
}

#[test]
fn substring_and_unknown_labels() {
    assert_eq!(canon("very positive", None), Label::Positive);
    assert_eq!(canon("mostly_negative", None), Label::Negative);
    assert_eq!(canon("mystery_label", None), Label::Neutral);
    assert_eq!(canon("", None), Label::Neutral);
    assert_eq!(canon("   ", None), Label::Neutral);
}

#[test]
fn indexed_labels_use_model_table_first() {
    let table: Id2Label = [(0, "neutral"), (1, "Positive"), (2, "negative")]
        .into_iter()
        .collect();
    assert_eq!(canon("LABEL_0", Some(&table)), Label::Neutral);
    assert_eq!(canon("label_1", Some(&table)), Label::Positive);
    assert_eq!(canon("LABEL_2", Some(&table)), Label::Negative);
}

#[test]
fn indexed_labels_fall_back_to_fixed_order() {
    assert_eq!(canon("LABEL_0", None), Label::Positive);
    assert_eq!(canon("LABEL_1", None), Label::Negative);
    assert_eq!(canon("LABEL_2", None), Label::Neutral);
    assert_eq!(canon("LABEL_7", None), Label::Neutral);
    assert_eq!(canon("LABEL_x", None), Label::Neutral);

    // table present but missing the index
    let partial: Id2Label = [(0, "negative")].into_iter().collect();
    assert_eq!(canon("LABEL_2", Some(&partial)), Label::Neutral);
    assert_eq!(canon("LABEL_1", Some(&partial)), Label::Negative);
}

#[test]
fn non_canonical_table_entry_passes_through() {
    let table: Id2Label = [(0, "Bullish")].into_iter().collect();
    let mapped = map_label("LABEL_0", Some(&table));
    assert_eq!(mapped, MappedLabel::Passthrough("bullish".into()));
    assert_eq!(mapped.as_str(), "bullish");
    assert_eq!(mapped.canonical(), None);
}

#[test]
fn config_table_parses_string_keys() {
    let table = Id2Label::from_config(vec![
        ("0".to_string(), "Positive".to_string()),
        ("1".to_string(), "Negative".to_string()),
        ("2".to_string(), "Neutral".to_string()),
    ]);
    assert_eq!(canon("LABEL_2", Some(&table)), Label::Neutral);
    assert_eq!(canon("LABEL_1", Some(&table)), Label::Negative);
}

#[test]
fn reconcile_fills_missing_labels_and_normalizes() {
    let out = reconcile(
        &[RawScore::new("LABEL_0", 0.6), RawScore::new("LABEL_1", 0.4)],
        None,
    );
    assert_eq!(out.label, "positive");
    assert!((out.score(Label::Positive) - 0.6).abs() < 1e-9);
    assert!((out.score(Label::Negative) - 0.4).abs() < 1e-9);
    assert_eq!(out.score(Label::Neutral), 0.0);
    assert_eq!(out.scores.len(), 3);
}

#[test]
fn reconcile_sums_duplicate_labels() {
    let out = reconcile(
        &[
            RawScore::new("pos", 0.2),
            RawScore::new("positive", 0.3),
            RawScore::new("negative", 0.5),
        ],
        None,
    );
    // 0.5 vs 0.5: positive wins the tie by enumeration order
    assert_eq!(out.label, "positive");
    assert!((out.score(Label::Positive) - 0.5).abs() < 1e-9);
    assert!((out.total() - 1.0).abs() < 1e-9);
}

#[test]
fn reconcile_renormalizes_unnormalized_scores() {
    let out = reconcile(
        &[RawScore::new("neutral", 3.0), RawScore::new("negative", 1.0)],
        None,
    );
    assert_eq!(out.label, "neutral");
    assert!((out.score(Label::Neutral) - 0.75).abs() < 1e-9);
    assert!((out.score(Label::Negative) - 0.25).abs() < 1e-9);
}

#[test]
fn reconcile_all_zero_stays_zero() {
    let out = reconcile(&[RawScore::new("positive", 0.0)], None);
    assert_eq!(out.total(), 0.0);
    assert_eq!(out.label, "positive");

    let empty = reconcile(&[], None);
    assert_eq!(empty.scores.len(), 3);
    assert_eq!(empty.total(), 0.0);
}

#[test]
fn reconcile_keeps_passthrough_key() {
    let table: Id2Label = [(0, "bullish"), (1, "negative")].into_iter().collect();
    let out = reconcile(
        &[RawScore::new("LABEL_0", 0.7), RawScore::new("LABEL_1", 0.3)],
        Some(&table),
    );
    assert_eq!(out.label, "bullish");
    assert_eq!(out.canonical_label(), None);
    assert_eq!(out.scores.len(), 4);
    assert!((out.scores["bullish"] - 0.7).abs() < 1e-9);
    assert!((out.total() - 1.0).abs() < 1e-9);
}

#[test]
fn reconciled_distribution_sums_to_one_for_random_inputs() {
    let names = ["positive", "NEG", "LABEL_2", "neutral", "+", "who_knows", "LABEL_0"];
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..300 {
        let n = rng.random_range(1..8);
        let raw: Vec<RawScore> = (0..n)
            .map(|_| {
                RawScore::new(
                    names[rng.random_range(0..names.len())],
                    rng.random_range(0.001..5.0),
                )
            })
            .collect();
        let out = reconcile(&raw, None);
        assert!((out.total() - 1.0).abs() < 1e-9, "sum was {}", out.total());
        for l in LABELS {
            assert!(out.scores.contains_key(l.as_str()));
        }
        let best = out.score(out.canonical_label().unwrap());
        assert!(out.scores.values().all(|v| *v <= best));
    }
}
