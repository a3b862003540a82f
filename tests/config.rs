use rowdedup::testing::scenario_table;
use rowdedup::{DedupConfig, DedupError, DuplicateRowFilter, TieBreak};

fn rejects(config: DedupConfig, needle: &str) {
    match DuplicateRowFilter::new(config) {
        Err(DedupError::Configuration(msg)) => assert!(msg.contains(needle), "{msg}"),
        Err(other) => panic!("expected configuration error, got {other:?}"),
        Ok(_) => panic!("configuration accepted, expected '{needle}'"),
    }
}

#[test]
fn construction_rejects_invalid_settings() {
    rejects(DedupConfig::default(), "no group columns");
    rejects(DedupConfig::new(["k", "k"]), "selected twice");
    rejects(
        DedupConfig {
            tie_break: TieBreak::Minimum(String::new()),
            ..DedupConfig::new(["k"])
        },
        "requires a reference column",
    );
    rejects(
        DedupConfig {
            tie_break: TieBreak::Maximum("k".into()),
            ..DedupConfig::new(["k"])
        },
        "also a group column",
    );
    rejects(
        DedupConfig {
            remove_duplicates: false,
            add_classification_column: false,
            add_reference_column: false,
            ..DedupConfig::new(["k"])
        },
        "classification or reference column",
    );
    rejects(
        DedupConfig {
            remove_duplicates: false,
            add_reference_column: true,
            reference_column_name: "duplicate-type-classifier".into(),
            ..DedupConfig::new(["k"])
        },
        "different names",
    );
}

#[test]
fn annotation_settings_are_ignored_in_remove_mode() -> anyhow::Result<()> {
    let filter = DuplicateRowFilter::new(DedupConfig {
        add_classification_column: false,
        add_reference_column: false,
        ..DedupConfig::new(["k"])
    })?;
    let output = filter.run(&scenario_table())?;
    assert_eq!(output.len(), 2);
    Ok(())
}

#[test]
fn schema_checks_run_before_any_row() -> anyhow::Result<()> {
    let input = scenario_table();

    let missing_reference = DuplicateRowFilter::new(DedupConfig {
        tie_break: TieBreak::Minimum("score".into()),
        ..DedupConfig::new(["k"])
    })?;
    let err = missing_reference.run(&input).unwrap_err();
    assert!(matches!(err, DedupError::Configuration(_)), "{err}");

    let clash = DuplicateRowFilter::new(DedupConfig {
        remove_duplicates: false,
        classification_column_name: "v".into(),
        ..DedupConfig::new(["k"])
    })?;
    assert!(clash.output_schema(input.schema()).is_err());
    assert!(clash.run(&input).is_err());
    Ok(())
}

#[test]
fn json_config_fills_defaults() -> anyhow::Result<()> {
    let config = DedupConfig::from_json(
        r#"{ "group_columns": ["k"], "remove_duplicates": false, "tie_break": { "Maximum": "v" } }"#,
    )?;
    assert_eq!(config.tie_break, TieBreak::Maximum("v".into()));
    assert!(config.add_classification_column);
    assert!(config.retain_order);
    assert_eq!(DedupConfig::from_json(&config.to_json()?)?, config);

    let output = DuplicateRowFilter::new(config)?.run(&scenario_table())?;
    assert_eq!(output.len(), 3);
    Ok(())
}

#[test]
fn malformed_json_is_a_configuration_error() {
    let err = DedupConfig::from_json("{ group_columns: }").unwrap_err();
    assert!(matches!(err, DedupError::Configuration(_)));
}
