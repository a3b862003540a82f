use rowdedup::testing::*;
use rowdedup::{DedupConfig, DuplicateRowFilter, TieBreak};

fn configs() -> Vec<DedupConfig> {
    let mut out = Vec::new();
    for tie_break in [
        TieBreak::First,
        TieBreak::Last,
        TieBreak::Minimum("seq".into()),
        TieBreak::Maximum("seq".into()),
    ] {
        for remove_duplicates in [true, false] {
            for retain_order in [true, false] {
                out.push(DedupConfig {
                    tie_break: tie_break.clone(),
                    remove_duplicates,
                    retain_order,
                    add_reference_column: true,
                    in_memory_sort: true,
                    ..DedupConfig::new(["k"])
                });
            }
        }
    }
    out
}

#[test]
fn invariants_hold_for_every_policy() -> anyhow::Result<()> {
    let input = generated_table(500, 37);
    for config in configs() {
        let output = DuplicateRowFilter::new(config.clone())?.run(&input)?;
        assert_dedup_invariants(&input, &output, &config);
    }
    Ok(())
}

#[test]
fn retained_order_matches_input_exactly_in_annotate_mode() -> anyhow::Result<()> {
    let input = generated_table(300, 11);
    let config = DedupConfig {
        remove_duplicates: false,
        ..DedupConfig::new(["k"])
    };
    let output = DuplicateRowFilter::new(config)?.run(&input)?;
    assert_eq!(output.row_ids(), input.row_ids());
    Ok(())
}

#[test]
fn without_retained_order_groups_are_contiguous() -> anyhow::Result<()> {
    let input = generated_table(300, 11);
    let config = DedupConfig {
        remove_duplicates: false,
        retain_order: false,
        ..DedupConfig::new(["k"])
    };
    let output = DuplicateRowFilter::new(config.clone())?.run(&input)?;
    let keys = group_keys(&output, &config);
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
    Ok(())
}

#[test]
fn extreme_tie_breaks_pick_extreme_sequence_numbers() -> anyhow::Result<()> {
    let input = generated_table(200, 9);
    let seq_of = |t: &rowdedup::Table| -> Vec<i64> {
        t.column_values("seq")
            .unwrap_or_default()
            .into_iter()
            .filter_map(rowdedup::Cell::as_int)
            .collect()
    };

    let first = DuplicateRowFilter::new(DedupConfig::new(["k"]))?.run(&input)?;
    let min = DuplicateRowFilter::new(DedupConfig {
        tie_break: TieBreak::Minimum("seq".into()),
        ..DedupConfig::new(["k"])
    })?
    .run(&input)?;
    assert_eq!(seq_of(&first), seq_of(&min));

    let last = DuplicateRowFilter::new(DedupConfig {
        tie_break: TieBreak::Last,
        ..DedupConfig::new(["k"])
    })?
    .run(&input)?;
    let max = DuplicateRowFilter::new(DedupConfig {
        tie_break: TieBreak::Maximum("seq".into()),
        ..DedupConfig::new(["k"])
    })?
    .run(&input)?;
    assert_eq!(seq_of(&last), seq_of(&max));
    Ok(())
}

#[test]
fn remove_mode_is_idempotent() -> anyhow::Result<()> {
    let input = generated_table(400, 23);
    for tie_break in [TieBreak::First, TieBreak::Last, TieBreak::Maximum("seq".into())] {
        for retain_order in [true, false] {
            let filter = DuplicateRowFilter::new(DedupConfig {
                tie_break: tie_break.clone(),
                retain_order,
                ..DedupConfig::new(["k"])
            })?;
            let once = filter.run(&input)?;
            let twice = filter.run(&once)?;
            assert_eq!(once, twice);
        }
    }
    Ok(())
}
