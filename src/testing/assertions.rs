//! Assertions over filter outputs.
//!
//! Each function panics with a message naming the offending row. They take the input
//! table and the [`DedupConfig`] that produced the output, so annotation columns and
//! group keys are located by name.

use crate::classify::Classification;
use crate::config::DedupConfig;
use crate::table::Table;
use crate::value::Cell;
use std::collections::{HashMap, HashSet};

/// Group key of every row of `table`, by the configured group column names.
///
/// # Panics
/// Panics if a group column is missing from `table`.
#[must_use]
pub fn group_keys(table: &Table, config: &DedupConfig) -> Vec<Vec<Cell>> {
    let indices: Vec<usize> = config
        .group_columns
        .iter()
        .map(|name| {
            table
                .schema()
                .index_of(name)
                .unwrap_or_else(|| panic!("group column '{name}' not in table"))
        })
        .collect();
    table
        .records()
        .iter()
        .map(|r| indices.iter().map(|&i| r.cell(i).clone()).collect())
        .collect()
}

/// Label of every row of an annotated output, paired with its row id.
///
/// # Panics
/// Panics if the classification column is absent or holds an unknown label.
#[must_use]
pub fn classifications(output: &Table, config: &DedupConfig) -> Vec<(String, Classification)> {
    let column = annotation_index(output, &config.classification_column_name);
    output
        .records()
        .iter()
        .map(|r| {
            let label = r.cell(column).as_str().unwrap_or_default();
            let class = Classification::from_label(label)
                .unwrap_or_else(|| panic!("row '{}' has unknown label '{label}'", r.id()));
            (r.id().to_string(), class)
        })
        .collect()
}

fn annotation_index(output: &Table, name: &str) -> usize {
    output
        .schema()
        .index_of(name)
        .unwrap_or_else(|| panic!("annotation column '{name}' not in output"))
}

/// Assert the output row ids, in order.
///
/// # Panics
/// Panics if the ids differ.
pub fn assert_row_ids(output: &Table, expected: &[&str]) {
    let actual = output.row_ids();
    assert_eq!(
        actual, expected,
        "Row id mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
}

/// Every input row appears exactly once in the output (annotate mode).
///
/// # Panics
/// Panics on a missing, extra, or repeated row id.
pub fn assert_exhaustive(input: &Table, output: &Table) {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for id in output.row_ids() {
        *seen.entry(id).or_default() += 1;
    }
    for id in input.row_ids() {
        match seen.remove(id) {
            Some(1) => {}
            Some(n) => panic!("row '{id}' appears {n} times in output"),
            None => panic!("row '{id}' missing from output"),
        }
    }
    let extra: Vec<_> = seen.keys().collect();
    assert!(extra.is_empty(), "output has rows not in input: {extra:?}");
}

/// The output has exactly one row per distinct input group key (remove mode).
///
/// # Panics
/// Panics if the counts differ or a key repeats in the output.
pub fn assert_group_count_conserved(input: &Table, output: &Table, config: &DedupConfig) {
    let input_keys: HashSet<_> = group_keys(input, config).into_iter().collect();
    let output_keys = group_keys(output, config);
    let distinct: HashSet<_> = output_keys.iter().cloned().collect();
    assert_eq!(
        distinct.len(),
        output_keys.len(),
        "a group key appears more than once in the output"
    );
    assert_eq!(
        distinct, input_keys,
        "output group keys differ from input group keys"
    );
}

/// Each group has exactly one CHOSEN row if it has two or more members, and its only
/// row is UNIQUE otherwise (annotate mode with classification column).
///
/// # Panics
/// Panics on the first group that breaks the rule.
pub fn assert_representatives_unique(output: &Table, config: &DedupConfig) {
    let keys = group_keys(output, config);
    let labels = classifications(output, config);
    let mut groups: HashMap<&Vec<Cell>, Vec<(&str, Classification)>> = HashMap::new();
    for (key, (id, class)) in keys.iter().zip(&labels) {
        groups.entry(key).or_default().push((id, *class));
    }
    for (key, members) in groups {
        let chosen = members.iter().filter(|(_, c)| *c == Classification::Chosen).count();
        let unique = members.iter().filter(|(_, c)| *c == Classification::Unique).count();
        if members.len() == 1 {
            assert_eq!(unique, 1, "single-row group {key:?} is not unique: {members:?}");
        } else {
            assert_eq!(chosen, 1, "group {key:?} needs exactly one chosen row: {members:?}");
            assert_eq!(unique, 0, "group {key:?} has a unique row: {members:?}");
        }
    }
}

/// Every row's reference names the CHOSEN row of its own group; UNIQUE and CHOSEN rows
/// reference nothing (annotate mode with both annotation columns).
///
/// # Panics
/// Panics on the first dangling or mismatched reference.
pub fn assert_reference_integrity(output: &Table, config: &DedupConfig) {
    let keys = group_keys(output, config);
    let labels = classifications(output, config);
    let ref_col = annotation_index(output, &config.reference_column_name);

    let chosen: HashMap<&str, &Vec<Cell>> = labels
        .iter()
        .zip(&keys)
        .filter(|((_, c), _)| *c == Classification::Chosen)
        .map(|((id, _), key)| (id.as_str(), key))
        .collect();

    for ((record, (id, class)), key) in output.records().iter().zip(&labels).zip(&keys) {
        let reference = record.cell(ref_col);
        match class {
            Classification::Duplicate => {
                let target = reference
                    .as_str()
                    .unwrap_or_else(|| panic!("duplicate row '{id}' has no reference"));
                let target_key = chosen
                    .get(target)
                    .unwrap_or_else(|| panic!("row '{id}' references non-chosen row '{target}'"));
                assert_eq!(
                    *target_key, key,
                    "row '{id}' references '{target}' from another group"
                );
            }
            Classification::Unique | Classification::Chosen => assert!(
                reference.is_missing(),
                "{class} row '{id}' has reference {reference:?}"
            ),
        }
    }
}

/// The output row ids are a subsequence of the input row ids.
///
/// # Panics
/// Panics at the first output row found out of input order.
pub fn assert_order_retained(input: &Table, output: &Table) {
    let mut input_ids = input.row_ids().into_iter();
    for id in output.row_ids() {
        assert!(
            input_ids.any(|i| i == id),
            "row '{id}' is out of input order"
        );
    }
}

/// Check every property that applies to `config`.
///
/// # Panics
/// Panics if any applicable property fails.
pub fn assert_dedup_invariants(input: &Table, output: &Table, config: &DedupConfig) {
    if config.remove_duplicates {
        assert_group_count_conserved(input, output, config);
    } else {
        assert_exhaustive(input, output);
        if config.add_classification_column {
            assert_representatives_unique(output, config);
            if config.add_reference_column {
                assert_reference_integrity(output, config);
            }
        }
    }
    if config.retain_order {
        assert_order_retained(input, output);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::scenario_table;

    #[test]
    fn subsequence_accepts_gaps() {
        let input = scenario_table();
        let t = crate::testing::table_from_rows(
            &[("k", crate::DataType::Int), ("v", crate::DataType::Str)],
            [("r1", vec![Cell::Int(1), Cell::from("a")]), ("r3", vec![Cell::Int(2), Cell::from("c")])],
        )
        .unwrap();
        assert_order_retained(&input, &t);
    }

    #[test]
    #[should_panic(expected = "out of input order")]
    fn subsequence_rejects_reordering() {
        let input = scenario_table();
        let reversed = crate::testing::table_from_rows(
            &[("k", crate::DataType::Int), ("v", crate::DataType::Str)],
            [("r3", vec![Cell::Int(2), Cell::from("c")]), ("r1", vec![Cell::Int(1), Cell::from("a")])],
        )
        .unwrap();
        assert_order_retained(&input, &reversed);
    }

    #[test]
    #[should_panic(expected = "missing from output")]
    fn exhaustive_detects_dropped_row() {
        let input = scenario_table();
        let (schema, mut rows) = input.clone().into_parts();
        rows.pop();
        assert_exhaustive(&input, &Table::new(schema, rows).unwrap());
    }
}
