#![cfg(feature = "io-jsonl")]

use rowdedup::testing::*;
use rowdedup::{
    DedupConfig, DuplicateRowFilter, ExecutionContext, JsonlSink, read_jsonl_table,
    write_jsonl_table,
};

#[test]
fn annotated_output_as_jsonl() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("annotated.jsonl");
    let config = DedupConfig {
        remove_duplicates: false,
        add_reference_column: true,
        ..DedupConfig::new(["k"])
    };
    let filter = DuplicateRowFilter::new(config.clone())?;
    let input = scenario_table();
    let (rows, _) = filter.execute(&input, JsonlSink::new(&path), &ExecutionContext::new())?;
    assert_eq!(rows, 3);

    let schema = filter.output_schema(input.schema())?;
    let back = read_jsonl_table(&path, &schema)?;
    assert_eq!(back, filter.run(&input)?);
    assert_dedup_invariants(&input, &back, &config);

    let second: serde_json::Value =
        serde_json::from_str(std::fs::read_to_string(&path)?.lines().nth(1).unwrap_or_default())?;
    assert_eq!(second["id"], "r2");
    assert_eq!(second["duplicate-type-classifier"], "duplicate");
    assert_eq!(second["duplicate-row-identifier"], "r1");
    Ok(())
}

#[cfg(feature = "compression-zstd")]
#[test]
fn zstd_jsonl_round_trip() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("rows.jsonl.zst");
    let input = generated_table(40, 6);
    assert_eq!(write_jsonl_table(&path, &input)?, 40);
    assert_eq!(read_jsonl_table(&path, input.schema())?, input);
    Ok(())
}
