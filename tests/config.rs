// tests/config.rs
use anyhow::Result;
use keyed_csv::testing::{run_to_string, temp_file};
use keyed_csv::*;

#[test]
fn json_defined_pipeline_runs() -> Result<()> {
    let (_dir, right) = temp_file("right.csv", "id,label\n1,one\n2,two\n")?;

    let json = format!(
        r#"{{
            "stages": [
                {{ "process": "sort", "keys": ["id"], "numeric": ["id"] }},
                {{ "process": "join", "right": {right:?}, "left_keys": ["id"] }},
                {{ "process": "select", "keys": ["label", "id"], "permute_only": true }}
            ]
        }}"#,
        right = right.display().to_string()
    );
    let pipeline = PipelineSpec::from_json(&json)?.build()?;
    assert_eq!(pipeline.len(), 3);

    let out = run_to_string(pipeline, "id,n\n2,b\n1,a\n3,c\n")?;
    assert_eq!(out, "label,id,n\none,1,a\ntwo,2,b\n,3,c\n");
    Ok(())
}

#[test]
fn spec_files_and_dialects() -> Result<()> {
    let (_dir, path) = temp_file(
        "pipeline.json",
        r#"{ "dialect": { "delimiter": "\t", "flexible": false }, "stages": [{ "process": "cat" }] }"#,
    )?;
    let spec = PipelineSpec::from_path(&path)?;
    assert_eq!(spec.dialect, Dialect::tab().strict());
    assert!(matches!(spec.stages.as_slice(), [StageSpec::Cat]));
    Ok(())
}

#[test]
fn invalid_stage_configuration_fails_at_build() {
    let spec = PipelineSpec::from_json(
        r#"{ "stages": [{ "process": "sort", "keys": ["a"], "numeric": ["b"] }] }"#,
    );
    let err = spec.and_then(|s| s.build()).unwrap_err();
    assert!(format!("{err:#}").starts_with("stage 0"), "{err:#}");
}

#[test]
fn join_with_missing_right_file_fails_at_build() {
    let spec = PipelineSpec::from_json(
        r#"{ "stages": [{ "process": "join", "right": "/no/such/file.csv", "left_keys": ["k"] }] }"#,
    );
    assert!(spec.and_then(|s| s.build()).is_err());
}
