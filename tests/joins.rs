// tests/joins.rs
use anyhow::Result;
use keyed_csv::error::stream_error;
use keyed_csv::processes::join::Join;
use keyed_csv::testing::{SharedBuffer, reader_from_str, run_to_string};
use keyed_csv::*;

fn join(join: Join, left: &str, right: &str) -> Result<String> {
    run_to_string(join.with_right(reader_from_str(right)), left)
}

#[test]
fn groups_cross_and_fall_through() -> Result<()> {
    let out = join(Join::on(["k"]), "k,v\na,1\na,2\nb,1\n", "k,w\na,10\n")?;
    assert_eq!(out, "k,v,w\na,1,10\na,2,10\nb,1,\n");
    Ok(())
}

#[test]
fn full_outer_with_right_only_groups() -> Result<()> {
    let out = join(
        Join::on(["k"]),
        "k,v\nb,1\nd,2\n",
        "k,w\na,x\nb,y\nb,z\nc,q\n",
    )?;
    assert_eq!(out, "k,v,w\na,,x\nb,1,y\nb,1,z\nc,,q\nd,2,\n");
    Ok(())
}

#[test]
fn cross_product_is_left_major() -> Result<()> {
    let out = join(Join::on(["k"]), "k,v\na,1\na,2\n", "k,w\na,x\na,y\n")?;
    assert_eq!(out, "k,v,w\na,1,x\na,1,y\na,2,x\na,2,y\n");
    Ok(())
}

#[test]
fn differently_named_keys_use_left_names() -> Result<()> {
    let out = join(Join::new(["id"], ["ref"]), "id,v\n1,a\n", "w,ref\nb,1\n")?;
    assert_eq!(out, "id,v,w\n1,a,b\n");
    Ok(())
}

#[test]
fn numeric_keys_compare_as_numbers() -> Result<()> {
    let out = join(
        Join::on(["n"]).numeric(["n"]),
        "n,v\n2,two\n10,ten\n",
        "n,w\n2.0,deux\n10,dix\n",
    )?;
    assert_eq!(out, "n,v,w\n2,two,deux\n10,ten,dix\n");
    Ok(())
}

#[test]
fn colliding_right_columns_are_dropped() -> Result<()> {
    let out = join(Join::on(["k"]), "k,v\na,left\n", "k,v,w\na,right,1\n")?;
    assert_eq!(out, "k,v,w\na,left,1\n");
    Ok(())
}

#[test]
fn multi_way_join_through_a_pipeline() -> Result<()> {
    let pipeline = Pipeline::default()
        .then(Join::on(["k"]).with_right(reader_from_str("k,y\na,ya\nb,yb\n")))
        .then(Join::on(["k"]).with_right(reader_from_str("k,z\nb,zb\nc,zc\n")));
    let out = run_to_string(pipeline, "k,x\na,xa\nb,xb\n")?;
    assert_eq!(out, "k,x,y,z\na,xa,ya,\nb,xb,yb,zb\nc,,,zc\n");
    Ok(())
}

#[test]
fn missing_keys_are_schema_errors() {
    let err = join(Join::on(["k"]), "k,v\n", "w\n1\n").unwrap_err();
    assert_eq!(
        err.downcast_ref::<SchemaError>(),
        Some(&SchemaError::MissingKeys(vec!["k".into()]))
    );
    assert!(format!("{err:#}").starts_with("right input"));
}

#[test]
fn decode_error_ends_the_join_after_completed_groups() {
    let right = Reader::from_io("k,w\na,1\nb\n".as_bytes(), &Dialect::csv().strict());
    let out = SharedBuffer::new();
    let err = Box::new(Join::on(["k"]).with_right(right))
        .run(
            reader_from_str("k,v\na,x\nb,y\nc,z\n"),
            writer::to_io(out.clone(), &Dialect::csv()),
        )
        .unwrap_err();
    assert!(matches!(stream_error(&err), Some(StreamError::Decode(_))), "{err:#}");
    assert_eq!(out.contents(), "k,v,w\na,x,1\n");
}

#[test]
fn decode_error_on_the_left_keeps_earlier_output() {
    let left = Reader::from_io("k,v\na,x\nb,y\nbroken\n".as_bytes(), &Dialect::csv().strict());
    let out = SharedBuffer::new();
    let err = Box::new(Join::on(["k"]).with_right(reader_from_str("k,w\na,1\nb,2\nc,3\n")))
        .run(left, writer::to_io(out.clone(), &Dialect::csv()))
        .unwrap_err();
    assert!(matches!(stream_error(&err), Some(StreamError::Decode(_))), "{err:#}");
    // The run of "b" ended at the bad record and is still merged; "c" is not.
    assert_eq!(out.contents(), "k,v,w\na,x,1\nb,y,2\n");
}
