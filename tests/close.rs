// tests/close.rs
use anyhow::Result;
use keyed_csv::testing::reader_from_str;
use keyed_csv::*;
use std::fmt::Write as _;

fn big_input() -> String {
    let mut text = String::from("n\n");
    for i in 0..10_000 {
        let _ = writeln!(text, "{i}");
    }
    text
}

#[test]
fn close_is_idempotent_and_stops_after_at_most_one_record() -> Result<()> {
    let reader = reader_from_str(&big_input());
    let first = reader.recv();
    assert!(first.is_some());

    reader.close();
    reader.close();
    let rest = reader.records().count();
    assert!(rest <= 1, "{rest} records after close");
    reader.close();
    reader.error()?;
    Ok(())
}

#[test]
fn close_before_reading_anything() -> Result<()> {
    let reader = reader_from_str(&big_input());
    assert_eq!(reader.header().names(), ["n"]);
    reader.close();
    assert!(reader.records().count() <= 1);
    reader.error()?;
    Ok(())
}

#[test]
fn closing_a_pipe_reader_stops_its_producer() {
    let reader = reader_from_str(&big_input()).with_process(Box::new(Cat));
    assert!(reader.recv().is_some());
    reader.close();
    assert!(reader.records().count() <= 1);
    // The producing process was told to stop; it reports that as a disconnect.
    assert!(matches!(reader.error(), Ok(()) | Err(StreamError::Disconnected)));
}

#[test]
fn dropping_an_unread_reader_releases_its_decoder() {
    for _ in 0..8 {
        let reader = reader_from_str(&big_input());
        let _ = reader.recv();
        drop(reader);
    }
}
