// tests/reader_writer.rs
use anyhow::Result;
use keyed_csv::testing::SharedBuffer;
use keyed_csv::*;
use std::io::Cursor;

fn encode(header: &Header, rows: &[Vec<&str>]) -> Result<String> {
    let out = SharedBuffer::new();
    let mut w = writer::to_io(out.clone(), &Dialect::csv())(header.clone())?;
    for row in rows {
        let mut r = w.blank();
        for (k, v) in header.iter().zip(row) {
            r.put(k, *v);
        }
        w.write(r)?;
    }
    w.close(None)?;
    Ok(out.contents())
}

#[test]
fn round_trip_preserves_header_and_values() -> Result<()> {
    let header = Header::new(["id", "text", "note"]);
    let rows = vec![
        vec!["1", "a,b", "say \"hi\""],
        vec!["2", "two\nlines", ""],
        vec!["3", "", "  padded  "],
    ];
    let text = encode(&header, &rows)?;

    let reader = Reader::from_io(Cursor::new(text), &Dialect::csv());
    assert_eq!(reader.header(), header);
    let records = reader.read_all()?;
    assert_eq!(records.len(), rows.len());
    for (record, row) in records.iter().zip(&rows) {
        for (k, v) in header.iter().zip(row) {
            assert_eq!(record.get(k), *v);
        }
    }
    Ok(())
}

#[test]
fn round_trip_of_no_records() -> Result<()> {
    let header = Header::new(["only"]);
    let text = encode(&header, &[])?;
    assert_eq!(text, "only\n");
    let reader = Reader::from_io(Cursor::new(text), &Dialect::csv());
    assert_eq!(reader.header(), header);
    assert!(reader.read_all()?.is_empty());
    Ok(())
}

#[test]
fn writer_reorders_records_with_another_header() -> Result<()> {
    let out = SharedBuffer::new();
    let mut w = writer::to_io(out.clone(), &Dialect::csv())(Header::new(["b", "a"]))?;
    let r = RecordBuilder::new(Header::new(["a", "b", "c"])).build(vec!["1".into(), "2".into(), "3".into()]);
    w.write(r)?;
    w.close(None)?;
    assert_eq!(out.contents(), "b,a\n2,1\n");
    Ok(())
}

#[test]
fn tab_dialect_on_both_sides() -> Result<()> {
    let input = Reader::from_io("a\tb\n1\t2,3\n".as_bytes(), &Dialect::tab());
    let out = SharedBuffer::new();
    Box::new(Cat).run(input, writer::to_io(out.clone(), &Dialect::csv()))?;
    assert_eq!(out.contents(), "a,b\n1,\"2,3\"\n");
    Ok(())
}

#[test]
fn strict_dialect_reports_decode_errors_after_good_records() {
    let reader = Reader::from_io("a,b\n1,2\n3\n".as_bytes(), &Dialect::csv().strict());
    assert_eq!(reader.records().count(), 1);
    assert!(matches!(reader.error(), Err(StreamError::Decode(_))));
}

#[cfg(all(
    feature = "compression-gzip",
    feature = "compression-zstd",
    feature = "compression-bzip2",
    feature = "compression-xz"
))]
#[test]
fn file_round_trip_with_compression() -> Result<()> {
    let dir = tempfile::tempdir()?;
    for name in ["plain.csv", "nested/dir/packed.csv.gz", "packed.csv.zst", "packed.csv.bz2", "packed.csv.xz"] {
        let path = dir.path().join(name);
        let mut w = writer::create(&path, &Dialect::csv())(Header::new(["k", "v"]))?;
        let mut r = w.blank();
        r.put("k", "x");
        r.put("v", "1");
        w.write(r)?;
        w.close(None)?;

        let reader = Reader::open(&path, &Dialect::csv())?;
        assert_eq!(reader.header().names(), ["k", "v"], "{name}");
        let all = reader.read_all()?;
        assert_eq!(all.len(), 1, "{name}");
        assert_eq!(all[0].get("v"), "1", "{name}");
    }
    Ok(())
}

#[test]
fn missing_file_is_an_error() {
    assert!(Reader::open("/definitely/not/here.csv", &Dialect::csv()).is_err());
}
