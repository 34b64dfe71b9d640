// tests/compare.rs
use anyhow::Result;
use keyed_csv::processes::sort::SortKeys;
use keyed_csv::testing::{records_from_str, run_to_string};
use keyed_csv::*;
use std::cmp::Ordering;

fn sort_column(sort: SortKeys, values: &[&str]) -> Result<Vec<String>> {
    let mut input = String::from("k\n");
    for v in values {
        input.push_str(v);
        input.push('\n');
    }
    let out = run_to_string(sort, &input)?;
    Ok(records_from_str(&out)?
        .iter()
        .map(|r| r.get("k").to_string())
        .collect())
}

#[test]
fn lexical_vs_numeric() -> Result<()> {
    assert_eq!(sort_column(SortKeys::new(["k"]), &["9", "10", "2"])?, ["10", "2", "9"]);
    assert_eq!(
        sort_column(SortKeys::new(["k"]).numeric(["k"]), &["9", "10", "2"])?,
        ["2", "9", "10"]
    );
    Ok(())
}

#[test]
fn unparsable_values_fall_back_to_lexical() -> Result<()> {
    let sorted = sort_column(SortKeys::new(["k"]).numeric(["k"]), &["b", "10", "abc", "9", "a"])?;
    assert_eq!(sorted, ["9", "10", "a", "abc", "b"]);
    Ok(())
}

#[test]
fn reversed_numeric_key() -> Result<()> {
    let sorted = sort_column(SortKeys::new(["k"]).numeric(["k"]).reversed(["k"]), &["9", "10", "2"])?;
    assert_eq!(sorted, ["10", "9", "2"]);
    Ok(())
}

#[test]
fn comparator_ties_break_on_later_keys() {
    let c = KeyComparator::for_keys(&["a", "b"], &["a"], &[]);
    assert_eq!(c.compare(&["1", "z"], &["1.0", "a"]), Ordering::Greater);
    assert_eq!(c.compare(&["2", "a"], &["10", "a"]), Ordering::Less);
    assert_eq!(Collation::Numeric.compare(" 5 ", "5"), Ordering::Equal);
    assert_eq!(Collation::Lexical.compare(" 5 ", "5"), Ordering::Less);
}
