//! Export to time-series line formats (InfluxDB line protocol and the
//! OpenTSDB import format).

use crate::error::SchemaError;
use crate::processes::require_keys;
use crate::reader::Reader;
use crate::record::Record;
use crate::utils::is_json_number;
use anyhow::{Context, Result, anyhow, bail, ensure};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

/// Which columns make up a point, and how to read its timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointSpec {
    pub measurement: String,
    /// Name of the timestamp column.
    pub timestamp: String,
    /// `ns`, `ms` or `s` for integer epochs, otherwise a chrono format string.
    pub format: String,
    /// `UTC` (also the default when empty), `Local` or a fixed offset such as
    /// `+10:00`. Used for formats that carry no offset.
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub values: Vec<String>,
}

impl PointSpec {
    pub fn new(measurement: impl Into<String>, timestamp: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            timestamp: timestamp.into(),
            format: format.into(),
            ..Self::default()
        }
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn values<S: Into<String>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Sorted copies of the tag and value columns, after checking that the
    /// input has them.
    fn prepare(&self, input: &Reader) -> Result<(Clock, Vec<String>, Vec<String>)> {
        let clock = Clock::parse(&self.format, &self.location)?;
        let header = input.header();
        require_keys(&header, std::slice::from_ref(&self.timestamp))?;
        require_keys(&header, &self.tags)?;
        require_keys(&header, &self.values)?;
        let mut tags = self.tags.clone();
        let mut values = self.values.clone();
        tags.sort();
        values.sort();
        Ok((clock, tags, values))
    }
}

#[derive(Debug, Clone, Copy)]
enum Zone {
    Utc,
    Local,
    Fixed(FixedOffset),
}

impl Zone {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "" | "UTC" | "utc" => Ok(Zone::Utc),
            "Local" | "local" => Ok(Zone::Local),
            other => {
                let offset: FixedOffset = other
                    .parse()
                    .map_err(|_| SchemaError::Config(format!("unsupported location {other:?}")))?;
                Ok(Zone::Fixed(offset))
            }
        }
    }

    fn resolve(self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            Zone::Utc => Some(Utc.from_utc_datetime(&naive)),
            Zone::Local => Local.from_local_datetime(&naive).single().map(|t| t.with_timezone(&Utc)),
            Zone::Fixed(o) => o.from_local_datetime(&naive).single().map(|t| t.with_timezone(&Utc)),
        }
    }
}

#[derive(Debug, Clone)]
enum Clock {
    Nanos,
    Millis,
    Seconds,
    Pattern(String, Zone),
}

impl Clock {
    fn parse(format: &str, location: &str) -> Result<Self> {
        Ok(match format {
            "ns" => Clock::Nanos,
            "ms" => Clock::Millis,
            "s" => Clock::Seconds,
            "" => bail!(SchemaError::Config("timestamp format is required".into())),
            pattern => Clock::Pattern(pattern.to_string(), Zone::parse(location)?),
        })
    }

    /// Nanoseconds since the Unix epoch.
    fn nanos(&self, s: &str) -> Result<i64> {
        let int = || s.trim().parse::<i64>().with_context(|| format!("bad epoch timestamp {s:?}"));
        let scaled = |n: i64, by: i64| n.checked_mul(by).ok_or_else(|| anyhow!("timestamp {s:?} out of range"));
        match self {
            Clock::Nanos => int(),
            Clock::Millis => scaled(int()?, 1_000_000),
            Clock::Seconds => scaled(int()?, 1_000_000_000),
            Clock::Pattern(pattern, zone) => {
                let utc = match DateTime::parse_from_str(s, pattern) {
                    Ok(t) => t.with_timezone(&Utc),
                    Err(_) => {
                        let naive = NaiveDateTime::parse_from_str(s, pattern)
                            .or_else(|_| {
                                NaiveDate::parse_from_str(s, pattern).map(|d| d.and_time(chrono::NaiveTime::MIN))
                            })
                            .with_context(|| format!("timestamp {s:?} does not match {pattern:?}"))?;
                        zone.resolve(naive)
                            .ok_or_else(|| anyhow!("timestamp {s:?} is ambiguous or skipped in its zone"))?
                    }
                };
                utc.timestamp_nanos_opt()
                    .ok_or_else(|| anyhow!("timestamp {s:?} out of range"))
            }
        }
    }
}

/// `key=value` escaping for tag values.
fn escape_tag(v: &str) -> String {
    let mut out = String::with_capacity(v.len());
    for c in v.chars() {
        if matches!(c, ',' | ' ' | '=') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Numbers and booleans are written bare, everything else quoted.
fn field_value(v: &str) -> String {
    if is_json_number(v) || v == "true" || v == "false" {
        v.to_string()
    } else {
        serde_json::Value::String(v.to_string()).to_string()
    }
}

fn non_empty<'r>(record: &'r Record, keys: &'r [String]) -> impl Iterator<Item = (&'r str, &'r str)> {
    keys.iter()
        .map(|k| (k.as_str(), record.get(k)))
        .filter(|(_, v)| !v.is_empty())
}

/// InfluxDB line protocol, one point per record:
/// `measurement[,tag=value…] field=value[,field=value…] nanos`.
///
/// Tags and fields are written in name order and empty ones are skipped. A
/// record with no non-empty field is dropped with a warning; an unparsable
/// timestamp is an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfluxLineFormat {
    #[serde(flatten)]
    pub point: PointSpec,
}

impl InfluxLineFormat {
    pub fn new(point: PointSpec) -> Self {
        Self { point }
    }

    /// # Errors
    /// Fails on configuration or schema errors, unparsable timestamps, input
    /// stream errors and write errors.
    pub fn run<W: Write>(&self, input: Reader, sink: W) -> Result<()> {
        let (clock, tags, values) = self.point.prepare(&input)?;
        let mut sink = io::BufWriter::new(sink);
        let mut line = String::new();
        for (n, record) in input.records().enumerate() {
            let lineno = n + 2;
            let ts = clock
                .nanos(record.get(&self.point.timestamp))
                .with_context(|| format!("line {lineno}"))?;
            line.clear();
            line.push_str(&self.point.measurement);
            for (k, v) in non_empty(&record, &tags) {
                line.push(',');
                line.push_str(k);
                line.push('=');
                line.push_str(&escape_tag(v));
            }
            let mut fields = 0;
            for (k, v) in non_empty(&record, &values) {
                line.push(if fields == 0 { ' ' } else { ',' });
                line.push_str(k);
                line.push('=');
                line.push_str(&field_value(v));
                fields += 1;
            }
            if fields == 0 {
                tracing::warn!(line = lineno, "dropping field-less point");
                continue;
            }
            line.push(' ');
            line.push_str(&ts.to_string());
            line.push('\n');
            sink.write_all(line.as_bytes()).context("write point")?;
        }
        input.error()?;
        sink.flush().context("flush points")?;
        Ok(())
    }
}

/// OpenTSDB import format, one data point per record:
/// `metric timestamp value [tag=value …]`.
///
/// Exactly one value column is allowed. Timestamps are written in seconds
/// when they are whole seconds, otherwise in milliseconds. Records with an
/// unparsable timestamp or an empty value are skipped with a warning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenTsdbImportFormat {
    #[serde(flatten)]
    pub point: PointSpec,
}

impl OpenTsdbImportFormat {
    pub fn new(point: PointSpec) -> Self {
        Self { point }
    }

    /// # Errors
    /// Fails on configuration or schema errors, input stream errors and write
    /// errors.
    pub fn run<W: Write>(&self, input: Reader, sink: W) -> Result<()> {
        ensure!(
            self.point.values.len() == 1,
            SchemaError::Config("opentsdb needs exactly one value column".into())
        );
        let (clock, tags, values) = self.point.prepare(&input)?;
        let mut sink = io::BufWriter::new(sink);
        let mut line = String::new();
        for (n, record) in input.records().enumerate() {
            let lineno = n + 2;
            let nanos = match clock.nanos(record.get(&self.point.timestamp)) {
                Ok(ts) => ts,
                Err(e) => {
                    tracing::warn!(line = lineno, "skipping point: {e:#}");
                    continue;
                }
            };
            let Some((_, value)) = non_empty(&record, &values).next() else {
                tracing::warn!(line = lineno, "skipping point without a value");
                continue;
            };
            let ts = if nanos % 1_000_000_000 == 0 {
                nanos / 1_000_000_000
            } else {
                nanos / 1_000_000
            };
            line.clear();
            line.push_str(&self.point.measurement);
            line.push(' ');
            line.push_str(&ts.to_string());
            line.push(' ');
            line.push_str(&field_value(value));
            for (k, v) in non_empty(&record, &tags) {
                line.push(' ');
                line.push_str(k);
                line.push('=');
                line.push_str(&escape_tag(v));
            }
            line.push('\n');
            sink.write_all(line.as_bytes()).context("write point")?;
        }
        input.error()?;
        sink.flush().context("flush points")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{SharedBuffer, reader_from_str};

    #[test]
    fn influx_sorts_escapes_and_quotes() -> Result<()> {
        let out = SharedBuffer::new();
        let spec = PointSpec::new("cpu", "t", "s")
            .tags(["zone", "host"])
            .values(["use", "state"]);
        InfluxLineFormat::new(spec).run(
            reader_from_str("t,host,zone,use,state\n10,a b,,0.5,ok\n11,c,x=y,,\n"),
            out.clone(),
        )?;
        assert_eq!(out.contents(), "cpu,host=a\\ b state=\"ok\",use=0.5 10000000000\n");
        Ok(())
    }

    #[test]
    fn influx_pattern_in_fixed_offset() -> Result<()> {
        let out = SharedBuffer::new();
        let spec = PointSpec::new("m", "t", "%Y-%m-%d %H:%M:%S")
            .location("+01:00")
            .values(["v"]);
        InfluxLineFormat::new(spec).run(reader_from_str("t,v\n1970-01-01 01:00:01,true\n"), out.clone())?;
        assert_eq!(out.contents(), "m v=true 1000000000\n");
        Ok(())
    }

    #[test]
    fn influx_rejects_bad_timestamps() {
        let spec = PointSpec::new("m", "t", "ms").values(["v"]);
        let err = InfluxLineFormat::new(spec)
            .run(reader_from_str("t,v\nsoon,1\n"), SharedBuffer::new())
            .unwrap_err();
        assert!(format!("{err:#}").contains("line 2"), "{err:#}");
    }

    #[test]
    fn opentsdb_picks_seconds_or_millis_and_skips_bad_rows() -> Result<()> {
        let out = SharedBuffer::new();
        let spec = PointSpec::new("sys.cpu", "t", "ms").tags(["host"]).values(["v"]);
        OpenTsdbImportFormat::new(spec).run(
            reader_from_str("t,host,v\n2000,web1,3\n2500,,4\nnever,web1,5\n3000,web1,\n"),
            out.clone(),
        )?;
        assert_eq!(out.contents(), "sys.cpu 2 3 host=web1\nsys.cpu 2500 4\n");
        Ok(())
    }

    #[test]
    fn opentsdb_needs_one_value() {
        let spec = PointSpec::new("m", "t", "s").values(["a", "b"]);
        assert!(OpenTsdbImportFormat::new(spec).run(reader_from_str("t,a,b\n"), SharedBuffer::new()).is_err());
    }

    #[test]
    fn unknown_location_is_a_config_error() {
        assert!(Clock::parse("%Y", "Mars/Olympus").is_err());
    }
}
