//! Conversion between JSON object streams and CSV.
//!
//! Dotted column names are paths into the JSON object: a column `a.b` maps
//! to `{"a": {"b": …}}`.

use crate::error::SchemaError;
use crate::header::Header;
use crate::pipe::Pipe;
use crate::reader::Reader;
use crate::utils::is_json_number;
use crate::writer::{self, Writer, WriterBuilder};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::io::{self, Read, Write};
use std::thread;

/// Flatten a stream of JSON objects into CSV columns.
///
/// String values are copied as is, `null` and missing paths become empty,
/// anything else is JSON encoded. Values consumed by a column are removed
/// from the object; with `base_object` set, whatever remains is written as
/// JSON into that column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonToCsv {
    pub header: Vec<String>,
    #[serde(default)]
    pub base_object: Option<String>,
}

impl JsonToCsv {
    pub fn new<S: Into<String>>(header: impl IntoIterator<Item = S>) -> Self {
        Self {
            header: header.into_iter().map(Into::into).collect(),
            base_object: None,
        }
    }

    pub fn base_object(mut self, column: impl Into<String>) -> Self {
        self.base_object = Some(column.into());
        self
    }

    fn output_header(&self) -> Header {
        match &self.base_object {
            Some(base) if !self.header.contains(base) => {
                Header::new(self.header.iter().cloned().chain([base.clone()]))
            }
            _ => Header::new(self.header.iter().cloned()),
        }
    }

    /// Convert every object read from `source`.
    ///
    /// # Errors
    /// Fails on the first malformed object, with its position in the stream,
    /// or on a write error.
    pub fn run<R: Read>(&self, source: R, output: WriterBuilder) -> Result<()> {
        let header = self.output_header();
        let mut w = output(header.clone())?;
        let outcome = self.convert(source, &header, w.as_mut());
        writer::finish(w, outcome)
    }

    fn convert<R: Read>(&self, source: R, header: &Header, w: &mut dyn Writer) -> Result<()> {
        let paths: Vec<Vec<&str>> = header.iter().map(|k| k.split('.').collect()).collect();
        let objects = serde_json::Deserializer::from_reader(source).into_iter::<Map<String, Value>>();
        for (n, object) in objects.enumerate() {
            let mut object = object.with_context(|| format!("object {}: unable to decode", n + 1))?;
            let mut out = w.blank();
            for (name, path) in header.iter().zip(&paths) {
                let value = take_path(&mut object, path);
                if self.base_object.as_deref() != Some(name.as_str()) {
                    out.put(name, column_value(value));
                }
            }
            if let Some(base) = &self.base_object {
                out.put(base, Value::Object(object).to_string());
            }
            w.write(out).with_context(|| format!("object {}: failed to write", n + 1))?;
        }
        Ok(())
    }

    /// A reader over the CSV produced from `source`, converted on a
    /// background thread. Conversion failures surface as
    /// [`StreamError::Upstream`](crate::StreamError::Upstream) on the reader.
    pub fn into_reader<R: Read + Send + 'static>(self, source: R) -> Reader {
        let (builder, reader, unclaimed) = Pipe::new().split_unclaimed();
        let on_failure = unclaimed.clone();
        let spawned = thread::Builder::new()
            .name("json-to-csv".into())
            .spawn(move || {
                if let Err(e) = self.run(source, builder) {
                    tracing::debug!("json conversion failed: {e:#}");
                    on_failure.fail(&e);
                }
            });
        if let Err(e) = spawned {
            tracing::warn!("could not start json conversion thread: {e}");
            unclaimed.fail(&anyhow::Error::new(e).context("start json conversion thread"));
        }
        reader
    }
}

/// Remove and return the value at `path`. Missing paths yield `Null`.
fn take_path(object: &mut Map<String, Value>, path: &[&str]) -> Value {
    match path {
        [] => Value::Null,
        [leaf] => object.remove(*leaf).unwrap_or(Value::Null),
        [head, rest @ ..] => match object.get_mut(*head) {
            Some(Value::Object(inner)) => take_path(inner, rest),
            _ => Value::Null,
        },
    }
}

fn column_value(v: Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Write each record as a JSON object on its own line.
///
/// Unless `strings_only` is set, values that read as booleans (`true`,
/// `TRUE`, `false`, `FALSE`), JSON numbers, objects or arrays are emitted
/// typed. Empty values, and `null` in typed mode, are omitted. With
/// `base_object` set, that column's JSON object is the starting point and
/// the other columns are written into it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvToJson {
    #[serde(default)]
    pub base_object: Option<String>,
    #[serde(default)]
    pub strings_only: bool,
}

impl CsvToJson {
    /// # Errors
    /// Fails if `base_object` is not an input column, if the input stream
    /// fails, or on a write error.
    pub fn run<W: Write>(&self, input: Reader, sink: W) -> Result<()> {
        let header = input.header();
        if let Some(base) = &self.base_object
            && !header.contains(base)
        {
            return Err(SchemaError::MissingKeys(vec![base.clone()]))
                .context("base object column");
        }
        let paths: Vec<Vec<&str>> = header.iter().map(|k| k.split('.').collect()).collect();
        let mut sink = io::BufWriter::new(sink);
        for record in input.records() {
            let base_text = self.base_object.as_deref().map_or("", |b| record.get(b));
            let mut object = self.base(base_text);
            for ((name, path), value) in header.iter().zip(&paths).zip(record.as_slice()) {
                if self.base_object.as_deref() == Some(name.as_str()) {
                    continue;
                }
                if let Some(v) = self.typed(value) {
                    insert_path(&mut object, path, v);
                }
            }
            serde_json::to_writer(&mut sink, &object).context("encode json")?;
            sink.write_all(b"\n").context("write json")?;
        }
        input.error()?;
        sink.flush().context("flush json")?;
        Ok(())
    }

    fn base(&self, text: &str) -> Map<String, Value> {
        if text.is_empty() {
            return Map::new();
        }
        match serde_json::from_str(text) {
            Ok(object) => object,
            Err(e) => {
                tracing::warn!("failed to parse base object {text:?}: {e}");
                Map::new()
            }
        }
    }

    fn typed(&self, v: &str) -> Option<Value> {
        if v.is_empty() {
            return None;
        }
        if self.strings_only {
            return Some(Value::String(v.to_string()));
        }
        let parsed = match v {
            "null" => return None,
            "true" | "TRUE" => Some(Value::Bool(true)),
            "false" | "FALSE" => Some(Value::Bool(false)),
            _ if v.starts_with('{') => serde_json::from_str::<Map<String, Value>>(v).ok().map(Value::Object),
            _ if v.starts_with('[') => serde_json::from_str::<Vec<Value>>(v).ok().map(Value::Array),
            _ if is_json_number(v) => number(v.trim()).map(Value::Number),
            _ => None,
        };
        Some(parsed.unwrap_or_else(|| Value::String(v.to_string())))
    }
}

fn number(s: &str) -> Option<Number> {
    s.parse::<i64>()
        .ok()
        .map(Number::from)
        .or_else(|| s.parse::<f64>().ok().and_then(Number::from_f64))
}

/// Store `v` at `path`, replacing non-object intermediates.
fn insert_path(object: &mut Map<String, Value>, path: &[&str], v: Value) {
    match path {
        [] => {}
        [leaf] => {
            object.insert((*leaf).to_string(), v);
        }
        [head, rest @ ..] => {
            let slot = object
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(inner) = slot {
                insert_path(inner, rest, v);
            }
        }
    }
}
