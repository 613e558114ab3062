// src/sink.rs

use chrono::{NaiveDate, SecondsFormat, Utc};
use serde_json::{json, Value};
use std::io::{self, Write};

use crate::history::Bookmarks;
use crate::process::extract::Record;

/// Where emitted records end up.
pub trait RecordSink {
    fn write_schema(&mut self, stream: &str, schema: &Value, key_properties: &[&str]) -> io::Result<()>;
    fn write_record(&mut self, stream: &str, record: &Record) -> io::Result<()>;
    /// Called once per fully emitted day.
    fn write_state(&mut self, stream: &str, served: NaiveDate) -> io::Result<()>;
}

/// Singer-style messages, one JSON object per line.
pub struct JsonLinesSink<W: Write> {
    out: W,
    state: Bookmarks,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W, state: Bookmarks) -> Self {
        Self { out, state }
    }

    pub fn state(&self) -> &Bookmarks {
        &self.state
    }

    pub fn into_inner(self) -> (W, Bookmarks) {
        (self.out, self.state)
    }

    fn line(&mut self, msg: &Value) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, msg)?;
        self.out.write_all(b"\n")
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn write_schema(&mut self, stream: &str, schema: &Value, key_properties: &[&str]) -> io::Result<()> {
        self.line(&json!({
            "type": "SCHEMA",
            "stream": stream,
            "schema": schema,
            "key_properties": key_properties,
        }))
    }

    fn write_record(&mut self, stream: &str, record: &Record) -> io::Result<()> {
        self.line(&json!({
            "type": "RECORD",
            "stream": stream,
            "record": record,
            "time_extracted": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }))
    }

    fn write_state(&mut self, stream: &str, served: NaiveDate) -> io::Result<()> {
        self.state.set(stream, served);
        let value = serde_json::to_value(&self.state)?;
        self.line(&json!({ "type": "STATE", "value": value }))?;
        self.out.flush()
    }
}

/// Keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub schemas: Vec<String>,
    pub records: Vec<(String, Record)>,
    pub states: Vec<(String, NaiveDate)>,
}

impl RecordSink for MemorySink {
    fn write_schema(&mut self, stream: &str, _: &Value, _: &[&str]) -> io::Result<()> {
        self.schemas.push(stream.to_string());
        Ok(())
    }

    fn write_record(&mut self, stream: &str, record: &Record) -> io::Result<()> {
        self.records.push((stream.to_string(), record.clone()));
        Ok(())
    }

    fn write_state(&mut self, stream: &str, served: NaiveDate) -> io::Result<()> {
        self.states.push((stream.to_string(), served));
        Ok(())
    }
}
