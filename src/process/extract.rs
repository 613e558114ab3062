// src/process/extract.rs

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{ExtractError, Result};
use crate::fetch::snapshot::{ContentKind, SnapshotResponse};

pub const CURRENT_DATE: &str = "current_date";

/// One CSV row: header → raw text, in file order, stamped with the served day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
    current_date: NaiveDate,
}

impl Record {
    pub fn new(fields: Vec<(String, String)>, current_date: NaiveDate) -> Self {
        // the injected date wins over any same-named column
        let fields = fields.into_iter().filter(|(k, _)| k != CURRENT_DATE).collect();
        Self {
            fields,
            current_date,
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn current_date(&self) -> NaiveDate {
        self.current_date
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.serialize_entry(CURRENT_DATE, &self.current_date)?;
        map.end()
    }
}

/// Turn a CSV snapshot into records, lazily, one per data row.
///
/// Calling this with a no-data response is a bug in the caller.
pub fn extract(response: &SnapshotResponse) -> Result<Records<'_>> {
    assert_eq!(
        response.content_kind,
        ContentKind::Csv,
        "extract called on a non-data response"
    );
    let date = response.served_date;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(response.body.as_slice());
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ExtractError::malformed(date, e))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    Ok(Records {
        headers,
        date,
        rows: reader.into_records(),
        done: false,
    })
}

/// Finite, single-pass record sequence over one day's body.
pub struct Records<'a> {
    headers: Vec<String>,
    date: NaiveDate,
    rows: csv::StringRecordsIntoIter<&'a [u8]>,
    done: bool,
}

impl Records<'_> {
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    fn to_record(&self, row: StringRecord) -> Record {
        let fields = self
            .headers
            .iter()
            .cloned()
            .zip(row.iter().map(str::to_string))
            .collect();
        Record::new(fields, self.date)
    }
}

impl Iterator for Records<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.rows.next()? {
            Ok(row) => Some(Ok(self.to_record(row))),
            Err(e) => {
                // nothing after a broken row is trustworthy
                self.done = true;
                Some(Err(ExtractError::malformed(self.date, e)))
            }
        }
    }
}

/// Decode the whole day up front; either every record or an error.
pub fn extract_all(response: &SnapshotResponse) -> Result<Vec<Record>> {
    extract(response)?.collect()
}
