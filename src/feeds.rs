// src/feeds.rs

use serde_json::{json, Map, Value};

use crate::process::extract::CURRENT_DATE;

/// A daily CSV published next to the others under the dated base path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedDescriptor {
    pub name: &'static str,
    pub url_suffix: &'static str,
    pub field_names: &'static [&'static str],
    pub primary_keys: &'static [&'static str],
}

pub const DEMAND: FeedDescriptor = FeedDescriptor {
    name: "demand",
    url_suffix: "demand.csv",
    field_names: &[
        "Time",
        "Day ahead forecast",
        "Hour ahead forecast",
        "Current demand",
        "Demand response",
    ],
    primary_keys: &[CURRENT_DATE, "Time"],
};

static FEEDS: &[FeedDescriptor] = &[DEMAND];

pub fn all() -> &'static [FeedDescriptor] {
    FEEDS
}

pub fn find(name: &str) -> Option<&'static FeedDescriptor> {
    FEEDS.iter().find(|f| f.name.eq_ignore_ascii_case(name))
}

impl FeedDescriptor {
    /// JSON Schema for one record: every CSV column as nullable text, plus the
    /// injected `current_date`.
    pub fn schema(&self) -> Value {
        let mut props = Map::new();
        for &field in self.field_names {
            let mut prop = json!({ "type": ["string", "null"] });
            if field == "Time" {
                prop["format"] = json!("time");
            }
            props.insert(field.to_string(), prop);
        }
        props.insert(
            CURRENT_DATE.to_string(),
            json!({ "type": "string", "format": "date" }),
        );
        json!({
            "type": "object",
            "properties": props,
        })
    }

    /// Catalog entry used by `--discover`.
    pub fn catalog_entry(&self) -> Value {
        json!({
            "tap_stream_id": self.name,
            "stream": self.name,
            "key_properties": self.primary_keys,
            "replication_key": CURRENT_DATE,
            "replication_method": "INCREMENTAL",
            "schema": self.schema(),
        })
    }
}

pub fn catalog() -> Value {
    json!({ "streams": FEEDS.iter().map(FeedDescriptor::catalog_entry).collect::<Vec<_>>() })
}
