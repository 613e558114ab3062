// src/history/mod.rs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{ExtractError, Result};
use crate::process::extract::CURRENT_DATE;

/// Per-feed bookmark: the last day whose records were fully emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmarks {
    #[serde(default)]
    pub bookmarks: BTreeMap<String, BTreeMap<String, NaiveDate>>,
}

impl Bookmarks {
    /// Missing file → empty bookmarks.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "no bookmark file yet");
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .map_err(|e| ExtractError::State(format!("reading {}: {e}", path.display())))?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&text)
            .map_err(|e| ExtractError::State(format!("parsing {}: {e}", path.display())))
    }

    /// Replace the file in one rename so a crash never leaves half a state.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let dir: PathBuf = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, self)
            .map_err(|e| ExtractError::State(format!("encoding bookmarks: {e}")))?;
        tmp.write_all(b"\n")?;
        tmp.persist(path).map_err(|e| ExtractError::Emit(e.error))?;
        Ok(())
    }

    pub fn get(&self, feed: &str) -> Option<NaiveDate> {
        self.bookmarks
            .get(feed)
            .and_then(|b| b.get(CURRENT_DATE))
            .copied()
    }

    /// Only ever moves forward.
    pub fn set(&mut self, feed: &str, date: NaiveDate) {
        let entry = self
            .bookmarks
            .entry(feed.to_string())
            .or_default()
            .entry(CURRENT_DATE.to_string())
            .or_insert(date);
        if date > *entry {
            *entry = date;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn missing_file_is_empty() {
        let tmp = tempdir().unwrap();
        let b = Bookmarks::load(tmp.path().join("state.json")).unwrap();
        assert_eq!(b, Bookmarks::default());
        assert_eq!(b.get("demand"), None);
    }

    #[test]
    fn persistence_across_restarts() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("state.json");
        {
            let mut b = Bookmarks::default();
            b.set("demand", day(2024, 5, 3));
            b.save(&path).unwrap();
        }
        let b = Bookmarks::load(&path).unwrap();
        assert_eq!(b.get("demand"), Some(day(2024, 5, 3)));

        let raw = fs::read_to_string(&path).unwrap();
        let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["bookmarks"]["demand"]["current_date"], "2024-05-03");
    }

    #[test]
    fn set_never_moves_backwards() {
        let mut b = Bookmarks::default();
        b.set("demand", day(2024, 5, 3));
        b.set("demand", day(2024, 5, 1));
        assert_eq!(b.get("demand"), Some(day(2024, 5, 3)));
        b.set("demand", day(2024, 5, 4));
        assert_eq!(b.get("demand"), Some(day(2024, 5, 4)));
    }

    #[test]
    fn garbage_is_a_state_error() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("state.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(Bookmarks::load(&path), Err(ExtractError::State(_))));
    }
}
