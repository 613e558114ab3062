// src/fetch/mod.rs

pub mod snapshot;
pub mod urls;

pub use snapshot::{ContentKind, SnapshotFetcher, SnapshotResponse};
pub use urls::{build_url, UrlTemplate};
