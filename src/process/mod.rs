// src/process/mod.rs

pub mod extract;

pub use extract::{extract, extract_all, Record, Records, CURRENT_DATE};
