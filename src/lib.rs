// src/lib.rs

pub mod config;
pub mod cursor;
pub mod error;
pub mod feeds;
pub mod fetch;
pub mod history;
pub mod process;
pub mod run;
pub mod sink;

pub use error::{ExtractError, Result};
