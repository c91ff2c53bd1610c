//! gator: a command-line RSS aggregator.
//!
//! Users register, add and follow RSS feeds, and `agg` polls those feeds on
//! an interval, storing new posts in SQLite for `browse`.

pub mod commands;
pub mod config;
pub mod feed;
pub mod storage;
pub mod util;
