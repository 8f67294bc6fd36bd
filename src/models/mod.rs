// src/models/mod.rs

//! Domain models for the trends monitor.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod outcome;
mod record;

// Re-export all public types
pub use config::{
    Config, DedupConfig, EngineConfig, GroupConfig, HttpConfig, MINUTES_PER_DAY, MinuteWindow,
    RegionConfig, RunConfig, TermsConfig, TimeframeConfig, WindowConfig,
};
pub use outcome::{Disposition, ErrorClass, RunSummary, RunTally};
pub use record::{DataMode, DataType, RawItem, TrendRecord, WORLDWIDE, WorkItem, explore_link};
