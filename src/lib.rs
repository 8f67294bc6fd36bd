// src/lib.rs

//! Trends Monitor Library
//!
//! Rate-limited acquisition of Google Trends related queries for scheduled
//! region groups, with retries, run-scoped deduplication, backups and a
//! clean/degraded/failed run summary.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
