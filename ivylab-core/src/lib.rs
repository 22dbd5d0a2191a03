//! IvyLab Core — price series, moving averages, planning, workbook model, dashboard.
//!
//! This crate holds everything needed to turn price history into a signal
//! workbook, with no file or network output of its own:
//! - Domain types (observations, series, moving-average specs)
//! - Data clients (Yahoo Finance, CSV directory) and ingest
//! - Moving-average engine (daily and month-anchored SMA)
//! - Up-front planning of date ranges, dashboard regions and data columns
//! - Cell-addressable workbook model
//! - Dashboard and data-sheet rendering

pub mod dashboard;
pub mod data;
pub mod domain;
pub mod indicators;
pub mod planning;
pub mod workbook;
