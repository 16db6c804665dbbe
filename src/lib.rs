//! Offline-first cache of finished print-press jobs with incremental sync
//! against a remote record collection, plus a terminal viewer on top of it.

pub mod app;
pub mod cache;
pub mod commands;
pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod remote;
pub mod scheduler;
pub mod ui;
pub mod viewer;
