//! Micro-journal Backend Library
//!
//! Session and token lifecycle for the journal API, plus the thin write
//! paths and notification fan-out that sit behind it.

pub mod app;
pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod journal;
pub mod middleware;
pub mod notify;
