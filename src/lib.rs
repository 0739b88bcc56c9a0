//! Taiwan equity screening and back-test engine.
//!
//! Two cores carry the engineering weight: ingestion (adapters → cache →
//! fetchers → storage) and analytics (scoring → portfolio → back-test).
//! See `DESIGN.md` for how each module is grounded.

pub mod adapters;
pub mod backtest;
pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod costmodel;
pub mod error;
pub mod executor;
pub mod fetchers;
pub mod indicators;
pub mod logging;
pub mod models;
pub mod portfolio;
pub mod scoring;
pub mod storage;
pub mod universe;
