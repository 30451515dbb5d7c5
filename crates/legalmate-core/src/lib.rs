//! Core review pipeline for LegalMate: persistence, lifecycle engine,
//! progress estimation, and outcome simulation. The HTTP surface lives
//! in `legalmate-server`.

pub mod config;
pub mod db;
pub mod engine;
pub mod outcome;
pub mod progress;
pub mod types;

pub use types::*;
