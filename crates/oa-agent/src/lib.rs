//! oc-ai session engine.
//!
//! Re-exports all modules so external crates (e.g. `oa-e2e-tests`) can
//! drive a `Session` with mock collaborators and in-memory terminals.

pub mod cache;
pub mod cli;
pub mod config;
pub mod context_refresh;
pub mod error;
pub mod execution;
pub mod gate;
pub mod generation;
pub mod history;
pub mod inference;
pub mod session;
