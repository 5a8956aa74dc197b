//! Execution engine for cfgsync
//!
//! The engine orchestrates:
//! 1. Planning - Compare declared objects with managed state
//! 2. Display - Show transitions and attribute operations
//! 3. Executing - Reconcile objects in parallel against the remote store

pub mod differ;
pub mod executor;
pub mod planner;

pub use executor::{ExecuteOptions, ExecuteSummary, execute};
pub use planner::build_plan;
