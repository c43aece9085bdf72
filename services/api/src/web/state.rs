//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use daily_drill_core::ports::{RecordStore, ScoringService};
use daily_drill_core::time::Clock;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
///
/// Requests hold no other shared mutable state; every cross-request
/// invariant (daily-set uniqueness, the answer quota) is delegated to
/// atomic operations on the record store.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub scorer: Arc<dyn ScoringService>,
    pub config: Arc<Config>,
    pub clock: Clock,
}
