//! Test utilities for microservice handler testing.
//!
//! Handlers are exercised against an in-memory SQLite copy of the plaques
//! table seeded by [`plaques_lib::fixtures`].

pub use plaques_lib::fixtures::fixture_ids;
use plaques_lib::fixtures::fixture_repository;
use plaques_lib::{PlaqueRepository, TableName};

use crate::state::AppState;

/// Fresh state over a newly seeded in-memory table.
///
/// Each call opens its own connection, so tests never share rows.
pub fn test_state() -> AppState {
    AppState::from_repository(fixture_repository())
}

/// State whose table does not exist, so every query fails in the store.
pub fn broken_store_state() -> AppState {
    let fixture = fixture_repository();
    let table = TableName::new("gone").expect("valid table name");
    AppState::from_repository(PlaqueRepository::new(fixture.store().clone(), table))
}

/// Generate a unique request ID for testing.
pub fn test_request_id() -> String {
    format!("test-{}", uuid::Uuid::now_v7())
}
