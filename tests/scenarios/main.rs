//! Scenario-based tests for matrix-ci

mod helpers;

mod cross_cell_independence;
mod fail_fast;
mod history;
mod matrix_success;
mod trigger_filtering;
