//! Timing acceptance tests for the precise timer.

mod common;
mod drift_test;
mod lifecycle_test;
mod overrun_test;
