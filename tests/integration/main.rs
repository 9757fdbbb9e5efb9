//! Integration test modules.

mod common;
mod concurrency_test;
mod config_test;
mod property_test;
mod scenario_test;
