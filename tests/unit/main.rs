//! Unit test modules.

mod criteria_test;
mod rank_test;
