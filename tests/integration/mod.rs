//! Lifecycle scenarios against a real store and documentation tree.

mod concurrency;
mod lifecycle_scenarios;
mod round_trip;
mod support;
