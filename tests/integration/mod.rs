//! Integration tests for the job accounting dispatch layer

mod concurrency;
mod config_integration;
mod log_backend;
mod resolution;
mod test_utils;
