//! Property-based tests for record aggregation and serialization

mod aggregation;
mod serialization;
