//! Property-based tests for the commit-graph crate.
//!
//! Run with: `cargo test --test property`

mod filter_props;
mod roundtrip_props;
