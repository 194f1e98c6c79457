//! Integration test suite.
//!
//! Cross-module scenarios: full update cycles against a scripted transport,
//! the promotion pipeline over filesystem stores, and CLI smoke tests.

mod cli;
mod promotion;
mod update_cycle;
