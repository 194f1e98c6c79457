//! Core error types shared across the update and promotion pipelines.

pub mod error;

pub use error::UpdateError;
