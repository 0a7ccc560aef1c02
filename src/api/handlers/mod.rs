//! API request handlers.

/// Research runs: blocking, streamed, cancellation and the run archive.
pub mod research;
/// Health and welcome handlers.
pub mod system;
