//! Progress reporting trait for long-running batch stages.
//!
//! Geocoding and classification both report through [`ProgressCallback`]
//! so neither needs to know whether the caller draws an `indicatif` bar,
//! logs, or stays silent.

/// Trait for reporting progress from long-running operations.
///
/// Implementations must be `Send + Sync` so a single instance can be
/// shared across concurrent lookups.
pub trait ProgressCallback: Send + Sync {
    /// Set the total expected units of work (enables percentage/ETA).
    fn set_total(&self, total: u64);

    /// Advance progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Update the message displayed alongside the progress indicator.
    fn set_message(&self, msg: String);

    /// Mark progress as complete with a final message.
    fn finish(&self, msg: String);
}
