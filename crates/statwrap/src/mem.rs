//! Best-effort memory sampling around delegated calls.
//!
//! The engine samples before and after delegation and attaches the
//! resident-page delta to the active span. Measurement availability must
//! never affect the wrapped call: samplers return `None` when the host
//! cannot provide counters.

use std::fs;

/// One memory snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySample {
    /// Resident set size in pages.
    pub resident_pages: u64,
}

/// Source of opaque before/after memory counters.
pub trait MemorySampler: Send + Sync {
    /// Take a snapshot, or `None` when unavailable.
    fn sample(&self) -> Option<MemorySample>;
}

/// Sampler that never produces a snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSampler;

impl MemorySampler for NoopSampler {
    fn sample(&self) -> Option<MemorySample> {
        None
    }
}

/// Resident-page sampler backed by `/proc/self/statm`.
///
/// Only Linux exposes the file; on other platforms every sample is `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcStatmSampler;

impl MemorySampler for ProcStatmSampler {
    fn sample(&self) -> Option<MemorySample> {
        let statm = fs::read_to_string("/proc/self/statm").ok()?;
        let resident_pages = statm.split_whitespace().nth(1)?.parse().ok()?;
        Some(MemorySample { resident_pages })
    }
}
