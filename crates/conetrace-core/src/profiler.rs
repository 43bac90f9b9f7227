//! Profiler collaborator interface.

/// Start/stop timer sink. Purely observational.
pub trait Profiler {
    /// Opens a labelled section.
    fn start_profile(&mut self, label: &str);

    /// Closes the most recently opened section.
    fn end_profile(&mut self);
}

/// A profiler that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProfiler;

impl Profiler for NullProfiler {
    fn start_profile(&mut self, _label: &str) {}

    fn end_profile(&mut self) {}
}
