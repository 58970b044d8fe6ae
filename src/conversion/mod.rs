//! Skip-and-continue bookkeeping shared by importers and exporters.
//!
//! Per-unit conversion returns `Result<T, SkipReason>`; callers fold those
//! results into a [`ConversionReport`] that travels back with the output.

pub mod report;

pub use report::{ConversionReport, SkipReason, SkippedUnit};
