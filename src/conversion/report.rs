//! Report types for units skipped during an export or import.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::ir::AnnotationType;

/// Why a unit (an annotation, a label line, an image) was left out.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum SkipReason {
    /// The annotation carries no geometry.
    EmptyPoints,
    /// Box width or height is zero once coordinates are truncated.
    DegenerateBox,
    /// The target format has no representation for this shape.
    UnsupportedType { kind: AnnotationType },
    /// No category or class matches the annotation value.
    UnknownCategory { value: String },
    /// The caller's class list does not contain the annotation value.
    ExcludedClass { value: String },
    /// The task's width or height is zero.
    ZeroSizedImage,
    /// The annotation color is missing or not `#RRGGBB`.
    InvalidColor { color: Option<String> },
    /// A palette index would exceed 255.
    PaletteExhausted,
    /// A source record could not be understood.
    MalformedInput { detail: String },
    /// No image matches a label file or a task.
    MissingImage { path: String },
    /// Reading or writing a per-unit file failed.
    Io { detail: String },
}

impl SkipReason {
    pub fn code(&self) -> &'static str {
        match self {
            SkipReason::EmptyPoints => "empty_points",
            SkipReason::DegenerateBox => "degenerate_box",
            SkipReason::UnsupportedType { .. } => "unsupported_type",
            SkipReason::UnknownCategory { .. } => "unknown_category",
            SkipReason::ExcludedClass { .. } => "excluded_class",
            SkipReason::ZeroSizedImage => "zero_sized_image",
            SkipReason::InvalidColor { .. } => "invalid_color",
            SkipReason::PaletteExhausted => "palette_exhausted",
            SkipReason::MalformedInput { .. } => "malformed_input",
            SkipReason::MissingImage { .. } => "missing_image",
            SkipReason::Io { .. } => "io",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::EmptyPoints => write!(f, "annotation has no points"),
            SkipReason::DegenerateBox => write!(f, "box has zero width or height in pixels"),
            SkipReason::UnsupportedType { kind } => {
                write!(f, "annotation type '{kind}' is not supported by this format")
            }
            SkipReason::UnknownCategory { value } => write!(f, "no category for '{value}'"),
            SkipReason::ExcludedClass { value } => {
                write!(f, "'{value}' is not in the requested classes")
            }
            SkipReason::ZeroSizedImage => write!(f, "image width or height is zero"),
            SkipReason::InvalidColor { color: Some(c) } => write!(f, "invalid color '{c}'"),
            SkipReason::InvalidColor { color: None } => write!(f, "annotation has no color"),
            SkipReason::PaletteExhausted => write!(f, "more than 255 palette indices needed"),
            SkipReason::MalformedInput { detail } => write!(f, "malformed input: {detail}"),
            SkipReason::MissingImage { path } => write!(f, "no image found for {path}"),
            SkipReason::Io { detail } => write!(f, "I/O failure: {detail}"),
        }
    }
}

/// A single skipped unit.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SkippedUnit {
    /// Task name, label file or image path the unit belongs to.
    pub source: String,
    /// Position of the annotation within its task, when the unit is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    pub reason: SkipReason,
}

/// Outcome of one conversion call.
///
/// Fatal problems abort the call with an error; everything recorded here
/// was dropped while the rest of the output was still produced.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ConversionReport {
    /// Format name, e.g. `coco` or `yolo`.
    pub format: String,
    /// Units that made it into the output.
    pub written: usize,
    pub skipped: Vec<SkippedUnit>,
}

impl ConversionReport {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            ..Default::default()
        }
    }

    pub fn record_written(&mut self) {
        self.written += 1;
    }

    /// Records a skipped annotation and logs it at debug level.
    pub fn skip_annotation(&mut self, task: &str, index: usize, reason: SkipReason) {
        log::debug!(
            "{}: skipping annotation {} of {}: {}",
            self.format,
            index,
            task,
            reason
        );
        self.skipped.push(SkippedUnit {
            source: task.to_string(),
            index: Some(index),
            reason,
        });
    }

    /// Records a skipped file-level unit and logs it at debug level.
    pub fn skip(&mut self, source: impl Into<String>, reason: SkipReason) {
        let source = source.into();
        log::debug!("{}: skipping {}: {}", self.format, source, reason);
        self.skipped.push(SkippedUnit {
            source,
            index: None,
            reason,
        });
    }

    /// Folds the per-annotation results of one task into the report,
    /// returning the converted values in order.
    pub fn gather<T>(&mut self, task: &str, results: Vec<Result<T, SkipReason>>) -> Vec<T> {
        let mut kept = Vec::with_capacity(results.len());
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(value) => {
                    self.written += 1;
                    kept.push(value);
                }
                Err(reason) => self.skip_annotation(task, index, reason),
            }
        }
        kept
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Skip counts keyed by reason code.
    pub fn skip_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for unit in &self.skipped {
            *counts.entry(unit.reason.code()).or_insert(0) += 1;
        }
        counts
    }

    /// True if anything was left out.
    pub fn is_lossy(&self) -> bool {
        !self.skipped.is_empty()
    }
}

impl fmt::Display for ConversionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {} written", self.format, self.written)?;
        if self.skipped.is_empty() {
            return Ok(());
        }
        writeln!(f, "Skipped ({}):", self.skipped.len())?;
        for (code, count) in self.skip_counts() {
            writeln!(f, "  - {code}: {count}")?;
        }
        Ok(())
    }
}
