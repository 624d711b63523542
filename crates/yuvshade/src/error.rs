use std::fmt;
use std::time::Duration;

use crate::types::{FrameGeometry, PixelFormat};

/// Step of the per-frame sequence a failure occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStage {
    Binding,
    Drawing,
    ReadingBack,
}

impl fmt::Display for FrameStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameStage::Binding => "binding",
            FrameStage::Drawing => "drawing",
            FrameStage::ReadingBack => "reading back",
        };
        f.write_str(name)
    }
}

/// Failures raised by the transform.
///
/// Only [`TransformError::DeviceUnavailable`] is fatal; every other variant
/// drops the frame it was raised for and leaves the transform ready for the
/// next one.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("GPU device unavailable: {reason}")]
    DeviceUnavailable { reason: String },
    #[error("unsupported pixel format {format} ({geometry})")]
    UnsupportedPixelFormat {
        format: PixelFormat,
        geometry: FrameGeometry,
    },
    #[error("frame ({geometry}) reports no pixel format")]
    MissingPixelFormat { geometry: FrameGeometry },
    #[error("failed to import {format} frame ({geometry}): {reason}")]
    ImportFailed {
        format: PixelFormat,
        geometry: FrameGeometry,
        reason: String,
    },
    #[error("GPU work for frame did not complete within {timeout:?} while {stage}")]
    SubmissionTimeout { stage: FrameStage, timeout: Duration },
    #[error("GPU error while {stage}: {reason}")]
    Gpu { stage: FrameStage, reason: String },
    #[error("failed to read back rendered frame: {reason}")]
    Readback { reason: String },
}

impl TransformError {
    pub(crate) fn device(reason: impl Into<String>) -> Self {
        TransformError::DeviceUnavailable {
            reason: reason.into(),
        }
    }

    pub(crate) fn import(
        format: PixelFormat,
        geometry: FrameGeometry,
        reason: impl Into<String>,
    ) -> Self {
        TransformError::ImportFailed {
            format,
            geometry,
            reason: reason.into(),
        }
    }

    /// True for errors that end the transform rather than a single frame.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransformError::DeviceUnavailable { .. })
    }
}
