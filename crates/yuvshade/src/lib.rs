//! GPU colour conversion for decoded video frames.
//!
//! The crate turns planar (I420) and semi-planar (NV12) YUV frames into packed
//! 8-bit RGB frames by drawing a full-screen quad through a per-format WGSL
//! program. The overall flow for one frame is:
//!
//! ```text
//!   VideoFrame ──▶ YuvTransform::transform
//!                    │ import planes ─▶ plane textures
//!                    │ ensure surface / pipeline (rebuilt on change only)
//!                    │ draw 6 vertices ─▶ wait for the GPU
//!                    ▼
//!                  readback ─▶ RgbFrame ─▶ FrameSink
//! ```
//!
//! `YuvTransform` owns every GPU resource. Unsupported or malformed frames are
//! logged and dropped; only failing to acquire a device is fatal.

mod compile;
mod error;
mod frame;
mod gpu;
mod transform;
mod types;

pub use compile::{expected_rgba8, yuv_to_rgb, ColorProgram, YUV_TO_RGB_MATRIX, YUV_TO_RGB_OFFSET};
pub use error::{FrameStage, TransformError};
pub use frame::{packed_frame_len, CpuFrame, FrameSink, Plane, RgbFrame, VideoFrame};
pub use transform::{TransformStats, YuvTransform};
pub use types::{
    AdapterProfile, FrameGeometry, GpuPowerPreference, PixelFormat, SurfaceFormat,
    TransformConfig,
};
