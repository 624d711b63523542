use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

/// Pixel layouts a video frame may declare.
///
/// The set mirrors what capture and decode paths commonly report. Only
/// [`PixelFormat::I420`] and [`PixelFormat::Nv12`] can be converted; every
/// other variant is rejected per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PixelFormat {
    /// Three single-channel planes: Y, U, V (4:2:0).
    I420,
    /// I420 plus a full-resolution alpha plane.
    I420A,
    /// Three single-channel planes with 4:2:2 chroma.
    I422,
    /// Three single-channel planes with full-resolution chroma.
    I444,
    /// One luma plane and one interleaved UV plane (4:2:0).
    Nv12,
    Rgba,
    Rgbx,
    Bgra,
    Bgrx,
}

impl PixelFormat {
    /// Number of planes a frame of this format carries.
    pub fn plane_count(self) -> usize {
        match self {
            PixelFormat::Nv12 => 2,
            PixelFormat::I420 | PixelFormat::I422 | PixelFormat::I444 => 3,
            PixelFormat::I420A => 4,
            PixelFormat::Rgba | PixelFormat::Rgbx | PixelFormat::Bgra | PixelFormat::Bgrx => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PixelFormat::I420 => "I420",
            PixelFormat::I420A => "I420A",
            PixelFormat::I422 => "I422",
            PixelFormat::I444 => "I444",
            PixelFormat::Nv12 => "NV12",
            PixelFormat::Rgba => "RGBA",
            PixelFormat::Rgbx => "RGBX",
            PixelFormat::Bgra => "BGRA",
            PixelFormat::Bgrx => "BGRX",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PixelFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "I420" | "YUV420P" => Ok(PixelFormat::I420),
            "I420A" => Ok(PixelFormat::I420A),
            "I422" | "YUV422P" => Ok(PixelFormat::I422),
            "I444" | "YUV444P" => Ok(PixelFormat::I444),
            "NV12" => Ok(PixelFormat::Nv12),
            "RGBA" => Ok(PixelFormat::Rgba),
            "RGBX" => Ok(PixelFormat::Rgbx),
            "BGRA" => Ok(PixelFormat::Bgra),
            "BGRX" => Ok(PixelFormat::Bgrx),
            other => Err(format!("unknown pixel format '{other}'")),
        }
    }
}

/// Coded dimensions of a frame, used as the cache key for the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
}

impl FrameGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Dimensions of a 4:2:0 chroma plane for this geometry.
    pub fn chroma(self) -> Self {
        Self {
            width: self.width.div_ceil(2),
            height: self.height.div_ceil(2),
        }
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for FrameGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Color format of the off-screen render target, and therefore of emitted frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum SurfaceFormat {
    /// 8-bit BGRA, the layout browsers and most compositors present.
    #[default]
    Bgra8,
    /// 8-bit RGBA.
    Rgba8,
}

impl SurfaceFormat {
    pub(crate) fn to_wgpu(self) -> wgpu::TextureFormat {
        match self {
            SurfaceFormat::Bgra8 => wgpu::TextureFormat::Bgra8Unorm,
            SurfaceFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        }
    }

    pub fn bytes_per_pixel(self) -> u32 {
        4
    }
}

impl fmt::Display for SurfaceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceFormat::Bgra8 => f.write_str("bgra8"),
            SurfaceFormat::Rgba8 => f.write_str("rgba8"),
        }
    }
}

/// GPU power profile requested from the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    /// Prefer integrated / low-power adapters.
    #[default]
    Low,
    /// Prefer discrete / high-performance adapters.
    High,
}

/// Summary of the adapter that backs a transform, kept for logging and stats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdapterProfile {
    pub name: String,
    pub backend: String,
    pub device_type: String,
    pub max_texture_dimension: u32,
}

impl AdapterProfile {
    pub(crate) fn from_wgpu(info: &wgpu::AdapterInfo, limits: &wgpu::Limits) -> Self {
        Self {
            name: info.name.clone(),
            backend: format!("{:?}", info.backend),
            device_type: format!("{:?}", info.device_type),
            max_texture_dimension: limits.max_texture_dimension_2d,
        }
    }

    /// True when the adapter is a CPU rasterizer (lavapipe, llvmpipe, WARP).
    pub fn is_software(&self) -> bool {
        self.device_type == "Cpu"
    }
}

/// Immutable configuration passed to the transform at construction.
///
/// `TransformConfig` mirrors the CLI flags and the `[gpu]`/`[frames]` tables
/// of a stage configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformConfig {
    /// Adapter power preference used during initialisation.
    pub power_preference: GpuPowerPreference,
    /// Request a software adapter instead of a hardware GPU.
    pub force_fallback_adapter: bool,
    /// Render target format; also the byte layout of emitted frames.
    pub surface_format: SurfaceFormat,
    /// Upper bound on the wait for a frame's GPU work. `None` waits forever.
    pub submission_timeout: Option<Duration>,
    /// Treat frames that report no pixel format as NV12.
    pub assume_nv12_when_unset: bool,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            power_preference: GpuPowerPreference::default(),
            force_fallback_adapter: false,
            surface_format: SurfaceFormat::default(),
            submission_timeout: None,
            assume_nv12_when_unset: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pixel_format_aliases() {
        assert_eq!("nv12".parse::<PixelFormat>(), Ok(PixelFormat::Nv12));
        assert_eq!(" I420 ".parse::<PixelFormat>(), Ok(PixelFormat::I420));
        assert_eq!("yuv420p".parse::<PixelFormat>(), Ok(PixelFormat::I420));
        assert!("p010".parse::<PixelFormat>().is_err());
    }

    #[test]
    fn chroma_geometry_rounds_up_odd_dimensions() {
        let geometry = FrameGeometry::new(641, 481);
        assert_eq!(geometry.chroma(), FrameGeometry::new(321, 241));
        assert_eq!(FrameGeometry::new(640, 480).chroma(), FrameGeometry::new(320, 240));
    }

    #[test]
    fn plane_counts_match_layouts() {
        assert_eq!(PixelFormat::I420.plane_count(), 3);
        assert_eq!(PixelFormat::Nv12.plane_count(), 2);
        assert_eq!(PixelFormat::Bgra.plane_count(), 1);
    }
}
