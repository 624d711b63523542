use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use stageconfig::{PowerSetting, SurfaceFormatSetting};
use yuvshade::{FrameGeometry, PixelFormat};

#[derive(Parser, Debug)]
#[command(
    name = "yuvshade",
    author,
    version,
    about = "Convert raw I420/NV12 video into RGB frames on the GPU"
)]
pub struct Args {
    /// Raw planar video file; `-` reads from stdin.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Coded frame size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_frame_size)]
    pub size: FrameGeometry,

    /// Layout of the input file: `i420` or `nv12`.
    #[arg(
        long,
        value_name = "FORMAT",
        value_parser = parse_input_format,
        default_value = "i420"
    )]
    pub format: PixelFormat,

    /// Stop after converting this many frames.
    #[arg(long, value_name = "N")]
    pub frames: Option<u64>,

    /// Frame rate used to derive presentation timestamps.
    #[arg(long, value_name = "FPS", value_parser = parse_fps, default_value = "30")]
    pub fps: f64,

    /// Stage configuration TOML file; CLI flags override its values.
    #[arg(long, value_name = "PATH", env = "YUVSHADE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory that receives one PNG per converted frame.
    #[arg(long, value_name = "DIR", default_value = "frames")]
    pub output: PathBuf,

    /// Adapter class to request: `low` or `high`.
    #[arg(long, value_name = "POWER", value_parser = parse_gpu_power)]
    pub gpu_power: Option<PowerSetting>,

    /// Force the software fallback adapter.
    #[arg(long)]
    pub fallback_adapter: bool,

    /// Give up on a frame whose GPU work takes longer than this (e.g. `500ms`).
    #[arg(long, value_name = "DURATION", value_parser = parse_timeout)]
    pub timeout: Option<Duration>,

    /// Render target layout: `bgra8` or `rgba8`.
    #[arg(long, value_name = "FORMAT", value_parser = parse_surface_format)]
    pub surface_format: Option<SurfaceFormatSetting>,

    /// Offer frames without a declared pixel format.
    #[arg(long)]
    pub unset_format: bool,

    /// Write conversion statistics as JSON to this path.
    #[arg(long, value_name = "PATH")]
    pub stats_json: Option<PathBuf>,
}

pub fn parse() -> Args {
    Args::parse()
}

pub fn parse_frame_size(spec: &str) -> Result<FrameGeometry, String> {
    let trimmed = spec.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| "expected WxH format, e.g. 1920x1080".to_string())?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| "invalid width in size specification".to_string())?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| "invalid height in size specification".to_string())?;

    if width == 0 || height == 0 {
        return Err("frame dimensions must be greater than zero".to_string());
    }

    Ok(FrameGeometry::new(width, height))
}

pub fn parse_input_format(value: &str) -> Result<PixelFormat, String> {
    let format: PixelFormat = value.parse()?;
    match format {
        PixelFormat::I420 | PixelFormat::Nv12 => Ok(format),
        other => Err(format!(
            "raw input must be i420 or nv12; {other} is not convertible"
        )),
    }
}

pub fn parse_fps(value: &str) -> Result<f64, String> {
    let fps: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid frame rate '{value}'"))?;
    if !fps.is_finite() || fps <= 0.0 {
        return Err("frame rate must be greater than zero".to_string());
    }
    Ok(fps)
}

pub fn parse_gpu_power(value: &str) -> Result<PowerSetting, String> {
    stageconfig::parse_power(value)
}

pub fn parse_timeout(value: &str) -> Result<Duration, String> {
    let timeout = stageconfig::parse_duration(value)?;
    if timeout.is_zero() {
        return Err("timeout must be greater than zero".to_string());
    }
    Ok(timeout)
}

pub fn parse_surface_format(value: &str) -> Result<SurfaceFormatSetting, String> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "bgra8" | "bgra" => Ok(SurfaceFormatSetting::Bgra8),
        "rgba8" | "rgba" => Ok(SurfaceFormatSetting::Rgba8),
        other => Err(format!(
            "unknown surface format '{other}'; expected bgra8 or rgba8"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_frame_sizes() {
        assert_eq!(parse_frame_size("1280x720"), Ok(FrameGeometry::new(1280, 720)));
        assert_eq!(parse_frame_size(" 7 X 5 "), Ok(FrameGeometry::new(7, 5)));
        assert!(parse_frame_size("1280").is_err());
        assert!(parse_frame_size("0x720").is_err());
        assert!(parse_frame_size("wide x 2").is_err());
    }

    #[test]
    fn input_format_is_limited_to_convertible_layouts() {
        assert_eq!(parse_input_format("nv12"), Ok(PixelFormat::Nv12));
        assert_eq!(parse_input_format("yuv420p"), Ok(PixelFormat::I420));
        assert!(parse_input_format("rgba").is_err());
        assert!(parse_input_format("yuyv").is_err());
    }

    #[test]
    fn rejects_non_positive_fps_and_timeouts() {
        assert_eq!(parse_fps("29.97"), Ok(29.97));
        assert!(parse_fps("0").is_err());
        assert!(parse_fps("-1").is_err());
        assert_eq!(parse_timeout("250ms"), Ok(Duration::from_millis(250)));
        assert!(parse_timeout("0s").is_err());
    }

    #[test]
    fn parses_full_command_line() {
        let args = Args::try_parse_from([
            "yuvshade",
            "clip.yuv",
            "--size",
            "64x32",
            "--format",
            "nv12",
            "--frames",
            "3",
            "--gpu-power",
            "high",
            "--surface-format",
            "rgba8",
            "--timeout",
            "2s",
        ])
        .unwrap();
        assert_eq!(args.size, FrameGeometry::new(64, 32));
        assert_eq!(args.format, PixelFormat::Nv12);
        assert_eq!(args.frames, Some(3));
        assert_eq!(args.fps, 30.0);
        assert_eq!(args.gpu_power, Some(PowerSetting::High));
        assert_eq!(args.surface_format, Some(SurfaceFormatSetting::Rgba8));
        assert_eq!(args.timeout, Some(Duration::from_secs(2)));
        assert!(!args.fallback_adapter);
    }
}
