use stageconfig::{PowerSetting, StageConfig, SurfaceFormatSetting};
use yuvshade::{GpuPowerPreference, SurfaceFormat, TransformConfig};

use crate::cli::Args;

/// Resolves the transform settings; flags win over the file, the file over defaults.
pub fn transform_config(file: &StageConfig, args: &Args) -> TransformConfig {
    let defaults = TransformConfig::default();
    TransformConfig {
        power_preference: args
            .gpu_power
            .or(file.gpu.power)
            .map(map_power)
            .unwrap_or(defaults.power_preference),
        force_fallback_adapter: args.fallback_adapter || file.gpu.fallback_adapter,
        surface_format: args
            .surface_format
            .or(file.gpu.surface_format)
            .map(map_surface_format)
            .unwrap_or(defaults.surface_format),
        submission_timeout: args.timeout.or(file.gpu.submission_timeout),
        assume_nv12_when_unset: file.frames.assume_nv12_when_unset,
    }
}

pub fn map_power(power: PowerSetting) -> GpuPowerPreference {
    match power {
        PowerSetting::Low => GpuPowerPreference::Low,
        PowerSetting::High => GpuPowerPreference::High,
    }
}

pub fn map_surface_format(format: SurfaceFormatSetting) -> SurfaceFormat {
    match format {
        SurfaceFormatSetting::Bgra8 => SurfaceFormat::Bgra8,
        SurfaceFormatSetting::Rgba8 => SurfaceFormat::Rgba8,
    }
}
