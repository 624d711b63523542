use std::borrow::Cow;

use crate::types::PixelFormat;

/// Column-major YUV→RGB matrix (limited range, BT.601 family).
///
/// Each inner array is one column, so `rgb = Σ column[i] * yuv[i] + OFFSET`.
pub const YUV_TO_RGB_MATRIX: [[f32; 3]; 3] = [
    [1.164_383_53e0, 1.164_383_53e0, 1.164_383_53e0],
    [-2.280_290_18e-9, -2.132_485_96e-1, 2.112_401_72e0],
    [1.792_741_18e0, -5.329_092_74e-1, -5.960_494_32e-10],
];

/// Offset added after the matrix product.
pub const YUV_TO_RGB_OFFSET: [f32; 3] = [-9.694_299_70e-1, 3.000_196_22e-1, -1.129_260_30e0];

/// Shader program variants, one per supported pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorProgram {
    /// Three single-channel planes sampled independently.
    I420,
    /// Luma plane plus an interleaved two-channel chroma plane.
    Nv12,
}

impl ColorProgram {
    /// Picks the program for a corrected pixel format, if one exists.
    pub fn for_format(format: PixelFormat) -> Option<Self> {
        match format {
            PixelFormat::I420 => Some(ColorProgram::I420),
            PixelFormat::Nv12 => Some(ColorProgram::Nv12),
            _ => None,
        }
    }

    pub fn pixel_format(self) -> PixelFormat {
        match self {
            ColorProgram::I420 => PixelFormat::I420,
            ColorProgram::Nv12 => PixelFormat::Nv12,
        }
    }

    /// Number of plane textures bound after the sampler.
    pub fn texture_count(self) -> usize {
        match self {
            ColorProgram::I420 => 3,
            ColorProgram::Nv12 => 2,
        }
    }

    /// Full WGSL source of the fragment stage for this program.
    pub fn fragment_source(self) -> String {
        let (bindings, body) = match self {
            ColorProgram::I420 => (I420_BINDINGS, I420_BODY),
            ColorProgram::Nv12 => (NV12_BINDINGS, NV12_BODY),
        };
        format!(
            "{bindings}\n{conversion}\n@fragment\nfn main(@location(0) frag_uv: vec2<f32>) -> @location(0) vec4<f32> {{\n{body}    return vec4<f32>(yuv_to_rgb(yuv), 1.0);\n}}\n",
            conversion = conversion_function(),
        )
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            ColorProgram::I420 => "i420 fragment",
            ColorProgram::Nv12 => "nv12 fragment",
        }
    }
}

/// CPU reference of the shader's conversion on normalised samples.
pub fn yuv_to_rgb(yuv: [f32; 3]) -> [f32; 3] {
    let mut rgb = YUV_TO_RGB_OFFSET;
    for (column, sample) in YUV_TO_RGB_MATRIX.iter().zip(yuv) {
        for (channel, coefficient) in rgb.iter_mut().zip(column) {
            *channel += coefficient * sample;
        }
    }
    rgb
}

/// Expected 8-bit RGBA output for a constant 8-bit YUV sample.
pub fn expected_rgba8(yuv: [u8; 3]) -> [u8; 4] {
    let rgb = yuv_to_rgb(yuv.map(|value| value as f32 / 255.0));
    let quantise = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u8;
    [quantise(rgb[0]), quantise(rgb[1]), quantise(rgb[2]), 255]
}

/// Compiles the position/UV passthrough vertex stage shared by every program.
pub(crate) fn compile_vertex_shader(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("quad passthrough vertex"),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(VERTEX_SHADER_WGSL)),
    })
}

/// Compiles the fragment stage for `program`.
pub(crate) fn compile_fragment_shader(
    device: &wgpu::Device,
    program: ColorProgram,
) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(program.label()),
        source: wgpu::ShaderSource::Wgsl(Cow::Owned(program.fragment_source())),
    })
}

/// Emits the coefficients as f32-suffixed literals so the shader parses the
/// exact values held by [`YUV_TO_RGB_MATRIX`] and [`YUV_TO_RGB_OFFSET`].
fn conversion_function() -> String {
    let vec3 = |v: &[f32; 3]| {
        format!(
            "vec3<f32>({}, {}, {})",
            wgsl_f32(v[0]),
            wgsl_f32(v[1]),
            wgsl_f32(v[2])
        )
    };
    let [c0, c1, c2] = &YUV_TO_RGB_MATRIX;
    format!(
        "fn yuv_to_rgb(yuv: vec3<f32>) -> vec3<f32> {{\n    let m = mat3x3<f32>(\n        {},\n        {},\n        {});\n    return m * yuv + {};\n}}\n",
        vec3(c0),
        vec3(c1),
        vec3(c2),
        vec3(&YUV_TO_RGB_OFFSET),
    )
}

fn wgsl_f32(value: f32) -> String {
    format!("{value:e}f")
}

/// Vertex stage: clip-space position straight from the quad, UV forwarded.
const VERTEX_SHADER_WGSL: &str = r"struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) frag_uv: vec2<f32>,
};

@vertex
fn main(@location(0) position: vec3<f32>, @location(1) uv: vec2<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.position = vec4<f32>(position, 1.0);
    out.frag_uv = uv;
    return out;
}
";

const I420_BINDINGS: &str = r"@group(0) @binding(0) var plane_sampler: sampler;
@group(0) @binding(1) var texture_y: texture_2d<f32>;
@group(0) @binding(2) var texture_u: texture_2d<f32>;
@group(0) @binding(3) var texture_v: texture_2d<f32>;
";

const I420_BODY: &str = r"    let yuv = vec3<f32>(
        textureSample(texture_y, plane_sampler, frag_uv).r,
        textureSample(texture_u, plane_sampler, frag_uv).r,
        textureSample(texture_v, plane_sampler, frag_uv).r,
    );
";

const NV12_BINDINGS: &str = r"@group(0) @binding(0) var plane_sampler: sampler;
@group(0) @binding(1) var texture_y: texture_2d<f32>;
@group(0) @binding(2) var texture_uv: texture_2d<f32>;
";

const NV12_BODY: &str = r"    let uv = textureSample(texture_uv, plane_sampler, frag_uv).rg;
    let yuv = vec3<f32>(textureSample(texture_y, plane_sampler, frag_uv).r, uv.x, uv.y);
";

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::naga;

    fn validate(source: &str) -> naga::Module {
        let module = naga::front::wgsl::parse_str(source)
            .unwrap_or_else(|err| panic!("{}\n{source}", err.emit_to_string(source)));
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::empty(),
        )
        .validate(&module)
        .expect("shader validates");
        module
    }

    #[test]
    fn vertex_shader_validates() {
        let module = validate(VERTEX_SHADER_WGSL);
        assert_eq!(module.entry_points.len(), 1);
        assert_eq!(module.entry_points[0].name, "main");
    }

    #[test]
    fn fragment_programs_validate() {
        for program in [ColorProgram::I420, ColorProgram::Nv12] {
            let module = validate(&program.fragment_source());
            assert_eq!(module.entry_points[0].stage, naga::ShaderStage::Fragment);
            assert_eq!(module.global_variables.len(), program.texture_count() + 1);
        }
    }

    #[test]
    fn nv12_splits_chroma_channels() {
        let source = ColorProgram::Nv12.fragment_source();
        assert!(source.contains("texture_uv, plane_sampler, frag_uv).rg"));
        assert!(!source.contains("texture_v"));
    }

    #[test]
    fn literals_round_trip_exactly() {
        let coefficients = YUV_TO_RGB_MATRIX.iter().flatten().chain(&YUV_TO_RGB_OFFSET);
        for &value in coefficients {
            let literal = wgsl_f32(value);
            let parsed: f32 = literal.trim_end_matches('f').parse().unwrap();
            assert_eq!(parsed.to_bits(), value.to_bits(), "{literal}");
        }
    }

    #[test]
    fn only_i420_and_nv12_have_programs() {
        assert_eq!(ColorProgram::for_format(PixelFormat::I420), Some(ColorProgram::I420));
        assert_eq!(ColorProgram::for_format(PixelFormat::Nv12), Some(ColorProgram::Nv12));
        assert_eq!(ColorProgram::for_format(PixelFormat::Rgba), None);
        assert_eq!(ColorProgram::for_format(PixelFormat::I444), None);
    }

    #[test]
    fn reference_maps_limited_range_extremes() {
        let black = expected_rgba8([16, 128, 128]);
        assert!(black[..3].iter().all(|&channel| channel <= 1), "{black:?}");
        assert_eq!(expected_rgba8([235, 128, 128]), [255, 255, 255, 255]);
        let grey = expected_rgba8([126, 128, 128]);
        assert!(grey[0].abs_diff(grey[1]) <= 1 && grey[1].abs_diff(grey[2]) <= 1);
    }
}
