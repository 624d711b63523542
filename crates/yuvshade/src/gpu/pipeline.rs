use crate::compile::{compile_fragment_shader, ColorProgram};
use crate::types::SurfaceFormat;

use super::geometry::{GeometryResources, QuadVertex};
use super::import::ImportedPlanes;

/// Everything a built pipeline depends on; a mismatch forces a rebuild.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct PipelineKey {
    pub program: ColorProgram,
    pub surface_format: SurfaceFormat,
}

pub(crate) struct ColorPipeline {
    pub key: PipelineKey,
    pub pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl ColorPipeline {
    /// Compiles the program's fragment stage and builds the render pipeline.
    ///
    /// Validation errors are captured in an error scope and returned instead
    /// of reaching the device's uncaptured-error handler.
    pub fn new(
        device: &wgpu::Device,
        vertex_module: &wgpu::ShaderModule,
        key: PipelineKey,
    ) -> Result<Self, String> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let fragment_module = compile_fragment_shader(device, key.program);
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("plane layout"),
            entries: &build_plane_layout_entries(key.program),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("color pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("color pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: vertex_module,
                entry_point: Some("main"),
                buffers: &[QuadVertex::layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: key.surface_format.to_wgpu(),
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(error.to_string());
        }

        Ok(Self {
            key,
            pipeline,
            bind_group_layout,
        })
    }

    /// Binds the sampler at 0 and the frame's planes at 1..N.
    pub fn bind_group(
        &self,
        device: &wgpu::Device,
        geometry: &GeometryResources,
        planes: &ImportedPlanes,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("plane bind group"),
            layout: &self.bind_group_layout,
            entries: &build_plane_entries(&geometry.sampler, &planes.views),
        })
    }
}

pub(crate) fn build_plane_entries<'a>(
    sampler: &'a wgpu::Sampler,
    views: &'a [wgpu::TextureView],
) -> Vec<wgpu::BindGroupEntry<'a>> {
    let mut entries = Vec::with_capacity(views.len() + 1);
    entries.push(wgpu::BindGroupEntry {
        binding: 0,
        resource: wgpu::BindingResource::Sampler(sampler),
    });
    for (index, view) in views.iter().enumerate() {
        entries.push(wgpu::BindGroupEntry {
            binding: index as u32 + 1,
            resource: wgpu::BindingResource::TextureView(view),
        });
    }
    entries
}

pub(crate) fn build_plane_layout_entries(program: ColorProgram) -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = Vec::with_capacity(program.texture_count() + 1);
    entries.push(wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    });
    for index in 0..program.texture_count() {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: index as u32 + 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_puts_sampler_first_then_planes() {
        let entries = build_plane_layout_entries(ColorProgram::I420);
        let bindings: Vec<u32> = entries.iter().map(|entry| entry.binding).collect();
        assert_eq!(bindings, vec![0, 1, 2, 3]);
        assert!(matches!(
            entries[0].ty,
            wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
        ));
        assert!(entries[1..]
            .iter()
            .all(|entry| matches!(entry.ty, wgpu::BindingType::Texture { .. })));
    }

    #[test]
    fn nv12_layout_has_two_planes() {
        assert_eq!(build_plane_layout_entries(ColorProgram::Nv12).len(), 3);
    }

    #[test]
    fn keys_differ_by_surface_format() {
        let bgra = PipelineKey {
            program: ColorProgram::Nv12,
            surface_format: SurfaceFormat::Bgra8,
        };
        let rgba = PipelineKey {
            surface_format: SurfaceFormat::Rgba8,
            ..bgra
        };
        assert_ne!(bgra, rgba);
    }
}
