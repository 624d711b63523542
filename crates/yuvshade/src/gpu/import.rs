use crate::compile::ColorProgram;
use crate::frame::Plane;
use crate::types::FrameGeometry;

/// Texture format and size of one plane for a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PlaneLayout {
    format: wgpu::TextureFormat,
    bytes_per_texel: u32,
    subsampled: bool,
}

const LUMA: PlaneLayout = PlaneLayout {
    format: wgpu::TextureFormat::R8Unorm,
    bytes_per_texel: 1,
    subsampled: false,
};

const CHROMA: PlaneLayout = PlaneLayout {
    format: wgpu::TextureFormat::R8Unorm,
    bytes_per_texel: 1,
    subsampled: true,
};

const CHROMA_INTERLEAVED: PlaneLayout = PlaneLayout {
    format: wgpu::TextureFormat::Rg8Unorm,
    bytes_per_texel: 2,
    subsampled: true,
};

fn plane_layouts(program: ColorProgram) -> &'static [PlaneLayout] {
    match program {
        ColorProgram::I420 => &[LUMA, CHROMA, CHROMA],
        ColorProgram::Nv12 => &[LUMA, CHROMA_INTERLEAVED],
    }
}

/// A frame's planes uploaded as sampleable textures for a single draw.
///
/// Dropping the value destroys the textures, so every exit path of a frame
/// releases them.
pub(crate) struct ImportedPlanes {
    textures: Vec<wgpu::Texture>,
    pub views: Vec<wgpu::TextureView>,
}

impl ImportedPlanes {
    /// Validates `planes` against the program's layout and uploads them.
    pub(crate) fn import(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        program: ColorProgram,
        geometry: FrameGeometry,
        planes: &[Plane<'_>],
    ) -> Result<Self, String> {
        let layouts = plane_layouts(program);
        if planes.len() != layouts.len() {
            return Err(format!(
                "expected {} planes, frame carries {}",
                layouts.len(),
                planes.len()
            ));
        }

        for (index, (plane, layout)) in planes.iter().zip(layouts).enumerate() {
            validate_plane(index, plane, *layout, geometry)?;
        }

        let mut textures = Vec::with_capacity(layouts.len());
        let mut views = Vec::with_capacity(layouts.len());
        for (index, (plane, layout)) in planes.iter().zip(layouts).enumerate() {
            let size = plane_size(*layout, geometry);
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some(PLANE_LABELS[index]),
                size: wgpu::Extent3d {
                    width: size.width,
                    height: size.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: layout.format,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                plane.data,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(plane.stride),
                    rows_per_image: Some(size.height),
                },
                wgpu::Extent3d {
                    width: size.width,
                    height: size.height,
                    depth_or_array_layers: 1,
                },
            );
            views.push(texture.create_view(&wgpu::TextureViewDescriptor::default()));
            textures.push(texture);
        }

        Ok(Self { textures, views })
    }
}

impl Drop for ImportedPlanes {
    fn drop(&mut self) {
        for texture in &self.textures {
            texture.destroy();
        }
    }
}

const PLANE_LABELS: [&str; 3] = ["plane 0", "plane 1", "plane 2"];

fn plane_size(layout: PlaneLayout, geometry: FrameGeometry) -> FrameGeometry {
    if layout.subsampled {
        geometry.chroma()
    } else {
        geometry
    }
}

fn validate_plane(
    index: usize,
    plane: &Plane<'_>,
    layout: PlaneLayout,
    geometry: FrameGeometry,
) -> Result<(), String> {
    let size = plane_size(layout, geometry);
    let row_bytes = size.width * layout.bytes_per_texel;
    if plane.stride < row_bytes {
        return Err(format!(
            "plane {index} stride {} is shorter than its {row_bytes}-byte rows",
            plane.stride
        ));
    }
    let required =
        plane.stride as usize * (size.height as usize).saturating_sub(1) + row_bytes as usize;
    if plane.data.len() < required {
        return Err(format!(
            "plane {index} holds {} bytes, {required} required for {size}",
            plane.data.len()
        ));
    }
    Ok(())
}
