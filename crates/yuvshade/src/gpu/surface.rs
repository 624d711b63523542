use std::time::Duration;

use crate::error::{FrameStage, TransformError};
use crate::frame::RgbFrame;
use crate::types::{FrameGeometry, SurfaceFormat};

use super::context::GpuContext;

/// Off-screen render target sized to the video frame, plus the buffer its
/// pixels are copied into for readback.
pub(crate) struct PresentationSurface {
    pub geometry: FrameGeometry,
    pub format: SurfaceFormat,
    texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    readback: wgpu::Buffer,
    padded_bytes_per_row: u32,
}

impl PresentationSurface {
    pub(crate) fn new(
        device: &wgpu::Device,
        geometry: FrameGeometry,
        format: SurfaceFormat,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("presentation surface"),
            size: extent(geometry),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: format.to_wgpu(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let padded_bytes_per_row = padded_row_bytes(geometry.width, format);
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("presentation readback"),
            size: padded_bytes_per_row as u64 * geometry.height as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            geometry,
            format,
            texture,
            view,
            readback,
            padded_bytes_per_row,
        }
    }

    pub(crate) fn matches(&self, geometry: FrameGeometry) -> bool {
        self.geometry == geometry
    }

    /// Records the copy of the rendered target into the readback buffer.
    pub(crate) fn encode_readback(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_bytes_per_row),
                    rows_per_image: Some(self.geometry.height),
                },
            },
            extent(self.geometry),
        );
    }

    /// Maps the readback buffer. The returned guard unmaps it when dropped.
    ///
    /// The guard exists from the moment the map is requested, so a failed or
    /// timed-out wait still leaves the buffer unmapped for the next frame.
    pub(crate) fn map(
        &self,
        context: &GpuContext,
        timeout: Option<Duration>,
    ) -> Result<MappedImage<'_>, TransformError> {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        self.readback
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                let _ = sender.send(result);
            });
        let mapped = MappedImage { surface: self };

        context.wait(None, timeout, FrameStage::ReadingBack)?;
        receiver
            .try_recv()
            .map_err(|_| TransformError::Readback {
                reason: "map callback did not run".to_string(),
            })?
            .map_err(|err| TransformError::Readback {
                reason: err.to_string(),
            })?;

        Ok(mapped)
    }
}

impl Drop for PresentationSurface {
    fn drop(&mut self) {
        self.texture.destroy();
        self.readback.destroy();
    }
}

/// The rendered image while its readback buffer is mapped.
pub(crate) struct MappedImage<'a> {
    surface: &'a PresentationSurface,
}

impl MappedImage<'_> {
    /// Copies the pixels out, dropping the row padding.
    pub(crate) fn to_frame(&self, timestamp: i64) -> RgbFrame {
        let surface = self.surface;
        let row_bytes = (surface.geometry.width * surface.format.bytes_per_pixel()) as usize;
        let mapped = surface.readback.slice(..).get_mapped_range();
        let mut data = Vec::with_capacity(row_bytes * surface.geometry.height as usize);
        for row in mapped.chunks(surface.padded_bytes_per_row as usize) {
            data.extend_from_slice(&row[..row_bytes]);
        }

        RgbFrame {
            timestamp,
            width: surface.geometry.width,
            height: surface.geometry.height,
            format: surface.format,
            data,
        }
    }
}

impl Drop for MappedImage<'_> {
    fn drop(&mut self) {
        self.surface.readback.unmap();
    }
}

fn extent(geometry: FrameGeometry) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: geometry.width,
        height: geometry.height,
        depth_or_array_layers: 1,
    }
}

fn padded_row_bytes(width: u32, format: SurfaceFormat) -> u32 {
    let unpadded = width * format.bytes_per_pixel();
    unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT
}
