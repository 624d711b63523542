use std::time::{Duration, Instant};

use serde::Serialize;

use crate::compile::{compile_vertex_shader, ColorProgram};
use crate::error::{FrameStage, TransformError};
use crate::frame::{FrameLease, FrameSink, RgbFrame, VideoFrame};
use crate::gpu::{
    ColorPipeline, GeometryResources, GpuContext, ImportedPlanes, PipelineKey, PresentationSurface,
};
use crate::types::{AdapterProfile, FrameGeometry, PixelFormat, TransformConfig};

const SUMMARY_INTERVAL: Duration = Duration::from_secs(5);

/// Counters describing what the transform did with the frames it was offered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransformStats {
    pub frames_received: u64,
    pub frames_emitted: u64,
    pub dropped_not_ready: u64,
    pub dropped_unsupported: u64,
    pub dropped_import: u64,
    pub dropped_gpu: u64,
    pub surface_rebuilds: u64,
    pub pipeline_rebuilds: u64,
}

impl TransformStats {
    pub fn frames_dropped(&self) -> u64 {
        self.dropped_not_ready + self.dropped_unsupported + self.dropped_import + self.dropped_gpu
    }

    fn record_drop(&mut self, err: &TransformError) {
        match err {
            TransformError::UnsupportedPixelFormat { .. }
            | TransformError::MissingPixelFormat { .. } => self.dropped_unsupported += 1,
            TransformError::ImportFailed { .. } => self.dropped_import += 1,
            TransformError::DeviceUnavailable { .. } => self.dropped_not_ready += 1,
            TransformError::SubmissionTimeout { .. }
            | TransformError::Gpu { .. }
            | TransformError::Readback { .. } => self.dropped_gpu += 1,
        }
    }
}

enum TransformState {
    Uninitialized,
    Ready(Box<GpuResources>),
    Destroyed,
}

/// Device-scoped resources. The surface and pipeline are built lazily by the
/// first frame that needs them and rebuilt only when that frame's geometry or
/// format differs from what they were built for.
struct GpuResources {
    context: GpuContext,
    geometry: GeometryResources,
    vertex_module: wgpu::ShaderModule,
    surface: Option<PresentationSurface>,
    pipeline: Option<ColorPipeline>,
}

impl GpuResources {
    fn ensure_surface(&mut self, config: &TransformConfig, geometry: FrameGeometry) -> bool {
        if self
            .surface
            .as_ref()
            .is_some_and(|surface| surface.matches(geometry))
        {
            return false;
        }

        tracing::debug!(
            width = geometry.width,
            height = geometry.height,
            format = %config.surface_format,
            "configuring presentation surface"
        );
        // Release the old target before allocating its replacement.
        self.surface = None;
        self.surface = Some(PresentationSurface::new(
            &self.context.device,
            geometry,
            config.surface_format,
        ));
        true
    }

    fn ensure_pipeline(&mut self, key: PipelineKey) -> Result<bool, TransformError> {
        if self
            .pipeline
            .as_ref()
            .is_some_and(|pipeline| pipeline.key == key)
        {
            return Ok(false);
        }

        tracing::debug!(
            program = key.program.label(),
            surface_format = %key.surface_format,
            "building color pipeline"
        );
        self.pipeline = None;
        let pipeline = ColorPipeline::new(&self.context.device, &self.vertex_module, key).map_err(
            |reason| TransformError::Gpu {
                stage: FrameStage::Binding,
                reason,
            },
        )?;
        self.pipeline = Some(pipeline);
        Ok(true)
    }

    fn release(mut self) {
        self.pipeline = None;
        self.surface = None;
        self.context.device.destroy();
    }
}

/// Converts planar/semi-planar YUV frames into packed RGB frames on the GPU.
///
/// The transform is driven one frame at a time: [`YuvTransform::initialize`]
/// once, then [`YuvTransform::transform`] for every frame, then
/// [`YuvTransform::destroy`]. Each frame offered to `transform` is closed
/// before the call returns, whether or not an output frame was produced.
pub struct YuvTransform {
    config: TransformConfig,
    state: TransformState,
    stats: TransformStats,
    warned_unset_format: bool,
    last_summary: Instant,
}

impl YuvTransform {
    pub fn new(config: TransformConfig) -> Self {
        Self {
            config,
            state: TransformState::Uninitialized,
            stats: TransformStats::default(),
            warned_unset_format: false,
            last_summary: Instant::now(),
        }
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    pub fn stats(&self) -> TransformStats {
        self.stats
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, TransformState::Ready(_))
    }

    pub fn adapter_profile(&self) -> Option<&AdapterProfile> {
        match &self.state {
            TransformState::Ready(resources) => Some(&resources.context.adapter_profile),
            _ => None,
        }
    }

    /// Acquires the GPU device and builds the per-device resources.
    ///
    /// Calling this on a ready transform is a no-op. A destroyed transform
    /// cannot be revived.
    pub fn initialize(&mut self) -> Result<(), TransformError> {
        match self.state {
            TransformState::Ready(_) => return Ok(()),
            TransformState::Destroyed => {
                return Err(TransformError::device("transform has been destroyed"))
            }
            TransformState::Uninitialized => {}
        }

        let context = GpuContext::new(&self.config).inspect_err(|err| {
            tracing::error!(error = %err, "GPU transform initialization failed");
        })?;
        let geometry = GeometryResources::new(&context.device);
        let vertex_module = compile_vertex_shader(&context.device);

        tracing::info!(
            adapter = %context.adapter_profile.name,
            backend = %context.adapter_profile.backend,
            surface_format = %self.config.surface_format,
            "GPU transform ready"
        );

        self.state = TransformState::Ready(Box::new(GpuResources {
            context,
            geometry,
            vertex_module,
            surface: None,
            pipeline: None,
        }));
        Ok(())
    }

    /// Converts `frame` and enqueues the result on `sink`.
    ///
    /// Failures drop the frame and are logged; they never leave the transform
    /// unable to process the next frame. `frame` is closed in every case.
    pub fn transform<F, S>(&mut self, frame: F, sink: &mut S)
    where
        F: VideoFrame,
        S: FrameSink + ?Sized,
    {
        let mut lease = FrameLease::new(frame);
        self.stats.frames_received += 1;

        let TransformState::Ready(resources) = &mut self.state else {
            self.stats.dropped_not_ready += 1;
            tracing::trace!(
                timestamp = lease.timestamp(),
                "transform not ready; dropping frame"
            );
            return;
        };

        let format = match lease.format() {
            Some(format) => Some(format),
            None if self.config.assume_nv12_when_unset => {
                if !self.warned_unset_format {
                    self.warned_unset_format = true;
                    tracing::warn!(
                        geometry = %lease.geometry(),
                        "frame reports no pixel format; treating as NV12"
                    );
                }
                Some(PixelFormat::Nv12)
            }
            None => None,
        };

        let timestamp = lease.timestamp();
        let geometry = lease.geometry();
        match convert(resources, &self.config, &mut lease, format, &mut self.stats) {
            Ok(output) => {
                sink.enqueue(output);
                self.stats.frames_emitted += 1;
            }
            Err(err) => {
                self.stats.record_drop(&err);
                tracing::warn!(
                    error = %err,
                    timestamp,
                    format = format.map(PixelFormat::as_str).unwrap_or("unset"),
                    geometry = %geometry,
                    "dropping frame"
                );
            }
        }

        let now = Instant::now();
        if now.duration_since(self.last_summary) >= SUMMARY_INTERVAL {
            tracing::debug!(
                received = self.stats.frames_received,
                emitted = self.stats.frames_emitted,
                dropped = self.stats.frames_dropped(),
                surface_rebuilds = self.stats.surface_rebuilds,
                pipeline_rebuilds = self.stats.pipeline_rebuilds,
                "transform summary"
            );
            self.last_summary = now;
        }
    }

    /// Releases the GPU device. Safe to call more than once.
    pub fn destroy(&mut self) {
        match std::mem::replace(&mut self.state, TransformState::Destroyed) {
            TransformState::Ready(resources) => {
                tracing::info!(
                    emitted = self.stats.frames_emitted,
                    dropped = self.stats.frames_dropped(),
                    "destroying GPU transform"
                );
                resources.release();
            }
            TransformState::Uninitialized | TransformState::Destroyed => {}
        }
    }
}

impl Drop for YuvTransform {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn convert<F: VideoFrame>(
    resources: &mut GpuResources,
    config: &TransformConfig,
    lease: &mut FrameLease<F>,
    format: Option<PixelFormat>,
    stats: &mut TransformStats,
) -> Result<RgbFrame, TransformError> {
    let geometry = lease.geometry();
    let timestamp = lease.timestamp();

    let format = format.ok_or(TransformError::MissingPixelFormat { geometry })?;
    let program = ColorProgram::for_format(format)
        .ok_or(TransformError::UnsupportedPixelFormat { format, geometry })?;

    if geometry.is_empty() {
        return Err(TransformError::import(format, geometry, "frame has no pixels"));
    }
    let max_dimension = resources.context.max_dimension();
    if geometry.width > max_dimension || geometry.height > max_dimension {
        return Err(TransformError::import(
            format,
            geometry,
            format!("exceeds the device limit of {max_dimension} pixels per side"),
        ));
    }

    let planes = ImportedPlanes::import(
        &resources.context.device,
        &resources.context.queue,
        program,
        geometry,
        &lease.planes(),
    )
    .map_err(|reason| TransformError::import(format, geometry, reason))?;

    if resources.ensure_surface(config, geometry) {
        stats.surface_rebuilds += 1;
    }
    let key = PipelineKey {
        program,
        surface_format: config.surface_format,
    };
    if resources.ensure_pipeline(key)? {
        stats.pipeline_rebuilds += 1;
    }

    let (Some(surface), Some(pipeline)) = (&resources.surface, &resources.pipeline) else {
        return Err(TransformError::Gpu {
            stage: FrameStage::Binding,
            reason: "presentation resources missing".to_string(),
        });
    };
    let context = &resources.context;
    let bind_group = pipeline.bind_group(&context.device, &resources.geometry, &planes);

    let mut encoder = context
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("transform encoder"),
        });
    {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("transform pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &surface.view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        render_pass.set_pipeline(&pipeline.pipeline);
        render_pass.set_vertex_buffer(0, resources.geometry.vertex_buffer.slice(..));
        render_pass.set_bind_group(0, &bind_group, &[]);
        render_pass.draw(0..resources.geometry.vertex_count(), 0..1);
    }
    surface.encode_readback(&mut encoder);

    let submission = context.queue.submit(std::iter::once(encoder.finish()));
    context.wait(Some(submission), config.submission_timeout, FrameStage::Drawing)?;

    // The planes have been consumed by the draw; release them and the source
    // frame before reading back.
    drop(bind_group);
    drop(planes);
    lease.close();

    let mapped = surface.map(context, config.submission_timeout)?;
    let output = mapped.to_frame(timestamp);
    drop(mapped);

    tracing::trace!(
        timestamp,
        width = geometry.width,
        height = geometry.height,
        "converted frame"
    );
    Ok(output)
}
