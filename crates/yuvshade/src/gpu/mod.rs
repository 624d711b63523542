//! GPU side of the transform.
//!
//! - `context` owns the wgpu instance/adapter/device wiring and the adapter
//!   profile used for logging.
//! - `geometry` holds the full-screen quad and the plane sampler, both built
//!   once per context.
//! - `surface` is the off-screen render target plus its readback buffer,
//!   rebuilt only when the frame dimensions change.
//! - `pipeline` compiles the per-format program into a render pipeline with a
//!   single bind group layout, rebuilt only on format transitions.
//! - `import` uploads a frame's planes into sampleable textures for one draw.

mod context;
mod geometry;
mod import;
mod pipeline;
mod surface;

pub(crate) use context::GpuContext;
pub(crate) use geometry::GeometryResources;
pub(crate) use import::ImportedPlanes;
pub(crate) use pipeline::{ColorPipeline, PipelineKey};
pub(crate) use surface::PresentationSurface;
