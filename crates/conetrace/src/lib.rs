//! conetrace: forward, voxel-debug and deferred voxel-cone-traced rendering.
//!
//! [`RenderPipeline`] sequences the passes of three interchangeable render
//! paths over any [`RenderBackend`]:
//!
//! - **Forward**: one lit pass straight to the screen
//! - **Voxel debug**: the voxel volume drawn as a point cloud
//! - **Deferred**: G-buffer, voxel rebuild, reflections, cone-traced
//!   indirect light, a two-pass blur, direct light and a final composite,
//!   with any intermediate buffer selectable for display
//!
//! # Quick Start
//!
//! ```no_run
//! use conetrace::*;
//!
//! struct EmptyScene;
//!
//! impl Scene for EmptyScene {
//!     fn draw(&self, _ctx: &mut dyn DrawContext, _program: &str) -> Result<()> {
//!         Ok(())
//!     }
//!
//!     fn object_count(&self) -> usize {
//!         0
//!     }
//! }
//!
//! struct NoVoxels;
//!
//! impl Voxelizer for NoVoxels {
//!     fn build_voxels(
//!         &mut self,
//!         _backend: &mut dyn RenderBackend,
//!         _scene: &dyn Scene,
//!         _volume: VolumeHandle,
//!         _desc: &VolumeDesc,
//!         _light: &LightSource,
//!     ) -> Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> Result<()> {
//!     init();
//!
//!     let backend = RecordingBackend::new();
//!     let mut pipeline =
//!         RenderPipeline::new(backend, PipelineOptions::default(), Box::new(NoVoxels))?;
//!     pipeline.resize(1280, 720);
//!
//!     let camera = Camera::new(Vec3::new(0.0, 4.0, 10.0), Vec3::ZERO, Vec3::Y);
//!     let mut profiler = FrameProfiler::new();
//!     pipeline.render_frame(&EmptyScene, &camera, &mut profiler)?;
//!
//!     // Show the G-buffer normals next frame.
//!     pipeline.handle_digit(4);
//!     pipeline.refresh_presentation()?;
//!     Ok(())
//! }
//! ```

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Texel and voxel counts are far below f32 precision limits
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]

pub mod context;
pub mod input;
pub mod passes;
pub mod pipeline;
pub mod profiler;
pub mod voxel_volume;

pub use conetrace_core::*;
pub use conetrace_render::{Camera, Command, ProgramSource, RecordingBackend, WgpuBackend};

pub use context::RenderContext;
pub use input::{translate_key, PipelineKey};
pub use pipeline::RenderPipeline;
pub use profiler::{FrameProfiler, ProfileStats};
pub use voxel_volume::VoxelVolume;

/// Sets up logging.
///
/// Safe to call more than once; only the first call installs the logger.
pub fn init() {
    let _ = env_logger::try_init();
    log::info!("conetrace initialized");
}
