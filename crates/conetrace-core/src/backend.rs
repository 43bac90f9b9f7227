//! The seam between pipeline orchestration and a GPU backend.
//!
//! Passes never talk to a graphics API directly. They look programs up by
//! name, describe what they bind and write with a [`PassDescriptor`], and
//! issue draws through [`DrawContext`]. Backends own every GPU object and
//! hand out opaque handles.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::attachment::{FrameBufferTarget, TargetDesc};
use crate::binding::PassDescriptor;
use crate::error::Result;
use crate::mesh::MeshData;
use crate::program::{ProgramInterface, UniformValue};
use crate::view::Viewport;
use crate::voxel::VolumeDesc;

/// Handle to a 2D texture owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TextureHandle(pub u32);

/// Handle to a 3D voxel volume owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VolumeHandle(pub u32);

/// Handle to a vertex/instance buffer owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u32);

/// Handle to an uploaded mesh owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(pub u32);

/// Handle to a validated shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub u32);

/// Draw calls available while a pass is open.
pub trait DrawContext {
    /// Sets a uniform of the active program. Names the program does not
    /// declare are ignored.
    fn set_uniform(&mut self, name: &str, value: UniformValue);

    /// Draws an uploaded mesh with the current uniforms.
    fn draw_mesh(&mut self, mesh: MeshHandle) -> Result<()>;

    /// Draws `count` instanced points from a point buffer.
    fn draw_points(&mut self, buffer: BufferHandle, count: u32) -> Result<()>;

    /// Draws a full-screen quad.
    fn draw_fullscreen(&mut self) -> Result<()>;
}

/// A GPU backend.
///
/// Texture units follow bind/release semantics: [`RenderBackend::begin_pass`]
/// enables every slot in the descriptor, and they stay enabled until the
/// controller releases them.
pub trait RenderBackend {
    /// Looks up the program registered under `name` and validates it against
    /// the interface the caller drives.
    fn program(&mut self, name: &str, interface: &ProgramInterface) -> Result<ProgramHandle>;

    /// Allocates a fixed-resolution target.
    fn create_target(&mut self, desc: &TargetDesc) -> Result<FrameBufferTarget>;

    /// Releases every attachment of a target.
    fn destroy_target(&mut self, target: &FrameBufferTarget);

    /// Allocates the mip-chained voxel volume.
    fn create_volume(&mut self, desc: &VolumeDesc) -> Result<VolumeHandle>;

    /// Releases a voxel volume.
    fn destroy_volume(&mut self, volume: VolumeHandle);

    /// Uploads a point buffer for instanced point drawing.
    fn create_point_buffer(&mut self, label: &str, points: &[Vec3]) -> Result<BufferHandle>;

    /// Releases a point buffer.
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Uploads mesh geometry.
    fn upload_mesh(&mut self, label: &str, mesh: &MeshData) -> Result<MeshHandle>;

    /// Releases mesh geometry.
    fn destroy_mesh(&mut self, mesh: MeshHandle);

    /// Starts a frame rendering into `viewport` of the presentation surface.
    fn begin_frame(&mut self, viewport: Viewport) -> Result<()>;

    /// Applies a pass descriptor and opens the pass for drawing.
    fn begin_pass(&mut self, pass: &PassDescriptor) -> Result<()>;

    /// Finishes the open pass.
    fn end_pass(&mut self) -> Result<()>;

    /// Disables the given texture units.
    fn release_texture_units(&mut self, slots: &[u32]);

    /// Disables every enabled texture unit numbered `first` or higher.
    fn disable_texture_units_from(&mut self, first: u32);

    /// Currently enabled texture units, ascending.
    fn enabled_texture_units(&self) -> Vec<u32>;

    /// Submits the frame.
    fn end_frame(&mut self) -> Result<()>;

    /// Drops any open pass and pending work after a failed frame.
    fn abort_frame(&mut self);

    /// The draw interface for the open pass.
    fn draw_context(&mut self) -> &mut dyn DrawContext;
}

impl<T: RenderBackend + ?Sized> RenderBackend for &mut T {
    fn program(&mut self, name: &str, interface: &ProgramInterface) -> Result<ProgramHandle> {
        (**self).program(name, interface)
    }

    fn create_target(&mut self, desc: &TargetDesc) -> Result<FrameBufferTarget> {
        (**self).create_target(desc)
    }

    fn destroy_target(&mut self, target: &FrameBufferTarget) {
        (**self).destroy_target(target);
    }

    fn create_volume(&mut self, desc: &VolumeDesc) -> Result<VolumeHandle> {
        (**self).create_volume(desc)
    }

    fn destroy_volume(&mut self, volume: VolumeHandle) {
        (**self).destroy_volume(volume);
    }

    fn create_point_buffer(&mut self, label: &str, points: &[Vec3]) -> Result<BufferHandle> {
        (**self).create_point_buffer(label, points)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        (**self).destroy_buffer(buffer);
    }

    fn upload_mesh(&mut self, label: &str, mesh: &MeshData) -> Result<MeshHandle> {
        (**self).upload_mesh(label, mesh)
    }

    fn destroy_mesh(&mut self, mesh: MeshHandle) {
        (**self).destroy_mesh(mesh);
    }

    fn begin_frame(&mut self, viewport: Viewport) -> Result<()> {
        (**self).begin_frame(viewport)
    }

    fn begin_pass(&mut self, pass: &PassDescriptor) -> Result<()> {
        (**self).begin_pass(pass)
    }

    fn end_pass(&mut self) -> Result<()> {
        (**self).end_pass()
    }

    fn release_texture_units(&mut self, slots: &[u32]) {
        (**self).release_texture_units(slots);
    }

    fn disable_texture_units_from(&mut self, first: u32) {
        (**self).disable_texture_units_from(first);
    }

    fn enabled_texture_units(&self) -> Vec<u32> {
        (**self).enabled_texture_units()
    }

    fn end_frame(&mut self) -> Result<()> {
        (**self).end_frame()
    }

    fn abort_frame(&mut self) {
        (**self).abort_frame();
    }

    fn draw_context(&mut self) -> &mut dyn DrawContext {
        (**self).draw_context()
    }
}
