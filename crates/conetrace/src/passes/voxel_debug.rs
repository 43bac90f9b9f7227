//! Voxel volume drawn as a point cloud.

use conetrace_core::{
    CameraRig, OutputLayout, PassDescriptor, PassOutput, ProgramHandle, ProgramInterface,
    RenderBackend, Result, SamplerKind, UniformType, VertexInput,
};

use super::{lookup, run_pass, send_camera, with_camera_uniforms};
use crate::context::RenderContext;
use crate::voxel_volume::VoxelVolume;

/// Slot the voxel volume is bound at for debug display.
pub const VOXELMAP_SLOT: u32 = 8;

/// Draws one instanced point per voxel at the selected mip level, sampling
/// the volume at that level. Bypasses every lighting pass.
pub struct VoxelDebugPass {
    program: ProgramHandle,
}

impl VoxelDebugPass {
    pub const LABEL: &'static str = "VoxelDebug";
    pub const PROGRAM: &'static str = "Voxel";

    pub fn interface() -> ProgramInterface {
        with_camera_uniforms(ProgramInterface::new(
            VertexInput::PointInstances,
            OutputLayout::Screen { depth: true },
        ))
        .uniform("invCameraMatrix", UniformType::Mat4)
        .uniform("worldSize", UniformType::Float)
        .uniform("pointSize", UniformType::Float)
        .sampler(VOXELMAP_SLOT, "voxelmap", SamplerKind::Volume3d)
    }

    pub fn load_program(backend: &mut dyn RenderBackend) -> Result<ProgramHandle> {
        lookup(backend, Self::PROGRAM, &Self::interface())
    }

    pub fn new(program: ProgramHandle) -> Self {
        Self { program }
    }

    pub fn draw(
        &self,
        backend: &mut dyn RenderBackend,
        context: &mut RenderContext,
        camera: &dyn CameraRig,
        volume: &mut VoxelVolume,
    ) -> Result<()> {
        let (buffer, count) = volume.debug_points(backend)?;
        let frame = context.view.begin_3d(camera);
        let desc = PassDescriptor::new(Self::LABEL, self.program, PassOutput::Screen)
            .bind_volume(VOXELMAP_SLOT, volume.handle(), Some(volume.mip_level()))
            .with_clear_color(Some(context.options().clear_rgba()));

        let world_size = volume.desc().world_size();
        let point_size = volume.point_size();
        run_pass(backend, &desc, |ctx| {
            send_camera(ctx, &frame);
            ctx.set_uniform("invCameraMatrix", frame.inverse_camera().into());
            ctx.set_uniform("worldSize", world_size.into());
            ctx.set_uniform("pointSize", point_size.into());
            ctx.draw_points(buffer, count)
        })
    }
}
