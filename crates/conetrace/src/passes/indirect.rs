//! Voxel-cone-traced indirect light.

use conetrace_core::{
    AttachmentDesc, AttachmentFormat, AttachmentKind, CameraRig, FrameBufferTarget,
    PassDescriptor, PipelineOptions, ProgramHandle, ProgramInterface, RenderBackend, Result,
    SamplerKind, TargetDesc, TextureHandle, UniformType, VertexInput,
};

use super::{
    lookup, run_pass, send_camera, target_desc, target_layout, target_output, with_camera_uniforms,
};
use crate::context::RenderContext;
use crate::voxel_volume::VoxelVolume;

const ATTACHMENTS: [AttachmentDesc; 1] = [AttachmentDesc::new(
    AttachmentKind::Indirect,
    AttachmentFormat::Rgba16Float,
)];

/// Cone-traces the voxel volume from every G-buffer texel.
///
/// Binds depth, tangent, bitangent, normal and color at slots 0..=4 and the
/// whole voxel mip chain at slot 5.
pub struct IndirectLightPass {
    program: ProgramHandle,
    target: FrameBufferTarget,
}

impl IndirectLightPass {
    pub const LABEL: &'static str = "Indirect";
    pub const PROGRAM: &'static str = "Indirect";

    pub fn interface() -> ProgramInterface {
        with_camera_uniforms(ProgramInterface::new(
            VertexInput::FullScreen,
            target_layout(&ATTACHMENTS),
        ))
        .uniform("invCameraMatrix", UniformType::Mat4)
        .uniform("cameraPos", UniformType::Vec3)
        .uniform("worldSize", UniformType::Float)
        .uniform("mipLevel", UniformType::Float)
        .sampler(0, "depthTex", SamplerKind::Depth2d)
        .sampler(1, "tangentTex", SamplerKind::Texture2d)
        .sampler(2, "bitangentTex", SamplerKind::Texture2d)
        .sampler(3, "normalTex", SamplerKind::Texture2d)
        .sampler(4, "colorTex", SamplerKind::Texture2d)
        .sampler(5, "voxelmap", SamplerKind::Volume3d)
    }

    pub fn load_program(backend: &mut dyn RenderBackend) -> Result<ProgramHandle> {
        lookup(backend, Self::PROGRAM, &Self::interface())
    }

    pub fn target_desc(options: &PipelineOptions) -> TargetDesc {
        target_desc(Self::LABEL, options, &ATTACHMENTS)
    }

    pub fn new(program: ProgramHandle, target: FrameBufferTarget) -> Self {
        Self { program, target }
    }

    pub fn target(&self) -> &FrameBufferTarget {
        &self.target
    }

    /// The unblurred indirect light.
    pub fn indirect_tex(&self) -> Result<TextureHandle> {
        self.target.require(AttachmentKind::Indirect)
    }

    /// Renders indirect light. Must run after the volume has been rebuilt
    /// for this frame.
    pub fn draw_to_buffer(
        &self,
        backend: &mut dyn RenderBackend,
        context: &mut RenderContext,
        camera: &dyn CameraRig,
        gbuffer: &FrameBufferTarget,
        volume: &VoxelVolume,
    ) -> Result<()> {
        let frame = context.view.begin_3d(camera);
        let desc = PassDescriptor::new(Self::LABEL, self.program, target_output(&self.target))
            .bind_texture(0, gbuffer.require(AttachmentKind::Depth)?)
            .bind_texture(1, gbuffer.require(AttachmentKind::Tangent)?)
            .bind_texture(2, gbuffer.require(AttachmentKind::Bitangent)?)
            .bind_texture(3, gbuffer.require(AttachmentKind::Normal)?)
            .bind_texture(4, gbuffer.require(AttachmentKind::Color)?)
            .bind_volume(5, volume.handle(), None);

        let world_size = volume.desc().world_size();
        let mip_level = volume.mip_level() as f32;
        run_pass(backend, &desc, |ctx| {
            send_camera(ctx, &frame);
            ctx.set_uniform("invCameraMatrix", frame.inverse_camera().into());
            ctx.set_uniform("cameraPos", frame.eye.into());
            ctx.set_uniform("worldSize", world_size.into());
            ctx.set_uniform("mipLevel", mip_level.into());
            ctx.draw_fullscreen()
        })
    }
}
