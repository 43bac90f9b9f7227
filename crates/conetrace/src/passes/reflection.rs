//! Glossy reflections from the G-buffer.

use conetrace_core::{
    AttachmentDesc, AttachmentFormat, AttachmentKind, CameraRig, FrameBufferTarget,
    PassDescriptor, PipelineOptions, ProgramHandle, ProgramInterface, RenderBackend, Result,
    SamplerKind, TargetDesc, TextureHandle, UniformType, VertexInput,
};

use super::{
    lookup, run_pass, send_camera, target_desc, target_layout, target_output, with_camera_uniforms,
};
use crate::context::RenderContext;

const ATTACHMENTS: [AttachmentDesc; 1] = [AttachmentDesc::new(
    AttachmentKind::Glossy,
    AttachmentFormat::Rgba16Float,
)];

/// Reads G-buffer normal, depth and glow and writes the glossy buffer.
pub struct ReflectionPass {
    program: ProgramHandle,
    target: FrameBufferTarget,
}

impl ReflectionPass {
    pub const LABEL: &'static str = "Reflection";
    pub const PROGRAM: &'static str = "Glossy";

    pub fn interface() -> ProgramInterface {
        with_camera_uniforms(ProgramInterface::new(
            VertexInput::FullScreen,
            target_layout(&ATTACHMENTS),
        ))
        .uniform("invCameraMatrix", UniformType::Mat4)
        .uniform("cameraPos", UniformType::Vec3)
        .sampler(0, "normalTex", SamplerKind::Texture2d)
        .sampler(1, "depthTex", SamplerKind::Depth2d)
        .sampler(2, "glowTex", SamplerKind::Texture2d)
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

    /// The glossy reflection texture.
    pub fn glossy_tex(&self) -> Result<TextureHandle> {
        self.target.require(AttachmentKind::Glossy)
    }

    /// Renders reflections; the G-buffer is only sampled.
    pub fn draw_to_buffer(
        &self,
        backend: &mut dyn RenderBackend,
        context: &mut RenderContext,
        camera: &dyn CameraRig,
        gbuffer: &FrameBufferTarget,
    ) -> Result<()> {
        let frame = context.view.begin_3d(camera);
        let desc = PassDescriptor::new(Self::LABEL, self.program, target_output(&self.target))
            .bind_texture(0, gbuffer.require(AttachmentKind::Normal)?)
            .bind_texture(1, gbuffer.require(AttachmentKind::Depth)?)
            .bind_texture(2, gbuffer.require(AttachmentKind::Glow)?);

        run_pass(backend, &desc, |ctx| {
            send_camera(ctx, &frame);
            ctx.set_uniform("invCameraMatrix", frame.inverse_camera().into());
            ctx.set_uniform("cameraPos", frame.eye.into());
            ctx.draw_fullscreen()
        })
    }
}
