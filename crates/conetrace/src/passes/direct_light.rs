//! Direct lighting and specular glow.

use conetrace_core::{
    AttachmentDesc, AttachmentFormat, AttachmentKind, CameraRig, FrameBufferTarget, LightSource,
    PassDescriptor, PipelineOptions, ProgramHandle, ProgramInterface, RenderBackend, Result,
    SamplerKind, TargetDesc, TextureHandle, UniformType, VertexInput,
};

use super::{lookup, run_pass, target_desc, target_layout, target_output};
use crate::context::RenderContext;

const ATTACHMENTS: [AttachmentDesc; 2] = [
    AttachmentDesc::new(AttachmentKind::Light, AttachmentFormat::Rgba16Float),
    AttachmentDesc::new(AttachmentKind::Specular, AttachmentFormat::Rgba16Float),
];

/// Shades the G-buffer with the directional light.
pub struct DirectLightPass {
    program: ProgramHandle,
    target: FrameBufferTarget,
    written: bool,
}

impl DirectLightPass {
    pub const LABEL: &'static str = "DirectLight";
    pub const PROGRAM: &'static str = "Light";

    pub fn interface() -> ProgramInterface {
        ProgramInterface::new(VertexInput::FullScreen, target_layout(&ATTACHMENTS))
            .uniform("light.direction", UniformType::Vec3)
            .uniform("light.color", UniformType::Vec3)
            .uniform("light.ambient", UniformType::Float)
            .uniform("light.diffuse", UniformType::Float)
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
        Self {
            program,
            target,
            written: false,
        }
    }

    pub fn target(&self) -> &FrameBufferTarget {
        &self.target
    }

    pub fn light_tex(&self) -> Result<TextureHandle> {
        self.target.require(AttachmentKind::Light)
    }

    pub fn specular_tex(&self) -> Result<TextureHandle> {
        self.target.require(AttachmentKind::Specular)
    }

    /// Light handed to the voxelizer.
    ///
    /// The light buffer is attached once a deferred frame has written it.
    pub fn light_source(&self, options: &PipelineOptions) -> LightSource {
        LightSource {
            direction: options.light.direction,
            color: options.light.color,
            light_texture: if self.written {
                self.target.attachment(AttachmentKind::Light)
            } else {
                None
            },
        }
    }

    /// Writes the light and specular attachments.
    pub fn draw_to_buffer(
        &mut self,
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

        let light = context.options().light;
        run_pass(backend, &desc, |ctx| {
            ctx.set_uniform("light.direction", light.direction.into());
            ctx.set_uniform("light.color", light.color.into());
            ctx.set_uniform("light.ambient", light.ambient.into());
            ctx.set_uniform("light.diffuse", light.diffuse.into());
            ctx.set_uniform("invCameraMatrix", frame.inverse_camera().into());
            ctx.set_uniform("cameraPos", frame.eye.into());
            ctx.draw_fullscreen()
        })?;
        self.written = true;
        Ok(())
    }
}
