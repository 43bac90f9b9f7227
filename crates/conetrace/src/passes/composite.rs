//! Final composite of every deferred buffer.

use conetrace_core::{
    AttachmentDesc, AttachmentFormat, AttachmentKind, FrameBufferTarget, PassDescriptor,
    PipelineOptions, ProgramHandle, ProgramInterface, RenderBackend, Result, SamplerKind,
    TargetDesc, TextureHandle, UniformType, VertexInput,
};

use super::{lookup, run_pass, target_desc, target_layout, target_output};

const ATTACHMENTS: [AttachmentDesc; 1] = [AttachmentDesc::new(
    AttachmentKind::Final,
    AttachmentFormat::Rgba8Unorm,
)];

/// Inputs of the composite, one per sampler slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeInputs {
    pub color: TextureHandle,
    pub light: TextureHandle,
    pub specular: TextureHandle,
    pub blur: TextureHandle,
    pub glossy: TextureHandle,
}

/// Adds direct, blurred indirect and reflected light modulated by surface
/// color. The weights come from [`conetrace_core::CompositeConfig`].
pub struct CompositePass {
    program: ProgramHandle,
    target: FrameBufferTarget,
}

impl CompositePass {
    pub const LABEL: &'static str = "Composite";
    pub const PROGRAM: &'static str = "Final";

    pub fn interface() -> ProgramInterface {
        ProgramInterface::new(VertexInput::FullScreen, target_layout(&ATTACHMENTS))
            .uniform("composite.direct", UniformType::Float)
            .uniform("composite.indirect", UniformType::Float)
            .uniform("composite.reflection", UniformType::Float)
            .uniform("composite.specular", UniformType::Float)
            .sampler(0, "colorTex", SamplerKind::Texture2d)
            .sampler(1, "lightTex", SamplerKind::Texture2d)
            .sampler(2, "specularTex", SamplerKind::Texture2d)
            .sampler(3, "blurTex", SamplerKind::Texture2d)
            .sampler(4, "glossyTex", SamplerKind::Texture2d)
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

    /// The composited image.
    pub fn final_tex(&self) -> Result<TextureHandle> {
        self.target.require(AttachmentKind::Final)
    }

    pub fn draw_to_buffer(
        &self,
        backend: &mut dyn RenderBackend,
        options: &PipelineOptions,
        inputs: &CompositeInputs,
    ) -> Result<()> {
        let desc = PassDescriptor::new(Self::LABEL, self.program, target_output(&self.target))
            .bind_texture(0, inputs.color)
            .bind_texture(1, inputs.light)
            .bind_texture(2, inputs.specular)
            .bind_texture(3, inputs.blur)
            .bind_texture(4, inputs.glossy);

        let weights = options.composite;
        run_pass(backend, &desc, |ctx| {
            ctx.set_uniform("composite.direct", weights.direct.into());
            ctx.set_uniform("composite.indirect", weights.indirect.into());
            ctx.set_uniform("composite.reflection", weights.reflection.into());
            ctx.set_uniform("composite.specular", weights.specular.into());
            ctx.draw_fullscreen()
        })
    }
}
