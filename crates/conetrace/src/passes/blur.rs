//! Normal-guided ping-pong blur of the indirect light.

use conetrace_core::{
    AttachmentDesc, AttachmentFormat, AttachmentKind, FrameBufferTarget, PassDescriptor,
    PipelineOptions, ProgramHandle, ProgramInterface, RenderBackend, Result, SamplerKind,
    TargetDesc, TextureHandle, UniformType, Vec2, VertexInput,
};

use super::{lookup, run_pass, target_desc, target_layout, target_output};

const ATTACHMENTS: [AttachmentDesc; 1] = [AttachmentDesc::new(
    AttachmentKind::Blur,
    AttachmentFormat::Rgba16Float,
)];

/// Bilateral blur over a pair of buffers.
///
/// Each invocation writes whichever buffer does not hold its input, so
/// feeding [`blur_tex`](Self::blur_tex) back in blurs the previous result.
/// The deferred path runs it exactly twice per frame.
pub struct BlurPass {
    program: ProgramHandle,
    targets: [FrameBufferTarget; 2],
    last_written: Option<usize>,
}

impl BlurPass {
    pub const LABEL: &'static str = "Blur";
    pub const PROGRAM: &'static str = "Blur";
    pub const TARGET_LABELS: [&'static str; 2] = ["Blur A", "Blur B"];

    pub fn interface() -> ProgramInterface {
        ProgramInterface::new(VertexInput::FullScreen, target_layout(&ATTACHMENTS))
            .uniform("texelSize", UniformType::Vec2)
            .uniform("sharpness", UniformType::Float)
            .sampler(0, "inputTex", SamplerKind::Texture2d)
            .sampler(1, "normalTex", SamplerKind::Texture2d)
    }

    pub fn load_program(backend: &mut dyn RenderBackend) -> Result<ProgramHandle> {
        lookup(backend, Self::PROGRAM, &Self::interface())
    }

    /// Descriptions of both ping-pong buffers.
    pub fn target_descs(options: &PipelineOptions) -> [TargetDesc; 2] {
        Self::TARGET_LABELS.map(|label| target_desc(label, options, &ATTACHMENTS))
    }

    pub fn new(program: ProgramHandle, targets: [FrameBufferTarget; 2]) -> Self {
        Self {
            program,
            targets,
            last_written: None,
        }
    }

    pub fn targets(&self) -> &[FrameBufferTarget; 2] {
        &self.targets
    }

    /// The most recently written blur buffer.
    pub fn blur_tex(&self) -> Option<TextureHandle> {
        self.last_written
            .and_then(|i| self.targets[i].attachment(AttachmentKind::Blur))
    }

    /// Blurs `input` guided by `normal` and returns the texture written.
    pub fn draw_to_buffer(
        &mut self,
        backend: &mut dyn RenderBackend,
        options: &PipelineOptions,
        input: TextureHandle,
        normal: TextureHandle,
    ) -> Result<TextureHandle> {
        let write = usize::from(self.targets[0].owns(input));
        let target = &self.targets[write];
        let output = target.require(AttachmentKind::Blur)?;
        let (width, height) = target.size();
        let desc = PassDescriptor::new(Self::LABEL, self.program, target_output(target))
            .bind_texture(0, input)
            .bind_texture(1, normal);

        let sharpness = options.blur.sharpness;
        run_pass(backend, &desc, |ctx| {
            let texel = Vec2::new(1.0 / width as f32, 1.0 / height as f32);
            ctx.set_uniform("texelSize", texel.into());
            ctx.set_uniform("sharpness", sharpness.into());
            ctx.draw_fullscreen()
        })?;

        self.last_written = Some(write);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conetrace_core::Viewport;
    use conetrace_render::RecordingBackend;

    fn setup(backend: &mut RecordingBackend) -> (BlurPass, TextureHandle, TextureHandle) {
        let options = PipelineOptions::default().with_target_size(8, 8);
        let program = BlurPass::load_program(backend).unwrap();
        let [a, b] = BlurPass::target_descs(&options).map(|d| backend.create_target(&d).unwrap());
        let source = backend
            .create_target(
                &TargetDesc::new("src", 8, 8)
                    .with_attachment(AttachmentKind::Indirect, AttachmentFormat::Rgba16Float)
                    .with_attachment(AttachmentKind::Normal, AttachmentFormat::Rgba16Float),
            )
            .unwrap();
        (
            BlurPass::new(program, [a, b]),
            source.attachment(AttachmentKind::Indirect).unwrap(),
            source.attachment(AttachmentKind::Normal).unwrap(),
        )
    }

    #[test]
    fn test_second_blur_reads_first_output() {
        let mut backend = RecordingBackend::new();
        let (mut blur, indirect, normal) = setup(&mut backend);
        let options = PipelineOptions::default();
        assert_eq!(blur.blur_tex(), None);

        backend.begin_frame(Viewport::new(8, 8)).unwrap();
        let first = blur.draw_to_buffer(&mut backend, &options, indirect, normal).unwrap();
        let second = blur.draw_to_buffer(&mut backend, &options, first, normal).unwrap();
        backend.end_frame().unwrap();

        assert_ne!(first, second);
        assert_eq!(blur.blur_tex(), Some(second));
        let passes: Vec<_> = backend.passes().collect();
        assert_eq!(passes[0].texture_at(0), Some(indirect));
        assert_eq!(passes[1].texture_at(0), Some(first));
        assert_eq!(passes[1].written_textures(), vec![second]);
    }

    #[test]
    fn test_blur_sends_texel_size() {
        let mut backend = RecordingBackend::new();
        let (mut blur, indirect, normal) = setup(&mut backend);
        backend.begin_frame(Viewport::new(8, 8)).unwrap();
        blur.draw_to_buffer(&mut backend, &PipelineOptions::default(), indirect, normal)
            .unwrap();
        backend.end_frame().unwrap();
        let uniforms = backend.uniforms_in_pass(BlurPass::LABEL);
        assert!(uniforms.contains(&("texelSize", Vec2::splat(0.125).into())));
    }
}
