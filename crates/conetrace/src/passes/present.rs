//! Full-screen blit of the selected channel.

use conetrace_core::{
    FrameMatrices, OutputLayout, PassDescriptor, PassOutput, ProgramHandle, ProgramInterface,
    RenderBackend, Result, SamplerKind, TextureHandle, VertexInput,
};

use super::{lookup, run_pass, send_camera, with_camera_uniforms};

/// Draws one attachment over the whole viewport through unit 0.
pub struct PresentPass {
    program: ProgramHandle,
}

impl PresentPass {
    pub const LABEL: &'static str = "Present";
    pub const PROGRAM: &'static str = "Screen";

    pub fn interface() -> ProgramInterface {
        with_camera_uniforms(ProgramInterface::new(
            VertexInput::FullScreen,
            OutputLayout::Screen { depth: false },
        ))
        .sampler(0, "screenTexture", SamplerKind::Texture2d)
    }

    pub fn load_program(backend: &mut dyn RenderBackend) -> Result<ProgramHandle> {
        lookup(backend, Self::PROGRAM, &Self::interface())
    }

    pub fn new(program: ProgramHandle) -> Self {
        Self { program }
    }

    /// Clears the screen to `clear_color` and blits `texture` with the
    /// orthographic matrices in `frame`.
    pub fn draw(
        &self,
        backend: &mut dyn RenderBackend,
        frame: &FrameMatrices,
        texture: TextureHandle,
        clear_color: [f32; 4],
    ) -> Result<()> {
        let desc = PassDescriptor::new(Self::LABEL, self.program, PassOutput::Screen)
            .bind_texture(0, texture)
            .with_clear_color(Some(clear_color));
        run_pass(backend, &desc, |ctx| {
            send_camera(ctx, frame);
            ctx.draw_fullscreen()
        })
    }
}
