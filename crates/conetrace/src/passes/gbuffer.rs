//! Geometry pass filling the multi-attachment G-buffer.

use conetrace_core::{
    AttachmentDesc, AttachmentFormat, AttachmentKind, CameraRig, FrameBufferTarget,
    PassDescriptor, PipelineOptions, ProgramHandle, ProgramInterface, RenderBackend, Result, Scene,
    TargetDesc, UniformType, VertexInput,
};

use super::{
    lookup, run_pass, send_camera, target_desc, target_layout, target_output,
    with_camera_uniforms, with_material_uniforms,
};
use crate::context::RenderContext;

/// G-buffer attachments in color-output order.
const ATTACHMENTS: [AttachmentDesc; 6] = [
    AttachmentDesc::new(AttachmentKind::Color, AttachmentFormat::Rgba8Unorm),
    AttachmentDesc::new(AttachmentKind::Normal, AttachmentFormat::Rgba16Float),
    AttachmentDesc::new(AttachmentKind::Glow, AttachmentFormat::Rgba8Unorm),
    AttachmentDesc::new(AttachmentKind::Tangent, AttachmentFormat::Rgba16Float),
    AttachmentDesc::new(AttachmentKind::Bitangent, AttachmentFormat::Rgba16Float),
    AttachmentDesc::new(AttachmentKind::Depth, AttachmentFormat::Depth32Float),
];

/// Rasterizes the grid and every opaque scene object into all G-buffer
/// attachments at once.
pub struct GBufferPass {
    program: ProgramHandle,
    target: FrameBufferTarget,
}

impl GBufferPass {
    pub const LABEL: &'static str = "GBuffer";
    pub const PROGRAM: &'static str = "GBuffer";

    /// Interface the G-buffer program must declare.
    pub fn interface() -> ProgramInterface {
        with_material_uniforms(with_camera_uniforms(ProgramInterface::new(
            VertexInput::Mesh,
            target_layout(&ATTACHMENTS),
        )))
        .uniform("normalMatrix", UniformType::Mat3)
    }

    /// Looks up and validates the G-buffer program.
    pub fn load_program(backend: &mut dyn RenderBackend) -> Result<ProgramHandle> {
        lookup(backend, Self::PROGRAM, &Self::interface())
    }

    /// The G-buffer target description.
    pub fn target_desc(options: &PipelineOptions) -> TargetDesc {
        target_desc(Self::LABEL, options, &ATTACHMENTS)
    }

    pub fn new(program: ProgramHandle, target: FrameBufferTarget) -> Self {
        Self { program, target }
    }

    /// The G-buffer.
    pub fn target(&self) -> &FrameBufferTarget {
        &self.target
    }

    /// Overwrites every attachment with this frame's geometry.
    pub fn draw_to_buffer(
        &self,
        backend: &mut dyn RenderBackend,
        context: &mut RenderContext,
        camera: &dyn CameraRig,
        scene: &dyn Scene,
    ) -> Result<()> {
        let frame = context.view.begin_3d(camera);
        let desc = PassDescriptor::new(Self::LABEL, self.program, target_output(&self.target))
            .with_clear_color(Some(context.options().clear_rgba()));

        let context = &*context;
        run_pass(backend, &desc, |ctx| {
            send_camera(ctx, &frame);
            ctx.set_uniform("normalMatrix", frame.normal.into());
            context.draw_grid(ctx)?;
            scene.draw(ctx, Self::PROGRAM)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gbuffer_writes_five_colors_and_depth() {
        let desc = GBufferPass::target_desc(&PipelineOptions::default());
        assert!(desc.validate().is_ok());
        assert_eq!(desc.color_formats().len(), 5);
        assert_eq!(desc.depth_format(), Some(AttachmentFormat::Depth32Float));
        assert!(GBufferPass::interface().validate().is_ok());
        assert!(GBufferPass::interface().find_uniform("normalMatrix").is_some());
    }
}
