//! Single lit pass straight to the screen.

use conetrace_core::{
    CameraRig, OutputLayout, PassDescriptor, PassOutput, ProgramHandle, ProgramInterface,
    RenderBackend, Result, Scene, UniformType, VertexInput,
};

use super::{lookup, run_pass, send_camera, with_camera_uniforms, with_material_uniforms};
use crate::context::RenderContext;

/// Shades the grid and the scene with one lit program; no intermediate
/// buffers are read or written.
pub struct ForwardPass {
    program: ProgramHandle,
}

impl ForwardPass {
    pub const LABEL: &'static str = "Forward";
    pub const PROGRAM: &'static str = "Basic";

    pub fn interface() -> ProgramInterface {
        with_material_uniforms(with_camera_uniforms(ProgramInterface::new(
            VertexInput::Mesh,
            OutputLayout::Screen { depth: true },
        )))
        .uniform("light.direction", UniformType::Vec3)
        .uniform("light.color", UniformType::Vec3)
        .uniform("light.ambient", UniformType::Float)
        .uniform("light.diffuse", UniformType::Float)
        .uniform("curveGeometry", UniformType::Bool)
        .uniform("inverseCameraMatrix", UniformType::Mat4)
        .uniform("cameraPos", UniformType::Vec3)
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
        scene: &dyn Scene,
    ) -> Result<()> {
        let frame = context.view.begin_3d(camera);
        let desc = PassDescriptor::new(Self::LABEL, self.program, PassOutput::Screen)
            .with_clear_color(Some(context.options().clear_rgba()));

        let context = &*context;
        let light = context.options().light;
        run_pass(backend, &desc, |ctx| {
            ctx.set_uniform("light.direction", light.direction.into());
            ctx.set_uniform("light.color", light.color.into());
            ctx.set_uniform("light.ambient", light.ambient.into());
            ctx.set_uniform("light.diffuse", light.diffuse.into());
            send_camera(ctx, &frame);
            ctx.set_uniform("curveGeometry", false.into());
            ctx.set_uniform("inverseCameraMatrix", frame.inverse_camera().into());
            ctx.set_uniform("cameraPos", frame.eye.into());
            context.draw_grid(ctx)?;
            scene.draw(ctx, Self::PROGRAM)
        })
    }
}
