//! Headless wgpu backend integration tests.
//!
//! These tests require a GPU adapter (real or software fallback). Without
//! one they print a note and return early.

use conetrace_core::{
    AttachmentFormat, AttachmentKind, OutputLayout, PassDescriptor, PassOutput, PipelineError,
    ProgramInterface, RenderBackend, TargetDesc, UniformType, Vec4, VertexInput, Viewport,
};
use conetrace_render::{ProgramSource, WgpuBackend};

const FILL_WGSL: &str = r"
struct Params {
    color: vec4<f32>,
};

@group(0) @binding(0) var<uniform> params: Params;

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    let x = f32((index << 1u) & 2u) * 2.0 - 1.0;
    let y = f32(index & 2u) * 2.0 - 1.0;
    return vec4<f32>(x, y, 0.0, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return params.color;
}
";

fn fill_interface() -> ProgramInterface {
    ProgramInterface::new(VertexInput::FullScreen, OutputLayout::Screen { depth: false })
        .uniform("color", UniformType::Vec4)
}

fn backend(width: u32, height: u32) -> Option<WgpuBackend> {
    match pollster::block_on(WgpuBackend::new_headless(width, height)) {
        Ok(backend) => Some(backend),
        Err(e) => {
            eprintln!("Skipping headless tests: no GPU adapter available ({e})");
            None
        }
    }
}

#[test]
fn headless_backend_tests() {
    let Some(mut backend) = backend(64, 48) else {
        return;
    };

    // --- Missing programs are reported by name ---
    {
        let result = backend.program("Nope", &fill_interface());
        assert!(matches!(result, Err(PipelineError::ProgramNotFound(name)) if name == "Nope"));
    }

    // --- Broken WGSL surfaces as a compilation failure ---
    {
        backend.register_program(ProgramSource::new("Broken", "fn vs_main( {"));
        let result = backend.program("Broken", &fill_interface());
        assert!(matches!(
            result,
            Err(PipelineError::ShaderCompilationFailed { .. })
        ));
    }

    // --- A declared interface that lacks a uniform is rejected ---
    {
        let declared =
            ProgramInterface::new(VertexInput::FullScreen, OutputLayout::Screen { depth: false });
        backend.register_program(ProgramSource::new("Bare", FILL_WGSL).with_interface(declared));
        let result = backend.program("Bare", &fill_interface());
        assert!(matches!(
            result,
            Err(PipelineError::ProgramInterfaceMismatch { .. })
        ));
    }

    // --- Full-screen fill reaches the screen ---
    {
        backend.register_program(ProgramSource::new("Fill", FILL_WGSL));
        let program = backend
            .program("Fill", &fill_interface())
            .expect("fill program should compile");

        backend.begin_frame(Viewport::new(64, 48)).unwrap();
        backend
            .begin_pass(&PassDescriptor::new("Fill", program, PassOutput::Screen))
            .unwrap();
        let ctx = backend.draw_context();
        ctx.set_uniform("color", Vec4::new(1.0, 0.0, 0.0, 1.0).into());
        ctx.set_uniform("undeclared", 1.0f32.into());
        ctx.draw_fullscreen().unwrap();
        backend.end_pass().unwrap();
        backend.end_frame().unwrap();

        let pixels = backend.read_screen().unwrap();
        assert_eq!(pixels.len(), 64 * 48 * 4);
        assert!(pixels.chunks(4).all(|px| px == [255, 0, 0, 255]));
    }

    // --- Targets allocate one texture per attachment ---
    {
        let desc = TargetDesc::new("Blur A", 32, 32)
            .with_attachment(AttachmentKind::Blur, AttachmentFormat::Rgba16Float);
        let target = backend.create_target(&desc).unwrap();
        let texture = target.require(AttachmentKind::Blur).unwrap();
        assert!(backend.texture(texture).is_some());
        backend.destroy_target(&target);
        assert!(backend.texture(texture).is_none());
    }

    // --- An aborted frame leaves the backend ready for the next one ---
    {
        backend.begin_frame(Viewport::new(64, 48)).unwrap();
        backend.abort_frame();
        assert!(backend.enabled_texture_units().is_empty());
        backend.begin_frame(Viewport::new(64, 48)).unwrap();
        backend.end_frame().unwrap();
    }

    // --- Resizing reallocates the offscreen screen ---
    {
        backend.resize_surface(32, 16);
        assert_eq!(backend.surface_size(), (32, 16));
        assert_eq!(backend.read_screen().unwrap().len(), 32 * 16 * 4);
    }
}
