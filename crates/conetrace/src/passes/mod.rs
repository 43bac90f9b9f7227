//! Render passes.
//!
//! Each pass owns its program handle and the fixed-resolution target it
//! writes. Passes receive every input attachment as an argument, so the data
//! flow of a frame is visible in the controller's call sequence.

mod blur;
mod composite;
mod direct_light;
mod forward;
mod gbuffer;
mod indirect;
mod present;
mod reflection;
mod voxel_debug;

pub use blur::BlurPass;
pub use composite::{CompositeInputs, CompositePass};
pub use direct_light::DirectLightPass;
pub use forward::ForwardPass;
pub use gbuffer::GBufferPass;
pub use indirect::IndirectLightPass;
pub use present::PresentPass;
pub use reflection::ReflectionPass;
pub use voxel_debug::{VoxelDebugPass, VOXELMAP_SLOT};

use conetrace_core::{
    AttachmentDesc, DrawContext, FrameBufferTarget, FrameMatrices, OutputLayout, PassDescriptor,
    PassOutput, PipelineError, PipelineOptions, ProgramHandle, ProgramInterface, RenderBackend,
    Result, TargetDesc, UniformType,
};

/// Applies `desc`, runs `draw` inside the pass and tears the bindings down.
///
/// On error the pass is left open; the controller aborts the frame.
pub(crate) fn run_pass<F>(
    backend: &mut dyn RenderBackend,
    desc: &PassDescriptor,
    draw: F,
) -> Result<()>
where
    F: FnOnce(&mut dyn DrawContext) -> Result<()>,
{
    backend.begin_pass(desc)?;
    draw(backend.draw_context())?;
    backend.end_pass()?;
    backend.release_texture_units(&desc.slots());
    Ok(())
}

/// Describes a target at the configured resolution.
pub(crate) fn target_desc(
    label: &str,
    options: &PipelineOptions,
    attachments: &[AttachmentDesc],
) -> TargetDesc {
    attachments.iter().fold(
        TargetDesc::new(label, options.target_width, options.target_height),
        |desc, a| desc.with_attachment(a.kind, a.format),
    )
}

/// Output layout a program needs to render into `attachments`.
pub(crate) fn target_layout(attachments: &[AttachmentDesc]) -> OutputLayout {
    OutputLayout::Target {
        color: attachments
            .iter()
            .filter(|a| !a.format.is_depth())
            .map(|a| a.format)
            .collect(),
        depth: attachments
            .iter()
            .find(|a| a.format.is_depth())
            .map(|a| a.format),
    }
}

/// Pass output writing every attachment of `target`.
pub(crate) fn target_output(target: &FrameBufferTarget) -> PassOutput {
    PassOutput::Target {
        color: target.color_textures(),
        depth: target.depth_texture(),
    }
}

/// Declares the camera matrices every 3D program reads.
pub(crate) fn with_camera_uniforms(interface: ProgramInterface) -> ProgramInterface {
    interface
        .uniform("projectionMatrix", UniformType::Mat4)
        .uniform("modelviewMatrix", UniformType::Mat4)
}

/// Declares the per-object material uniforms scene objects send.
pub(crate) fn with_material_uniforms(interface: ProgramInterface) -> ProgramInterface {
    interface
        .uniform("modelMatrix", UniformType::Mat4)
        .uniform("material.diffuse", UniformType::Vec3)
        .uniform("material.specular", UniformType::Vec3)
        .uniform("material.glow", UniformType::Float)
}

/// Sends the projection and modelview matrices.
pub(crate) fn send_camera(ctx: &mut dyn DrawContext, frame: &FrameMatrices) {
    ctx.set_uniform("projectionMatrix", frame.projection.into());
    ctx.set_uniform("modelviewMatrix", frame.view.into());
}

/// Looks up a pass program, logging which pass needed it on failure.
pub(crate) fn lookup(
    backend: &mut dyn RenderBackend,
    name: &str,
    interface: &ProgramInterface,
) -> Result<ProgramHandle> {
    backend.program(name, interface).map_err(|e| {
        log::error!("program '{name}' unavailable: {e}");
        e
    })
}

/// Creates every target in `descs`, releasing the ones already created if a
/// later allocation fails.
pub(crate) fn create_targets<const N: usize>(
    backend: &mut dyn RenderBackend,
    descs: [TargetDesc; N],
) -> Result<[FrameBufferTarget; N]> {
    let mut created = Vec::with_capacity(N);
    for desc in &descs {
        match backend.create_target(desc) {
            Ok(target) => {
                log::info!(
                    "allocated target '{}' ({}x{}, {} attachments)",
                    desc.label,
                    desc.width,
                    desc.height,
                    desc.attachments.len()
                );
                created.push(target);
            }
            Err(e) => {
                for target in &created {
                    backend.destroy_target(target);
                }
                return Err(e);
            }
        }
    }
    created.try_into().map_err(|_: Vec<FrameBufferTarget>| {
        PipelineError::Backend("target count mismatch".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use conetrace_core::{AttachmentFormat, AttachmentKind};
    use conetrace_render::{Command, RecordingBackend};

    fn desc(label: &str) -> TargetDesc {
        TargetDesc::new(label, 4, 4)
            .with_attachment(AttachmentKind::Blur, AttachmentFormat::Rgba16Float)
    }

    #[test]
    fn test_create_targets_in_order() {
        let mut backend = RecordingBackend::new();
        let [a, b] = create_targets(&mut backend, [desc("A"), desc("B")]).unwrap();
        assert_eq!(a.label(), "A");
        assert_eq!(b.label(), "B");
        assert_eq!(backend.live_texture_count(), 2);
    }

    #[test]
    fn test_failed_allocation_releases_earlier_targets() {
        let mut backend = RecordingBackend::new().with_failing_target("B");
        let result = create_targets(&mut backend, [desc("A"), desc("B"), desc("C")]);
        assert!(matches!(
            result,
            Err(PipelineError::TargetAllocationFailed { target, .. }) if target == "B"
        ));
        assert_eq!(backend.live_texture_count(), 0);
        assert!(backend
            .commands()
            .contains(&Command::DestroyTarget { label: "A".to_string() }));
    }

    #[test]
    fn test_target_layout_splits_depth() {
        let attachments = [
            AttachmentDesc::new(AttachmentKind::Depth, AttachmentFormat::Depth32Float),
            AttachmentDesc::new(AttachmentKind::Blur, AttachmentFormat::Rgba16Float),
        ];
        let desc = target_desc("G", &PipelineOptions::default(), &attachments);
        assert_eq!((desc.width, desc.height), (1280, 720));
        assert_eq!(desc.attachments.len(), 2);
        assert_eq!(
            target_layout(&attachments),
            OutputLayout::Target {
                color: vec![AttachmentFormat::Rgba16Float],
                depth: Some(AttachmentFormat::Depth32Float),
            }
        );
    }
}
