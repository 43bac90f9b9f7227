//! A backend that records every command instead of touching a GPU.
//!
//! It enforces the same rules as the wgpu backend (one open pass at a time,
//! declared sampler slots, live handles, no feedback loops) so orchestration
//! code can be exercised and inspected headlessly.

use std::collections::{BTreeSet, HashMap, HashSet};

use conetrace_core::{
    BindingResource, BufferHandle, DrawContext, FrameBufferTarget, MeshData, MeshHandle,
    PassDescriptor, PassOutput, PipelineError, ProgramHandle, ProgramInterface, RenderBackend,
    Result, TargetDesc, TextureHandle, UniformValue, Vec3, VertexInput, Viewport, VolumeDesc,
    VolumeHandle,
};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateTarget {
        label: String,
        textures: Vec<TextureHandle>,
    },
    DestroyTarget {
        label: String,
    },
    CreateVolume {
        volume: VolumeHandle,
        resolution: u32,
        mip_levels: u32,
    },
    DestroyVolume(VolumeHandle),
    CreatePointBuffer {
        buffer: BufferHandle,
        label: String,
        count: u32,
    },
    DestroyBuffer(BufferHandle),
    UploadMesh {
        mesh: MeshHandle,
        label: String,
    },
    DestroyMesh(MeshHandle),
    BeginFrame(Viewport),
    BeginPass {
        program: String,
        pass: PassDescriptor,
    },
    SetUniform {
        name: String,
        value: UniformValue,
    },
    /// A uniform the active program does not declare.
    IgnoredUniform(String),
    DrawMesh(MeshHandle),
    DrawPoints {
        buffer: BufferHandle,
        count: u32,
    },
    DrawFullscreen,
    EndPass,
    ReleaseUnits(Vec<u32>),
    DisableUnitsFrom(u32),
    EndFrame,
    AbortFrame,
}

struct OpenPass {
    descriptor: PassDescriptor,
    program: usize,
}

/// Records commands and validates them against declared program interfaces.
#[derive(Default)]
pub struct RecordingBackend {
    commands: Vec<Command>,
    programs: Vec<(String, ProgramInterface)>,
    missing_programs: HashSet<String>,
    declared_overrides: HashMap<String, ProgramInterface>,
    failing_passes: HashSet<String>,
    failing_targets: HashSet<String>,
    next_id: u32,
    textures: HashSet<TextureHandle>,
    volumes: HashMap<VolumeHandle, u32>,
    buffers: HashMap<BufferHandle, u32>,
    meshes: HashSet<MeshHandle>,
    enabled_units: BTreeSet<u32>,
    in_frame: bool,
    open_pass: Option<OpenPass>,
}

impl RecordingBackend {
    /// Creates a backend where every program name resolves and declares
    /// exactly the interface its caller expects.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes lookups of `name` fail with `ProgramNotFound`.
    #[must_use]
    pub fn with_missing_program(mut self, name: &str) -> Self {
        self.missing_programs.insert(name.to_string());
        self
    }

    /// Makes `name` declare `interface` instead of mirroring the caller.
    #[must_use]
    pub fn with_program_interface(mut self, name: &str, interface: ProgramInterface) -> Self {
        self.declared_overrides.insert(name.to_string(), interface);
        self
    }

    /// Makes allocation of the target labelled `label` fail.
    #[must_use]
    pub fn with_failing_target(mut self, label: &str) -> Self {
        self.failing_targets.insert(label.to_string());
        self
    }

    /// Makes every pass labelled `label` fail when it begins.
    pub fn fail_pass(&mut self, label: &str) {
        self.failing_passes.insert(label.to_string());
    }

    /// Lets passes labelled `label` succeed again.
    pub fn clear_pass_failure(&mut self, label: &str) {
        self.failing_passes.remove(label);
    }

    /// Everything recorded so far.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Forgets recorded commands; live resources are kept.
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Labels of every pass begun, in order.
    pub fn pass_labels(&self) -> Vec<&str> {
        self.passes().map(|p| p.label.as_str()).collect()
    }

    /// Every pass descriptor begun, in order.
    pub fn passes(&self) -> impl Iterator<Item = &PassDescriptor> {
        self.commands.iter().filter_map(|c| match c {
            Command::BeginPass { pass, .. } => Some(pass),
            _ => None,
        })
    }

    /// Commands grouped per frame, from `BeginFrame` through `EndFrame` or
    /// `AbortFrame`.
    pub fn frames(&self) -> Vec<&[Command]> {
        let mut frames = Vec::new();
        let mut start = None;
        for (i, c) in self.commands.iter().enumerate() {
            match c {
                Command::BeginFrame(_) => start = Some(i),
                Command::EndFrame | Command::AbortFrame => {
                    if let Some(s) = start.take() {
                        frames.push(&self.commands[s..=i]);
                    }
                }
                _ => {}
            }
        }
        frames
    }

    /// Uniforms set during the first pass labelled `label`.
    pub fn uniforms_in_pass(&self, label: &str) -> Vec<(&str, UniformValue)> {
        let mut inside = false;
        let mut uniforms = Vec::new();
        for c in &self.commands {
            match c {
                Command::BeginPass { pass, .. } if pass.label == label => inside = true,
                Command::SetUniform { name, value } if inside => uniforms.push((name.as_str(), *value)),
                Command::EndPass if inside => break,
                _ => {}
            }
        }
        uniforms
    }

    /// Number of programs resolved.
    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    /// Name of a resolved program.
    pub fn program_name(&self, program: ProgramHandle) -> Option<&str> {
        self.programs
            .get(program.0 as usize)
            .map(|(name, _)| name.as_str())
    }

    /// Number of live textures, volumes, buffers and meshes.
    pub fn live_resource_count(&self) -> usize {
        self.textures.len() + self.volumes.len() + self.buffers.len() + self.meshes.len()
    }

    /// Number of live textures.
    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Whether a point buffer is live.
    pub fn is_buffer_live(&self, buffer: BufferHandle) -> bool {
        self.buffers.contains_key(&buffer)
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn check_live(&self, resource: BindingResource) -> Result<()> {
        match resource {
            BindingResource::Texture(t) if !self.textures.contains(&t) => {
                Err(PipelineError::UnknownHandle {
                    kind: "texture",
                    id: t.0,
                })
            }
            BindingResource::Volume { volume, mip } => match self.volumes.get(&volume) {
                None => Err(PipelineError::UnknownHandle {
                    kind: "volume",
                    id: volume.0,
                }),
                Some(&levels) if mip.is_some_and(|m| m >= levels) => Err(PipelineError::Backend(
                    format!("volume {} has no mip level {mip:?}", volume.0),
                )),
                Some(_) => Ok(()),
            },
            BindingResource::Texture(_) => Ok(()),
        }
    }

    fn open_program(&self) -> Result<&ProgramInterface> {
        let open = self.open_pass.as_ref().ok_or(PipelineError::PassNotOpen)?;
        Ok(&self.programs[open.program].1)
    }

    fn check_input(&self, input: VertexInput) -> Result<()> {
        let program = self.open_program()?;
        if program.vertex_input != input {
            return Err(PipelineError::Backend(format!(
                "program consumes {:?} input, draw provides {input:?}",
                program.vertex_input
            )));
        }
        Ok(())
    }
}

impl RenderBackend for RecordingBackend {
    fn program(&mut self, name: &str, interface: &ProgramInterface) -> Result<ProgramHandle> {
        if self.missing_programs.contains(name) {
            return Err(PipelineError::ProgramNotFound(name.to_string()));
        }
        interface
            .validate()
            .map_err(|reason| PipelineError::ProgramInterfaceMismatch {
                program: name.to_string(),
                reason,
            })?;
        let declared = self
            .declared_overrides
            .get(name)
            .cloned()
            .unwrap_or_else(|| interface.clone());
        interface
            .check_satisfied_by(&declared)
            .map_err(|reason| PipelineError::ProgramInterfaceMismatch {
                program: name.to_string(),
                reason,
            })?;

        let handle = ProgramHandle(self.programs.len() as u32);
        self.programs.push((name.to_string(), declared));
        Ok(handle)
    }

    fn create_target(&mut self, desc: &TargetDesc) -> Result<FrameBufferTarget> {
        desc.validate()?;
        if self.failing_targets.contains(&desc.label) {
            return Err(PipelineError::TargetAllocationFailed {
                target: desc.label.clone(),
                reason: "allocation refused".to_string(),
            });
        }
        let textures: Vec<TextureHandle> = desc
            .attachments
            .iter()
            .map(|_| TextureHandle(self.next_id()))
            .collect();
        self.textures.extend(textures.iter().copied());
        self.commands.push(Command::CreateTarget {
            label: desc.label.clone(),
            textures: textures.clone(),
        });
        FrameBufferTarget::from_parts(desc, textures)
    }

    fn destroy_target(&mut self, target: &FrameBufferTarget) {
        for t in target.textures() {
            self.textures.remove(&t);
        }
        self.commands.push(Command::DestroyTarget {
            label: target.label().to_string(),
        });
    }

    fn create_volume(&mut self, desc: &VolumeDesc) -> Result<VolumeHandle> {
        let volume = VolumeHandle(self.next_id());
        self.volumes.insert(volume, desc.mip_levels());
        self.commands.push(Command::CreateVolume {
            volume,
            resolution: desc.resolution(),
            mip_levels: desc.mip_levels(),
        });
        Ok(volume)
    }

    fn destroy_volume(&mut self, volume: VolumeHandle) {
        self.volumes.remove(&volume);
        self.commands.push(Command::DestroyVolume(volume));
    }

    fn create_point_buffer(&mut self, label: &str, points: &[Vec3]) -> Result<BufferHandle> {
        if points.is_empty() {
            return Err(PipelineError::BufferAllocationFailed {
                label: label.to_string(),
                reason: "no points".to_string(),
            });
        }
        let buffer = BufferHandle(self.next_id());
        let count = points.len() as u32;
        self.buffers.insert(buffer, count);
        self.commands.push(Command::CreatePointBuffer {
            buffer,
            label: label.to_string(),
            count,
        });
        Ok(buffer)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer);
        self.commands.push(Command::DestroyBuffer(buffer));
    }

    fn upload_mesh(&mut self, label: &str, mesh: &MeshData) -> Result<MeshHandle> {
        mesh.validate()
            .map_err(|reason| PipelineError::BufferAllocationFailed {
                label: label.to_string(),
                reason,
            })?;
        let handle = MeshHandle(self.next_id());
        self.meshes.insert(handle);
        self.commands.push(Command::UploadMesh {
            mesh: handle,
            label: label.to_string(),
        });
        Ok(handle)
    }

    fn destroy_mesh(&mut self, mesh: MeshHandle) {
        self.meshes.remove(&mesh);
        self.commands.push(Command::DestroyMesh(mesh));
    }

    fn begin_frame(&mut self, viewport: Viewport) -> Result<()> {
        if self.in_frame {
            return Err(PipelineError::Backend("frame already in progress".to_string()));
        }
        self.in_frame = true;
        self.commands.push(Command::BeginFrame(viewport));
        Ok(())
    }

    fn begin_pass(&mut self, pass: &PassDescriptor) -> Result<()> {
        if !self.in_frame {
            return Err(PipelineError::Backend("no frame in progress".to_string()));
        }
        if let Some(open) = &self.open_pass {
            return Err(PipelineError::PassAlreadyOpen(open.descriptor.label.clone()));
        }
        if self.failing_passes.contains(&pass.label) {
            return Err(PipelineError::Backend(format!("pass '{}' failed", pass.label)));
        }
        pass.validate()?;

        let program = pass.program.0 as usize;
        let (name, interface) = self.programs.get(program).ok_or(PipelineError::UnknownHandle {
            kind: "program",
            id: pass.program.0,
        })?;
        for binding in &pass.bindings {
            if interface.find_sampler(binding.slot).is_none() {
                return Err(PipelineError::ProgramInterfaceMismatch {
                    program: name.clone(),
                    reason: format!("pass '{}' binds undeclared slot {}", pass.label, binding.slot),
                });
            }
        }
        for sampler in &interface.samplers {
            if !pass.bindings.iter().any(|b| b.slot == sampler.slot) {
                return Err(PipelineError::ProgramInterfaceMismatch {
                    program: name.clone(),
                    reason: format!("pass '{}' leaves sampler '{}' unbound", pass.label, sampler.name),
                });
            }
        }
        let program_name = name.clone();
        for binding in &pass.bindings {
            self.check_live(binding.resource)?;
        }
        if let PassOutput::Target { color, depth } = &pass.output {
            for t in color.iter().chain(depth.iter()) {
                self.check_live(BindingResource::Texture(*t))?;
            }
        }

        self.enabled_units.extend(pass.slots());
        self.commands.push(Command::BeginPass {
            program: program_name,
            pass: pass.clone(),
        });
        self.open_pass = Some(OpenPass {
            descriptor: pass.clone(),
            program,
        });
        Ok(())
    }

    fn end_pass(&mut self) -> Result<()> {
        self.open_pass.take().ok_or(PipelineError::PassNotOpen)?;
        self.commands.push(Command::EndPass);
        Ok(())
    }

    fn release_texture_units(&mut self, slots: &[u32]) {
        for slot in slots {
            self.enabled_units.remove(slot);
        }
        self.commands.push(Command::ReleaseUnits(slots.to_vec()));
    }

    fn disable_texture_units_from(&mut self, first: u32) {
        self.enabled_units.retain(|&unit| unit < first);
        self.commands.push(Command::DisableUnitsFrom(first));
    }

    fn enabled_texture_units(&self) -> Vec<u32> {
        self.enabled_units.iter().copied().collect()
    }

    fn end_frame(&mut self) -> Result<()> {
        if let Some(open) = &self.open_pass {
            return Err(PipelineError::PassAlreadyOpen(open.descriptor.label.clone()));
        }
        if !self.in_frame {
            return Err(PipelineError::Backend("no frame in progress".to_string()));
        }
        self.in_frame = false;
        self.commands.push(Command::EndFrame);
        Ok(())
    }

    fn abort_frame(&mut self) {
        self.open_pass = None;
        self.in_frame = false;
        self.enabled_units.clear();
        self.commands.push(Command::AbortFrame);
    }

    fn draw_context(&mut self) -> &mut dyn DrawContext {
        self
    }
}

impl DrawContext for RecordingBackend {
    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        let declared = match self.open_program() {
            Ok(interface) => interface
                .find_uniform(name)
                .is_some_and(|u| u.ty == value.ty()),
            Err(_) => false,
        };
        if declared {
            self.commands.push(Command::SetUniform {
                name: name.to_string(),
                value,
            });
        } else {
            log::warn!("ignoring uniform '{name}': not declared by the active program");
            self.commands.push(Command::IgnoredUniform(name.to_string()));
        }
    }

    fn draw_mesh(&mut self, mesh: MeshHandle) -> Result<()> {
        self.check_input(VertexInput::Mesh)?;
        if !self.meshes.contains(&mesh) {
            return Err(PipelineError::UnknownHandle {
                kind: "mesh",
                id: mesh.0,
            });
        }
        self.commands.push(Command::DrawMesh(mesh));
        Ok(())
    }

    fn draw_points(&mut self, buffer: BufferHandle, count: u32) -> Result<()> {
        self.check_input(VertexInput::PointInstances)?;
        match self.buffers.get(&buffer) {
            None => Err(PipelineError::UnknownHandle {
                kind: "buffer",
                id: buffer.0,
            }),
            Some(&len) if count > len => Err(PipelineError::Backend(format!(
                "drawing {count} points from a buffer of {len}"
            ))),
            Some(_) => {
                self.commands.push(Command::DrawPoints { buffer, count });
                Ok(())
            }
        }
    }

    fn draw_fullscreen(&mut self) -> Result<()> {
        self.check_input(VertexInput::FullScreen)?;
        self.commands.push(Command::DrawFullscreen);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conetrace_core::{AttachmentFormat, AttachmentKind, OutputLayout, SamplerKind, UniformType};

    fn blur_interface() -> ProgramInterface {
        ProgramInterface::new(
            VertexInput::FullScreen,
            OutputLayout::Target {
                color: vec![AttachmentFormat::Rgba16Float],
                depth: None,
            },
        )
        .uniform("sharpness", UniformType::Float)
        .sampler(0, "inputTex", SamplerKind::Texture2d)
    }

    fn blur_target(backend: &mut RecordingBackend, label: &str) -> FrameBufferTarget {
        backend
            .create_target(
                &TargetDesc::new(label, 8, 8)
                    .with_attachment(AttachmentKind::Blur, AttachmentFormat::Rgba16Float),
            )
            .unwrap()
    }

    #[test]
    fn test_missing_program() {
        let mut backend = RecordingBackend::new().with_missing_program("Blur");
        assert!(matches!(
            backend.program("Blur", &blur_interface()),
            Err(PipelineError::ProgramNotFound(name)) if name == "Blur"
        ));
    }

    #[test]
    fn test_interface_override_mismatch() {
        let declared = blur_interface().uniform("extra", UniformType::Vec2);
        let mut backend = RecordingBackend::new()
            .with_program_interface("Blur", declared.clone());
        assert!(backend.program("Blur", &blur_interface()).is_ok());

        let mut backend = RecordingBackend::new().with_program_interface(
            "Blur",
            ProgramInterface::new(VertexInput::FullScreen, OutputLayout::Screen { depth: false }),
        );
        assert!(matches!(
            backend.program("Blur", &blur_interface()),
            Err(PipelineError::ProgramInterfaceMismatch { .. })
        ));
    }

    #[test]
    fn test_pass_records_and_tracks_units() {
        let mut backend = RecordingBackend::new();
        let program = backend.program("Blur", &blur_interface()).unwrap();
        let a = blur_target(&mut backend, "A");
        let b = blur_target(&mut backend, "B");
        let pass = PassDescriptor::new(
            "Blur",
            program,
            PassOutput::Target {
                color: b.color_textures(),
                depth: None,
            },
        )
        .bind_texture(0, a.color_textures()[0]);

        backend.begin_frame(Viewport::new(8, 8)).unwrap();
        backend.begin_pass(&pass).unwrap();
        backend.draw_context().set_uniform("sharpness", 2.0f32.into());
        backend.draw_context().set_uniform("unknown", 1.0f32.into());
        backend.draw_context().draw_fullscreen().unwrap();
        backend.end_pass().unwrap();
        assert_eq!(backend.enabled_texture_units(), vec![0]);
        backend.end_frame().unwrap();

        assert_eq!(backend.pass_labels(), vec!["Blur"]);
        assert_eq!(backend.uniforms_in_pass("Blur"), vec![("sharpness", UniformValue::Float(2.0))]);
        assert!(backend
            .commands()
            .contains(&Command::IgnoredUniform("unknown".to_string())));
        assert_eq!(backend.frames().len(), 1);
    }

    #[test]
    fn test_unbound_sampler_rejected() {
        let mut backend = RecordingBackend::new();
        let program = backend.program("Blur", &blur_interface()).unwrap();
        let b = blur_target(&mut backend, "B");
        let pass = PassDescriptor::new(
            "Blur",
            program,
            PassOutput::Target {
                color: b.color_textures(),
                depth: None,
            },
        );
        backend.begin_frame(Viewport::new(8, 8)).unwrap();
        assert!(matches!(
            backend.begin_pass(&pass),
            Err(PipelineError::ProgramInterfaceMismatch { .. })
        ));
    }

    #[test]
    fn test_destroyed_texture_is_unknown() {
        let mut backend = RecordingBackend::new();
        let program = backend.program("Blur", &blur_interface()).unwrap();
        let a = blur_target(&mut backend, "A");
        let b = blur_target(&mut backend, "B");
        backend.destroy_target(&a);
        let pass = PassDescriptor::new(
            "Blur",
            program,
            PassOutput::Target {
                color: b.color_textures(),
                depth: None,
            },
        )
        .bind_texture(0, a.color_textures()[0]);
        backend.begin_frame(Viewport::new(8, 8)).unwrap();
        assert!(matches!(
            backend.begin_pass(&pass),
            Err(PipelineError::UnknownHandle { kind: "texture", .. })
        ));
    }

    #[test]
    fn test_draw_outside_pass_fails() {
        let mut backend = RecordingBackend::new();
        assert!(matches!(
            backend.draw_context().draw_fullscreen(),
            Err(PipelineError::PassNotOpen)
        ));
        assert!(backend.end_pass().is_err());
    }

    #[test]
    fn test_abort_clears_state() {
        let mut backend = RecordingBackend::new();
        let program = backend.program("Blur", &blur_interface()).unwrap();
        let a = blur_target(&mut backend, "A");
        let b = blur_target(&mut backend, "B");
        let pass = PassDescriptor::new(
            "Blur",
            program,
            PassOutput::Target {
                color: b.color_textures(),
                depth: None,
            },
        )
        .bind_texture(0, a.color_textures()[0]);
        backend.begin_frame(Viewport::new(8, 8)).unwrap();
        backend.begin_pass(&pass).unwrap();
        backend.abort_frame();
        assert!(backend.enabled_texture_units().is_empty());
        assert!(backend.begin_frame(Viewport::new(8, 8)).is_ok());
    }
}
