//! Pass recording.
//!
//! Draws issued while a pass is open are recorded together with a snapshot of
//! the uniform block. The wgpu render pass is encoded in one go when the pass
//! ends, with every snapshot packed into a single dynamically-offset uniform
//! buffer.

use std::num::NonZeroU64;

use wgpu::util::DeviceExt;

use conetrace_core::{
    BindingResource, BufferHandle, DrawContext, MeshHandle, OutputLayout, PassDescriptor,
    PassOutput, PipelineError, Result, SamplerKind, TextureHandle, Topology, UniformValue,
    VertexInput,
};

use super::WgpuBackend;
use crate::uniforms::{UniformBlock, UniformWriteError};
use crate::vertex::POINT_QUAD_VERTICES;

#[derive(Debug, Clone, Copy)]
enum DrawKind {
    Mesh(MeshHandle),
    Points { buffer: BufferHandle, count: u32 },
    Fullscreen,
}

struct PendingDraw {
    uniforms: Vec<u8>,
    kind: DrawKind,
}

/// A pass that has begun but not yet been encoded.
pub(super) struct PendingPass {
    descriptor: PassDescriptor,
    program: usize,
    block: UniformBlock,
    draws: Vec<PendingDraw>,
}

impl PendingPass {
    pub fn label(&self) -> &str {
        &self.descriptor.label
    }
}

impl WgpuBackend {
    pub(super) fn open_pass(&mut self, pass: &PassDescriptor) -> Result<()> {
        if self.frame.is_none() {
            return Err(PipelineError::Backend("no frame in progress".to_string()));
        }
        if let Some(open) = &self.pending {
            return Err(PipelineError::PassAlreadyOpen(open.label().to_string()));
        }
        pass.validate()?;

        let index = pass.program.0 as usize;
        let program = self.programs.get(index).ok_or(PipelineError::UnknownHandle {
            kind: "program",
            id: pass.program.0,
        })?;
        let mismatch = |reason: String| PipelineError::ProgramInterfaceMismatch {
            program: program.name.clone(),
            reason,
        };

        for sampler in &program.interface.samplers {
            let binding = pass
                .bindings
                .iter()
                .find(|b| b.slot == sampler.slot)
                .ok_or_else(|| {
                    mismatch(format!(
                        "pass '{}' leaves sampler '{}' unbound",
                        pass.label, sampler.name
                    ))
                })?;
            self.check_binding(sampler.kind, binding.resource)
                .map_err(|reason| mismatch(format!("pass '{}': {reason}", pass.label)))?;
        }
        for binding in &pass.bindings {
            if program.interface.find_sampler(binding.slot).is_none() {
                return Err(mismatch(format!(
                    "pass '{}' binds undeclared slot {}",
                    pass.label, binding.slot
                )));
            }
        }

        match (&pass.output, &program.interface.output) {
            (
                PassOutput::Target { color, depth },
                OutputLayout::Target {
                    color: formats,
                    depth: depth_format,
                },
            ) => {
                let mut actual = Vec::with_capacity(color.len());
                for texture in color {
                    actual.push(self.texture_entry(*texture)?.format);
                }
                if actual != *formats {
                    return Err(mismatch(format!(
                        "pass '{}' writes {actual:?}, program outputs {formats:?}",
                        pass.label
                    )));
                }
                let actual_depth = match depth {
                    Some(texture) => Some(self.texture_entry(*texture)?.format),
                    None => None,
                };
                if actual_depth != *depth_format {
                    return Err(mismatch(format!(
                        "pass '{}' depth {actual_depth:?}, program expects {depth_format:?}",
                        pass.label
                    )));
                }
            }
            (PassOutput::Screen, OutputLayout::Screen { .. }) => {}
            _ => {
                return Err(mismatch(format!(
                    "pass '{}' output does not match the program's output layout",
                    pass.label
                )))
            }
        }

        let block = UniformBlock::new(program.uniform_layout.clone());
        self.enabled_units.extend(pass.slots());
        self.pending = Some(PendingPass {
            descriptor: pass.clone(),
            program: index,
            block,
            draws: Vec::new(),
        });
        Ok(())
    }

    fn check_binding(
        &self,
        kind: SamplerKind,
        resource: BindingResource,
    ) -> std::result::Result<(), String> {
        match (kind, resource) {
            (SamplerKind::Texture2d | SamplerKind::Depth2d, BindingResource::Texture(texture)) => {
                let entry = self
                    .textures
                    .get(&texture)
                    .ok_or_else(|| format!("unknown texture {}", texture.0))?;
                let is_depth = kind == SamplerKind::Depth2d;
                if entry.format.is_depth() != is_depth {
                    return Err(format!("texture {} has format {:?}", texture.0, entry.format));
                }
                Ok(())
            }
            (SamplerKind::Volume3d, BindingResource::Volume { volume, mip }) => {
                let entry = self
                    .volumes
                    .get(&volume)
                    .ok_or_else(|| format!("unknown volume {}", volume.0))?;
                match mip {
                    Some(level) if level >= entry.mip_levels => {
                        Err(format!("volume {} has no mip level {level}", volume.0))
                    }
                    _ => Ok(()),
                }
            }
            (kind, resource) => Err(format!("{kind:?} slot cannot bind {resource:?}")),
        }
    }

    fn texture_entry(&self, texture: TextureHandle) -> Result<&super::resources::GpuTexture> {
        self.textures.get(&texture).ok_or(PipelineError::UnknownHandle {
            kind: "texture",
            id: texture.0,
        })
    }

    fn binding_view(&self, resource: BindingResource) -> Result<wgpu::TextureView> {
        match resource {
            BindingResource::Texture(texture) => Ok(self
                .texture_entry(texture)?
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default())),
            BindingResource::Volume { volume, mip } => {
                let entry = self.volumes.get(&volume).ok_or(PipelineError::UnknownHandle {
                    kind: "volume",
                    id: volume.0,
                })?;
                let (base_mip_level, mip_level_count) = match mip {
                    Some(level) => (level, Some(1)),
                    None => (0, None),
                };
                Ok(entry.texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some("voxel volume view"),
                    dimension: Some(wgpu::TextureViewDimension::D3),
                    base_mip_level,
                    mip_level_count,
                    ..Default::default()
                }))
            }
        }
    }

    pub(super) fn finish_pass(&mut self) -> Result<()> {
        let pending = self.pending.take().ok_or(PipelineError::PassNotOpen)?;
        let program = &self.programs[pending.program];
        let descriptor = &pending.descriptor;

        let block_size = u64::from(program.uniform_layout.size());
        let alignment = u64::from(self.device.limits().min_uniform_buffer_offset_alignment);
        let stride = block_size.next_multiple_of(alignment);
        let mut contents = vec![0u8; (stride * pending.draws.len().max(1) as u64) as usize];
        for (i, draw) in pending.draws.iter().enumerate() {
            let start = i * stride as usize;
            contents[start..start + draw.uniforms.len()].copy_from_slice(&draw.uniforms);
        }
        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&descriptor.label),
                contents: &contents,
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let uniform_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&descriptor.label),
            layout: &program.uniform_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &uniform_buffer,
                    offset: 0,
                    size: NonZeroU64::new(block_size),
                }),
            }],
        });

        let mut views = Vec::with_capacity(descriptor.bindings.len());
        for binding in &descriptor.bindings {
            views.push((binding.slot + 1, self.binding_view(binding.resource)?));
        }
        let texture_group = program.texture_group_layout.as_ref().map(|layout| {
            let mut entries = vec![wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            }];
            entries.extend(views.iter().map(|(binding, view)| wgpu::BindGroupEntry {
                binding: *binding,
                resource: wgpu::BindingResource::TextureView(view),
            }));
            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&descriptor.label),
                layout,
                entries: &entries,
            })
        });

        let (target_views, target_depth) = match &descriptor.output {
            PassOutput::Target { color, depth } => {
                let mut color_views = Vec::with_capacity(color.len());
                for texture in color {
                    color_views.push(self.binding_view(BindingResource::Texture(*texture))?);
                }
                let depth_view = match depth {
                    Some(texture) => Some(self.binding_view(BindingResource::Texture(*texture))?),
                    None => None,
                };
                (color_views, depth_view)
            }
            PassOutput::Screen => (Vec::new(), None),
        };

        let (color_load, depth_load) = match descriptor.clear_color {
            Some([r, g, b, a]) => (
                wgpu::LoadOp::Clear(wgpu::Color {
                    r: f64::from(r),
                    g: f64::from(g),
                    b: f64::from(b),
                    a: f64::from(a),
                }),
                wgpu::LoadOp::Clear(1.0),
            ),
            None => (wgpu::LoadOp::Load, wgpu::LoadOp::Load),
        };

        let surface_size = (self.surface_config.width, self.surface_config.height);
        let frame = self
            .frame
            .as_mut()
            .ok_or_else(|| PipelineError::Backend("no frame in progress".to_string()))?;

        let (color_targets, depth_target): (Vec<&wgpu::TextureView>, Option<&wgpu::TextureView>) =
            match descriptor.output {
                PassOutput::Target { .. } => (target_views.iter().collect(), target_depth.as_ref()),
                PassOutput::Screen => (
                    vec![&frame.screen_view],
                    program
                        .uses_screen_depth()
                        .then_some(&self.screen_depth_view),
                ),
            };
        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = color_targets
            .into_iter()
            .map(|view| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect();

        let mut render_pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&descriptor.label),
            color_attachments: &color_attachments,
            depth_stencil_attachment: depth_target.map(|view| {
                wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }
            }),
            ..Default::default()
        });

        if descriptor.output == PassOutput::Screen {
            let viewport = frame.viewport;
            let x = u32::try_from(viewport.x).unwrap_or(0).min(surface_size.0);
            let y = u32::try_from(viewport.y).unwrap_or(0).min(surface_size.1);
            let width = viewport.width.min(surface_size.0 - x);
            let height = viewport.height.min(surface_size.1 - y);
            if width > 0 && height > 0 {
                render_pass.set_viewport(
                    x as f32,
                    y as f32,
                    width as f32,
                    height as f32,
                    0.0,
                    1.0,
                );
            }
        }

        for (i, draw) in pending.draws.iter().enumerate() {
            let offset = (i as u64 * stride) as u32;
            render_pass.set_bind_group(0, &uniform_group, &[offset]);
            if let Some(group) = &texture_group {
                render_pass.set_bind_group(1, group, &[]);
            }

            match draw.kind {
                DrawKind::Mesh(handle) => {
                    let Some(mesh) = self.meshes.get(&handle) else {
                        log::warn!("mesh {} was destroyed before its pass ended", handle.0);
                        continue;
                    };
                    render_pass.set_pipeline(program.pipeline(mesh.topology));
                    render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                    match &mesh.index_buffer {
                        Some(indices) => {
                            render_pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                            render_pass.draw_indexed(0..mesh.element_count, 0, 0..1);
                        }
                        None => render_pass.draw(0..mesh.element_count, 0..1),
                    }
                }
                DrawKind::Points { buffer, count } => {
                    let Some(points) = self.points.get(&buffer) else {
                        log::warn!("point buffer {} was destroyed before its pass ended", buffer.0);
                        continue;
                    };
                    render_pass.set_pipeline(program.pipeline(Topology::Triangles));
                    render_pass.set_vertex_buffer(0, points.buffer.slice(..));
                    render_pass.draw(0..POINT_QUAD_VERTICES, 0..count);
                }
                DrawKind::Fullscreen => {
                    render_pass.set_pipeline(program.pipeline(Topology::Triangles));
                    render_pass.draw(0..3, 0..1);
                }
            }
        }

        log::trace!(
            "encoded pass '{}' with program '{}' ({} draws)",
            descriptor.label,
            program.name,
            pending.draws.len()
        );
        Ok(())
    }

    fn record_draw(&mut self, kind: DrawKind, expected: VertexInput) -> Result<()> {
        let pending = self.pending.as_mut().ok_or(PipelineError::PassNotOpen)?;
        let program = &self.programs[pending.program];
        if program.interface.vertex_input != expected {
            return Err(PipelineError::Backend(format!(
                "program '{}' consumes {:?} input, draw provides {expected:?}",
                program.name, program.interface.vertex_input
            )));
        }
        pending.draws.push(PendingDraw {
            uniforms: pending.block.bytes().to_vec(),
            kind,
        });
        Ok(())
    }
}

impl DrawContext for WgpuBackend {
    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        let Some(pending) = self.pending.as_mut() else {
            log::warn!("ignoring uniform '{name}': no pass is open");
            return;
        };
        let program = &self.programs[pending.program].name;
        match pending.block.set(name, value) {
            Ok(()) => {}
            Err(UniformWriteError::Undeclared) => {
                log::warn!("ignoring uniform '{name}': not declared by program '{program}'");
            }
            Err(UniformWriteError::TypeMismatch { declared }) => {
                log::warn!(
                    "ignoring uniform '{name}': program '{program}' declares {declared:?}, got {:?}",
                    value.ty()
                );
            }
        }
    }

    fn draw_mesh(&mut self, mesh: MeshHandle) -> Result<()> {
        if !self.meshes.contains_key(&mesh) {
            return Err(PipelineError::UnknownHandle {
                kind: "mesh",
                id: mesh.0,
            });
        }
        self.record_draw(DrawKind::Mesh(mesh), VertexInput::Mesh)
    }

    fn draw_points(&mut self, buffer: BufferHandle, count: u32) -> Result<()> {
        match self.points.get(&buffer) {
            None => {
                return Err(PipelineError::UnknownHandle {
                    kind: "buffer",
                    id: buffer.0,
                })
            }
            Some(points) if count > points.count => {
                return Err(PipelineError::Backend(format!(
                    "drawing {count} points from a buffer of {}",
                    points.count
                )))
            }
            Some(_) => {}
        }
        self.record_draw(
            DrawKind::Points { buffer, count },
            VertexInput::PointInstances,
        )
    }

    fn draw_fullscreen(&mut self) -> Result<()> {
        self.record_draw(DrawKind::Fullscreen, VertexInput::FullScreen)
    }
}
