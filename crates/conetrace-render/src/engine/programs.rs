//! Program registry and pipeline creation.

use std::num::NonZeroU64;

use conetrace_core::{
    OutputLayout, PipelineError, ProgramHandle, ProgramInterface, Result, SamplerKind, Topology,
    VertexInput,
};

use super::resources::{texture_format, SCREEN_DEPTH_FORMAT};
use super::WgpuBackend;
use crate::uniforms::UniformLayout;
use crate::vertex::{mesh_vertex_layout, point_instance_layout};

/// WGSL source registered under a program name.
///
/// The module must provide `vs_main` and `fs_main` entry points. Uniforms live
/// in one struct at `@group(0) @binding(0)`, packed in declaration order; a
/// non-filtering sampler sits at `@group(1) @binding(0)` and the texture for
/// sampler slot `n` at `@group(1) @binding(n + 1)`.
#[derive(Debug, Clone)]
pub struct ProgramSource {
    pub name: String,
    pub wgsl: String,
    /// Interface the module declares. `None` trusts the interface a pass
    /// asks for.
    pub interface: Option<ProgramInterface>,
}

impl ProgramSource {
    /// Creates a source with no declared interface.
    pub fn new(name: impl Into<String>, wgsl: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wgsl: wgsl.into(),
            interface: None,
        }
    }

    /// Declares the interface the module implements.
    #[must_use]
    pub fn with_interface(mut self, interface: ProgramInterface) -> Self {
        self.interface = Some(interface);
        self
    }
}

/// A compiled program and its pipelines.
pub(super) struct CompiledProgram {
    pub name: String,
    pub interface: ProgramInterface,
    pub uniform_layout: UniformLayout,
    pub uniform_group_layout: wgpu::BindGroupLayout,
    pub texture_group_layout: Option<wgpu::BindGroupLayout>,
    /// Triangle-list pipeline; used for every non-mesh draw too.
    pub triangles: wgpu::RenderPipeline,
    /// Line-list pipeline, for mesh programs only.
    pub lines: Option<wgpu::RenderPipeline>,
}

impl CompiledProgram {
    /// Whether the program draws into the screen depth buffer.
    pub fn uses_screen_depth(&self) -> bool {
        matches!(self.interface.output, OutputLayout::Screen { depth: true })
    }

    /// The pipeline for a topology.
    pub fn pipeline(&self, topology: Topology) -> &wgpu::RenderPipeline {
        match (topology, &self.lines) {
            (Topology::Lines, Some(lines)) => lines,
            _ => &self.triangles,
        }
    }
}

impl WgpuBackend {
    /// Registers WGSL source for later lookup by name.
    ///
    /// Re-registering a name replaces the source; handles returned earlier
    /// keep drawing with the old pipelines.
    pub fn register_program(&mut self, source: ProgramSource) {
        log::debug!("registered program '{}'", source.name);
        self.program_index.remove(&source.name);
        self.sources.insert(source.name.clone(), source);
    }

    /// Whether a program with this name is registered.
    #[must_use]
    pub fn has_program(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    pub(super) fn lookup_program(
        &mut self,
        name: &str,
        expected: &ProgramInterface,
    ) -> Result<ProgramHandle> {
        let mismatch = |reason: String| PipelineError::ProgramInterfaceMismatch {
            program: name.to_string(),
            reason,
        };

        if let Some(&handle) = self.program_index.get(name) {
            expected
                .check_satisfied_by(&self.programs[handle.0 as usize].interface)
                .map_err(mismatch)?;
            return Ok(handle);
        }

        let source = self
            .sources
            .get(name)
            .ok_or_else(|| PipelineError::ProgramNotFound(name.to_string()))?;
        expected.validate().map_err(mismatch)?;
        let declared = source
            .interface
            .clone()
            .unwrap_or_else(|| expected.clone());
        declared.validate().map_err(mismatch)?;
        expected.check_satisfied_by(&declared).map_err(mismatch)?;

        let compiled = self.compile(name, &source.wgsl, declared)?;
        let handle = ProgramHandle(self.programs.len() as u32);
        self.programs.push(compiled);
        self.program_index.insert(name.to_string(), handle);
        log::info!("compiled program '{name}'");
        Ok(handle)
    }

    fn compile(&self, name: &str, wgsl: &str, interface: ProgramInterface) -> Result<CompiledProgram> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(name),
            source: wgpu::ShaderSource::Wgsl(wgsl.into()),
        });

        let uniform_layout = UniformLayout::new(&interface.uniforms);
        let uniform_group_layout =
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(name),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: true,
                            min_binding_size: NonZeroU64::new(u64::from(uniform_layout.size())),
                        },
                        count: None,
                    }],
                });
        let texture_group_layout = self.texture_group_layout(name, &interface);

        let mut group_layouts = vec![&uniform_group_layout];
        if let Some(layout) = &texture_group_layout {
            group_layouts.push(layout);
        }
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(name),
                bind_group_layouts: &group_layouts,
                push_constant_ranges: &[],
            });

        let triangles = self.create_pipeline(
            name,
            &shader,
            &pipeline_layout,
            &interface,
            wgpu::PrimitiveTopology::TriangleList,
        );
        let lines = (interface.vertex_input == VertexInput::Mesh).then(|| {
            self.create_pipeline(
                name,
                &shader,
                &pipeline_layout,
                &interface,
                wgpu::PrimitiveTopology::LineList,
            )
        });

        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(PipelineError::ShaderCompilationFailed {
                program: name.to_string(),
                message: err.to_string(),
            });
        }

        Ok(CompiledProgram {
            name: name.to_string(),
            interface,
            uniform_layout,
            uniform_group_layout,
            texture_group_layout,
            triangles,
            lines,
        })
    }

    fn texture_group_layout(
        &self,
        name: &str,
        interface: &ProgramInterface,
    ) -> Option<wgpu::BindGroupLayout> {
        if interface.samplers.is_empty() {
            return None;
        }

        let mut entries = vec![wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
            count: None,
        }];
        for sampler in &interface.samplers {
            let (sample_type, view_dimension) = match sampler.kind {
                SamplerKind::Texture2d => (
                    wgpu::TextureSampleType::Float { filterable: false },
                    wgpu::TextureViewDimension::D2,
                ),
                SamplerKind::Depth2d => (
                    wgpu::TextureSampleType::Depth,
                    wgpu::TextureViewDimension::D2,
                ),
                SamplerKind::Volume3d => (
                    wgpu::TextureSampleType::Float { filterable: false },
                    wgpu::TextureViewDimension::D3,
                ),
            };
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: sampler.slot + 1,
                // The voxel debug program reads the volume per instance.
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type,
                    view_dimension,
                    multisampled: false,
                },
                count: None,
            });
        }

        Some(
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(name),
                    entries: &entries,
                }),
        )
    }

    fn create_pipeline(
        &self,
        name: &str,
        shader: &wgpu::ShaderModule,
        layout: &wgpu::PipelineLayout,
        interface: &ProgramInterface,
        topology: wgpu::PrimitiveTopology,
    ) -> wgpu::RenderPipeline {
        let buffers = match interface.vertex_input {
            VertexInput::FullScreen => Vec::new(),
            VertexInput::Mesh => vec![mesh_vertex_layout()],
            VertexInput::PointInstances => vec![point_instance_layout()],
        };

        let (color_formats, depth_format) = match &interface.output {
            OutputLayout::Target { color, depth } => (
                color.iter().map(|f| texture_format(*f)).collect::<Vec<_>>(),
                (*depth).map(texture_format),
            ),
            OutputLayout::Screen { depth } => (
                vec![self.surface_config.format],
                (*depth).then_some(SCREEN_DEPTH_FORMAT),
            ),
        };
        let targets: Vec<Option<wgpu::ColorTargetState>> = color_formats
            .into_iter()
            .map(|format| {
                Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(name),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module: shader,
                    entry_point: Some("vs_main"),
                    buffers: &buffers,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: shader,
                    entry_point: Some("fs_main"),
                    targets: &targets,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: depth_format.map(|format| wgpu::DepthStencilState {
                    format,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
    }
}
