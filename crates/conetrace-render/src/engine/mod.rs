//! The wgpu rendering backend.

mod passes;
mod programs;
mod resources;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use conetrace_core::{
    BufferHandle, DrawContext, FrameBufferTarget, MeshData, MeshHandle, PassDescriptor,
    PipelineError, ProgramHandle, ProgramInterface, RenderBackend, Result, TargetDesc,
    TextureHandle, Vec3, Viewport, VolumeDesc, VolumeHandle,
};

use crate::error::{RenderError, RenderResult};
use passes::PendingPass;
use programs::CompiledProgram;
use resources::{GpuMesh, GpuPoints, GpuTexture, GpuVolume};

pub use programs::ProgramSource;

/// Work recorded for the frame in progress.
struct FrameState {
    encoder: wgpu::CommandEncoder,
    screen_view: wgpu::TextureView,
    surface_texture: Option<wgpu::SurfaceTexture>,
    viewport: Viewport,
}

/// A [`RenderBackend`] backed by wgpu.
///
/// Programs are registered as WGSL source and compiled on first lookup.
/// Without a window the backend renders into an offscreen texture that can be
/// read back with [`WgpuBackend::read_screen`].
pub struct WgpuBackend {
    /// The wgpu instance.
    pub instance: wgpu::Instance,
    /// The wgpu adapter.
    pub adapter: wgpu::Adapter,
    /// The wgpu device.
    pub device: wgpu::Device,
    /// The wgpu queue.
    pub queue: wgpu::Queue,
    /// The render surface (None for headless).
    surface: Option<wgpu::Surface<'static>>,
    /// Surface configuration; also describes the offscreen texture.
    surface_config: wgpu::SurfaceConfiguration,
    /// Stand-in for the surface when headless.
    offscreen: Option<wgpu::Texture>,
    screen_depth_view: wgpu::TextureView,
    sampler: wgpu::Sampler,

    sources: HashMap<String, ProgramSource>,
    programs: Vec<CompiledProgram>,
    program_index: HashMap<String, ProgramHandle>,

    next_id: u32,
    textures: HashMap<TextureHandle, GpuTexture>,
    volumes: HashMap<VolumeHandle, GpuVolume>,
    points: HashMap<BufferHandle, GpuPoints>,
    meshes: HashMap<MeshHandle, GpuMesh>,

    enabled_units: BTreeSet<u32>,
    frame: Option<FrameState>,
    pending: Option<PendingPass>,
}

impl WgpuBackend {
    /// Creates a backend presenting to a window.
    pub async fn new_windowed(window: Arc<winit::window::Window>) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;

        let (device, queue) = Self::request_device(&adapter, "conetrace device").await?;

        let size = window.inner_size();
        let width = size.width.max(1);
        let height = size.height.max(1);

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(RenderError::SurfaceConfigurationFailed)?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        log::info!(
            "created windowed backend on '{}' ({width}x{height}, {surface_format:?})",
            adapter.get_info().name
        );
        Ok(Self::from_parts(
            instance,
            adapter,
            device,
            queue,
            Some(surface),
            surface_config,
        ))
    }

    /// Creates a backend rendering into an offscreen texture.
    pub async fn new_headless(width: u32, height: u32) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;

        let (device, queue) = Self::request_device(&adapter, "conetrace device (headless)").await?;

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        log::info!(
            "created headless backend on '{}' ({}x{})",
            adapter.get_info().name,
            surface_config.width,
            surface_config.height
        );
        Ok(Self::from_parts(
            instance,
            adapter,
            device,
            queue,
            None,
            surface_config,
        ))
    }

    async fn request_device(
        adapter: &wgpu::Adapter,
        label: &str,
    ) -> RenderResult<(wgpu::Device, wgpu::Queue)> {
        Ok(adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some(label),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
            })
            .await?)
    }

    fn from_parts(
        instance: wgpu::Instance,
        adapter: wgpu::Adapter,
        device: wgpu::Device,
        queue: wgpu::Queue,
        surface: Option<wgpu::Surface<'static>>,
        surface_config: wgpu::SurfaceConfiguration,
    ) -> Self {
        let offscreen = surface.is_none().then(|| {
            resources::create_offscreen_screen(
                &device,
                surface_config.format,
                surface_config.width,
                surface_config.height,
            )
        });
        let screen_depth_view =
            resources::create_screen_depth(&device, surface_config.width, surface_config.height);
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("pass sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            instance,
            adapter,
            device,
            queue,
            surface,
            surface_config,
            offscreen,
            screen_depth_view,
            sampler,
            sources: HashMap::new(),
            programs: Vec::new(),
            program_index: HashMap::new(),
            next_id: 0,
            textures: HashMap::new(),
            volumes: HashMap::new(),
            points: HashMap::new(),
            meshes: HashMap::new(),
            enabled_units: BTreeSet::new(),
            frame: None,
            pending: None,
        }
    }

    /// Resizes the surface (or offscreen texture) and the screen depth buffer.
    ///
    /// Render targets keep their fixed resolution.
    pub fn resize_surface(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        self.surface_config.width = width;
        self.surface_config.height = height;

        if let Some(ref surface) = self.surface {
            surface.configure(&self.device, &self.surface_config);
        } else {
            self.offscreen = Some(resources::create_offscreen_screen(
                &self.device,
                self.surface_config.format,
                width,
                height,
            ));
        }

        self.screen_depth_view = resources::create_screen_depth(&self.device, width, height);
    }

    /// Surface size in pixels.
    #[must_use]
    pub fn surface_size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    /// Format passes drawing to the screen write.
    #[must_use]
    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_config.format
    }

    /// The wgpu texture behind an attachment handle.
    #[must_use]
    pub fn texture(&self, texture: TextureHandle) -> Option<&wgpu::Texture> {
        self.textures.get(&texture).map(|t| &t.texture)
    }

    /// The wgpu texture behind the voxel volume, for voxelizers that write it
    /// directly.
    #[must_use]
    pub fn volume_texture(&self, volume: VolumeHandle) -> Option<&wgpu::Texture> {
        self.volumes.get(&volume).map(|v| &v.texture)
    }

    /// Reads back the offscreen screen texture as tightly packed RGBA8 rows.
    pub fn read_screen(&self) -> RenderResult<Vec<u8>> {
        let texture = self
            .offscreen
            .as_ref()
            .ok_or(RenderError::ReadbackUnavailable("backend presents to a window"))?;
        if self.frame.is_some() {
            return Err(RenderError::ReadbackUnavailable("a frame is in progress"));
        }

        let width = self.surface_config.width;
        let height = self.surface_config.height;
        let bytes_per_row = resources::aligned_bytes_per_row(width);

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("screen readback buffer"),
            size: u64::from(bytes_per_row) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("screen readback encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());
        rx.recv()
            .map_err(|_| RenderError::BufferMapFailed)?
            .map_err(|_| RenderError::BufferMapFailed)?;

        // Copy data, removing row padding
        let data = buffer_slice.get_mapped_range();
        let row_bytes = (width * 4) as usize;
        let mut result = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height {
            let start = (row * bytes_per_row) as usize;
            result.extend_from_slice(&data[start..start + row_bytes]);
        }
        drop(data);
        buffer.unmap();

        Ok(result)
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl RenderBackend for WgpuBackend {
    fn program(&mut self, name: &str, interface: &ProgramInterface) -> Result<ProgramHandle> {
        self.lookup_program(name, interface)
    }

    fn create_target(&mut self, desc: &TargetDesc) -> Result<FrameBufferTarget> {
        desc.validate()?;
        let max = self.device.limits().max_texture_dimension_2d;
        if desc.width > max || desc.height > max {
            return Err(PipelineError::TargetAllocationFailed {
                target: desc.label.clone(),
                reason: format!("{}x{} exceeds the device limit of {max}", desc.width, desc.height),
            });
        }

        let mut handles = Vec::with_capacity(desc.attachments.len());
        for attachment in &desc.attachments {
            let label = format!("{} {}", desc.label, attachment.kind.name());
            let texture = resources::create_attachment(
                &self.device,
                &label,
                desc.width,
                desc.height,
                attachment.format,
            );
            let handle = TextureHandle(self.next_id());
            self.textures.insert(handle, texture);
            handles.push(handle);
        }
        log::debug!(
            "allocated target '{}' ({}x{}, {} attachments)",
            desc.label,
            desc.width,
            desc.height,
            handles.len()
        );
        FrameBufferTarget::from_parts(desc, handles)
    }

    fn destroy_target(&mut self, target: &FrameBufferTarget) {
        for handle in target.textures() {
            if let Some(entry) = self.textures.remove(&handle) {
                entry.texture.destroy();
            }
        }
        log::debug!("released target '{}'", target.label());
    }

    fn create_volume(&mut self, desc: &VolumeDesc) -> Result<VolumeHandle> {
        let max = self.device.limits().max_texture_dimension_3d;
        if desc.resolution() > max {
            return Err(PipelineError::VolumeAllocationFailed(format!(
                "resolution {} exceeds the device limit of {max}",
                desc.resolution()
            )));
        }
        let volume = resources::create_volume(&self.device, desc);
        let handle = VolumeHandle(self.next_id());
        self.volumes.insert(handle, volume);
        Ok(handle)
    }

    fn destroy_volume(&mut self, volume: VolumeHandle) {
        if let Some(entry) = self.volumes.remove(&volume) {
            entry.texture.destroy();
        }
    }

    fn create_point_buffer(&mut self, label: &str, points: &[Vec3]) -> Result<BufferHandle> {
        if points.is_empty() {
            return Err(PipelineError::BufferAllocationFailed {
                label: label.to_string(),
                reason: "no points".to_string(),
            });
        }
        let buffer = resources::create_points(&self.device, label, points);
        let handle = BufferHandle(self.next_id());
        self.points.insert(handle, buffer);
        Ok(handle)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if let Some(entry) = self.points.remove(&buffer) {
            entry.buffer.destroy();
        }
    }

    fn upload_mesh(&mut self, label: &str, mesh: &MeshData) -> Result<MeshHandle> {
        mesh.validate()
            .map_err(|reason| PipelineError::BufferAllocationFailed {
                label: label.to_string(),
                reason,
            })?;
        let gpu_mesh = resources::create_mesh(&self.device, label, mesh);
        let handle = MeshHandle(self.next_id());
        self.meshes.insert(handle, gpu_mesh);
        Ok(handle)
    }

    fn destroy_mesh(&mut self, mesh: MeshHandle) {
        self.meshes.remove(&mesh);
    }

    fn begin_frame(&mut self, viewport: Viewport) -> Result<()> {
        if self.frame.is_some() {
            return Err(PipelineError::Backend("frame already in progress".to_string()));
        }

        let (screen_view, surface_texture) = match &self.surface {
            Some(surface) => {
                let surface_texture = match surface.get_current_texture() {
                    Ok(texture) => texture,
                    Err(err) => {
                        if matches!(err, wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) {
                            surface.configure(&self.device, &self.surface_config);
                        }
                        return Err(RenderError::from(err).into());
                    }
                };
                let view = surface_texture
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                (view, Some(surface_texture))
            }
            None => {
                let texture = self.offscreen.as_ref().ok_or(RenderError::SurfaceLost)?;
                (
                    texture.create_view(&wgpu::TextureViewDescriptor::default()),
                    None,
                )
            }
        };

        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });
        self.frame = Some(FrameState {
            encoder,
            screen_view,
            surface_texture,
            viewport,
        });
        Ok(())
    }

    fn begin_pass(&mut self, pass: &PassDescriptor) -> Result<()> {
        self.open_pass(pass)
    }

    fn end_pass(&mut self) -> Result<()> {
        self.finish_pass()
    }

    fn release_texture_units(&mut self, slots: &[u32]) {
        for slot in slots {
            self.enabled_units.remove(slot);
        }
    }

    fn disable_texture_units_from(&mut self, first: u32) {
        self.enabled_units.retain(|&unit| unit < first);
    }

    fn enabled_texture_units(&self) -> Vec<u32> {
        self.enabled_units.iter().copied().collect()
    }

    fn end_frame(&mut self) -> Result<()> {
        if let Some(open) = &self.pending {
            return Err(PipelineError::PassAlreadyOpen(open.label().to_string()));
        }
        let frame = self
            .frame
            .take()
            .ok_or_else(|| PipelineError::Backend("no frame in progress".to_string()))?;
        self.queue.submit(std::iter::once(frame.encoder.finish()));
        if let Some(surface_texture) = frame.surface_texture {
            surface_texture.present();
        }
        Ok(())
    }

    fn abort_frame(&mut self) {
        if let Some(pending) = self.pending.take() {
            log::debug!("dropping open pass '{}'", pending.label());
        }
        // Dropping the encoder discards everything recorded this frame.
        self.frame = None;
        self.enabled_units.clear();
    }

    fn draw_context(&mut self) -> &mut dyn DrawContext {
        self
    }
}
