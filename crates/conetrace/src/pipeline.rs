//! The render pipeline controller.

use conetrace_core::{
    AttachmentKind, CameraRig, FrameBufferTarget, PipelineError, PipelineOptions, Profiler,
    ProgramHandle, RenderBackend, RenderChannel, RenderPath, RenderPathSelector, RenderState,
    Result, Scene, TextureHandle, Transition, Viewport, Voxelizer,
};

use crate::context::RenderContext;
use crate::input::PipelineKey;
use crate::passes::{
    create_targets, BlurPass, CompositeInputs, CompositePass, DirectLightPass, ForwardPass,
    GBufferPass, IndirectLightPass, PresentPass, ReflectionPass, VoxelDebugPass,
};
use crate::profiler::FrameProfiler;
use crate::voxel_volume::VoxelVolume;

/// Every program the pipeline drives, resolved before anything is allocated.
struct Programs {
    gbuffer: ProgramHandle,
    reflection: ProgramHandle,
    indirect: ProgramHandle,
    blur: ProgramHandle,
    direct_light: ProgramHandle,
    composite: ProgramHandle,
    forward: ProgramHandle,
    voxel_debug: ProgramHandle,
    present: ProgramHandle,
}

impl Programs {
    fn load(backend: &mut dyn RenderBackend) -> Result<Self> {
        Ok(Self {
            gbuffer: GBufferPass::load_program(backend)?,
            reflection: ReflectionPass::load_program(backend)?,
            indirect: IndirectLightPass::load_program(backend)?,
            blur: BlurPass::load_program(backend)?,
            direct_light: DirectLightPass::load_program(backend)?,
            composite: CompositePass::load_program(backend)?,
            forward: ForwardPass::load_program(backend)?,
            voxel_debug: VoxelDebugPass::load_program(backend)?,
            present: PresentPass::load_program(backend)?,
        })
    }
}

/// Drives one of three render paths per frame.
///
/// The pipeline owns its backend, every render target, the voxel volume and
/// the render path selector. Targets are allocated once in [`new`](Self::new)
/// and destroyed when the pipeline is dropped.
///
/// Each frame runs exactly one path:
/// - forward: the lit forward pass, then the scene's debug overlays
/// - voxel debug: volume rebuild, then the point cloud
/// - deferred: G-buffer, volume rebuild, reflection, indirect light, two
///   blur passes, direct light and composite, then a blit of the selected
///   channel
pub struct RenderPipeline<B: RenderBackend> {
    backend: B,
    context: RenderContext,
    selector: RenderPathSelector,
    gbuffer: GBufferPass,
    reflection: ReflectionPass,
    indirect: IndirectLightPass,
    blur: BlurPass,
    direct_light: DirectLightPass,
    composite: CompositePass,
    forward: ForwardPass,
    voxel_debug: VoxelDebugPass,
    present: PresentPass,
    volume: VoxelVolume,
    voxelizer: Box<dyn Voxelizer>,
    /// Whether the deferred targets hold a complete frame.
    deferred_valid: bool,
}

impl<B: RenderBackend> RenderPipeline<B> {
    /// Resolves every program and allocates every target.
    ///
    /// Fails with the first missing or mismatched program before anything is
    /// allocated; an allocation failure releases what was already created.
    pub fn new(
        mut backend: B,
        options: PipelineOptions,
        voxelizer: Box<dyn Voxelizer>,
    ) -> Result<Self> {
        let programs = Programs::load(&mut backend)?;
        options.voxel.volume_desc()?;

        let [blur_a, blur_b] = BlurPass::target_descs(&options);
        let targets = create_targets(
            &mut backend,
            [
                GBufferPass::target_desc(&options),
                ReflectionPass::target_desc(&options),
                IndirectLightPass::target_desc(&options),
                blur_a,
                blur_b,
                DirectLightPass::target_desc(&options),
                CompositePass::target_desc(&options),
            ],
        )?;

        let mut volume = match VoxelVolume::new(&mut backend, &options.voxel) {
            Ok(volume) => volume,
            Err(e) => {
                release_targets(&mut backend, &targets);
                return Err(e);
            }
        };
        let context = match RenderContext::new(&mut backend, options) {
            Ok(context) => context,
            Err(e) => {
                volume.destroy(&mut backend);
                release_targets(&mut backend, &targets);
                return Err(e);
            }
        };

        let [gbuffer, glossy, indirect, blur_a, blur_b, light, composite] = targets;
        log::info!(
            "render pipeline created ({}x{} targets)",
            context.options().target_width,
            context.options().target_height
        );
        Ok(Self {
            backend,
            context,
            selector: RenderPathSelector::new(),
            gbuffer: GBufferPass::new(programs.gbuffer, gbuffer),
            reflection: ReflectionPass::new(programs.reflection, glossy),
            indirect: IndirectLightPass::new(programs.indirect, indirect),
            blur: BlurPass::new(programs.blur, [blur_a, blur_b]),
            direct_light: DirectLightPass::new(programs.direct_light, light),
            composite: CompositePass::new(programs.composite, composite),
            forward: ForwardPass::new(programs.forward),
            voxel_debug: VoxelDebugPass::new(programs.voxel_debug),
            present: PresentPass::new(programs.present),
            volume,
            voxelizer,
            deferred_valid: false,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    pub fn selector(&self) -> &RenderPathSelector {
        &self.selector
    }

    /// Current path and channel.
    pub fn state(&self) -> RenderState {
        self.selector.state()
    }

    pub fn volume(&self) -> &VoxelVolume {
        &self.volume
    }

    /// Selects the voxel mip level used by cone tracing and the debug view.
    /// Returns the clamped level.
    pub fn set_mip_level(&mut self, mip: u32) -> u32 {
        self.volume.set_mip_level(mip)
    }

    /// Advances the camera by one frame at `fps`.
    #[allow(clippy::unused_self)]
    pub fn update(&mut self, camera: &mut dyn CameraRig, fps: f32) {
        if fps > 0.0 {
            camera.advance(60.0 / fps);
        }
    }

    /// Updates the viewport for a new output size. Targets keep their size.
    pub fn resize(&mut self, width: u32, height: u32) -> Viewport {
        let viewport = self.context.view.resize(width, height);
        log::debug!("viewport resized to {}x{}", viewport.width, viewport.height);
        viewport
    }

    /// Feeds a digit key to the render path selector.
    pub fn handle_digit(&mut self, digit: u8) -> Transition {
        self.selector.handle_digit(digit)
    }

    /// Handles a translated key.
    pub fn handle_key(&mut self, key: PipelineKey, profiler: &FrameProfiler) -> Transition {
        match key {
            PipelineKey::Digit(digit) => self.handle_digit(digit),
            PipelineKey::LogProfile => {
                profiler.log_profile();
                Transition::Ignored
            }
        }
    }

    /// Renders one frame through the active path.
    ///
    /// A failing pass aborts the frame: the backend drops the open pass and
    /// its texture units, and the error is returned. The next call starts a
    /// fresh frame.
    pub fn render_frame(
        &mut self,
        scene: &dyn Scene,
        camera: &dyn CameraRig,
        profiler: &mut dyn Profiler,
    ) -> Result<()> {
        self.run_frame(|pipeline| {
            let path = pipeline.selector.path();
            match path {
                RenderPath::Forward => pipeline.draw_forward(scene, camera)?,
                RenderPath::VoxelDebug => pipeline.draw_voxel_debug(scene, camera)?,
                RenderPath::Deferred => pipeline.draw_deferred(scene, camera, profiler)?,
            }
            pipeline.deferred_valid = path == RenderPath::Deferred;
            pipeline.present_selected()
        })
    }

    /// Re-presents the selected channel from the last deferred frame
    /// without running any other pass.
    ///
    /// Returns `false` when there is nothing to re-present: the active path
    /// is not deferred or no complete deferred frame exists yet.
    pub fn refresh_presentation(&mut self) -> Result<bool> {
        if self.selector.path() != RenderPath::Deferred || !self.deferred_valid {
            return Ok(false);
        }
        self.run_frame(Self::present_selected)?;
        Ok(true)
    }

    /// The attachment shown for `channel`.
    pub fn channel_texture(&self, channel: RenderChannel) -> Result<TextureHandle> {
        let kind = channel.attachment();
        if kind == AttachmentKind::Blur {
            return self
                .blur
                .blur_tex()
                .ok_or_else(|| PipelineError::MissingAttachment {
                    target: BlurPass::LABEL.to_string(),
                    attachment: kind,
                });
        }
        [
            self.gbuffer.target(),
            self.reflection.target(),
            self.indirect.target(),
            self.direct_light.target(),
            self.composite.target(),
        ]
        .into_iter()
        .find_map(|target| target.attachment(kind))
        .ok_or_else(|| PipelineError::MissingAttachment {
            target: "deferred pipeline".to_string(),
            attachment: kind,
        })
    }

    fn run_frame<F>(&mut self, body: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let viewport = self.context.view.viewport();
        let result = match self.backend.begin_frame(viewport) {
            Ok(()) => body(&mut *self).and_then(|()| self.backend.end_frame()),
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            log::error!("frame aborted: {e}");
            self.backend.abort_frame();
            self.deferred_valid = false;
        }
        result
    }

    fn rebuild_volume(&mut self, scene: &dyn Scene) -> Result<()> {
        let light = self.direct_light.light_source(self.context.options());
        self.volume
            .rebuild(&mut self.backend, self.voxelizer.as_mut(), scene, &light)
    }

    fn draw_forward(&mut self, scene: &dyn Scene, camera: &dyn CameraRig) -> Result<()> {
        self.forward
            .draw(&mut self.backend, &mut self.context, camera, scene)?;
        scene.draw_debug_overlays(&mut self.backend)
    }

    fn draw_voxel_debug(&mut self, scene: &dyn Scene, camera: &dyn CameraRig) -> Result<()> {
        self.rebuild_volume(scene)?;
        self.voxel_debug
            .draw(&mut self.backend, &mut self.context, camera, &mut self.volume)
    }

    fn draw_deferred(
        &mut self,
        scene: &dyn Scene,
        camera: &dyn CameraRig,
        profiler: &mut dyn Profiler,
    ) -> Result<()> {
        self.gbuffer
            .draw_to_buffer(&mut self.backend, &mut self.context, camera, scene)?;
        self.rebuild_volume(scene)?;

        let gbuffer = self.gbuffer.target();

        profiler.start_profile("Reflection");
        let reflected =
            self.reflection
                .draw_to_buffer(&mut self.backend, &mut self.context, camera, gbuffer);
        profiler.end_profile();
        reflected?;

        profiler.start_profile("Indirect Lighting");
        let indirect = self.indirect.draw_to_buffer(
            &mut self.backend,
            &mut self.context,
            camera,
            gbuffer,
            &self.volume,
        );
        profiler.end_profile();
        indirect?;

        let normal = gbuffer.require(AttachmentKind::Normal)?;
        profiler.start_profile("Indirect Lighting Blur");
        let blurred = self.blur_indirect(normal);
        profiler.end_profile();
        let blurred = blurred?;

        let gbuffer = self.gbuffer.target();
        self.direct_light
            .draw_to_buffer(&mut self.backend, &mut self.context, camera, gbuffer)?;

        let inputs = CompositeInputs {
            color: gbuffer.require(AttachmentKind::Color)?,
            light: self.direct_light.light_tex()?,
            specular: self.direct_light.specular_tex()?,
            blur: blurred,
            glossy: self.reflection.glossy_tex()?,
        };
        self.composite
            .draw_to_buffer(&mut self.backend, self.context.options(), &inputs)
    }

    /// Two blur iterations over the indirect light; the second reads the
    /// first one's output.
    fn blur_indirect(&mut self, normal: TextureHandle) -> Result<TextureHandle> {
        let source = self.indirect.indirect_tex()?;
        let options = self.context.options();
        let first = self
            .blur
            .draw_to_buffer(&mut self.backend, options, source, normal)?;
        self.blur
            .draw_to_buffer(&mut self.backend, options, first, normal)
    }

    /// Post-path reset: disables every texture unit above 0, loads the unit
    /// orthographic view and, on the deferred path, blits the selected
    /// channel.
    fn present_selected(&mut self) -> Result<()> {
        self.backend.disable_texture_units_from(1);
        let frame = self.context.view.begin_2d();
        if self.selector.path() != RenderPath::Deferred {
            return Ok(());
        }
        let texture = self.channel_texture(self.selector.channel())?;
        let clear = self.context.options().clear_rgba();
        self.present.draw(&mut self.backend, &frame, texture, clear)
    }
}

impl<B: RenderBackend> Drop for RenderPipeline<B> {
    fn drop(&mut self) {
        let backend: &mut dyn RenderBackend = &mut self.backend;
        for target in [
            self.gbuffer.target(),
            self.reflection.target(),
            self.indirect.target(),
            self.direct_light.target(),
            self.composite.target(),
        ]
        .into_iter()
        .chain(self.blur.targets())
        {
            backend.destroy_target(target);
        }
        self.volume.destroy(backend);
        self.context.destroy(backend);
        log::info!("render pipeline destroyed");
    }
}

fn release_targets(backend: &mut dyn RenderBackend, targets: &[FrameBufferTarget]) {
    for target in targets {
        backend.destroy_target(target);
    }
}
