//! Lifecycle of the voxel radiance volume.

use conetrace_core::{
    BufferHandle, LightSource, RenderBackend, Result, Scene, VolumeDesc, VolumeHandle,
    VoxelConfig, Voxelizer,
};

/// Uploaded point cloud for one mip level.
#[derive(Debug, Clone, Copy)]
struct DebugPoints {
    buffer: BufferHandle,
    count: u32,
    mip: u32,
}

/// The mip-chained voxel volume and its debug point cloud.
///
/// The volume is allocated once and rebuilt by the voxelizer every frame
/// that reads it. The point cloud is only re-uploaded when the selected mip
/// level changes.
pub struct VoxelVolume {
    desc: VolumeDesc,
    handle: VolumeHandle,
    mip_level: u32,
    point_base_size: f32,
    points: Option<DebugPoints>,
}

impl VoxelVolume {
    /// Allocates the volume described by `config`.
    pub fn new(backend: &mut dyn RenderBackend, config: &VoxelConfig) -> Result<Self> {
        let desc = config.volume_desc()?;
        let handle = backend.create_volume(&desc)?;
        log::info!(
            "allocated voxel volume ({}^3, {} mip levels, world size {})",
            desc.resolution(),
            desc.mip_levels(),
            desc.world_size()
        );
        Ok(Self {
            desc,
            handle,
            mip_level: desc.clamp_mip(config.mip_level),
            point_base_size: config.point_base_size,
            points: None,
        })
    }

    pub fn handle(&self) -> VolumeHandle {
        self.handle
    }

    pub fn desc(&self) -> &VolumeDesc {
        &self.desc
    }

    /// Mip level used for cone tracing and debug display.
    pub fn mip_level(&self) -> u32 {
        self.mip_level
    }

    /// Selects a mip level, clamped to the chain. Returns the level applied.
    pub fn set_mip_level(&mut self, mip: u32) -> u32 {
        let clamped = self.desc.clamp_mip(mip);
        if clamped != self.mip_level {
            log::debug!("voxel mip level {} -> {clamped}", self.mip_level);
            self.mip_level = clamped;
        }
        clamped
    }

    /// Debug point size at the current mip level.
    pub fn point_size(&self) -> f32 {
        self.desc.point_size(self.point_base_size, self.mip_level)
    }

    /// Rebuilds the radiance field for this frame.
    pub fn rebuild(
        &self,
        backend: &mut dyn RenderBackend,
        voxelizer: &mut dyn Voxelizer,
        scene: &dyn Scene,
        light: &LightSource,
    ) -> Result<()> {
        voxelizer.build_voxels(backend, scene, self.handle, &self.desc, light)
    }

    /// Point buffer holding one centre per voxel at the current mip level.
    ///
    /// Uploaded on first use and again only when the mip level changes.
    pub fn debug_points(
        &mut self,
        backend: &mut dyn RenderBackend,
    ) -> Result<(BufferHandle, u32)> {
        if let Some(points) = self.points.filter(|p| p.mip == self.mip_level) {
            return Ok((points.buffer, points.count));
        }
        if let Some(stale) = self.points.take() {
            backend.destroy_buffer(stale.buffer);
        }

        let centres = self.desc.debug_points(self.mip_level);
        let buffer = backend.create_point_buffer("voxel debug points", &centres)?;
        let count = centres.len() as u32;
        log::debug!(
            "rebuilt voxel point cloud: {count} points at mip {}",
            self.mip_level
        );
        self.points = Some(DebugPoints {
            buffer,
            count,
            mip: self.mip_level,
        });
        Ok((buffer, count))
    }

    /// The uploaded point buffer, if any.
    pub fn point_buffer(&self) -> Option<BufferHandle> {
        self.points.map(|p| p.buffer)
    }

    /// Releases the point buffer and the volume.
    pub fn destroy(&mut self, backend: &mut dyn RenderBackend) {
        if let Some(points) = self.points.take() {
            backend.destroy_buffer(points.buffer);
        }
        backend.destroy_volume(self.handle);
    }
}
