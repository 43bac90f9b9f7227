//! Voxel volume description and the voxelizer collaborator.

use glam::Vec3;

use crate::backend::{RenderBackend, TextureHandle, VolumeHandle};
use crate::error::{PipelineError, Result};
use crate::scene::Scene;

/// A cubic, power-of-two voxel volume covering a fixed world-space extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeDesc {
    world_size: f32,
    resolution: u32,
}

impl VolumeDesc {
    /// Creates a description; `resolution` must be a non-zero power of two.
    pub fn new(world_size: f32, resolution: u32) -> Result<Self> {
        if !resolution.is_power_of_two() {
            return Err(PipelineError::InvalidVoxelResolution(resolution));
        }
        Ok(Self {
            world_size,
            resolution,
        })
    }

    /// World-space edge length.
    #[must_use]
    pub fn world_size(&self) -> f32 {
        self.world_size
    }

    /// Voxels per edge at mip 0.
    #[must_use]
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Number of mip levels down to a single voxel.
    #[must_use]
    pub fn mip_levels(&self) -> u32 {
        self.resolution.trailing_zeros() + 1
    }

    /// Clamps a requested mip level to the chain.
    #[must_use]
    pub fn clamp_mip(&self, mip: u32) -> u32 {
        mip.min(self.mip_levels() - 1)
    }

    /// Voxels per edge at `mip`.
    #[must_use]
    pub fn resolution_at(&self, mip: u32) -> u32 {
        self.resolution >> self.clamp_mip(mip)
    }

    /// `2^mip`.
    #[must_use]
    pub fn mip_factor(&self, mip: u32) -> f32 {
        (1u32 << self.clamp_mip(mip)) as f32
    }

    /// World-space edge length of one voxel at `mip`.
    #[must_use]
    pub fn voxel_width(&self, mip: u32) -> f32 {
        self.world_size / self.resolution as f32 * self.mip_factor(mip)
    }

    /// Debug point size at `mip` for a given base size.
    #[must_use]
    pub fn point_size(&self, base: f32, mip: u32) -> f32 {
        base * self.mip_factor(mip)
    }

    /// Centres of every voxel at `mip`, x-major then y then z.
    #[must_use]
    pub fn debug_points(&self, mip: u32) -> Vec<Vec3> {
        let n = self.resolution_at(mip);
        let width = self.voxel_width(mip);
        let origin = -self.world_size / 2.0 + width / 2.0;
        let coord = |i: u32| origin + i as f32 * width;

        let mut points = Vec::with_capacity((n as usize).pow(3));
        for x in 0..n {
            for y in 0..n {
                for z in 0..n {
                    points.push(Vec3::new(coord(x), coord(y), coord(z)));
                }
            }
        }
        points
    }
}

/// The light input handed to the voxelizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSource {
    pub direction: Vec3,
    pub color: Vec3,
    /// Direct-light buffer from the most recent deferred frame, if any.
    pub light_texture: Option<TextureHandle>,
}

/// External collaborator that rebuilds the voxel radiance field.
///
/// The pipeline only decides when this runs; the algorithm is opaque.
pub trait Voxelizer {
    /// Rebuilds `volume` and its mip chain from the scene and light.
    fn build_voxels(
        &mut self,
        backend: &mut dyn RenderBackend,
        scene: &dyn Scene,
        volume: VolumeHandle,
        desc: &VolumeDesc,
        light: &LightSource,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rejects_non_power_of_two() {
        assert!(matches!(
            VolumeDesc::new(16.0, 48),
            Err(PipelineError::InvalidVoxelResolution(48))
        ));
        assert!(VolumeDesc::new(16.0, 0).is_err());
    }

    #[test]
    fn test_mip_chain() {
        let desc = VolumeDesc::new(16.0, 64).unwrap();
        assert_eq!(desc.mip_levels(), 7);
        assert_eq!(desc.resolution_at(2), 16);
        assert_eq!(desc.clamp_mip(20), 6);
        assert_eq!(desc.resolution_at(20), 1);
    }

    #[test]
    fn test_voxel_width_and_point_size() {
        let desc = VolumeDesc::new(16.0, 64).unwrap();
        assert_eq!(desc.voxel_width(0), 0.25);
        assert_eq!(desc.voxel_width(1), 0.5);
        assert_eq!(desc.point_size(10.0, 0), 10.0);
        assert_eq!(desc.point_size(10.0, 3), 80.0);
    }

    #[test]
    fn test_debug_points_start_half_voxel_in() {
        let desc = VolumeDesc::new(16.0, 4).unwrap();
        let points = desc.debug_points(0);
        assert_eq!(points.len(), 64);
        assert_eq!(points[0], Vec3::splat(-6.0));
        assert_eq!(points[63], Vec3::splat(6.0));
    }

    proptest! {
        #[test]
        fn prop_debug_points_fill_the_volume(shift in 0u32..5, mip in 0u32..8) {
            let resolution = 1u32 << shift;
            let desc = VolumeDesc::new(16.0, resolution).unwrap();
            let points = desc.debug_points(mip);
            let n = resolution >> desc.clamp_mip(mip);
            prop_assert_eq!(points.len(), (n * n * n) as usize);
            for p in &points {
                prop_assert!(p.abs().max_element() < 8.0);
            }
        }
    }
}
