//! Configuration options for the render pipeline.

use std::path::Path;

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::voxel::VolumeDesc;

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Width of every fixed-resolution render target.
    pub target_width: u32,
    /// Height of every fixed-resolution render target.
    pub target_height: u32,
    /// Perspective projection.
    pub projection: ProjectionConfig,
    /// Clear color for the screen and offscreen targets.
    pub clear_color: Vec4,
    /// Directional light.
    pub light: LightConfig,
    /// Voxel volume.
    pub voxel: VoxelConfig,
    /// Indirect-light blur.
    pub blur: BlurConfig,
    /// Final composite weights.
    pub composite: CompositeConfig,
    /// Reference grid.
    pub grid: GridConfig,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            target_width: 1280,
            target_height: 720,
            projection: ProjectionConfig::default(),
            clear_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            light: LightConfig::default(),
            voxel: VoxelConfig::default(),
            blur: BlurConfig::default(),
            composite: CompositeConfig::default(),
            grid: GridConfig::default(),
        }
    }
}

impl PipelineOptions {
    /// Creates options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses options from JSON; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads options from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Serializes options to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Sets the target resolution.
    pub fn with_target_size(mut self, width: u32, height: u32) -> Self {
        self.target_width = width;
        self.target_height = height;
        self
    }

    /// Sets the voxel configuration.
    pub fn with_voxel(mut self, voxel: VoxelConfig) -> Self {
        self.voxel = voxel;
        self
    }

    /// Sets the light configuration.
    pub fn with_light(mut self, light: LightConfig) -> Self {
        self.light = light;
        self
    }

    /// Sets the composite weights.
    pub fn with_composite(mut self, composite: CompositeConfig) -> Self {
        self.composite = composite;
        self
    }

    /// Clear color as an array.
    pub fn clear_rgba(&self) -> [f32; 4] {
        self.clear_color.to_array()
    }
}

/// Perspective projection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 45.0,
            near: 0.01,
            far: 50.0,
        }
    }
}

/// Directional light shared by the forward and direct-light passes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    pub direction: Vec3,
    pub color: Vec3,
    pub ambient: f32,
    pub diffuse: f32,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            direction: Vec3::new(1.0, -5.0, 2.0),
            color: Vec3::ONE,
            ambient: 0.7,
            diffuse: 0.6,
        }
    }
}

impl LightConfig {
    /// Creates a light configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the light direction.
    pub fn with_direction(mut self, direction: Vec3) -> Self {
        self.direction = direction;
        self
    }

    /// Sets the light color.
    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    /// Sets the ambient term.
    pub fn with_ambient(mut self, ambient: f32) -> Self {
        self.ambient = ambient;
        self
    }

    /// Sets the diffuse term.
    pub fn with_diffuse(mut self, diffuse: f32) -> Self {
        self.diffuse = diffuse;
        self
    }
}

/// Voxel volume configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoxelConfig {
    /// World-space edge length covered by the volume.
    pub world_size: f32,
    /// Voxels per edge; must be a power of two.
    pub resolution: u32,
    /// Mip level used for cone tracing and debug display.
    pub mip_level: u32,
    /// Debug point size at mip 0.
    pub point_base_size: f32,
}

impl Default for VoxelConfig {
    fn default() -> Self {
        Self {
            world_size: 16.0,
            resolution: 64,
            mip_level: 0,
            point_base_size: 10.0,
        }
    }
}

impl VoxelConfig {
    /// Creates a voxel configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the world size.
    pub fn with_world_size(mut self, world_size: f32) -> Self {
        self.world_size = world_size;
        self
    }

    /// Sets the resolution.
    pub fn with_resolution(mut self, resolution: u32) -> Self {
        self.resolution = resolution;
        self
    }

    /// Sets the mip level.
    pub fn with_mip_level(mut self, mip_level: u32) -> Self {
        self.mip_level = mip_level;
        self
    }

    /// Validated volume description.
    pub fn volume_desc(&self) -> Result<VolumeDesc> {
        VolumeDesc::new(self.world_size, self.resolution)
    }
}

/// Bilateral blur configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlurConfig {
    /// Edge sharpness; higher keeps more detail across normal discontinuities.
    pub sharpness: f32,
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self { sharpness: 8.0 }
    }
}

/// Weights of the additive final composite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeConfig {
    pub direct: f32,
    pub indirect: f32,
    pub reflection: f32,
    pub specular: f32,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            direct: 1.0,
            indirect: 1.0,
            reflection: 0.5,
            specular: 1.0,
        }
    }
}

impl CompositeConfig {
    /// Creates composite weights with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the direct-light weight.
    pub fn with_direct(mut self, direct: f32) -> Self {
        self.direct = direct;
        self
    }

    /// Sets the indirect-light weight.
    pub fn with_indirect(mut self, indirect: f32) -> Self {
        self.indirect = indirect;
        self
    }

    /// Sets the reflection weight.
    pub fn with_reflection(mut self, reflection: f32) -> Self {
        self.reflection = reflection;
        self
    }
}

/// Reference grid configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub cells: u32,
    pub color: Vec3,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cells: 16,
            color: Vec3::ONE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_default() {
        let options = PipelineOptions::default();
        assert_eq!((options.target_width, options.target_height), (1280, 720));
        assert_eq!(options.projection.fov_degrees, 45.0);
        assert_eq!(options.light.direction, Vec3::new(1.0, -5.0, 2.0));
        assert_eq!(options.voxel.world_size, 16.0);
        assert_eq!(options.voxel.point_base_size, 10.0);
        assert_eq!(options.grid.cells, 16);
    }

    #[test]
    fn test_builders() {
        let options = PipelineOptions::new()
            .with_target_size(640, 480)
            .with_voxel(VoxelConfig::new().with_resolution(32).with_mip_level(2))
            .with_light(LightConfig::new().with_ambient(0.2));
        assert_eq!(options.target_width, 640);
        assert_eq!(options.voxel.resolution, 32);
        assert_eq!(options.voxel.mip_level, 2);
        assert_eq!(options.light.ambient, 0.2);
        assert_eq!(options.light.diffuse, 0.6);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let options =
            PipelineOptions::from_json_str(r#"{ "voxel": { "resolution": 128 } }"#).unwrap();
        assert_eq!(options.voxel.resolution, 128);
        assert_eq!(options.voxel.world_size, 16.0);
        assert_eq!(options.target_width, 1280);
    }

    #[test]
    fn test_json_round_trip() {
        let options = PipelineOptions::new().with_composite(CompositeConfig::new().with_reflection(0.25));
        let json = options.to_json().unwrap();
        assert_eq!(PipelineOptions::from_json_str(&json).unwrap(), options);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(matches!(
            PipelineOptions::from_json_str("{ not json"),
            Err(crate::PipelineError::JsonError(_))
        ));
    }

    #[test]
    fn test_voxel_resolution_validated() {
        assert!(VoxelConfig::new().with_resolution(100).volume_desc().is_err());
        assert!(VoxelConfig::new().volume_desc().is_ok());
    }
}
