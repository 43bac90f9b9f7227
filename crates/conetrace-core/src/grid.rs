//! Reference grid drawn under the scene.

use glam::Vec3;

use crate::mesh::{MeshData, MeshVertex};
use crate::program::Topology;

/// A flat line grid on the XZ plane, centered on the origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    cells_x: u32,
    cells_z: u32,
    color: Vec3,
}

impl Grid {
    /// Creates a grid with unit-sized cells.
    #[must_use]
    pub fn new(cells_x: u32, cells_z: u32) -> Self {
        Self {
            cells_x,
            cells_z,
            color: Vec3::ONE,
        }
    }

    /// Sets the line color.
    pub fn set_color(&mut self, r: f32, g: f32, b: f32) {
        self.color = Vec3::new(r, g, b);
    }

    /// Line color.
    #[must_use]
    pub fn color(&self) -> Vec3 {
        self.color
    }

    /// Cell counts along X and Z.
    #[must_use]
    pub fn cells(&self) -> (u32, u32) {
        (self.cells_x, self.cells_z)
    }

    /// Builds line-list geometry: one line per cell boundary on each axis.
    #[must_use]
    pub fn mesh(&self) -> MeshData {
        let half_x = self.cells_x as f32 / 2.0;
        let half_z = self.cells_z as f32 / 2.0;
        let mut vertices = Vec::with_capacity(2 * (self.cells_x + self.cells_z + 2) as usize);

        for i in 0..=self.cells_x {
            let x = i as f32 - half_x;
            vertices.push(MeshVertex::new(Vec3::new(x, 0.0, -half_z), Vec3::Y));
            vertices.push(MeshVertex::new(Vec3::new(x, 0.0, half_z), Vec3::Y));
        }
        for k in 0..=self.cells_z {
            let z = k as f32 - half_z;
            vertices.push(MeshVertex::new(Vec3::new(-half_x, 0.0, z), Vec3::Y));
            vertices.push(MeshVertex::new(Vec3::new(half_x, 0.0, z), Vec3::Y));
        }

        MeshData {
            vertices,
            indices: None,
            topology: Topology::Lines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_line_count() {
        let grid = Grid::new(16, 16);
        let mesh = grid.mesh();
        assert_eq!(mesh.vertices.len(), 2 * (17 + 17));
        assert_eq!(mesh.topology, Topology::Lines);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_grid_is_centered() {
        let mesh = Grid::new(4, 2).mesh();
        let (min, max) = mesh.vertices.iter().fold(
            (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
            |(min, max), v| {
                let p = Vec3::from_array(v.position);
                (min.min(p), max.max(p))
            },
        );
        assert_eq!(min, Vec3::new(-2.0, 0.0, -1.0));
        assert_eq!(max, Vec3::new(2.0, 0.0, 1.0));
    }
}
