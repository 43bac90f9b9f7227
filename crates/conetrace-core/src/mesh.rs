//! CPU-side mesh data uploaded through a backend.

use glam::{Vec2, Vec3};

use crate::program::Topology;

/// Interleaved vertex matching the fixed attribute slots
/// (`v_vertex`, `v_texture`, `v_normal`, `v_tangent`, `v_bitangent`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub texcoord: [f32; 2],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
}

impl MeshVertex {
    /// Creates a vertex with a position and normal; other attributes default.
    #[must_use]
    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Self {
            position: position.to_array(),
            texcoord: [0.0, 0.0],
            normal: normal.to_array(),
            tangent: [1.0, 0.0, 0.0],
            bitangent: [0.0, 0.0, 1.0],
        }
    }

    /// Sets the texture coordinate.
    #[must_use]
    pub fn with_texcoord(mut self, texcoord: Vec2) -> Self {
        self.texcoord = texcoord.to_array();
        self
    }

    /// Sets the tangent frame.
    #[must_use]
    pub fn with_tangents(mut self, tangent: Vec3, bitangent: Vec3) -> Self {
        self.tangent = tangent.to_array();
        self.bitangent = bitangent.to_array();
        self
    }
}

/// Mesh geometry with optional indices.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Option<Vec<u32>>,
    pub topology: Topology,
}

impl MeshData {
    /// Number of elements a draw consumes.
    #[must_use]
    pub fn element_count(&self) -> u32 {
        match &self.indices {
            Some(indices) => indices.len() as u32,
            None => self.vertices.len() as u32,
        }
    }

    /// Checks that indices stay in range and the element count fits the topology.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(indices) = &self.indices {
            let n = self.vertices.len() as u32;
            if let Some(bad) = indices.iter().find(|&&i| i >= n) {
                return Err(format!("index {bad} out of range for {n} vertices"));
            }
        }
        let per_primitive = match self.topology {
            Topology::Triangles => 3,
            Topology::Lines => 2,
        };
        if self.element_count() % per_primitive != 0 {
            return Err(format!(
                "{} elements do not form whole {:?} primitives",
                self.element_count(),
                self.topology
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout_size() {
        // position + texcoord + normal + tangent + bitangent
        assert_eq!(std::mem::size_of::<MeshVertex>(), (3 + 2 + 3 + 3 + 3) * 4);
    }

    #[test]
    fn test_index_out_of_range() {
        let mesh = MeshData {
            vertices: vec![MeshVertex::new(Vec3::ZERO, Vec3::Y); 3],
            indices: Some(vec![0, 1, 3]),
            topology: Topology::Triangles,
        };
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn test_partial_primitive_rejected() {
        let mesh = MeshData {
            vertices: vec![MeshVertex::new(Vec3::ZERO, Vec3::Y); 3],
            indices: None,
            topology: Topology::Lines,
        };
        assert!(mesh.validate().is_err());
    }
}
