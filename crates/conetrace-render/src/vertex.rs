//! Fixed vertex buffer layouts.
//!
//! Shader locations equal the attribute slots in
//! [`conetrace_core::VERTEX_ATTRIBUTES`].

use conetrace_core::MeshVertex;

const MESH_ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
    0 => Float32x3, // v_vertex
    1 => Float32x2, // v_texture
    2 => Float32x3, // v_normal
    3 => Float32x3, // v_tangent
    4 => Float32x3 // v_bitangent
];

const POINT_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];

/// Layout of interleaved [`MeshVertex`] data.
#[must_use]
pub fn mesh_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &MESH_ATTRIBUTES,
    }
}

/// Layout of one point position per instance.
#[must_use]
pub fn point_instance_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &POINT_ATTRIBUTES,
    }
}

/// Vertices per point quad, expanded in the vertex shader.
pub const POINT_QUAD_VERTICES: u32 = 6;

#[cfg(test)]
mod tests {
    use super::*;
    use conetrace_core::VERTEX_ATTRIBUTES;

    #[test]
    fn test_mesh_locations_match_attribute_slots() {
        let layout = mesh_vertex_layout();
        for (attr, (slot, _)) in layout.attributes.iter().zip(VERTEX_ATTRIBUTES) {
            assert_eq!(attr.shader_location, slot);
        }
        let last = layout.attributes[4];
        assert_eq!(
            last.offset + last.format.size(),
            layout.array_stride
        );
    }

    #[test]
    fn test_points_step_per_instance() {
        let layout = point_instance_layout();
        assert_eq!(layout.step_mode, wgpu::VertexStepMode::Instance);
        assert_eq!(layout.array_stride, 12);
    }
}
